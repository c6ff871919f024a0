use core::fmt;

/// Implemented by values which form a bounded
/// [lattice](https://en.wikipedia.org/wiki/Lattice_(order)#Definition).
///
/// The lattices used by range propagation have two distinguished elements:
///
/// * _Undefined_ (bottom), the initial state of every value, meaning that no definition reaching
///   the current program point has been executed yet.
/// * _Varying_ (top), meaning nothing useful is known about the value. For an integer this is the
///   same as saying that the value may be anything representable by its type.
///
/// `join` must be monotonic: `a.join(b)` contains both `a` and `b`. Likewise, `meet` must produce a
/// value contained in both of its inputs. Both must be sound over-approximations when the exact
/// result cannot be represented, i.e. `join` may lose precision by growing, `meet` only by not
/// shrinking as far as it could.
pub trait LatticeLike: Default + Clone + Eq + fmt::Debug {
    /// The least upper bound of `self` and `other`, i.e. the union of the sets they describe
    fn join(&self, other: &Self) -> Self;

    /// The greatest lower bound of `self` and `other`, i.e. the intersection of the sets they
    /// describe
    fn meet(&self, other: &Self) -> Self;
}
