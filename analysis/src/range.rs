pub mod arith;
#[cfg(test)]
mod tests;

use core::fmt;

use smallvec::{SmallVec, smallvec};
use vrp_ir::{Immediate, IntType, Value};

use crate::LatticeLike;

/// The disjoint, inclusive pieces making up the set of values described by a [ValueRange]
pub type Pieces = SmallVec<[(i128, i128); 2]>;

/// A contiguous set of integers `[lo, hi]`, or the complement of one, `~[lo, hi]`.
///
/// Bounds are canonical values of `ty`. An interval never covers the whole type, and is never
/// empty: those cases are represented by [ValueRange::Varying] and [ValueRange::Undefined].
#[derive(Clone, PartialEq, Eq)]
pub struct Interval {
    lo: i128,
    hi: i128,
    ty: IntType,
    /// When set, this is the anti-range `~[lo, hi]`, i.e. `[MIN, lo - 1] ∪ [hi + 1, MAX]`.
    ///
    /// Anti-ranges are only constructed with `MIN < lo <= hi < MAX`.
    inverted: bool,
    /// The SSA names known to hold the same value, sorted and deduplicated
    equiv: SmallVec<[Value; 2]>,
}

impl Interval {
    #[inline(always)]
    pub const fn lo(&self) -> i128 {
        self.lo
    }

    #[inline(always)]
    pub const fn hi(&self) -> i128 {
        self.hi
    }

    #[inline(always)]
    pub const fn ty(&self) -> IntType {
        self.ty
    }

    #[inline(always)]
    pub const fn is_anti_range(&self) -> bool {
        self.inverted
    }

    #[inline]
    pub fn equivalences(&self) -> &[Value] {
        &self.equiv
    }
}

/// The abstract value computed for an integer SSA name.
#[derive(Default, Clone, PartialEq, Eq)]
pub enum ValueRange {
    /// No definition reaching this point has been executed yet
    #[default]
    Undefined,
    Interval(Interval),
    /// Any value of the type is possible
    Varying,
}

/// Construction
impl ValueRange {
    /// The range `[lo, hi]` of `ty`.
    ///
    /// Bounds outside of `ty` are clamped. An empty range is undefined, and the full range of `ty`
    /// is varying.
    pub fn new(lo: i128, hi: i128, ty: IntType) -> Self {
        let lo = lo.max(ty.min_value());
        let hi = hi.min(ty.max_value());
        if lo > hi {
            Self::Undefined
        } else if lo == ty.min_value() && hi == ty.max_value() {
            Self::Varying
        } else {
            Self::Interval(Interval {
                lo,
                hi,
                ty,
                inverted: false,
                equiv: SmallVec::new(),
            })
        }
    }

    /// The anti-range `~[lo, hi]` of `ty`, i.e. every value of `ty` except those in `[lo, hi]`
    pub fn anti(lo: i128, hi: i128, ty: IntType) -> Self {
        let (min, max) = (ty.min_value(), ty.max_value());
        let lo = lo.max(min);
        let hi = hi.min(max);
        if lo > hi {
            return Self::Varying;
        }
        match (lo == min, hi == max) {
            (true, true) => Self::Undefined,
            (true, false) => Self::new(hi + 1, max, ty),
            (false, true) => Self::new(min, lo - 1, ty),
            (false, false) => Self::Interval(Interval {
                lo,
                hi,
                ty,
                inverted: true,
                equiv: SmallVec::new(),
            }),
        }
    }

    #[inline]
    pub fn singleton(value: i128, ty: IntType) -> Self {
        Self::new(value, value, ty)
    }

    #[inline]
    pub fn constant(imm: Immediate) -> Self {
        Self::singleton(imm.value(), imm.ty())
    }

    /// The best range representable as a [ValueRange] which contains every one of `pieces`.
    ///
    /// Pieces may be unsorted, overlapping, or stick out of `ty`. When the union has more than one
    /// gap, the representation which adds the fewest values is chosen: either the hull of all
    /// pieces, or the anti-range of the widest gap.
    pub fn from_pieces(pieces: &[(i128, i128)], ty: IntType) -> Self {
        let (min, max) = (ty.min_value(), ty.max_value());
        let mut sorted = SmallVec::<[(i128, i128); 8]>::new();
        sorted.extend(
            pieces
                .iter()
                .map(|&(lo, hi)| (lo.max(min), hi.min(max)))
                .filter(|(lo, hi)| lo <= hi),
        );
        sorted.sort_unstable();

        let mut merged = SmallVec::<[(i128, i128); 8]>::new();
        for (lo, hi) in sorted {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }

        let (first, last) = match (merged.first(), merged.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Self::Undefined,
        };
        if merged.len() == 1 {
            return Self::new(first.0, first.1, ty);
        }

        let widest_gap = merged
            .windows(2)
            .map(|w| (w[0].1 + 1, w[1].0 - 1))
            .max_by_key(|(lo, hi)| hi - lo)
            .unwrap_or((first.1 + 1, last.0 - 1));
        let gap_size = widest_gap.1 - widest_gap.0 + 1;
        let outside = (first.0 - min) + (max - last.1);
        if gap_size > outside {
            Self::anti(widest_gap.0, widest_gap.1, ty)
        } else {
            Self::new(first.0, last.1, ty)
        }
    }

    /// Attach `value` to the equivalence set of this range.
    ///
    /// Only intervals carry equivalences, so this has no effect on other ranges.
    pub fn with_equivalence(mut self, value: Value) -> Self {
        self.add_equivalence(value);
        self
    }

    pub fn add_equivalence(&mut self, value: Value) {
        if let Self::Interval(interval) = self {
            if let Err(index) = interval.equiv.binary_search(&value) {
                interval.equiv.insert(index, value);
            }
        }
    }

    /// Attach all of `values` to the equivalence set of this range
    pub fn add_equivalences(&mut self, values: &[Value]) {
        for value in values {
            self.add_equivalence(*value);
        }
    }

    /// This range without any equivalences
    pub fn without_equivalences(mut self) -> Self {
        if let Self::Interval(interval) = &mut self {
            interval.equiv.clear();
        }
        self
    }
}

/// Queries
impl ValueRange {
    #[inline(always)]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[inline(always)]
    pub const fn is_varying(&self) -> bool {
        matches!(self, Self::Varying)
    }

    #[inline]
    pub const fn as_interval(&self) -> Option<&Interval> {
        match self {
            Self::Interval(interval) => Some(interval),
            _ => None,
        }
    }

    #[inline]
    pub fn is_anti_range(&self) -> bool {
        self.as_interval().is_some_and(Interval::is_anti_range)
    }

    pub fn equivalences(&self) -> &[Value] {
        match self {
            Self::Interval(interval) => &interval.equiv,
            _ => &[],
        }
    }

    /// The disjoint pieces of this range, interpreted in `ty`
    pub fn pieces(&self, ty: IntType) -> Pieces {
        match self {
            Self::Undefined => SmallVec::new(),
            Self::Varying => smallvec![(ty.min_value(), ty.max_value())],
            Self::Interval(Interval {
                lo,
                hi,
                inverted: false,
                ..
            }) => smallvec![(*lo, *hi)],
            Self::Interval(Interval {
                lo,
                hi,
                ty,
                inverted: true,
                ..
            }) => smallvec![(ty.min_value(), lo - 1), (hi + 1, ty.max_value())],
        }
    }

    /// The smallest and largest values in this range, or `None` if it is undefined
    pub fn bounds(&self, ty: IntType) -> Option<(i128, i128)> {
        let pieces = self.pieces(ty);
        Some((pieces.first()?.0, pieces.last()?.1))
    }

    /// If this range contains exactly one value, return it
    pub fn as_singleton(&self) -> Option<i128> {
        match self {
            Self::Interval(Interval {
                lo,
                hi,
                inverted: false,
                ..
            }) if lo == hi => Some(*lo),
            _ => None,
        }
    }

    /// If this range contains exactly two values, return them in ascending order
    pub fn two_valued(&self, ty: IntType) -> Option<(i128, i128)> {
        let pieces = self.pieces(ty);
        match pieces.as_slice() {
            [(lo, hi)] if hi - lo == 1 => Some((*lo, *hi)),
            [(a, b), (c, d)] if a == b && c == d => Some((*a, *c)),
            _ => None,
        }
    }

    pub fn contains(&self, value: i128, ty: IntType) -> bool {
        self.pieces(ty).iter().any(|(lo, hi)| *lo <= value && value <= *hi)
    }

    /// Returns true if every value in this range is `>= 0`
    pub fn is_nonnegative(&self, ty: IntType) -> bool {
        self.bounds(ty).is_some_and(|(lo, _)| lo >= 0)
    }

    /// Returns true if every value in this range is `<= 0`
    pub fn is_nonpositive(&self, ty: IntType) -> bool {
        self.bounds(ty).is_some_and(|(_, hi)| hi <= 0)
    }

    #[inline]
    pub fn may_be_zero(&self, ty: IntType) -> bool {
        self.contains(0, ty)
    }

    /// Returns true if every value in this range, interpreted in `ty`, is representable in `to`
    pub fn fits_in(&self, ty: IntType, to: IntType) -> bool {
        match self.bounds(ty) {
            None => true,
            Some((lo, hi)) => to.contains(lo) && to.contains(hi),
        }
    }

    /// Compute `(must_be_nonzero, may_be_nonzero)` bit masks of this range.
    ///
    /// A bit set in the first mask is set in every value of the range, a bit clear in the second
    /// is clear in every value of the range. Both are raw bit patterns of `ty`.
    pub fn nonzero_bits(&self, ty: IntType) -> (u64, u64) {
        let pieces = self.pieces(ty);
        if pieces.is_empty() {
            return (0, ty.mask());
        }
        pieces.iter().fold((ty.mask(), 0), |(must, may), &(lo, hi)| {
            let (piece_must, piece_may) = piece_nonzero_bits(lo, hi, ty);
            (must & piece_must, may | piece_may)
        })
    }

    /// The range of values whose bit patterns include every bit of `must` and no bit outside
    /// `may`
    pub fn from_nonzero_bits(must: u64, may: u64, ty: IntType) -> Self {
        let (must, may) = (must & ty.mask(), may & ty.mask());
        if must & !may != 0 {
            return Self::Undefined;
        }
        if !ty.is_signed() {
            return Self::new(must as i128, may as i128, ty);
        }
        let sign = 1u64 << (ty.bits() - 1);
        if may & sign == 0 {
            Self::new(must as i128, may as i128, ty)
        } else if must & sign != 0 {
            Self::new(ty.from_bits(must), ty.from_bits(may), ty)
        } else {
            Self::new(ty.from_bits(must | sign), (may & !sign) as i128, ty)
        }
    }
}

fn piece_nonzero_bits(lo: i128, hi: i128, ty: IntType) -> (u64, u64) {
    if lo < 0 && hi >= 0 {
        return (0, ty.mask());
    }
    let (lo_bits, hi_bits) = (ty.to_bits(lo), ty.to_bits(hi));
    let differing = lo_bits ^ hi_bits;
    if differing == 0 {
        return (lo_bits, lo_bits);
    }
    let below = u64::MAX >> differing.leading_zeros();
    (lo_bits & !below, (hi_bits | below) & ty.mask())
}

fn intersect_equivalences(a: &[Value], b: &[Value]) -> SmallVec<[Value; 2]> {
    a.iter().copied().filter(|value| b.binary_search(value).is_ok()).collect()
}

impl ValueRange {
    fn set_equivalences(&mut self, equiv: SmallVec<[Value; 2]>) {
        if let Self::Interval(interval) = self {
            interval.equiv = equiv;
        }
    }
}

impl LatticeLike for ValueRange {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Undefined, other) | (other, Self::Undefined) => other.clone(),
            (Self::Varying, _) | (_, Self::Varying) => Self::Varying,
            (Self::Interval(a), Self::Interval(b)) => {
                debug_assert_eq!(a.ty, b.ty, "cannot join ranges of different types");
                if a == b {
                    return self.clone();
                }
                let mut pieces = self.pieces(a.ty);
                pieces.extend(other.pieces(b.ty));
                let mut joined = Self::from_pieces(&pieces, a.ty);
                joined.set_equivalences(intersect_equivalences(&a.equiv, &b.equiv));
                joined
            }
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => Self::Undefined,
            (Self::Varying, other) | (other, Self::Varying) => other.clone(),
            (Self::Interval(a), Self::Interval(b)) => {
                debug_assert_eq!(a.ty, b.ty, "cannot meet ranges of different types");
                let ty = a.ty;
                let mut pieces = Pieces::new();
                for (alo, ahi) in self.pieces(ty) {
                    for (blo, bhi) in other.pieces(ty) {
                        let (lo, hi) = (alo.max(blo), ahi.min(bhi));
                        if lo <= hi {
                            pieces.push((lo, hi));
                        }
                    }
                }
                let mut met = Self::from_pieces(&pieces, ty);
                met.add_equivalences(&a.equiv);
                met.add_equivalences(&b.equiv);
                met
            }
        }
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("UNDEFINED"),
            Self::Varying => f.write_str("VARYING"),
            Self::Interval(interval) => fmt::Display::fmt(interval, f),
        }
    }
}

impl fmt::Debug for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tilde = if self.inverted { "~" } else { "" };
        write!(f, "{} {tilde}[{}, {}]", self.ty, self.lo, self.hi)?;
        if !self.equiv.is_empty() {
            f.write_str("  EQUIVALENCES: {")?;
            for value in self.equiv.iter() {
                write!(f, " {value}")?;
            }
            write!(f, " }} ({} elements)", self.equiv.len())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<Immediate> for ValueRange {
    #[inline]
    fn from(imm: Immediate) -> Self {
        Self::constant(imm)
    }
}
