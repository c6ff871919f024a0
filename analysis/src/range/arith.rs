//! Transfer functions of the integer operators over [ValueRange].
//!
//! Every function here interprets its inputs at their declared type, computes the exact
//! mathematical result of each pair of operand pieces in `i128`, and then maps that result back
//! into the result type according to its overflow semantics:
//!
//! * Signed overflow is undefined, so any result which might overflow is VARYING.
//! * Unsigned arithmetic wraps, so a result spanning a single wrap-around becomes an anti-range.
//!
//! If any operand is UNDEFINED, so is the result.

use vrp_ir::{BinaryOp, IntType, UnaryOp};

use super::{Pieces, ValueRange};
use crate::LatticeLike;

/// The range of `[lo, hi]` reduced modulo `2^bits` into `ty`.
///
/// This is exact whenever the reduced set is representable, i.e. when the interval spans at most a
/// single wrap-around of `ty`.
pub fn wrapped(lo: i128, hi: i128, ty: IntType) -> ValueRange {
    if lo > hi {
        return ValueRange::Undefined;
    }
    if ty.contains(lo) && ty.contains(hi) {
        return ValueRange::new(lo, hi, ty);
    }
    match hi.checked_sub(lo) {
        Some(span) if span < ty.modulus() - 1 => {
            let (wlo, whi) = (ty.wrap(lo), ty.wrap(hi));
            if wlo <= whi {
                ValueRange::new(wlo, whi, ty)
            } else {
                ValueRange::anti(whi + 1, wlo - 1, ty)
            }
        }
        _ => ValueRange::Varying,
    }
}

/// The range of the exact result `[lo, hi]` of an arithmetic operation in `ty`
pub fn overflowing(lo: i128, hi: i128, ty: IntType) -> ValueRange {
    if ty.contains(lo) && ty.contains(hi) {
        ValueRange::new(lo, hi, ty)
    } else if ty.overflow_wraps() {
        wrapped(lo, hi, ty)
    } else {
        log::trace!(target: "vrp:extract", "[{lo}, {hi}] may overflow {ty}");
        ValueRange::Varying
    }
}

fn corners(
    (alo, ahi): (i128, i128),
    (blo, bhi): (i128, i128),
    f: impl Fn(i128, i128) -> Option<i128>,
) -> Option<(i128, i128)> {
    let values = [f(alo, blo)?, f(alo, bhi)?, f(ahi, blo)?, f(ahi, bhi)?];
    let lo = values.iter().copied().min()?;
    let hi = values.iter().copied().max()?;
    Some((lo, hi))
}

/// Split the pieces of a divisor around zero, which is never a valid divisor
fn nonzero_pieces(pieces: Pieces) -> Pieces {
    let mut split = Pieces::new();
    for (lo, hi) in pieces {
        if lo < 0 {
            split.push((lo, hi.min(-1)));
        }
        if hi > 0 {
            split.push((lo.max(1), hi));
        }
    }
    split
}

/// The exact mathematical bounds of `a op b` for one pair of pieces, if the operator is one of the
/// arithmetic operators and the result fits in `i128`
pub fn exact_bounds(op: BinaryOp, a: (i128, i128), b: (i128, i128)) -> Option<(i128, i128)> {
    match op {
        BinaryOp::Add => Some((a.0.checked_add(b.0)?, a.1.checked_add(b.1)?)),
        BinaryOp::Sub => Some((a.0.checked_sub(b.1)?, a.1.checked_sub(b.0)?)),
        BinaryOp::Mul => corners(a, b, i128::checked_mul),
        _ => None,
    }
}

/// The range of `a op b`, where `a` is of type `ty`, and `b` is of type `b_ty` (which differs
/// from `ty` only for shifts).
pub fn binary(
    op: BinaryOp,
    a: &ValueRange,
    ty: IntType,
    b: &ValueRange,
    b_ty: IntType,
) -> ValueRange {
    if a.is_undefined() || b.is_undefined() {
        return ValueRange::Undefined;
    }
    match op {
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => return bitwise(op, a, b, ty),
        BinaryOp::Shl | BinaryOp::Shr => {
            let Some((slo, shi)) = b.bounds(b_ty) else {
                return ValueRange::Undefined;
            };
            if slo < 0 || shi >= i128::from(ty.bits()) {
                return ValueRange::Varying;
            }
        }
        _ => (),
    }

    let mut rhs = b.pieces(b_ty);
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) {
        rhs = nonzero_pieces(rhs);
        if rhs.is_empty() {
            log::trace!(target: "vrp:extract", "{} by zero has no defined result", op.as_str());
            return ValueRange::Undefined;
        }
    }

    let mut result = ValueRange::Undefined;
    for pa in a.pieces(ty) {
        for &pb in rhs.iter() {
            let piece = binary_piece(op, pa, pb, ty);
            result = result.join(&piece);
            if result.is_varying() {
                return result;
            }
        }
    }
    result
}

fn binary_piece(op: BinaryOp, a: (i128, i128), b: (i128, i128), ty: IntType) -> ValueRange {
    let bounds = match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => exact_bounds(op, a, b),
        BinaryOp::Div => corners(a, b, i128::checked_div),
        BinaryOp::Rem => Some(remainder(a, b)),
        BinaryOp::Shl => {
            let factors = (1i128 << b.0, 1i128 << b.1);
            corners(a, factors, i128::checked_mul)
        }
        BinaryOp::Shr => corners(a, b, |x, s| Some(x >> s)),
        BinaryOp::Min => Some((a.0.min(b.0), a.1.min(b.1))),
        BinaryOp::Max => Some((a.0.max(b.0), a.1.max(b.1))),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => unreachable!(),
    };
    match bounds {
        Some((lo, hi)) => overflowing(lo, hi, ty),
        None => ValueRange::Varying,
    }
}

/// Bounds of the truncating remainder `a % b` for a divisor piece `b` excluding zero.
///
/// The magnitude of the result is less than that of the divisor and no greater than that of the
/// dividend, and its sign follows the dividend.
fn remainder((alo, ahi): (i128, i128), (blo, bhi): (i128, i128)) -> (i128, i128) {
    let min_divisor = blo.abs().min(bhi.abs());
    if alo >= 0 && ahi < min_divisor {
        return (alo, ahi);
    }
    if alo == ahi && blo == bhi {
        let r = alo % blo;
        return (r, r);
    }
    let limit = blo.abs().max(bhi.abs()) - 1;
    let lo = if alo >= 0 { 0 } else { alo.max(-limit) };
    let hi = if ahi <= 0 { 0 } else { ahi.min(limit) };
    (lo, hi)
}

fn bitwise(op: BinaryOp, a: &ValueRange, b: &ValueRange, ty: IntType) -> ValueRange {
    let (a_must, a_may) = a.nonzero_bits(ty);
    let (b_must, b_may) = b.nonzero_bits(ty);
    let (must, may) = match op {
        BinaryOp::And => (a_must & b_must, a_may & b_may),
        BinaryOp::Or => (a_must | b_must, a_may | b_may),
        BinaryOp::Xor => (
            (a_must & !b_may) | (b_must & !a_may),
            (a_may | b_may) & !(a_must & b_must),
        ),
        _ => unreachable!(),
    };
    let result = ValueRange::from_nonzero_bits(must, may, ty);

    let (Some((alo, ahi)), Some((blo, bhi))) = (a.bounds(ty), b.bounds(ty)) else {
        return result;
    };
    match op {
        // x & y is no larger than any non-negative operand
        BinaryOp::And if alo >= 0 || blo >= 0 => {
            let hi = match (alo >= 0, blo >= 0) {
                (true, true) => ahi.min(bhi),
                (true, false) => ahi,
                _ => bhi,
            };
            result.meet(&ValueRange::new(0, hi, ty))
        }
        // x | y is no smaller than either operand when both are non-negative
        BinaryOp::Or if alo >= 0 && blo >= 0 => {
            result.meet(&ValueRange::new(alo.max(blo), ty.max_value(), ty))
        }
        _ => result,
    }
}

/// The range of `op a`
pub fn unary(op: UnaryOp, a: &ValueRange, ty: IntType) -> ValueRange {
    if a.is_undefined() {
        return ValueRange::Undefined;
    }
    let mut result = ValueRange::Undefined;
    for (lo, hi) in a.pieces(ty) {
        let piece = match op {
            UnaryOp::Neg => overflowing(-hi, -lo, ty),
            UnaryOp::Not => overflowing(-1 - hi, -1 - lo, ty),
            UnaryOp::Abs if lo >= 0 => ValueRange::new(lo, hi, ty),
            UnaryOp::Abs if hi <= 0 => overflowing(-hi, -lo, ty),
            UnaryOp::Abs => overflowing(0, hi.max(-lo), ty),
        };
        result = result.join(&piece);
    }
    result
}

/// The range of `a`, of type `from`, converted to the integer type `to`
pub fn convert(a: &ValueRange, from: IntType, to: IntType) -> ValueRange {
    if a.is_undefined() {
        return ValueRange::Undefined;
    }
    if from == to {
        return a.clone().without_equivalences();
    }
    let mut result = ValueRange::Undefined;
    for (lo, hi) in a.pieces(from) {
        result = result.join(&wrapped(lo, hi, to));
    }
    result
}

/// Whether the arithmetic operation `a op b` may overflow, must overflow, or cannot overflow `ty`,
/// as a range of the `i1` overflow flag
pub fn overflow_flag(op: BinaryOp, a: &ValueRange, b: &ValueRange, ty: IntType) -> ValueRange {
    if a.is_undefined() || b.is_undefined() {
        return ValueRange::Undefined;
    }
    let (mut may_overflow, mut may_not_overflow) = (false, false);
    for pa in a.pieces(ty) {
        for pb in b.pieces(ty) {
            match exact_bounds(op, pa, pb) {
                Some((lo, hi)) if ty.contains(lo) && ty.contains(hi) => may_not_overflow = true,
                Some((lo, hi)) if hi < ty.min_value() || lo > ty.max_value() => {
                    may_overflow = true
                }
                _ => return ValueRange::Varying,
            }
        }
    }
    match (may_overflow, may_not_overflow) {
        (true, false) => ValueRange::singleton(1, IntType::I1),
        (false, true) => ValueRange::singleton(0, IntType::I1),
        _ => ValueRange::Varying,
    }
}

/// The range of `a op b` computed with wrapping semantics regardless of the signedness of `ty`
pub fn wrapping(op: BinaryOp, a: &ValueRange, b: &ValueRange, ty: IntType) -> ValueRange {
    if a.is_undefined() || b.is_undefined() {
        return ValueRange::Undefined;
    }
    let mut result = ValueRange::Undefined;
    for pa in a.pieces(ty) {
        for pb in b.pieces(ty) {
            let piece = match exact_bounds(op, pa, pb) {
                Some((lo, hi)) => wrapped(lo, hi, ty),
                None => ValueRange::Varying,
            };
            result = result.join(&piece);
        }
    }
    result
}

/// The range of `a op b` for an operation which traps rather than overflow `ty`
pub fn checked(op: BinaryOp, a: &ValueRange, b: &ValueRange, ty: IntType) -> ValueRange {
    if a.is_undefined() || b.is_undefined() {
        return ValueRange::Undefined;
    }
    let mut result = ValueRange::Undefined;
    for pa in a.pieces(ty) {
        for pb in b.pieces(ty) {
            let piece = match exact_bounds(op, pa, pb) {
                Some((lo, hi)) => ValueRange::new(lo, hi, ty),
                None => ValueRange::Varying,
            };
            result = result.join(&piece);
        }
    }
    result
}
