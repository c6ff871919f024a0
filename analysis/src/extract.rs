//! Transfer functions of statements: the ranges implied for the SSA names a statement defines,
//! given the ranges of its operands.

use smallvec::{SmallVec, smallvec};
use vrp_ir::{
    BinaryOp, Callee, Edge, Expr, Function, Inst, InstData, IntType, InternalFn, Operand,
    Predicate, Value,
};

use crate::{
    LatticeLike, RangeQuery, Truth, ValueRange,
    evaluate::{compare_names, evaluate_operands},
    query::{is_tracked, operand_int_type},
    range::arith,
};

/// The ranges of the integer SSA names defined by a statement
pub type DefRanges = SmallVec<[(Value, ValueRange); 2]>;

/// Compute the ranges of the integer SSA names defined by `inst`.
///
/// Returns `None` if the effect of `inst` cannot be modeled, in which case every name it defines
/// must be considered VARYING. PHIs are handled as if every incoming edge were executable, see
/// [extract_range_from_phi] for the precise form used during propagation.
pub fn extract_ranges(func: &Function, inst: Inst, query: &dyn RangeQuery) -> Option<DefRanges> {
    let ranges: DefRanges = match func.inst(inst) {
        InstData::Phi { dest, .. } => {
            smallvec![(*dest, extract_range_from_phi(func, inst, query, &|_| true))]
        }
        InstData::Assign { dest, expr } => match func.value_type(*dest).as_int() {
            Some(ty) => smallvec![(*dest, extract_range_from_expr(func, expr, ty, query))],
            None => SmallVec::new(),
        },
        InstData::Assert {
            dest,
            src,
            pred,
            bound,
        } => smallvec![(*dest, extract_range_from_assert(func, *src, *pred, bound, query))],
        InstData::Call {
            dests,
            callee: Callee::Internal(callee),
            args,
        } => extract_range_basic(func, *callee, args, dests, query),
        InstData::Call { .. } => return None,
        _ => SmallVec::new(),
    };
    Some(ranges.into_iter().filter(|(value, _)| is_tracked(func, *value)).collect())
}

/// Compute the range of the right-hand side `expr` of an assignment to a name of type `ty`
pub fn extract_range_from_expr(
    func: &Function,
    expr: &Expr,
    ty: IntType,
    query: &dyn RangeQuery,
) -> ValueRange {
    match expr {
        Expr::Copy(src) => {
            let mut range = query.range_of_operand(func, src);
            if let Some(src) = src.as_value() {
                range.add_equivalence(src);
            }
            range
        }
        Expr::Unary(op, operand) => arith::unary(*op, &query.range_of_operand(func, operand), ty),
        Expr::Binary(op, lhs, rhs) => extract_range_from_binary(func, *op, lhs, rhs, ty, query),
        Expr::Compare(pred, lhs, rhs) => {
            let a = query.range_of_operand(func, lhs);
            let b = query.range_of_operand(func, rhs);
            if a.is_undefined() || b.is_undefined() {
                return ValueRange::Undefined;
            }
            match evaluate_operands(func, *pred, lhs, rhs, query) {
                Truth::AlwaysTrue => ValueRange::singleton(1, ty),
                Truth::AlwaysFalse => ValueRange::singleton(0, ty),
                Truth::Unknown => ValueRange::new(0, 1, ty),
            }
        }
        Expr::Select(cond, then_value, else_value) => {
            let cond = query.range_of_operand(func, cond);
            match cond.as_singleton() {
                _ if cond.is_undefined() => ValueRange::Undefined,
                Some(0) => query.range_of_operand(func, else_value),
                Some(_) => query.range_of_operand(func, then_value),
                None => query
                    .range_of_operand(func, then_value)
                    .join(&query.range_of_operand(func, else_value)),
            }
        }
        Expr::Convert(src) => match operand_int_type(func, src) {
            Some(from) => arith::convert(&query.range_of_operand(func, src), from, ty),
            // Float to integer conversions are not modeled
            None => ValueRange::Varying,
        },
    }
}

fn extract_range_from_binary(
    func: &Function,
    op: BinaryOp,
    lhs: &Operand,
    rhs: &Operand,
    ty: IntType,
    query: &dyn RangeQuery,
) -> ValueRange {
    let a = query.range_of_operand(func, lhs);
    let b = query.range_of_operand(func, rhs);
    if a.is_undefined() || b.is_undefined() {
        return ValueRange::Undefined;
    }

    // `x - x`, `x ^ x` and friends are decided by the names alone
    if let (Operand::Value(x), Operand::Value(y)) = (lhs, rhs) {
        if compare_names(Predicate::Eq, *x, *y, ty, query) == Truth::AlwaysTrue {
            match op {
                BinaryOp::Sub | BinaryOp::Xor => return ValueRange::singleton(0, ty),
                BinaryOp::And | BinaryOp::Or | BinaryOp::Min | BinaryOp::Max => {
                    return a.without_equivalences();
                }
                _ => (),
            }
        }
    }

    let b_ty = operand_int_type(func, rhs).unwrap_or(ty);
    arith::binary(op, &a, ty, &b, b_ty)
}

/// Compute the range of the name defined by `assert src pred bound`.
///
/// The result is the range of `src` intersected with the values satisfying the assertion. The
/// defined name is equivalent to `src`, and to `bound` when the assertion is an equality.
pub fn extract_range_from_assert(
    func: &Function,
    src: Value,
    pred: Predicate,
    bound: &Operand,
    query: &dyn RangeQuery,
) -> ValueRange {
    let Some(ty) = func.value_type(src).as_int() else {
        return ValueRange::Varying;
    };
    let src_range = query.range_of(src);
    if src_range.is_undefined() {
        return ValueRange::Undefined;
    }
    let limit = extract_range_for_var_from_comparison_expr(
        pred,
        &query.range_of_operand(func, bound),
        ty,
    );
    let mut range = src_range.meet(&limit);
    range.add_equivalence(src);
    if let (Predicate::Eq, Some(bound)) = (pred, bound.as_value()) {
        range.add_equivalence(bound);
    }
    log::trace!(
        target: "vrp:extract",
        "assert {src} {pred} {bound}: {src_range} & {limit} = {range}"
    );
    range
}

/// Compute the range of the values `x` of type `ty` for which `x pred b` holds for some `b` in
/// `bound`.
pub fn extract_range_for_var_from_comparison_expr(
    pred: Predicate,
    bound: &ValueRange,
    ty: IntType,
) -> ValueRange {
    let Some((lo, hi)) = bound.bounds(ty) else {
        return ValueRange::Undefined;
    };
    let (min, max) = (ty.min_value(), ty.max_value());
    match pred {
        Predicate::Eq => bound.clone().without_equivalences(),
        Predicate::Ne => match bound.as_singleton() {
            Some(value) => ValueRange::anti(value, value, ty),
            None => ValueRange::Varying,
        },
        Predicate::Lt => ValueRange::new(min, hi - 1, ty),
        Predicate::Le => ValueRange::new(min, hi, ty),
        Predicate::Gt => ValueRange::new(lo + 1, max, ty),
        Predicate::Ge => ValueRange::new(lo, max, ty),
    }
}

/// Compute the range of the PHI `inst` as the join of the incoming values along every edge for
/// which `is_executable` holds.
///
/// Edges which have not been found executable yet contribute nothing.
pub fn extract_range_from_phi(
    func: &Function,
    inst: Inst,
    query: &dyn RangeQuery,
    is_executable: &dyn Fn(Edge) -> bool,
) -> ValueRange {
    let InstData::Phi { dest, args } = func.inst(inst) else {
        return ValueRange::Varying;
    };
    if !is_tracked(func, *dest) {
        return ValueRange::Varying;
    }
    let mut range = ValueRange::Undefined;
    for (edge, arg) in args.iter() {
        if !is_executable(*edge) {
            continue;
        }
        range = range.join(&query.range_of_operand(func, arg));
        if range.is_varying() {
            break;
        }
    }
    range
}

/// The number of leading zero bits of the raw bit pattern `bits` of `ty`
fn leading_zeros(bits: u64, ty: IntType) -> i128 {
    i128::from(bits.leading_zeros() - (64 - ty.bits()))
}

/// The number of trailing zero bits of the raw bit pattern `bits` of `ty`
fn trailing_zeros(bits: u64, ty: IntType) -> i128 {
    if bits == 0 { i128::from(ty.bits()) } else { i128::from(bits.trailing_zeros()) }
}

/// Compute the ranges of the results of a call to the runtime helper `callee`
pub fn extract_range_basic(
    func: &Function,
    callee: InternalFn,
    args: &[Operand],
    dests: &[Value],
    query: &dyn RangeQuery,
) -> DefRanges {
    let mut ranges = DefRanges::new();
    let Some(&dest) = dests.first() else {
        return ranges;
    };
    let operands = args.first().and_then(|arg| {
        Some((arg, operand_int_type(func, arg)?, func.value_type(dest).as_int()?))
    });
    let Some((arg, ty, dest_ty)) = operands else {
        ranges.extend(
            dests
                .iter()
                .filter(|&&value| is_tracked(func, value))
                .map(|&value| (value, ValueRange::Varying)),
        );
        return ranges;
    };
    let a = query.range_of_operand(func, arg);

    if let Some(op) = callee.arith_op() {
        let b = args
            .get(1)
            .map(|arg| query.range_of_operand(func, arg))
            .unwrap_or(ValueRange::Varying);
        if callee.reports_overflow() {
            ranges.push((dest, arith::wrapping(op, &a, &b, ty)));
            if let Some(&flag) = dests.get(1) {
                ranges.push((flag, arith::overflow_flag(op, &a, &b, ty)));
            }
        } else {
            ranges.push((dest, arith::checked(op, &a, &b, ty)));
        }
        return ranges;
    }

    if a.is_undefined() {
        ranges.push((dest, ValueRange::Undefined));
        return ranges;
    }
    let (must, may) = a.nonzero_bits(ty);
    let range = match callee {
        InternalFn::Popcount => ValueRange::new(
            i128::from(must.count_ones()),
            i128::from(may.count_ones()),
            dest_ty,
        ),
        InternalFn::Parity if must == may => {
            ValueRange::singleton(i128::from(must.count_ones() & 1), dest_ty)
        }
        InternalFn::Parity => ValueRange::new(0, 1, dest_ty),
        // Zero has as many leading and trailing zeros as the type has bits
        InternalFn::Clz => {
            ValueRange::new(leading_zeros(may, ty), leading_zeros(must, ty), dest_ty)
        }
        InternalFn::Ctz => {
            ValueRange::new(trailing_zeros(may, ty), trailing_zeros(must, ty), dest_ty)
        }
        InternalFn::Ffs if may == 0 => ValueRange::singleton(0, dest_ty),
        InternalFn::Ffs => {
            let lo = if a.may_be_zero(ty) { 0 } else { trailing_zeros(may, ty) + 1 };
            let hi = if must == 0 { i128::from(ty.bits()) } else { trailing_zeros(must, ty) + 1 };
            ValueRange::new(lo, hi, dest_ty)
        }
        InternalFn::AddOverflow
        | InternalFn::SubOverflow
        | InternalFn::MulOverflow
        | InternalFn::CheckedAdd
        | InternalFn::CheckedSub
        | InternalFn::CheckedMul => ValueRange::Varying,
    };
    ranges.push((dest, range));
    ranges
}
