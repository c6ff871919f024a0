use alloc::vec::Vec;

use smallvec::SmallVec;
use vrp_analysis::{
    LatticeLike, RangeQuery, Truth, ValueRange, VrpConfig, arith, evaluate_operands,
    extract_range_basic, extract_range_for_var_from_comparison_expr, extract_range_from_expr,
    switch_targets,
};
use vrp_ir::{
    BinaryOp, Callee, Edge, Expr, Function, Immediate, Inst, InstData, IntType, InternalFn,
    Operand, Predicate, StmtCursor, SwitchCase, Type, UnaryOp, Value,
};

use crate::{DeferredEdits, SwitchUpdate};

/// What [Simplifier::simplify_stmt_using_ranges] did to a statement
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Simplification {
    /// The statement was replaced in place with a cheaper equivalent
    Statement,
    /// The conditional branch always goes one way, and the edge it never takes was queued for
    /// removal
    BranchFolded,
    /// Some destinations of the switch can never be selected, and its rewrite was queued
    SwitchNarrowed,
}

#[inline]
fn constant(value: i128, ty: IntType) -> Operand {
    Operand::Const(Immediate::new(value, ty))
}

/// Rewrites statements into cheaper forms using the ranges of the names they read.
///
/// Statements are edited in place through a [StmtCursor]. Changes to the control flow graph are
/// never made directly; they are recorded in a [DeferredEdits] log, to be applied once the whole
/// region has been visited.
pub struct Simplifier<'a> {
    query: &'a dyn RangeQuery,
    config: &'a VrpConfig,
}

impl<'a> Simplifier<'a> {
    pub fn new(query: &'a dyn RangeQuery, config: &'a VrpConfig) -> Self {
        Self { query, config }
    }

    /// Simplify the statement under `cursor`, if its operand ranges permit.
    ///
    /// Returns `None` if the statement was left untouched.
    pub fn simplify_stmt_using_ranges(
        &self,
        cursor: &mut StmtCursor<'_>,
        edits: &mut DeferredEdits,
    ) -> Option<Simplification> {
        let inst = cursor.current()?;
        let data = cursor.func().inst(inst).clone();
        let simplified = match data {
            InstData::Assign { dest, expr } => {
                self.simplify_assign(cursor, dest, &expr).then_some(Simplification::Statement)
            }
            InstData::Assert { dest, .. } => {
                self.fold_to_constant(cursor, dest).then_some(Simplification::Statement)
            }
            InstData::Call {
                dests,
                callee: Callee::Internal(callee),
                args,
            } if self.config.simplify_internal_calls() => self
                .simplify_internal_call(cursor, callee, &args, &dests)
                .then_some(Simplification::Statement),
            InstData::CondBranch {
                pred,
                lhs,
                rhs,
                then_edge,
                else_edge,
            } => self.simplify_cond(cursor, edits, pred, lhs, rhs, then_edge, else_edge),
            InstData::Switch {
                selector,
                cases,
                default,
            } if self.config.simplify_switches() => self
                .simplify_switch(cursor.func(), edits, inst, &selector, &cases, default)
                .then_some(Simplification::SwitchNarrowed),
            _ => None,
        };
        if simplified == Some(Simplification::Statement) {
            log::debug!(
                target: "vrp:simplify",
                "simplified {inst} to {}",
                cursor.func().display_inst(inst)
            );
        }
        simplified
    }

    fn replace_with(&self, cursor: &mut StmtCursor<'_>, dest: Value, expr: Expr) -> bool {
        cursor.replace(InstData::Assign { dest, expr });
        true
    }

    /// Replace the definition of `dest` with a constant, if its range holds a single value
    fn fold_to_constant(&self, cursor: &mut StmtCursor<'_>, dest: Value) -> bool {
        let Some(ty) = cursor.func().value_type(dest).as_int() else {
            return false;
        };
        match self.query.range_of(dest).as_singleton() {
            Some(value) => self.replace_with(cursor, dest, Expr::Copy(constant(value, ty))),
            None => false,
        }
    }

    fn simplify_assign(&self, cursor: &mut StmtCursor<'_>, dest: Value, expr: &Expr) -> bool {
        let func = cursor.func();
        let ty = match func.value_type(dest) {
            Type::Int(ty) => ty,
            Type::F32 | Type::F64 => {
                return match expr {
                    Expr::Convert(src) if self.config.simplify_conversions() => {
                        self.simplify_float_conversion(cursor, dest, *src)
                    }
                    _ => false,
                };
            }
        };
        let dest_range = self.query.range_of(dest);
        if dest_range.is_undefined() {
            return false;
        }

        if !matches!(expr, Expr::Copy(Operand::Const(_))) {
            let range = extract_range_from_expr(func, expr, ty, self.query).meet(&dest_range);
            if let Some(value) = range.as_singleton() {
                return self.replace_with(cursor, dest, Expr::Copy(constant(value, ty)));
            }
        }

        if let Expr::Compare(pred @ (Predicate::Eq | Predicate::Ne), a, b) = *expr {
            return self.simplify_truth_ops(cursor, dest, pred, a, b);
        }

        let replacement = match *expr {
            Expr::Select(cond, a, b) => {
                match self.query.range_of_operand(func, &cond).as_singleton() {
                    Some(0) => Some(Expr::Copy(b)),
                    Some(_) => Some(Expr::Copy(a)),
                    None => None,
                }
            }
            Expr::Binary(op @ (BinaryOp::Div | BinaryOp::Rem), a, b) => {
                self.simplify_div_or_mod(func, op, a, b, ty)
            }
            Expr::Binary(op @ (BinaryOp::Min | BinaryOp::Max), a, b) => {
                self.simplify_min_or_max(func, op, a, b, ty)
            }
            Expr::Binary(op @ (BinaryOp::And | BinaryOp::Or), a, b) => {
                self.simplify_bit_ops(func, op, a, b, ty)
            }
            Expr::Unary(UnaryOp::Abs, a) => self.simplify_abs(func, a, ty),
            Expr::Convert(src) if self.config.simplify_conversions() => {
                self.simplify_conversion(func, src, ty)
            }
            _ => None,
        };
        match replacement {
            Some(expr) => self.replace_with(cursor, dest, expr),
            None => false,
        }
    }

    /// `a / 1` is `a`; for a nonnegative `a`, dividing by a power of two is a shift and the
    /// remainder is a mask
    fn simplify_div_or_mod(
        &self,
        func: &Function,
        op: BinaryOp,
        a: Operand,
        b: Operand,
        ty: IntType,
    ) -> Option<Expr> {
        let divisor = self.query.range_of_operand(func, &b).as_singleton()?;
        if divisor == 1 && op == BinaryOp::Div {
            return Some(Expr::Copy(a));
        }
        if divisor <= 1 || divisor & (divisor - 1) != 0 {
            return None;
        }
        if !self.query.range_of_operand(func, &a).is_nonnegative(ty) {
            return None;
        }
        Some(match op {
            BinaryOp::Div => {
                Expr::Binary(BinaryOp::Shr, a, constant(i128::from(divisor.trailing_zeros()), ty))
            }
            _ => Expr::Binary(BinaryOp::And, a, constant(divisor - 1, ty)),
        })
    }

    /// Returns true if `operand` is always either 0 or 1
    fn has_boolean_range(&self, func: &Function, operand: &Operand, ty: IntType) -> bool {
        if ty == IntType::I1 {
            return true;
        }
        self.query
            .range_of_operand(func, operand)
            .bounds(ty)
            .is_some_and(|(lo, hi)| lo >= 0 && hi <= 1)
    }

    /// Over operands which are always 0 or 1, `a != 0` is `a`, and `a != b` is `a ^ b`.
    ///
    /// `a == c` for a constant `c` is handled as `a != (c ^ 1)`. Operands wider than `i1` are
    /// converted to the `i1` result.
    fn simplify_truth_ops(
        &self,
        cursor: &mut StmtCursor<'_>,
        dest: Value,
        pred: Predicate,
        a: Operand,
        b: Operand,
    ) -> bool {
        let func = cursor.func();
        let (a, b) = match (a, b) {
            (Operand::Const(_), Operand::Value(_)) => (b, a),
            _ => (a, b),
        };
        let Some(ty) = func.operand_type(&a).as_int() else {
            return false;
        };
        if !self.has_boolean_range(func, &a, ty) || !self.has_boolean_range(func, &b, ty) {
            return false;
        }
        let b = match (pred, b) {
            (Predicate::Ne, b) => b,
            (Predicate::Eq, Operand::Const(c)) => constant(c.value() ^ 1, ty),
            // There is no single statement for `a == b`
            _ => return false,
        };

        let needs_conversion = ty != IntType::I1;
        let expr = match b {
            Operand::Const(c) if c.value() == 0 => {
                if needs_conversion {
                    Expr::Convert(a)
                } else {
                    Expr::Copy(a)
                }
            }
            _ if needs_conversion => {
                let flipped = cursor.func_mut().create_value(ty.into());
                cursor.insert_before(InstData::Assign {
                    dest: flipped,
                    expr: Expr::Binary(BinaryOp::Xor, a, b),
                });
                Expr::Convert(Operand::Value(flipped))
            }
            _ => Expr::Binary(BinaryOp::Xor, a, b),
        };
        self.replace_with(cursor, dest, expr)
    }

    /// Pick the operand of a min or max which is always the result. Over operands which are
    /// always 0 or 1, min is `a & b` and max is `a | b`.
    fn simplify_min_or_max(
        &self,
        func: &Function,
        op: BinaryOp,
        a: Operand,
        b: Operand,
        ty: IntType,
    ) -> Option<Expr> {
        let a_first = match evaluate_operands(func, Predicate::Le, &a, &b, self.query) {
            Truth::AlwaysTrue => true,
            Truth::AlwaysFalse => false,
            Truth::Unknown => match evaluate_operands(func, Predicate::Ge, &a, &b, self.query) {
                Truth::AlwaysTrue => false,
                _ => {
                    let boolean = self.has_boolean_range(func, &a, ty)
                        && self.has_boolean_range(func, &b, ty);
                    if !boolean {
                        return None;
                    }
                    let op = if op == BinaryOp::Min { BinaryOp::And } else { BinaryOp::Or };
                    return Some(Expr::Binary(op, a, b));
                }
            },
        };
        let (smaller, larger) = if a_first { (a, b) } else { (b, a) };
        Some(Expr::Copy(if op == BinaryOp::Min { smaller } else { larger }))
    }

    fn simplify_abs(&self, func: &Function, a: Operand, ty: IntType) -> Option<Expr> {
        let range = self.query.range_of_operand(func, &a);
        if range.is_nonnegative(ty) {
            Some(Expr::Copy(a))
        } else if range.is_nonpositive(ty) {
            Some(Expr::Unary(UnaryOp::Neg, a))
        } else {
            None
        }
    }

    /// Drop the bits of a constant mask which the other operand already decides, or replace the
    /// operation with one of its operands when the other cannot affect the result
    fn simplify_bit_ops(
        &self,
        func: &Function,
        op: BinaryOp,
        a: Operand,
        b: Operand,
        ty: IntType,
    ) -> Option<Expr> {
        let ra = self.query.range_of_operand(func, &a);
        let rb = self.query.range_of_operand(func, &b);
        if ra.is_undefined() || rb.is_undefined() {
            return None;
        }

        let masked = match (a, b) {
            (Operand::Value(_), Operand::Const(mask)) => Some((a, &ra, mask, false)),
            (Operand::Const(mask), Operand::Value(_)) => Some((b, &rb, mask, true)),
            _ => None,
        };
        if let Some((x, rx, mask, swapped)) = masked {
            let (must, may) = rx.nonzero_bits(ty);
            let old = ty.to_bits(mask.value());
            let new = match op {
                BinaryOp::And => old & may,
                _ => old & !must,
            };
            if op == BinaryOp::Or && new == 0 {
                return Some(Expr::Copy(x));
            }
            if new == old {
                return None;
            }
            let mask = constant(ty.from_bits(new), ty);
            return Some(if swapped {
                Expr::Binary(op, mask, x)
            } else {
                Expr::Binary(op, x, mask)
            });
        }

        let (must_a, may_a) = ra.nonzero_bits(ty);
        let (must_b, may_b) = rb.nonzero_bits(ty);
        let (keep_a, keep_b) = match op {
            BinaryOp::And => (may_a & !must_b == 0, may_b & !must_a == 0),
            _ => (may_b & !must_a == 0, may_a & !must_b == 0),
        };
        if keep_a {
            Some(Expr::Copy(a))
        } else if keep_b {
            Some(Expr::Copy(b))
        } else {
            None
        }
    }

    /// `(to)(mid)x` is `(to)x` when every value of `x` survives the conversion to `mid`
    fn simplify_conversion(&self, func: &Function, src: Operand, to: IntType) -> Option<Expr> {
        let mid = src.as_value()?;
        let mid_ty = func.value_type(mid).as_int()?;
        let Some(InstData::Assign {
            expr: Expr::Convert(inner),
            ..
        }) = func.defining_inst(mid).map(|inst| func.inst(inst))
        else {
            return None;
        };
        let inner_ty = func.operand_type(inner).as_int()?;
        let range = self.query.range_of_operand(func, inner);
        if range.is_undefined() || !range.fits_in(inner_ty, mid_ty) {
            return None;
        }
        if inner_ty == to {
            Some(Expr::Copy(*inner))
        } else {
            Some(Expr::Convert(*inner))
        }
    }

    /// Convert a wide integer whose range fits in `i32` through an `i32` temporary, as the
    /// narrower conversion to floating point is cheaper
    fn simplify_float_conversion(
        &self,
        cursor: &mut StmtCursor<'_>,
        dest: Value,
        src: Operand,
    ) -> bool {
        let func = cursor.func();
        let Some(src_ty) = func.operand_type(&src).as_int() else {
            return false;
        };
        if src_ty.bits() <= 32 {
            return false;
        }
        let range = self.query.range_of_operand(func, &src);
        if range.is_undefined() || !range.fits_in(src_ty, IntType::I32) {
            return false;
        }
        let narrow = cursor.func_mut().create_value(Type::I32);
        cursor.insert_before(InstData::Assign {
            dest: narrow,
            expr: Expr::Convert(src),
        });
        self.replace_with(cursor, dest, Expr::Convert(Operand::Value(narrow)))
    }

    fn simplify_internal_call(
        &self,
        cursor: &mut StmtCursor<'_>,
        callee: InternalFn,
        args: &[Operand],
        dests: &[Value],
    ) -> bool {
        let func = cursor.func();
        if let [dest] = dests {
            let computed = extract_range_basic(func, callee, args, dests, self.query);
            if let (Some(ty), Some((_, range))) = (func.value_type(*dest).as_int(), computed.first())
            {
                let range = range.meet(&self.query.range_of(*dest));
                if let Some(value) = range.as_singleton() {
                    return self.replace_with(cursor, *dest, Expr::Copy(constant(value, ty)));
                }
            }
        }

        let (Some(op), [a, b]) = (callee.arith_op(), args) else {
            return false;
        };
        let Some(ty) = func.operand_type(a).as_int() else {
            return false;
        };
        let ra = self.query.range_of_operand(func, a);
        let rb = self.query.range_of_operand(func, b);
        if arith::overflow_flag(op, &ra, &rb, ty).as_singleton() != Some(0) {
            return false;
        }
        match dests {
            [result, flag] if callee.reports_overflow() => {
                cursor.insert_before(InstData::Assign {
                    dest: *flag,
                    expr: Expr::Copy(constant(0, IntType::I1)),
                });
                self.replace_with(cursor, *result, Expr::Binary(op, *a, *b))
            }
            [result] if !callee.reports_overflow() => {
                self.replace_with(cursor, *result, Expr::Binary(op, *a, *b))
            }
            _ => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn simplify_cond(
        &self,
        cursor: &mut StmtCursor<'_>,
        edits: &mut DeferredEdits,
        pred: Predicate,
        lhs: Operand,
        rhs: Operand,
        then_edge: Edge,
        else_edge: Edge,
    ) -> Option<Simplification> {
        if then_edge == else_edge {
            return None;
        }
        let func = cursor.func();
        match evaluate_operands(func, pred, &lhs, &rhs, self.query) {
            Truth::AlwaysTrue => {
                edits.remove_edge(else_edge);
                return Some(Simplification::BranchFolded);
            }
            Truth::AlwaysFalse => {
                edits.remove_edge(then_edge);
                return Some(Simplification::BranchFolded);
            }
            Truth::Unknown => (),
        }

        let (Operand::Value(x), Operand::Const(bound)) = (lhs, rhs) else {
            return None;
        };
        let (pred, lhs, rhs) = self
            .cond_using_singularity(func, pred, x, bound)
            .or_else(|| self.cond_using_narrower_operand(func, pred, x, bound))?;
        cursor.replace(InstData::CondBranch {
            pred,
            lhs,
            rhs,
            then_edge,
            else_edge,
        });
        Some(Simplification::Statement)
    }

    /// If only one value of `x` takes one side of `x pred bound`, test for equality with it
    fn cond_using_singularity(
        &self,
        func: &Function,
        pred: Predicate,
        x: Value,
        bound: Immediate,
    ) -> Option<(Predicate, Operand, Operand)> {
        if matches!(pred, Predicate::Eq | Predicate::Ne) {
            return None;
        }
        let ty = func.value_type(x).as_int()?;
        let range = self.query.range_of(x);
        if range.is_undefined() {
            return None;
        }
        let bound = ValueRange::constant(bound);
        let taken = range.meet(&extract_range_for_var_from_comparison_expr(pred, &bound, ty));
        if let Some(value) = taken.as_singleton() {
            return Some((Predicate::Eq, Operand::Value(x), constant(value, ty)));
        }
        let not_taken =
            range.meet(&extract_range_for_var_from_comparison_expr(pred.invert(), &bound, ty));
        not_taken
            .as_singleton()
            .map(|value| (Predicate::Ne, Operand::Value(x), constant(value, ty)))
    }

    /// Compare the source of a value-preserving conversion directly, i.e. `(T)y pred c` becomes
    /// `y pred c`
    fn cond_using_narrower_operand(
        &self,
        func: &Function,
        pred: Predicate,
        x: Value,
        bound: Immediate,
    ) -> Option<(Predicate, Operand, Operand)> {
        let x_ty = func.value_type(x).as_int()?;
        let Some(InstData::Assign {
            expr: Expr::Convert(Operand::Value(inner)),
            ..
        }) = func.defining_inst(x).map(|inst| func.inst(inst))
        else {
            return None;
        };
        let inner_ty = func.value_type(*inner).as_int()?;
        let range = self.query.range_of(*inner);
        if range.is_undefined() || !range.fits_in(inner_ty, x_ty) || !inner_ty.contains(bound.value())
        {
            return None;
        }
        Some((pred, Operand::Value(*inner), constant(bound.value(), inner_ty)))
    }

    /// Drop the cases of a switch its selector can never match, and retarget the default when the
    /// selector always matches some case
    fn simplify_switch(
        &self,
        func: &Function,
        edits: &mut DeferredEdits,
        inst: Inst,
        selector: &Operand,
        cases: &[SwitchCase],
        default: Edge,
    ) -> bool {
        let Some(ty) = func.operand_type(selector).as_int() else {
            return false;
        };
        let range = self.query.range_of_operand(func, selector);
        if range.is_undefined() {
            return false;
        }
        let targets = switch_targets(&range, ty, cases);
        if targets.all_reachable(cases.len()) {
            return false;
        }
        let mut new_cases = targets.cases.iter().map(|&index| cases[index]).collect::<Vec<_>>();
        let new_default = if targets.default_reachable {
            default
        } else {
            match new_cases.last() {
                Some(case) => case.edge,
                None => return false,
            }
        };
        new_cases.retain(|case| case.edge != new_default);

        let kept = new_cases
            .iter()
            .map(|case| case.edge)
            .chain(core::iter::once(new_default))
            .collect::<SmallVec<[Edge; 8]>>();
        for edge in func.inst(inst).successor_edges() {
            if !kept.contains(&edge) {
                edits.remove_edge(edge);
            }
        }
        edits.update_switch(SwitchUpdate {
            switch: inst,
            cases: new_cases,
            default: new_default,
        });
        true
    }
}
