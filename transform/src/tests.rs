use alloc::string::ToString;

use pretty_assertions::assert_eq;
use vrp_analysis::{
    GlobalRanges, RangeQuery, RangeStore, ValueRange, VrpConfig, VrpError, propagate,
};
use vrp_ir::{
    BinaryOp, Block, Expr, Function, FunctionBuilder, Immediate, InductionInfo, InstData, IntType,
    InternalFn, IrError, NoLoops, Operand, Predicate, StaticLoopInfo, StmtCursor, Type, UnaryOp,
    Value, imm,
};

use crate::*;

const I32: IntType = IntType::I32;

fn init_logging() {
    let _ = env_logger::Builder::from_env("VRP_TRACE")
        .format_timestamp(None)
        .is_test(true)
        .try_init();
}

/// The statement defining `value`
fn def_of(func: &Function, value: Value) -> &InstData {
    let inst = func
        .defining_inst(value)
        .unwrap_or_else(|| panic!("{value} has no defining statement"));
    func.inst(inst)
}

fn assign(dest: Value, expr: Expr) -> InstData {
    InstData::Assign { dest, expr }
}

fn int(value: i128, ty: IntType) -> Operand {
    Operand::Const(Immediate::new(value, ty))
}

/// The destination of the terminator of `block`, if it is an unconditional jump
fn jump_dest(func: &Function, block: Block) -> Option<Block> {
    match func.inst(func.terminator(block)?) {
        InstData::Jump { edge } => Some(func.edge_dest(*edge)),
        _ => None,
    }
}

fn run(func: &mut Function) -> Result<PassOutcome, VrpError> {
    init_logging();
    ValueRangePropagation::default().run(func, &NoLoops)
}

/// ```text
/// int rvrp17(int n) {
///     int sum = 0;
///     for (int i = 0; i < n; i++) {
///         if (i > 1000)
///             abort();
///         sum += q() ? a[i] : b[i];
///     }
///     return sum;
/// }
/// ```
///
/// With the loop analysis reporting at most 1000 iterations, `i > 1000` is always false.
#[test]
fn loop_bound_folds_the_abort_check() -> Result<(), VrpError> {
    init_logging();
    let mut func = Function::new("rvrp17", &[Type::I32], Some(Type::I32));
    let mut b = FunctionBuilder::new(&mut func);
    let n = b.param(0);
    let entry = b.entry_block();
    let header = b.create_block();
    let check = b.create_block();
    let fail = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    b.jump(header)?;

    b.switch_to_block(header);
    let (i_phi, i) = b.phi(Type::I32)?;
    let (sum_phi, sum) = b.phi(Type::I32)?;
    b.add_phi_incoming(i_phi, entry, imm(0, I32)?)?;
    b.add_phi_incoming(sum_phi, entry, imm(0, I32)?)?;
    b.cond_br(Predicate::Lt, i, n, check, exit)?;

    b.switch_to_block(check);
    let i_lt_n = b.assert(i, Predicate::Lt, n)?;
    b.cond_br(Predicate::Gt, i_lt_n, imm(1000, I32)?, fail, body)?;

    b.switch_to_block(fail);
    b.call("abort", false, &[], &[])?;
    b.unreachable()?;

    b.switch_to_block(body);
    let idx = b.assert(i_lt_n, Predicate::Le, imm(1000, I32)?)?;
    let choice = b.call("q", false, &[], &[Type::I32])?[0];
    let a = b.call("load_a", true, &[idx.into()], &[Type::I32])?[0];
    let c = b.call("load_b", true, &[idx.into()], &[Type::I32])?[0];
    let cond = b.icmp(Predicate::Ne, choice, imm(0, I32)?)?;
    let selected = b.select(cond, a, c)?;
    let next_sum = b.add(sum, selected)?;
    let next_i = b.add(idx, imm(1, I32)?)?;
    b.add_phi_incoming(i_phi, body, next_i)?;
    b.add_phi_incoming(sum_phi, body, next_sum)?;
    b.jump(header)?;

    b.switch_to_block(exit);
    b.ret(Some(sum.into()))?;

    let mut loops = StaticLoopInfo::new();
    let id = loops.add_loop(header);
    loops.add_induction(
        id,
        i,
        InductionInfo {
            init: 0,
            step: 1,
            max_latch_executions: Some(1000),
            exact: false,
        },
    );

    let outcome = ValueRangePropagation::default().run(&mut func, &loops)?;
    assert!(outcome.changed);
    assert_eq!(
        outcome.statistics,
        Statistics {
            branches_rewritten: 1,
            statements_simplified: 0,
            edges_removed: 1,
            switches_updated: 0,
            assertions_removed: 2,
        }
    );

    assert_eq!(jump_dest(&func, check), Some(body));
    assert!(func.preds(fail).is_empty());
    assert!(matches!(
        func.inst(func.terminator(header).unwrap()),
        InstData::CondBranch {
            pred: Predicate::Lt,
            ..
        }
    ));
    assert_eq!(*def_of(&func, idx), assign(idx, Expr::Copy(Operand::Value(i_lt_n))));
    func.verify()?;
    Ok(())
}

#[test]
fn without_loop_bounds_the_abort_check_stays() -> Result<(), VrpError> {
    let mut func = Function::new("count", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let n = b.param(0);
    let entry = b.entry_block();
    let header = b.create_block();
    let check = b.create_block();
    let fail = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    b.jump(header)?;

    b.switch_to_block(header);
    let (phi, i) = b.phi(Type::I32)?;
    b.add_phi_incoming(phi, entry, imm(0, I32)?)?;
    b.cond_br(Predicate::Lt, i, n, check, exit)?;

    b.switch_to_block(check);
    let i_lt_n = b.assert(i, Predicate::Lt, n)?;
    b.cond_br(Predicate::Gt, i_lt_n, imm(1000, I32)?, fail, body)?;

    b.switch_to_block(fail);
    b.unreachable()?;

    b.switch_to_block(body);
    let next = b.add(i_lt_n, imm(1, I32)?)?;
    b.add_phi_incoming(phi, body, next)?;
    b.jump(header)?;

    b.switch_to_block(exit);
    b.ret(None)?;

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.branches_rewritten, 0);
    assert_eq!(outcome.statistics.edges_removed, 0);
    assert_eq!(func.preds(fail).len(), 1);
    Ok(())
}

#[test]
fn mask_is_narrowed_to_the_bits_that_may_be_set() -> Result<(), VrpError> {
    let mut func = Function::new("mask", &[Type::I32], Some(Type::I32));
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let x = b.binary(BinaryOp::And, p, imm(255, I32)?)?;
    let y = b.binary(BinaryOp::And, x, imm(0x1fff, I32)?)?;
    b.ret(Some(y.into()))?;

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 1);
    assert_eq!(
        *def_of(&func, y),
        assign(y, Expr::Binary(BinaryOp::And, Operand::Value(x), int(0xff, I32)))
    );
    assert_eq!(
        *def_of(&func, x),
        assign(x, Expr::Binary(BinaryOp::And, Operand::Value(p), int(255, I32)))
    );
    Ok(())
}

#[test]
fn bit_operations_with_a_redundant_operand_become_copies() -> Result<(), VrpError> {
    const U32: IntType = IntType::U32;
    let mut func = Function::new("bits", &[Type::U32, Type::U32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let (p, q) = (b.param(0), b.param(1));
    let ones = b.copy(imm(0xff, U32)?)?;
    let low = b.binary(BinaryOp::And, p, imm(0x0f, U32)?)?;
    // Every bit that may be set in `low` is set in `ones`
    let anded = b.binary(BinaryOp::And, low, ones)?;
    let ored = b.binary(BinaryOp::Or, low, ones)?;
    // Bits 4 to 7 are always set in [0xf0, 0xff]
    let nibble = b.binary(BinaryOp::And, q, imm(0x0f, U32)?)?;
    let high = b.add(nibble, imm(0xf0, U32)?)?;
    let narrowed = b.binary(BinaryOp::Or, high, imm(0x1f0, U32)?)?;
    let covered = b.binary(BinaryOp::Or, high, imm(0x30, U32)?)?;
    b.ret(None)?;

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 4);
    assert_eq!(*def_of(&func, anded), assign(anded, Expr::Copy(Operand::Value(low))));
    // The result of the OR is known exactly
    assert_eq!(*def_of(&func, ored), assign(ored, Expr::Copy(int(0xff, U32))));
    assert_eq!(
        *def_of(&func, narrowed),
        assign(narrowed, Expr::Binary(BinaryOp::Or, Operand::Value(high), int(0x100, U32)))
    );
    assert_eq!(*def_of(&func, covered), assign(covered, Expr::Copy(Operand::Value(high))));
    Ok(())
}

#[test]
fn min_max_and_abs_with_ordered_operands() -> Result<(), VrpError> {
    let mut func = Function::new("minmax", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let small = b.binary(BinaryOp::And, p, imm(15, I32)?)?;
    let large = b.add(small, imm(16, I32)?)?;
    let min = b.binary(BinaryOp::Min, large, small)?;
    let max = b.binary(BinaryOp::Max, large, small)?;
    let negated = b.sub(imm(0, I32)?, small)?;
    let abs_pos = b.unary(UnaryOp::Abs, small)?;
    let abs_neg = b.unary(UnaryOp::Abs, negated)?;
    b.ret(None)?;

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 4);
    assert_eq!(*def_of(&func, min), assign(min, Expr::Copy(Operand::Value(small))));
    assert_eq!(*def_of(&func, max), assign(max, Expr::Copy(Operand::Value(large))));
    assert_eq!(*def_of(&func, abs_pos), assign(abs_pos, Expr::Copy(Operand::Value(small))));
    assert_eq!(
        *def_of(&func, abs_neg),
        assign(abs_neg, Expr::Unary(UnaryOp::Neg, Operand::Value(negated)))
    );
    Ok(())
}

#[test]
fn known_comparisons_and_selects_are_folded() -> Result<(), VrpError> {
    let mut func = Function::new("fold", &[Type::I32, Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let (p, q) = (b.param(0), b.param(1));
    let small = b.binary(BinaryOp::And, p, imm(7, I32)?)?;
    let cond = b.icmp(Predicate::Lt, small, imm(8, I32)?)?;
    let selected = b.select(cond, q, p)?;
    b.ret(None)?;

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 2);
    assert_eq!(*def_of(&func, cond), assign(cond, Expr::Copy(int(1, IntType::I1))));
    assert_eq!(*def_of(&func, selected), assign(selected, Expr::Copy(Operand::Value(q))));
    Ok(())
}

/// The `xor` inserted to compute `dest` before converting it to `i1`
fn converted_xor(func: &Function, dest: Value) -> &InstData {
    match def_of(func, dest) {
        InstData::Assign {
            expr: Expr::Convert(Operand::Value(flipped)),
            ..
        } => def_of(func, *flipped),
        other => panic!("expected {dest} to be a conversion, got {other:?}"),
    }
}

#[test]
fn comparisons_of_values_that_are_zero_or_one() -> Result<(), VrpError> {
    const U32: IntType = IntType::U32;
    let mut func = Function::new("truth", &[Type::U32, Type::U32, Type::U32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let (p, q, r) = (b.param(0), b.param(1), b.param(2));
    let x = b.binary(BinaryOp::And, p, imm(1, U32)?)?;
    let y = b.binary(BinaryOp::And, q, imm(1, U32)?)?;
    let wide = b.binary(BinaryOp::And, r, imm(3, U32)?)?;
    let flag = b.icmp(Predicate::Lt, p, q)?;
    let x_ne_0 = b.icmp(Predicate::Ne, x, imm(0, U32)?)?;
    let x_eq_1 = b.icmp(Predicate::Eq, imm(1, U32)?, x)?;
    let x_eq_0 = b.icmp(Predicate::Eq, x, imm(0, U32)?)?;
    let x_ne_y = b.icmp(Predicate::Ne, x, y)?;
    let not_flag = b.icmp(Predicate::Eq, flag, imm(0, IntType::I1)?)?;
    let both = b.binary(BinaryOp::Min, x, y)?;
    let either = b.binary(BinaryOp::Max, x, y)?;
    let x_eq_y = b.icmp(Predicate::Eq, x, y)?;
    let wide_ne_0 = b.icmp(Predicate::Ne, wide, imm(0, U32)?)?;
    let wide_min = b.binary(BinaryOp::Min, wide, x)?;
    b.ret(None)?;
    let before = func.to_string();

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 7);
    let (x, y) = (Operand::Value(x), Operand::Value(y));
    assert_eq!(*def_of(&func, x_ne_0), assign(x_ne_0, Expr::Convert(x)));
    assert_eq!(*def_of(&func, x_eq_1), assign(x_eq_1, Expr::Convert(x)));
    assert!(matches!(
        converted_xor(&func, x_eq_0),
        InstData::Assign { expr: Expr::Binary(BinaryOp::Xor, lhs, rhs), .. }
            if *lhs == x && *rhs == int(1, U32)
    ));
    assert!(matches!(
        converted_xor(&func, x_ne_y),
        InstData::Assign { expr: Expr::Binary(BinaryOp::Xor, lhs, rhs), .. }
            if *lhs == x && *rhs == y
    ));
    assert_eq!(
        *def_of(&func, not_flag),
        assign(not_flag, Expr::Binary(BinaryOp::Xor, Operand::Value(flag), int(1, IntType::I1)))
    );
    assert_eq!(*def_of(&func, both), assign(both, Expr::Binary(BinaryOp::And, x, y)));
    assert_eq!(*def_of(&func, either), assign(either, Expr::Binary(BinaryOp::Or, x, y)));

    // Neither side of these is limited to 0 and 1, or there is no single statement for them
    for (dest, expected) in [
        (x_eq_y, Expr::Compare(Predicate::Eq, x, y)),
        (wide_ne_0, Expr::Compare(Predicate::Ne, Operand::Value(wide), int(0, U32))),
        (wide_min, Expr::Binary(BinaryOp::Min, Operand::Value(wide), x)),
    ] {
        assert_eq!(*def_of(&func, dest), assign(dest, expected));
    }
    assert_ne!(func.to_string(), before);
    func.verify()?;
    Ok(())
}

#[test]
fn switch_cases_outside_the_selector_range_are_removed() -> Result<(), VrpError> {
    let mut func = Function::new("switch", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let entry = b.entry_block();
    let zero = b.create_block();
    let one = b.create_block();
    let many = b.create_block();
    let other = b.create_block();
    let selector = b.binary(BinaryOp::And, p, imm(3, I32)?)?;
    b.switch(selector, &[(0, 0, zero), (1, 1, one), (5, 9, many)], other)?;
    for block in [zero, one, many, other] {
        b.switch_to_block(block);
        b.ret(None)?;
    }

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.switches_updated, 1);
    assert_eq!(outcome.statistics.edges_removed, 1);
    assert!(func.preds(many).is_empty());
    assert_eq!(
        func.display_inst(func.terminator(entry).unwrap()).to_string(),
        "switch v1 [0: block1, 1: block2], default block4"
    );
    func.verify()?;
    Ok(())
}

#[test]
fn unreachable_switch_default_is_retargeted() -> Result<(), VrpError> {
    let mut func = Function::new("switch", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let entry = b.entry_block();
    let zero = b.create_block();
    let one = b.create_block();
    let other = b.create_block();
    let selector = b.binary(BinaryOp::And, p, imm(1, I32)?)?;
    b.switch(selector, &[(0, 0, zero), (1, 1, one)], other)?;
    for block in [zero, one, other] {
        b.switch_to_block(block);
        b.ret(None)?;
    }

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.switches_updated, 1);
    assert_eq!(outcome.statistics.edges_removed, 1);
    assert!(func.preds(other).is_empty());
    assert_eq!(
        func.display_inst(func.terminator(entry).unwrap()).to_string(),
        "switch v1 [0: block1], default block2"
    );
    Ok(())
}

#[test]
fn switch_simplification_can_be_disabled() -> Result<(), VrpError> {
    let mut func = Function::new("switch", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let zero = b.create_block();
    let other = b.create_block();
    let selector = b.binary(BinaryOp::And, p, imm(1, I32)?)?;
    b.switch(selector, &[(0, 0, zero), (4, 4, other)], other)?;
    for block in [zero, other] {
        b.switch_to_block(block);
        b.ret(None)?;
    }

    let mut config = VrpConfig::default();
    config.set_simplify_switches(false);
    let outcome = ValueRangePropagation::new(config).run(&mut func, &NoLoops)?;
    assert!(!outcome.changed);
    Ok(())
}

#[test]
fn single_value_side_of_a_condition_becomes_an_equality() -> Result<(), VrpError> {
    let mut func = Function::new("cond", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let entry = b.entry_block();
    let yes = b.create_block();
    let no = b.create_block();
    let small = b.binary(BinaryOp::And, p, imm(3, I32)?)?;
    // Only zero is `<= 0` in [0, 3]
    b.cond_br(Predicate::Le, small, imm(0, I32)?, yes, no)?;
    for block in [yes, no] {
        b.switch_to_block(block);
        b.ret(None)?;
    }

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 1);
    assert_eq!(outcome.statistics.branches_rewritten, 0);
    assert_eq!(
        *func.inst(func.terminator(entry).unwrap()),
        InstData::CondBranch {
            pred: Predicate::Eq,
            lhs: Operand::Value(small),
            rhs: int(0, I32),
            then_edge: func.edge_between(entry, yes).unwrap(),
            else_edge: func.edge_between(entry, no).unwrap(),
        }
    );
    Ok(())
}

#[test]
fn comparison_through_a_widening_conversion() -> Result<(), VrpError> {
    let mut func = Function::new("cond", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let entry = b.entry_block();
    let yes = b.create_block();
    let no = b.create_block();
    let byte = b.binary(BinaryOp::And, p, imm(255, I32)?)?;
    let wide = b.convert(byte, Type::I64)?;
    b.cond_br(Predicate::Lt, wide, imm(100, IntType::I64)?, yes, no)?;
    for block in [yes, no] {
        b.switch_to_block(block);
        b.ret(None)?;
    }

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 1);
    assert_eq!(
        *func.inst(func.terminator(entry).unwrap()),
        InstData::CondBranch {
            pred: Predicate::Lt,
            lhs: Operand::Value(byte),
            rhs: int(100, I32),
            then_edge: func.edge_between(entry, yes).unwrap(),
            else_edge: func.edge_between(entry, no).unwrap(),
        }
    );
    Ok(())
}

#[test]
fn division_by_powers_of_two_using_global_ranges() -> Result<(), IrError> {
    init_logging();
    let mut func = Function::new("div", &[Type::I32, Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let (p, q) = (b.param(0), b.param(1));
    let quotient = b.binary(BinaryOp::Div, p, imm(4, I32)?)?;
    let remainder = b.binary(BinaryOp::Rem, p, imm(8, I32)?)?;
    let identity = b.binary(BinaryOp::Div, q, imm(1, I32)?)?;
    let signed = b.binary(BinaryOp::Div, q, imm(4, I32)?)?;
    b.ret(None)?;

    let mut globals = GlobalRanges::new();
    globals.refine(p, &ValueRange::new(0, 100, I32));
    let config = VrpConfig::default();
    let simplifier = Simplifier::new(&globals, &config);
    let mut edits = DeferredEdits::new();
    let entry = func.entry_block();
    let mut cursor = StmtCursor::new(&mut func, entry);
    let mut simplified = 0;
    while cursor.next().is_some() {
        if simplifier.simplify_stmt_using_ranges(&mut cursor, &mut edits).is_some() {
            simplified += 1;
        }
    }
    assert!(edits.is_empty());
    assert_eq!(simplified, 3);

    assert_eq!(
        *def_of(&func, quotient),
        assign(quotient, Expr::Binary(BinaryOp::Shr, Operand::Value(p), int(2, I32)))
    );
    assert_eq!(
        *def_of(&func, remainder),
        assign(remainder, Expr::Binary(BinaryOp::And, Operand::Value(p), int(7, I32)))
    );
    assert_eq!(*def_of(&func, identity), assign(identity, Expr::Copy(Operand::Value(q))));
    assert_eq!(
        *def_of(&func, signed),
        assign(signed, Expr::Binary(BinaryOp::Div, Operand::Value(q), int(4, I32)))
    );
    Ok(())
}

#[test]
fn conversions_of_values_that_fit() -> Result<(), VrpError> {
    let mut func = Function::new("convert", &[Type::I32, Type::I64], None);
    let mut b = FunctionBuilder::new(&mut func);
    let (p, q) = (b.param(0), b.param(1));
    let byte = b.binary(BinaryOp::And, p, imm(255, I32)?)?;
    let wide = b.convert(byte, Type::I64)?;
    let narrow = b.convert(wide, Type::I16)?;
    let back = b.convert(wide, Type::I32)?;
    let small = b.binary(BinaryOp::And, q, imm(1000, IntType::I64)?)?;
    let float = b.convert(small, Type::F64)?;
    b.ret(None)?;

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 3);
    assert_eq!(*def_of(&func, narrow), assign(narrow, Expr::Convert(Operand::Value(byte))));
    assert_eq!(*def_of(&func, back), assign(back, Expr::Copy(Operand::Value(byte))));

    let InstData::Assign {
        expr: Expr::Convert(Operand::Value(temp)),
        ..
    } = *def_of(&func, float)
    else {
        panic!("expected {float} to convert a value");
    };
    assert_eq!(func.value_type(temp), Type::I32);
    assert_eq!(*def_of(&func, temp), assign(temp, Expr::Convert(Operand::Value(small))));
    Ok(())
}

#[test]
fn conversion_simplification_can_be_disabled() -> Result<(), VrpError> {
    let mut func = Function::new("convert", &[Type::I64], None);
    let mut b = FunctionBuilder::new(&mut func);
    let q = b.param(0);
    let small = b.binary(BinaryOp::And, q, imm(1000, IntType::I64)?)?;
    let float = b.convert(small, Type::F64)?;
    b.ret(None)?;

    let mut config = VrpConfig::default();
    config.set_simplify_conversions(false);
    let outcome = ValueRangePropagation::new(config).run(&mut func, &NoLoops)?;
    assert!(!outcome.changed);
    assert_eq!(*def_of(&func, float), assign(float, Expr::Convert(Operand::Value(small))));
    Ok(())
}

#[test]
fn runtime_helpers_that_cannot_overflow() -> Result<(), VrpError> {
    let mut func = Function::new("helpers", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let small = b.binary(BinaryOp::And, p, imm(15, I32)?)?;
    let pair = b.call_internal(InternalFn::AddOverflow, &[small.into(), small.into()])?;
    let (sum, flag) = (pair[0], pair[1]);
    let product = b.call_internal(InternalFn::CheckedMul, &[small.into(), small.into()])?[0];
    let twelve = b.copy(imm(12, I32)?)?;
    let bits = b.call_internal(InternalFn::Popcount, &[twelve.into()])?[0];
    b.ret(None)?;

    let outcome = run(&mut func)?;
    assert_eq!(outcome.statistics.statements_simplified, 3);
    assert_eq!(
        *def_of(&func, sum),
        assign(sum, Expr::Binary(BinaryOp::Add, Operand::Value(small), Operand::Value(small)))
    );
    assert_eq!(*def_of(&func, flag), assign(flag, Expr::Copy(int(0, IntType::I1))));
    assert_eq!(
        *def_of(&func, product),
        assign(
            product,
            Expr::Binary(BinaryOp::Mul, Operand::Value(small), Operand::Value(small))
        )
    );
    assert_eq!(*def_of(&func, bits), assign(bits, Expr::Copy(int(2, I32))));
    func.verify()?;
    Ok(())
}

#[test]
fn edits_are_deferred_until_flushed() -> Result<(), VrpError> {
    init_logging();
    let mut func = Function::new("deferred", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let entry = b.entry_block();
    let first = b.create_block();
    let dead = b.create_block();
    let second = b.create_block();
    let exit = b.create_block();
    let small = b.binary(BinaryOp::And, p, imm(7, I32)?)?;
    b.cond_br(Predicate::Lt, small, imm(8, I32)?, first, dead)?;
    b.switch_to_block(first);
    b.cond_br(Predicate::Ge, small, imm(0, I32)?, second, dead)?;
    b.switch_to_block(second);
    b.switch(small, &[(0, 7, exit), (8, 8, dead)], dead)?;
    for block in [dead, exit] {
        b.switch_to_block(block);
        b.ret(None)?;
    }

    let mut store = RangeStore::for_function(&func);
    let result = propagate(&func, &NoLoops, &VrpConfig::default(), &mut store)?;
    store.set_lattice_propagation_complete();
    assert!(!result.is_block_executable(dead));

    let before = func.to_string();
    let config = VrpConfig::default();
    let simplifier = Simplifier::new(&store, &config);
    let mut edits = DeferredEdits::new();
    for block in result.executable_blocks().collect::<alloc::vec::Vec<_>>() {
        let mut cursor = StmtCursor::new(&mut func, block);
        while cursor.next().is_some() {
            simplifier.simplify_stmt_using_ranges(&mut cursor, &mut edits);
        }
    }

    // Nothing about the control flow graph changes until the log is flushed
    assert_eq!(func.to_string(), before);
    assert_eq!(func.preds(dead).len(), 3);
    assert_eq!(edits.pending_edge_removals().len(), 3);
    assert_eq!(edits.pending_switch_updates().len(), 1);
    assert_eq!(edits.len(), 4);

    let summary = edits.flush(&mut func);
    assert!(edits.is_empty());
    assert_eq!(
        summary,
        FlushSummary {
            edges_removed: 3,
            switches_updated: 1,
        }
    );
    assert!(func.preds(dead).is_empty());
    assert_eq!(jump_dest(&func, entry), Some(first));
    assert_eq!(jump_dest(&func, first), Some(second));
    assert_eq!(jump_dest(&func, second), Some(exit));
    func.verify()?;
    Ok(())
}

#[test]
#[cfg(feature = "std")]
#[should_panic(expected = "deferred edits were dropped without being flushed")]
fn dropping_unflushed_edits_panics() {
    let mut func = Function::new("leak", &[], None);
    let mut b = FunctionBuilder::new(&mut func);
    let entry = b.entry_block();
    let exit = b.create_block();
    b.jump(exit).unwrap();
    let edge = func.edge_between(entry, exit).unwrap();

    let mut edits = DeferredEdits::new();
    edits.remove_edge(edge);
    drop(edits);
}

/// A panic raised while edits are pending must unwind normally rather than abort
#[test]
#[should_panic(expected = "simplification failed")]
fn unflushed_edits_are_dropped_quietly_while_unwinding() {
    let mut func = Function::new("unwind", &[], None);
    let mut b = FunctionBuilder::new(&mut func);
    let entry = b.entry_block();
    let exit = b.create_block();
    b.jump(exit).unwrap();
    let edge = func.edge_between(entry, exit).unwrap();

    let mut edits = DeferredEdits::new();
    edits.remove_edge(edge);
    panic!("simplification failed with {} pending edits", edits.len());
}

#[test]
fn iteration_limit_leaves_the_function_untouched() -> Result<(), IrError> {
    let mut func = Function::new("limit", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let x = b.binary(BinaryOp::And, p, imm(255, I32)?)?;
    b.binary(BinaryOp::And, x, imm(0x1fff, I32)?)?;
    b.ret(None)?;

    let before = func.to_string();
    let mut config = VrpConfig::default();
    config.set_max_steps(1);
    let result = ValueRangePropagation::new(config).run(&mut func, &NoLoops);
    assert_eq!(result, Err(VrpError::IterationLimit { limit: 1 }));
    assert_eq!(func.to_string(), before);
    Ok(())
}

#[test]
fn ranges_are_promoted_to_globals() -> Result<(), VrpError> {
    let mut func = Function::new("globals", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let p = b.param(0);
    let x = b.binary(BinaryOp::And, p, imm(255, I32)?)?;
    let y = b.add(x, imm(1, I32)?)?;
    b.ret(None)?;

    let mut globals = GlobalRanges::new();
    ValueRangePropagation::default().run_with_globals(&mut func, &NoLoops, &mut globals)?;
    assert_eq!(globals.range_of(x), ValueRange::new(0, 255, I32));
    assert_eq!(globals.range_of(y), ValueRange::new(1, 256, I32));
    assert!(globals.range_of(p).is_varying());
    Ok(())
}
