use alloc::vec;

use crate::*;

/// Builds:
///
/// ```text
/// block0: jump block1
/// block1: v1 = phi [block0: 0], [block2: v2]; br lt v1, v0, block2, block3
/// block2: v2 = add v1, 1; jump block1
/// block3: ret v1
/// ```
fn counting_loop() -> Result<(Function, Inst, Value, Value), IrError> {
    let mut func = Function::new("count", &[Type::I32], Some(Type::I32));
    let mut b = FunctionBuilder::new(&mut func);
    let n = b.param(0);
    let entry = b.entry_block();
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    b.jump(header)?;

    b.switch_to_block(header);
    let (phi, i) = b.phi(Type::I32)?;
    b.add_phi_incoming(phi, entry, imm(0, IntType::I32)?)?;
    b.cond_br(Predicate::Lt, i, n, body, exit)?;

    b.switch_to_block(body);
    let next = b.add(i, imm(1, IntType::I32)?)?;
    b.add_phi_incoming(phi, body, next)?;
    b.jump(header)?;

    b.switch_to_block(exit);
    b.ret(Some(i.into()))?;
    Ok((func, phi, i, next))
}

#[test]
fn builder_produces_verifiable_loop() -> Result<(), IrError> {
    let (func, phi, i, next) = counting_loop()?;
    func.verify()?;

    let header = func.inst_block(phi);
    assert_eq!(func.preds(header).len(), 2);
    assert_eq!(func.succs(header).len(), 2);
    assert_eq!(func.value_def(i), ValueDef::Result(phi, 0));
    assert!(matches!(func.value_def(func.params()[0]), ValueDef::Param(0)));

    let uses = func.compute_uses();
    assert_eq!(uses[i].len(), 3);
    assert_eq!(uses[next].as_slice(), &[phi]);
    Ok(())
}

#[test]
fn builder_rejects_type_mismatch() -> Result<(), IrError> {
    let mut func = Function::new("mismatch", &[Type::I32, Type::I64], None);
    let mut b = FunctionBuilder::new(&mut func);
    let (x, y) = (b.param(0), b.param(1));
    let err = b.add(x, y).unwrap_err();
    assert_eq!(
        err,
        IrError::TypeMismatch {
            context: "add",
            expected: Type::I32,
            actual: Type::I64
        }
    );
    assert!(matches!(imm(300, IntType::U8), Err(IrError::ImmediateOutOfRange { value: 300, .. })));
    Ok(())
}

#[test]
fn builder_rejects_appending_after_terminator() -> Result<(), IrError> {
    let mut func = Function::new("f", &[], None);
    let mut b = FunctionBuilder::new(&mut func);
    b.ret(None)?;
    let entry = b.entry_block();
    assert_eq!(b.unreachable().unwrap_err(), IrError::AlreadyTerminated(entry));
    Ok(())
}

#[test]
fn verify_reports_unterminated_and_missing_phi_args() -> Result<(), IrError> {
    let mut func = Function::new("f", &[], None);
    let mut b = FunctionBuilder::new(&mut func);
    let next = b.create_block();
    b.jump(next)?;
    b.switch_to_block(next);
    let (_, phi) = b.phi(Type::I32)?;
    assert_eq!(func.verify().unwrap_err(), IrError::Unterminated(next));

    let mut b = FunctionBuilder::new(&mut func);
    b.switch_to_block(next);
    b.ret(None)?;
    let edge = func.preds(next)[0];
    assert_eq!(func.verify().unwrap_err(), IrError::MissingPhiArgument { phi, edge });
    Ok(())
}

#[test]
fn switch_cases_must_be_disjoint() -> Result<(), IrError> {
    let mut func = Function::new("f", &[Type::I32], None);
    let mut b = FunctionBuilder::new(&mut func);
    let x = b.param(0);
    let a = b.create_block();
    let err = b.switch(x, &[(0, 5, a), (5, 7, a)], a).unwrap_err();
    assert_eq!(err, IrError::InvalidSwitchCase { lo: 5, hi: 7 });
    Ok(())
}

#[test]
fn remove_edge_drops_phi_arguments() -> Result<(), IrError> {
    let (mut func, phi, _, _) = counting_loop()?;
    let header = func.inst_block(phi);
    let exit = Block::from_u32(3);
    let body = Block::from_u32(2);
    let (to_body, to_exit) = match func.inst(func.terminator(header).unwrap()) {
        InstData::CondBranch {
            then_edge,
            else_edge,
            ..
        } => (*then_edge, *else_edge),
        other => panic!("unexpected terminator {other:?}"),
    };
    assert_eq!(func.edge_dest(to_exit), exit);

    // Turn the loop into an infinite one, then cut the back edge from the body.
    func.set_terminator(header, InstData::Jump { edge: to_body });
    func.remove_edge(to_exit);
    assert!(func.is_edge_removed(to_exit));
    assert!(func.preds(exit).is_empty());

    let back_edge = func.edge_between(body, header).unwrap();
    func.set_terminator(body, InstData::Unreachable);
    func.remove_edge(back_edge);
    match func.inst(phi) {
        InstData::Phi { args, .. } => assert_eq!(args.len(), 1),
        other => panic!("unexpected phi {other:?}"),
    }
    assert_eq!(func.edge_between(body, header), None);
    Ok(())
}

#[test]
fn replace_and_insert_keep_definitions_consistent() -> Result<(), IrError> {
    let (mut func, _, i, next) = counting_loop()?;
    let add = func.defining_inst(next).unwrap();
    let body = func.inst_block(add);

    let tmp = func.create_value(Type::I32);
    let copy = func.insert_inst_before(
        add,
        InstData::Assign {
            dest: tmp,
            expr: Expr::Copy(i.into()),
        },
    );
    assert_eq!(func.body(body), &[copy, add]);
    assert_eq!(func.defining_inst(tmp), Some(copy));

    func.replace_inst(
        add,
        InstData::Assign {
            dest: next,
            expr: Expr::Binary(BinaryOp::Add, tmp.into(), Immediate::i32(1).into()),
        },
    );
    assert_eq!(func.defining_inst(next), Some(add));
    func.verify()?;

    let mut cursor = StmtCursor::new(&mut func, body);
    let mut visited = vec![];
    while let Some(inst) = cursor.next() {
        if inst == copy {
            let extra = cursor.func_mut().create_value(Type::I32);
            cursor.insert_before(InstData::Assign {
                dest: extra,
                expr: Expr::Copy(i.into()),
            });
        }
        visited.push(inst);
    }
    assert_eq!(visited.len(), 3);
    assert_eq!(func.body(body).len(), 3);
    Ok(())
}
