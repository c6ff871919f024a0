use alloc::vec::Vec;

use smallvec::{SmallVec, smallvec};

use crate::{
    BinaryOp, Block, Callee, Expr, Function, Immediate, Inst, InstData, IntType, InternalFn,
    IrError, Operand, Predicate, SwitchCase, Type, UnaryOp, Value,
};

/// A builder for constructing well-typed SSA functions block by block.
///
/// The builder has an insertion block, to which every statement is appended. Terminators end the
/// insertion block, but do not select a new one: use [FunctionBuilder::switch_to_block] for that.
pub struct FunctionBuilder<'f> {
    func: &'f mut Function,
    current: Option<Block>,
}

impl<'f> FunctionBuilder<'f> {
    /// Create a builder for `func`, positioned at the end of its entry block
    pub fn new(func: &'f mut Function) -> Self {
        let current = Some(func.entry_block());
        Self { func, current }
    }

    #[inline]
    pub fn func(&self) -> &Function {
        self.func
    }

    #[inline]
    pub fn func_mut(&mut self) -> &mut Function {
        self.func
    }

    #[inline]
    pub fn entry_block(&self) -> Block {
        self.func.entry_block()
    }

    #[inline]
    pub fn current_block(&self) -> Option<Block> {
        self.current
    }

    /// Get the `index`th function parameter
    #[inline]
    pub fn param(&self, index: usize) -> Value {
        self.func.params()[index]
    }

    pub fn create_block(&mut self) -> Block {
        self.func.create_block()
    }

    #[inline]
    pub fn switch_to_block(&mut self, block: Block) {
        self.current = Some(block);
    }

    fn insertion_block(&self) -> Result<Block, IrError> {
        self.current.ok_or(IrError::NoInsertionBlock)
    }

    fn append(&mut self, data: InstData) -> Result<Inst, IrError> {
        let block = self.insertion_block()?;
        self.func.append_inst(block, data)
    }

    fn int_type_of(&self, operand: &Operand, context: &'static str) -> Result<IntType, IrError> {
        if let Some(value) = operand.as_value() {
            if !self.func.is_valid_value(value) {
                return Err(IrError::InvalidValue(value));
            }
        }
        match self.func.operand_type(operand) {
            Type::Int(ty) => Ok(ty),
            actual => Err(IrError::ExpectedInteger { context, actual }),
        }
    }

    fn expect_type(
        &self,
        operand: &Operand,
        expected: Type,
        context: &'static str,
    ) -> Result<(), IrError> {
        if let Some(value) = operand.as_value() {
            if !self.func.is_valid_value(value) {
                return Err(IrError::InvalidValue(value));
            }
        }
        let actual = self.func.operand_type(operand);
        if actual != expected {
            return Err(IrError::TypeMismatch {
                context,
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn assign(&mut self, ty: Type, expr: Expr) -> Result<Value, IrError> {
        self.insertion_block()?;
        let dest = self.func.create_value(ty);
        self.append(InstData::Assign { dest, expr })?;
        Ok(dest)
    }
}

/// Ordinary statements
impl FunctionBuilder<'_> {
    /// `dest = src`
    pub fn copy(&mut self, src: impl Into<Operand>) -> Result<Value, IrError> {
        let src = src.into();
        let ty = self.int_type_of(&src, "copy")?;
        self.assign(ty.into(), Expr::Copy(src))
    }

    pub fn unary(&mut self, op: UnaryOp, operand: impl Into<Operand>) -> Result<Value, IrError> {
        let operand = operand.into();
        let ty = self.int_type_of(&operand, op.as_str())?;
        self.assign(ty.into(), Expr::Unary(op, operand))
    }

    /// Build a binary operation, both operands of which must have the same type, except for shifts,
    /// whose shift amount may be of any integer type.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<Value, IrError> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let ty = self.int_type_of(&lhs, op.as_str())?;
        if op.is_shift() {
            self.int_type_of(&rhs, op.as_str())?;
        } else {
            self.expect_type(&rhs, ty.into(), op.as_str())?;
        }
        self.assign(ty.into(), Expr::Binary(op, lhs, rhs))
    }

    #[inline]
    pub fn add(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Value, IrError> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    #[inline]
    pub fn sub(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Value, IrError> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    #[inline]
    pub fn mul(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Value, IrError> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// `dest = lhs pred rhs`, producing an `i1`
    pub fn icmp(
        &mut self,
        pred: Predicate,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<Value, IrError> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let ty = self.int_type_of(&lhs, "icmp")?;
        self.expect_type(&rhs, ty.into(), "icmp")?;
        self.assign(Type::I1, Expr::Compare(pred, lhs, rhs))
    }

    /// `dest = cond ? then_value : else_value`
    pub fn select(
        &mut self,
        cond: impl Into<Operand>,
        then_value: impl Into<Operand>,
        else_value: impl Into<Operand>,
    ) -> Result<Value, IrError> {
        let (cond, then_value, else_value) = (cond.into(), then_value.into(), else_value.into());
        self.expect_type(&cond, Type::I1, "select")?;
        let ty = self.int_type_of(&then_value, "select")?;
        self.expect_type(&else_value, ty.into(), "select")?;
        self.assign(ty.into(), Expr::Select(cond, then_value, else_value))
    }

    /// Convert `src` to `ty`.
    ///
    /// At least one side of the conversion must be an integer.
    pub fn convert(&mut self, src: impl Into<Operand>, ty: Type) -> Result<Value, IrError> {
        let src = src.into();
        if let Some(value) = src.as_value() {
            if !self.func.is_valid_value(value) {
                return Err(IrError::InvalidValue(value));
            }
        }
        let src_ty = self.func.operand_type(&src);
        if src_ty.is_float() && ty.is_float() {
            return Err(IrError::ExpectedInteger {
                context: "convert",
                actual: src_ty,
            });
        }
        self.assign(ty, Expr::Convert(src))
    }

    /// `dest = src`, known to satisfy `src pred bound`
    pub fn assert(
        &mut self,
        src: Value,
        pred: Predicate,
        bound: impl Into<Operand>,
    ) -> Result<Value, IrError> {
        let bound = bound.into();
        let ty = self.int_type_of(&Operand::Value(src), "assert")?;
        self.expect_type(&bound, ty.into(), "assert")?;
        self.insertion_block()?;
        let dest = self.func.create_value(ty.into());
        self.append(InstData::Assert {
            dest,
            src,
            pred,
            bound,
        })?;
        Ok(dest)
    }

    /// Call an opaque function, returning the values it defines
    pub fn call(
        &mut self,
        name: &str,
        pure: bool,
        args: &[Operand],
        results: &[Type],
    ) -> Result<SmallVec<[Value; 2]>, IrError> {
        for arg in args {
            if let Some(value) = arg.as_value() {
                if !self.func.is_valid_value(value) {
                    return Err(IrError::InvalidValue(value));
                }
            }
        }
        self.insertion_block()?;
        let dests: SmallVec<[Value; 2]> =
            results.iter().map(|ty| self.func.create_value(*ty)).collect();
        self.append(InstData::Call {
            dests: dests.clone(),
            callee: Callee::External {
                name: name.into(),
                pure,
            },
            args: SmallVec::from_slice(args),
        })?;
        Ok(dests)
    }

    /// Call a runtime helper.
    ///
    /// The overflow-reporting helpers define a `(result, overflowed)` pair, the checked arithmetic
    /// helpers define a result of their operand type, and the bit counting helpers define an `i32`.
    pub fn call_internal(
        &mut self,
        callee: InternalFn,
        args: &[Operand],
    ) -> Result<SmallVec<[Value; 2]>, IrError> {
        let context = callee.as_str();
        let arity = if callee.arith_op().is_some() { 2 } else { 1 };
        if args.len() != arity {
            return Err(IrError::ArityMismatch {
                callee: context,
                expected: arity,
                actual: args.len(),
            });
        }
        let ty = self.int_type_of(&args[0], context)?;
        if arity == 2 {
            self.expect_type(&args[1], ty.into(), context)?;
        }

        let results: SmallVec<[Type; 2]> = if callee.reports_overflow() {
            smallvec![ty.into(), Type::I1]
        } else if callee.arith_op().is_some() {
            smallvec![ty.into()]
        } else {
            smallvec![Type::I32]
        };
        self.insertion_block()?;
        let dests: SmallVec<[Value; 2]> =
            results.iter().map(|ty| self.func.create_value(*ty)).collect();
        self.append(InstData::Call {
            dests: dests.clone(),
            callee: Callee::Internal(callee),
            args: SmallVec::from_slice(args),
        })?;
        Ok(dests)
    }
}

/// PHIs
impl FunctionBuilder<'_> {
    /// Create a PHI of type `ty` in the insertion block, without any incoming values
    pub fn phi(&mut self, ty: Type) -> Result<(Inst, Value), IrError> {
        self.insertion_block()?;
        let dest = self.func.create_value(ty);
        let inst = self.append(InstData::Phi {
            dest,
            args: SmallVec::new(),
        })?;
        Ok((inst, dest))
    }

    /// Add the value flowing into `phi` when control arrives from `pred`.
    ///
    /// The edge from `pred` is created if the terminator of `pred` has not been built yet.
    pub fn add_phi_incoming(
        &mut self,
        phi: Inst,
        pred: Block,
        value: impl Into<Operand>,
    ) -> Result<(), IrError> {
        let value = value.into();
        let InstData::Phi { dest, .. } = self.func.inst(phi) else {
            return Err(IrError::NotAPhi(phi));
        };
        let ty = self.func.value_type(*dest);
        self.expect_type(&value, ty, "phi")?;
        if !self.func.is_valid_block(pred) {
            return Err(IrError::InvalidBlock(pred));
        }
        let block = self.func.inst_block(phi);
        let edge = self.func.ensure_edge(pred, block);
        self.func.add_phi_arg(phi, edge, value)
    }
}

/// Terminators
impl FunctionBuilder<'_> {
    fn check_block(&self, block: Block) -> Result<(), IrError> {
        if self.func.is_valid_block(block) {
            Ok(())
        } else {
            Err(IrError::InvalidBlock(block))
        }
    }

    pub fn jump(&mut self, dest: Block) -> Result<Inst, IrError> {
        let block = self.insertion_block()?;
        self.check_block(dest)?;
        let edge = self.func.ensure_edge(block, dest);
        self.append(InstData::Jump { edge })
    }

    /// Branch to `then_dest` if `lhs pred rhs` holds, otherwise to `else_dest`
    pub fn cond_br(
        &mut self,
        pred: Predicate,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
        then_dest: Block,
        else_dest: Block,
    ) -> Result<Inst, IrError> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let ty = self.int_type_of(&lhs, "br")?;
        self.expect_type(&rhs, ty.into(), "br")?;
        let block = self.insertion_block()?;
        self.check_block(then_dest)?;
        self.check_block(else_dest)?;
        let then_edge = self.func.ensure_edge(block, then_dest);
        let else_edge = self.func.ensure_edge(block, else_dest);
        self.append(InstData::CondBranch {
            pred,
            lhs,
            rhs,
            then_edge,
            else_edge,
        })
    }

    /// Build a switch on `selector`, whose cases are inclusive `(lo, hi, dest)` ranges
    pub fn switch(
        &mut self,
        selector: impl Into<Operand>,
        cases: &[(i128, i128, Block)],
        default: Block,
    ) -> Result<Inst, IrError> {
        let selector = selector.into();
        let ty = self.int_type_of(&selector, "switch")?;
        let block = self.insertion_block()?;
        self.check_block(default)?;

        let mut switch_cases = Vec::with_capacity(cases.len());
        for &(lo, hi, dest) in cases {
            self.check_block(dest)?;
            for value in [lo, hi] {
                if !ty.contains(value) {
                    return Err(IrError::ImmediateOutOfRange { value, ty });
                }
            }
            let overlaps = switch_cases
                .iter()
                .any(|prev: &SwitchCase| prev.lo <= hi && lo <= prev.hi);
            if lo > hi || overlaps {
                return Err(IrError::InvalidSwitchCase { lo, hi });
            }
            let edge = self.func.ensure_edge(block, dest);
            switch_cases.push(SwitchCase { lo, hi, edge });
        }
        let default = self.func.ensure_edge(block, default);
        self.append(InstData::Switch {
            selector,
            cases: switch_cases,
            default,
        })
    }

    pub fn ret(&mut self, value: Option<Operand>) -> Result<Inst, IrError> {
        match (self.func.result_type(), value.as_ref()) {
            (Some(ty), Some(value)) => self.expect_type(value, ty, "ret")?,
            (None, None) => (),
            (Some(_), None) => {
                return Err(IrError::ArityMismatch {
                    callee: "ret",
                    expected: 1,
                    actual: 0,
                });
            }
            (None, Some(_)) => {
                return Err(IrError::ArityMismatch {
                    callee: "ret",
                    expected: 0,
                    actual: 1,
                });
            }
        }
        self.append(InstData::Return { value })
    }

    pub fn unreachable(&mut self) -> Result<Inst, IrError> {
        self.append(InstData::Unreachable)
    }
}

/// Construct an integer constant operand of type `ty`.
///
/// Returns an error if `value` is not representable in `ty`.
pub fn imm(value: i128, ty: IntType) -> Result<Operand, IrError> {
    if ty.contains(value) {
        Ok(Operand::Const(Immediate::new(value, ty)))
    } else {
        Err(IrError::ImmediateOutOfRange { value, ty })
    }
}
