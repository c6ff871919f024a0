use alloc::vec::Vec;
use core::fmt;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::{Block, Edge, Immediate, Value};

/// An input to a statement: either an SSA name, or an integer constant
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Value(Value),
    Const(Immediate),
}

impl Operand {
    #[inline]
    pub const fn as_value(&self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(*value),
            Self::Const(_) => None,
        }
    }

    #[inline]
    pub const fn as_const(&self) -> Option<Immediate> {
        match self {
            Self::Const(imm) => Some(*imm),
            Self::Value(_) => None,
        }
    }
}

impl From<Value> for Operand {
    #[inline]
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Immediate> for Operand {
    #[inline]
    fn from(imm: Immediate) -> Self {
        Self::Const(imm)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => fmt::Display::fmt(value, f),
            Self::Const(imm) => fmt::Display::fmt(imm, f),
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => fmt::Display::fmt(value, f),
            Self::Const(imm) => fmt::Debug::fmt(imm, f),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Abs,
    /// Bitwise complement
    Not,
}

impl UnaryOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Abs => "abs",
            Self::Not => "not",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Truncating division
    Div,
    /// Truncating remainder, the sign of the result follows the dividend
    Rem,
    Shl,
    /// Arithmetic shift for signed types, logical shift for unsigned types
    Shr,
    And,
    Or,
    Xor,
    Min,
    Max,
}

impl BinaryOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "rem",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Returns true if the operands of this operator may be swapped without changing its result
    pub const fn is_commutative(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor | Self::Min | Self::Max
        )
    }

    /// Returns true if the right-hand operand is a shift amount, whose type is unrelated to the
    /// type of the result.
    pub const fn is_shift(&self) -> bool {
        matches!(self, Self::Shl | Self::Shr)
    }
}

/// An integer comparison predicate.
///
/// Whether the comparison is signed or unsigned is determined by the type of its operands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Predicate {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
        }
    }

    /// The predicate which holds exactly when `self` does not, i.e. `!(a < b)` is `a >= b`
    pub const fn invert(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
        }
    }

    /// The predicate obtained by swapping the operands, i.e. `a < b` is `b > a`
    pub const fn swap(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    /// Evaluate this predicate on two canonical values of the same type
    pub const fn eval(&self, lhs: i128, rhs: i128) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The right-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Copy(Operand),
    Unary(UnaryOp, Operand),
    Binary(BinaryOp, Operand, Operand),
    /// Produces an `i1`
    Compare(Predicate, Operand, Operand),
    /// `cond ? then : else`
    Select(Operand, Operand, Operand),
    /// Conversion of the operand to the type of the destination.
    ///
    /// Integer-to-integer conversions truncate or extend according to the signedness of the
    /// source. Integer-to-float and float-to-integer conversions round toward zero.
    Convert(Operand),
}

impl Expr {
    pub fn operands(&self) -> SmallVec<[Operand; 3]> {
        match self {
            Self::Copy(a) | Self::Unary(_, a) | Self::Convert(a) => SmallVec::from_slice(&[*a]),
            Self::Binary(_, a, b) | Self::Compare(_, a, b) => SmallVec::from_slice(&[*a, *b]),
            Self::Select(c, a, b) => SmallVec::from_slice(&[*c, *a, *b]),
        }
    }
}

/// Functions provided by the compiler runtime, whose semantics are known to the optimizer
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InternalFn {
    /// `(a + b, overflowed)`, with wrapping result
    AddOverflow,
    /// `(a - b, overflowed)`, with wrapping result
    SubOverflow,
    /// `(a * b, overflowed)`, with wrapping result
    MulOverflow,
    /// `a + b`, trapping on overflow
    CheckedAdd,
    /// `a - b`, trapping on overflow
    CheckedSub,
    /// `a * b`, trapping on overflow
    CheckedMul,
    /// Number of set bits
    Popcount,
    /// Number of set bits, modulo 2
    Parity,
    /// Number of leading zero bits, undefined for zero
    Clz,
    /// Number of trailing zero bits, undefined for zero
    Ctz,
    /// One plus the index of the least significant set bit, or zero
    Ffs,
}

impl InternalFn {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddOverflow => "add_overflow",
            Self::SubOverflow => "sub_overflow",
            Self::MulOverflow => "mul_overflow",
            Self::CheckedAdd => "checked_add",
            Self::CheckedSub => "checked_sub",
            Self::CheckedMul => "checked_mul",
            Self::Popcount => "popcount",
            Self::Parity => "parity",
            Self::Clz => "clz",
            Self::Ctz => "ctz",
            Self::Ffs => "ffs",
        }
    }

    /// The arithmetic operator underlying an overflow-checking helper
    pub const fn arith_op(&self) -> Option<BinaryOp> {
        match self {
            Self::AddOverflow | Self::CheckedAdd => Some(BinaryOp::Add),
            Self::SubOverflow | Self::CheckedSub => Some(BinaryOp::Sub),
            Self::MulOverflow | Self::CheckedMul => Some(BinaryOp::Mul),
            _ => None,
        }
    }

    /// Returns true if this helper produces a `(result, overflow flag)` pair
    pub const fn reports_overflow(&self) -> bool {
        matches!(self, Self::AddOverflow | Self::SubOverflow | Self::MulOverflow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// A call to a function whose body is not visible to the optimizer
    External {
        name: CompactString,
        /// Whether the function is known to have no side effects
        pure: bool,
    },
    Internal(InternalFn),
}

/// A single case of a switch, matching the inclusive range `lo..=hi` of the selector
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    pub lo: i128,
    pub hi: i128,
    pub edge: Edge,
}

impl SwitchCase {
    #[inline]
    pub const fn contains(&self, value: i128) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// The contents of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstData {
    /// A merge of values flowing in along each incoming edge of the containing block
    Phi {
        dest: Value,
        args: SmallVec<[(Edge, Operand); 4]>,
    },
    Assign {
        dest: Value,
        expr: Expr,
    },
    /// `dest` is a copy of `src`, which is known to satisfy `src pred bound` at this point.
    ///
    /// Assertions are how the facts established by a conditional branch are made available to
    /// the statements dominated by one of its successors.
    Assert {
        dest: Value,
        src: Value,
        pred: Predicate,
        bound: Operand,
    },
    Call {
        dests: SmallVec<[Value; 2]>,
        callee: Callee,
        args: SmallVec<[Operand; 4]>,
    },
    Jump {
        edge: Edge,
    },
    CondBranch {
        pred: Predicate,
        lhs: Operand,
        rhs: Operand,
        then_edge: Edge,
        else_edge: Edge,
    },
    Switch {
        selector: Operand,
        cases: Vec<SwitchCase>,
        default: Edge,
    },
    Return {
        value: Option<Operand>,
    },
    Unreachable,
}

impl InstData {
    #[inline]
    pub const fn is_phi(&self) -> bool {
        matches!(self, Self::Phi { .. })
    }

    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. }
                | Self::CondBranch { .. }
                | Self::Switch { .. }
                | Self::Return { .. }
                | Self::Unreachable
        )
    }

    /// The SSA names defined by this statement
    pub fn defs(&self) -> SmallVec<[Value; 2]> {
        match self {
            Self::Phi { dest, .. } | Self::Assign { dest, .. } | Self::Assert { dest, .. } => {
                SmallVec::from_slice(&[*dest])
            }
            Self::Call { dests, .. } => dests.clone(),
            _ => SmallVec::new(),
        }
    }

    /// All of the operands read by this statement
    pub fn operands(&self) -> SmallVec<[Operand; 4]> {
        match self {
            Self::Phi { args, .. } => args.iter().map(|(_, arg)| *arg).collect(),
            Self::Assign { expr, .. } => expr.operands().into_iter().collect(),
            Self::Assert { src, bound, .. } => SmallVec::from_slice(&[Operand::Value(*src), *bound]),
            Self::Call { args, .. } => args.clone(),
            Self::CondBranch { lhs, rhs, .. } => SmallVec::from_slice(&[*lhs, *rhs]),
            Self::Switch { selector, .. } => SmallVec::from_slice(&[*selector]),
            Self::Return { value: Some(value) } => SmallVec::from_slice(&[*value]),
            Self::Return { value: None } | Self::Jump { .. } | Self::Unreachable => SmallVec::new(),
        }
    }

    /// The SSA names read by this statement
    pub fn uses(&self) -> impl Iterator<Item = Value> {
        self.operands().into_iter().filter_map(|operand| operand.as_value())
    }

    /// The outgoing control flow edges of a terminator, in order, without duplicates
    pub fn successor_edges(&self) -> SmallVec<[Edge; 4]> {
        match self {
            Self::Jump { edge } => SmallVec::from_slice(&[*edge]),
            Self::CondBranch {
                then_edge,
                else_edge,
                ..
            } => {
                if then_edge == else_edge {
                    SmallVec::from_slice(&[*then_edge])
                } else {
                    SmallVec::from_slice(&[*then_edge, *else_edge])
                }
            }
            Self::Switch { cases, default, .. } => {
                let mut edges = SmallVec::<[Edge; 4]>::default();
                for edge in cases.iter().map(|case| case.edge).chain(core::iter::once(*default)) {
                    if !edges.contains(&edge) {
                        edges.push(edge);
                    }
                }
                edges
            }
            _ => SmallVec::new(),
        }
    }
}

/// The position of a [Block] argument or statement result in the function
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueDef {
    /// The `n`th function parameter
    Param(usize),
    /// The `n`th result of a statement
    Result(crate::Inst, usize),
    /// A value which has been created, but whose definition has not been inserted yet
    Detached,
}

impl ValueDef {
    pub const fn inst(&self) -> Option<crate::Inst> {
        match self {
            Self::Result(inst, _) => Some(*inst),
            _ => None,
        }
    }
}

/// The location of a statement in its block
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstPosition {
    Phi(Block),
    Body(Block),
    Terminator(Block),
}

impl InstPosition {
    pub const fn block(&self) -> Block {
        match self {
            Self::Phi(block) | Self::Body(block) | Self::Terminator(block) => *block,
        }
    }
}
