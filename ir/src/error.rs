use crate::{Block, Edge, Inst, IntType, Type, Value};

/// Errors raised when constructing or verifying malformed IR
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    #[error("invalid value reference: {0}")]
    InvalidValue(Value),
    #[error("invalid block reference: {0}")]
    InvalidBlock(Block),
    #[error("no block is selected for insertion")]
    NoInsertionBlock,
    #[error("cannot append to {0}: it has already been terminated")]
    AlreadyTerminated(Block),
    #[error("{0} has no terminator")]
    Unterminated(Block),
    #[error("type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: &'static str,
        expected: Type,
        actual: Type,
    },
    #[error("expected an integer operand in {context}, got {actual}")]
    ExpectedInteger { context: &'static str, actual: Type },
    #[error("{0} is not a phi")]
    NotAPhi(Inst),
    #[error("phi {phi} has no argument for incoming edge {edge}")]
    MissingPhiArgument { phi: Value, edge: Edge },
    #[error("phi {phi} has an argument for {edge}, which does not enter {block}")]
    StrayPhiArgument { phi: Value, edge: Edge, block: Block },
    #[error("{edge} leaves {block}, but is not a successor of its terminator")]
    DanglingEdge { edge: Edge, block: Block },
    #[error("switch case {lo}..={hi} is empty or overlaps a previous case")]
    InvalidSwitchCase { lo: i128, hi: i128 },
    #[error("constant {value} is not representable as {ty}")]
    ImmediateOutOfRange { value: i128, ty: IntType },
    #[error("{callee} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        callee: &'static str,
        expected: usize,
        actual: usize,
    },
}
