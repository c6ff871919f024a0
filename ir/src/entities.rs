use cranelift_entity::entity_impl;

/// An SSA name.
///
/// Every value is defined exactly once, either as a function parameter, or as a result of a
/// statement (including PHIs).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A basic block
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A statement, i.e. a PHI, an ordinary statement, or a block terminator
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A control flow edge between two blocks.
///
/// There is at most one live edge between any ordered pair of blocks.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge(u32);
entity_impl!(Edge, "edge");

/// A loop, as identified by the loop analysis collaborator
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(u32);
entity_impl!(LoopId, "loop");
