use cranelift_entity::PrimaryMap;

use crate::{Block, FxHashMap, LoopId, Value};

/// What is known about a basic induction variable of a loop.
///
/// The induction variable is the result of a PHI in the loop header which takes `init` on entry to
/// the loop, and is incremented by `step` on every iteration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InductionInfo {
    /// The value of the induction variable on entry to the loop
    pub init: i128,
    /// The amount added to the induction variable on each iteration
    pub step: i128,
    /// An upper bound on the number of times the latch of the loop executes, if known
    pub max_latch_executions: Option<u64>,
    /// Whether `max_latch_executions` is the exact trip count rather than an upper bound
    pub exact: bool,
}

impl InductionInfo {
    /// The inclusive range of values the induction variable takes in the loop header, if the
    /// number of latch executions is bounded.
    pub fn value_bounds(&self) -> Option<(i128, i128)> {
        let n = i128::from(self.max_latch_executions?);
        let last = self.step.checked_mul(n)?.checked_add(self.init)?;
        Some(if self.step >= 0 {
            (self.init, last)
        } else {
            (last, self.init)
        })
    }
}

/// The loop analysis collaborator consulted by range propagation
pub trait LoopInfo {
    /// Get the loop whose header is `block`, if any
    fn loop_of_header(&self, block: Block) -> Option<LoopId>;

    /// Get the induction information for `value` in `loop_id`, if `value` is an induction
    /// variable of that loop
    fn induction(&self, loop_id: LoopId, value: Value) -> Option<InductionInfo>;
}

/// A [LoopInfo] which knows of no loops
#[derive(Debug, Default, Copy, Clone)]
pub struct NoLoops;

impl LoopInfo for NoLoops {
    #[inline]
    fn loop_of_header(&self, _block: Block) -> Option<LoopId> {
        None
    }

    #[inline]
    fn induction(&self, _loop_id: LoopId, _value: Value) -> Option<InductionInfo> {
        None
    }
}

/// A [LoopInfo] backed by facts registered up front, e.g. by a prior loop analysis
#[derive(Debug, Default, Clone)]
pub struct StaticLoopInfo {
    /// The induction variables of each loop
    loops: PrimaryMap<LoopId, FxHashMap<Value, InductionInfo>>,
    headers: FxHashMap<Block, LoopId>,
}

impl StaticLoopInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loop headed by `header`
    pub fn add_loop(&mut self, header: Block) -> LoopId {
        if let Some(id) = self.headers.get(&header) {
            return *id;
        }
        let id = self.loops.push(FxHashMap::default());
        self.headers.insert(header, id);
        id
    }

    /// Register `value` as an induction variable of `loop_id`
    pub fn add_induction(&mut self, loop_id: LoopId, value: Value, info: InductionInfo) {
        log::trace!(
            target: "vrp:loops",
            "registering {value} as induction variable of {loop_id}: {info:?}"
        );
        self.loops[loop_id].insert(value, info);
    }

}

impl LoopInfo for StaticLoopInfo {
    fn loop_of_header(&self, block: Block) -> Option<LoopId> {
        self.headers.get(&block).copied()
    }

    fn induction(&self, loop_id: LoopId, value: Value) -> Option<InductionInfo> {
        self.loops.get(loop_id)?.get(&value).copied()
    }
}
