use alloc::{string::String, vec::Vec};

use vrp_analysis::{GlobalRanges, PropagationResult, RangeStore, VrpConfig, VrpError, propagate};
use vrp_ir::{Block, Expr, Function, InstData, LoopInfo, Operand, StmtCursor};

use crate::{DeferredEdits, Simplification, Simplifier, Statistics};

/// The result of running [ValueRangePropagation] on a function
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Whether the function was modified
    pub changed: bool,
    pub statistics: Statistics,
}

/// This pass computes the range of values every integer SSA name may hold, and uses those ranges
/// to fold conditional branches, remove unreachable switch destinations, and rewrite statements
/// into cheaper equivalents.
///
/// Each run is a single session: a fresh range store is created for the function, filled to a
/// fixed point by the sparse conditional propagation driver, used to simplify the executable
/// blocks, and then torn down. Control flow edits are deferred until every executable block has
/// been simplified, and applied in one batch.
///
/// Once simplification is done, the range assertions the function carries are no longer needed,
/// and are replaced with plain copies.
#[derive(Debug, Default, Clone)]
pub struct ValueRangePropagation {
    config: VrpConfig,
}

impl ValueRangePropagation {
    pub const NAME: &'static str = "value-range-propagation";

    pub fn new(config: VrpConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    #[inline]
    pub fn config(&self) -> &VrpConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut VrpConfig {
        &mut self.config
    }

    /// Run the pass on `func`, using `loops` for the bounds of its induction variables
    pub fn run(&mut self, func: &mut Function, loops: &dyn LoopInfo) -> Result<PassOutcome, VrpError> {
        self.run_session(func, loops, None)
    }

    /// Run the pass on `func`, and then attach the ranges it computed to `globals`, where later
    /// passes can find them
    pub fn run_with_globals(
        &mut self,
        func: &mut Function,
        loops: &dyn LoopInfo,
        globals: &mut GlobalRanges,
    ) -> Result<PassOutcome, VrpError> {
        self.run_session(func, loops, Some(globals))
    }

    fn run_session(
        &mut self,
        func: &mut Function,
        loops: &dyn LoopInfo,
        globals: Option<&mut GlobalRanges>,
    ) -> Result<PassOutcome, VrpError> {
        log::debug!(target: "vrp:pass", "running {} on @{}", Self::NAME, func.name());

        let mut store = RangeStore::for_function(func);
        let result = match propagate(func, loops, &self.config, &mut store) {
            Ok(result) => result,
            Err(err) => {
                log::warn!(target: "vrp:pass", "abandoning {} on @{}: {err}", Self::NAME, func.name());
                return Err(err);
            }
        };
        store.set_lattice_propagation_complete();

        if self.config.dump_ranges() {
            let mut dump = String::new();
            if store.dump_all_value_ranges(&mut dump).is_ok() {
                log::debug!(target: "vrp:pass", "{dump}");
            }
        }

        let mut statistics = self.simplify(func, &store, &result);
        statistics.assertions_removed = remove_range_assertions(func);

        if let Some(globals) = globals {
            store.promote_to_global(globals);
        }
        let released = store.teardown();
        log::trace!(target: "vrp:pass", "session for @{} released {released} ranges", func.name());

        let changed = !statistics.is_empty();
        if changed {
            log::debug!(target: "vrp:pass", "{statistics}");
        }
        Ok(PassOutcome {
            changed,
            statistics,
        })
    }

    /// Simplify every statement of the blocks `result` found executable, then apply the control
    /// flow edits this produced
    fn simplify(&self, func: &mut Function, store: &RangeStore, result: &PropagationResult) -> Statistics {
        let simplifier = Simplifier::new(store, &self.config);
        let mut edits = DeferredEdits::new();
        let mut statistics = Statistics::default();

        let blocks = result.executable_blocks().collect::<Vec<Block>>();
        for block in blocks {
            let mut cursor = StmtCursor::new(func, block);
            while cursor.next().is_some() {
                match simplifier.simplify_stmt_using_ranges(&mut cursor, &mut edits) {
                    Some(Simplification::Statement) => statistics.statements_simplified += 1,
                    Some(Simplification::BranchFolded) => statistics.branches_rewritten += 1,
                    // Counted when the update is applied
                    Some(Simplification::SwitchNarrowed) | None => (),
                }
            }
        }

        let summary = edits.flush(func);
        statistics.edges_removed = summary.edges_removed;
        statistics.switches_updated = summary.switches_updated;
        statistics
    }
}

/// Replace every range assertion in `func` with a copy of the name it asserts on, returning the
/// number of assertions replaced
pub fn remove_range_assertions(func: &mut Function) -> usize {
    let mut removed = 0;
    let blocks = func.blocks().collect::<Vec<_>>();
    for block in blocks {
        let mut cursor = StmtCursor::new(func, block);
        while let Some(inst) = cursor.next() {
            if let InstData::Assert { dest, src, .. } = *cursor.func().inst(inst) {
                cursor.replace(InstData::Assign {
                    dest,
                    expr: Expr::Copy(Operand::Value(src)),
                });
                removed += 1;
            }
        }
    }
    removed
}
