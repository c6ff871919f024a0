use alloc::vec::Vec;

use vrp_ir::{Edge, Function, Inst, InstData, SwitchCase};

/// A pending rewrite of a switch, replacing its case vector and default destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchUpdate {
    pub switch: Inst,
    pub cases: Vec<SwitchCase>,
    pub default: Edge,
}

/// The number of structural edits applied by [DeferredEdits::flush]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FlushSummary {
    pub edges_removed: usize,
    pub switches_updated: usize,
}

/// Control flow edits recorded while simplifying a region, applied all at once afterwards.
///
/// Removing edges or rewriting a switch while other statements of the region are still being
/// visited would invalidate the iteration, so the simplifier only records what should happen. The
/// log must be flushed before it is dropped: dropping a log with pending edits is a usage error,
/// which is logged, and panics in debug builds with the `std` feature unless the thread is
/// already panicking.
#[derive(Debug, Default)]
pub struct DeferredEdits {
    to_remove_edges: Vec<Edge>,
    switch_updates: Vec<SwitchUpdate>,
}

impl DeferredEdits {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.to_remove_edges.is_empty() && self.switch_updates.is_empty()
    }

    /// The number of edits waiting to be applied
    #[inline]
    pub fn len(&self) -> usize {
        self.to_remove_edges.len() + self.switch_updates.len()
    }

    /// Record that `edge` is never taken, and should be removed from the control flow graph.
    ///
    /// If `edge` leaves a conditional branch, the branch becomes a jump along its other edge.
    pub fn remove_edge(&mut self, edge: Edge) {
        if !self.to_remove_edges.contains(&edge) {
            log::debug!(target: "vrp:edits", "queued removal of {edge}");
            self.to_remove_edges.push(edge);
        }
    }

    /// Record that the switch `update.switch` should be rewritten
    pub fn update_switch(&mut self, update: SwitchUpdate) {
        log::debug!(
            target: "vrp:edits",
            "queued update of {} to {} cases",
            update.switch,
            update.cases.len()
        );
        self.switch_updates.retain(|pending| pending.switch != update.switch);
        self.switch_updates.push(update);
    }

    pub fn pending_edge_removals(&self) -> &[Edge] {
        &self.to_remove_edges
    }

    pub fn pending_switch_updates(&self) -> &[SwitchUpdate] {
        &self.switch_updates
    }

    /// Apply every recorded edit to `func`, leaving the log empty.
    ///
    /// Switch updates are applied first, so that the edges they stop using can then be removed.
    pub fn flush(&mut self, func: &mut Function) -> FlushSummary {
        let mut summary = FlushSummary::default();

        for SwitchUpdate {
            switch,
            cases,
            default,
        } in self.switch_updates.drain(..)
        {
            let data = if cases.iter().all(|case| case.edge == default) {
                InstData::Jump { edge: default }
            } else {
                let InstData::Switch { selector, .. } = func.inst(switch) else {
                    panic!("{switch} is not a switch");
                };
                InstData::Switch {
                    selector: *selector,
                    cases,
                    default,
                }
            };
            log::debug!(target: "vrp:edits", "rewriting {switch}: {}", func.display_inst(switch));
            func.replace_inst(switch, data);
            summary.switches_updated += 1;
        }

        for edge in self.to_remove_edges.drain(..) {
            if func.is_edge_removed(edge) {
                continue;
            }
            let source = func.edge_source(edge);
            if let Some(term) = func.terminator(source) {
                if let InstData::CondBranch {
                    then_edge,
                    else_edge,
                    ..
                } = *func.inst(term)
                {
                    let taken = if then_edge == edge { else_edge } else { then_edge };
                    assert_ne!(taken, edge, "cannot remove the only successor edge of {source}");
                    func.replace_inst(term, InstData::Jump { edge: taken });
                }
            }
            log::debug!(
                target: "vrp:edits",
                "removing {edge} ({source} -> {})",
                func.edge_dest(edge)
            );
            func.remove_edge(edge);
            summary.edges_removed += 1;
        }

        summary
    }
}

impl Drop for DeferredEdits {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        log::error!(
            target: "vrp:edits",
            "deferred edits were dropped without being flushed: {} edge removals and {} switch \
             updates are pending",
            self.to_remove_edges.len(),
            self.switch_updates.len()
        );
        // Panicking again while unwinding would abort
        #[cfg(feature = "std")]
        if cfg!(debug_assertions) && !std::thread::panicking() {
            panic!(
                "deferred edits were dropped without being flushed: {} edge removals and {} \
                 switch updates are pending",
                self.to_remove_edges.len(),
                self.switch_updates.len()
            );
        }
    }
}
