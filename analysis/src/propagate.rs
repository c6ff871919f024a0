//! The propagation driver: a sparse conditional solver which computes the ranges of all SSA names
//! of a function to a fixed point, along with the set of blocks and edges which may execute.

use alloc::collections::VecDeque;

use bitvec::prelude::*;
use cranelift_entity::{EntityRef, SecondaryMap};
use smallvec::SmallVec;
use vrp_ir::{Block, Edge, Function, Inst, InstData, LoopInfo, Value};

use crate::{
    ChangeResult, RangeQuery, RangeStore, ValueRange, VrpConfig, VrpError,
    evaluate::{Taken, cond_branch_taken, switch_targets},
    extract::{extract_range_from_phi, extract_ranges},
    loop_adjust::adjust_range_with_loop,
    query::{is_tracked, operand_int_type},
};

/// The control flow facts established by a propagation run
#[derive(Debug, Clone)]
pub struct PropagationResult {
    executable_blocks: BitVec,
    executable_edges: BitVec,
}

impl PropagationResult {
    #[inline]
    pub fn is_block_executable(&self, block: Block) -> bool {
        self.executable_blocks.get(block.index()).is_some_and(|bit| *bit)
    }

    #[inline]
    pub fn is_edge_executable(&self, edge: Edge) -> bool {
        self.executable_edges.get(edge.index()).is_some_and(|bit| *bit)
    }

    /// The blocks which may execute, in layout order
    pub fn executable_blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.executable_blocks.iter_ones().map(Block::new)
    }
}

/// Compute the ranges of every integer SSA name of `func` into `store`.
///
/// Parameters are VARYING on entry. A block is only evaluated once an edge into it is found to be
/// executable, and a PHI only merges the values flowing along executable edges, so ranges never
/// account for code which cannot run.
///
/// If the fixed point is not reached within the configured number of steps, every range in
/// `store` is reset to VARYING and [VrpError::IterationLimit] is returned.
pub fn propagate(
    func: &Function,
    loops: &dyn LoopInfo,
    config: &VrpConfig,
    store: &mut RangeStore,
) -> Result<PropagationResult, VrpError> {
    assert_eq!(
        store.num_values(),
        func.num_values(),
        "range store was not created for {}",
        func.name()
    );
    log::debug!(target: "vrp:propagate", "propagating ranges in @{}", func.name());

    let mut propagator = Propagator::new(func, loops, config, store);
    propagator.run()?;
    log::debug!(
        target: "vrp:propagate",
        "reached fixed point for @{} in {} steps",
        func.name(),
        propagator.steps
    );
    Ok(PropagationResult {
        executable_blocks: propagator.executable_blocks,
        executable_edges: propagator.executable_edges,
    })
}

enum WorkItem {
    /// An edge which has just become executable
    Edge(Edge),
    /// A statement with an operand whose range changed
    Inst(Inst),
}

struct Propagator<'a> {
    func: &'a Function,
    loops: &'a dyn LoopInfo,
    config: &'a VrpConfig,
    store: &'a mut RangeStore,
    uses: SecondaryMap<Value, SmallVec<[Inst; 4]>>,
    /// The names whose equivalence set has held each name. Branches on those names may have been
    /// decided through the range of the equivalent.
    equivalent_of: SecondaryMap<Value, SmallVec<[Value; 2]>>,
    executable_blocks: BitVec,
    executable_edges: BitVec,
    /// The number of executable incoming edges of each PHI when it was last visited
    phi_edge_counts: SecondaryMap<Inst, u32>,
    /// The number of visits which changed the range of each PHI
    phi_visits: SecondaryMap<Inst, u32>,
    edge_worklist: VecDeque<Edge>,
    ssa_worklist: VecDeque<Inst>,
    queued: BitVec,
    steps: usize,
}

impl<'a> Propagator<'a> {
    fn new(
        func: &'a Function,
        loops: &'a dyn LoopInfo,
        config: &'a VrpConfig,
        store: &'a mut RangeStore,
    ) -> Self {
        Self {
            func,
            loops,
            config,
            store,
            uses: func.compute_uses(),
            equivalent_of: SecondaryMap::new(),
            executable_blocks: bitvec![0; func.num_blocks()],
            executable_edges: bitvec![0; func.num_edges()],
            phi_edge_counts: SecondaryMap::new(),
            phi_visits: SecondaryMap::new(),
            edge_worklist: VecDeque::new(),
            ssa_worklist: VecDeque::new(),
            queued: bitvec![0; func.num_insts()],
            steps: 0,
        }
    }

    fn run(&mut self) -> Result<(), VrpError> {
        for &param in self.func.params() {
            if is_tracked(self.func, param) {
                self.store.set(param, ValueRange::Varying);
            }
        }
        self.visit_block(self.func.entry_block());

        loop {
            let next = match self.edge_worklist.pop_front() {
                Some(edge) => WorkItem::Edge(edge),
                None => match self.ssa_worklist.pop_front() {
                    Some(inst) => WorkItem::Inst(inst),
                    None => break,
                },
            };

            self.steps += 1;
            if self.steps > self.config.max_steps() {
                return Err(self.give_up());
            }

            match next {
                WorkItem::Edge(edge) => {
                    let func = self.func;
                    let dest = func.edge_dest(edge);
                    if self.executable_blocks[dest.index()] {
                        for &phi in func.phis(dest) {
                            self.visit_phi(phi);
                        }
                    } else {
                        self.visit_block(dest);
                    }
                }
                WorkItem::Inst(inst) => {
                    self.queued.set(inst.index(), false);
                    self.visit_inst(inst);
                }
            }
        }
        Ok(())
    }

    /// Fall back to VARYING for everything, treating all of the control flow graph as executable
    fn give_up(&mut self) -> VrpError {
        let limit = self.config.max_steps();
        log::warn!(
            target: "vrp:propagate",
            "giving up on @{} after {limit} steps, all ranges are now VARYING",
            self.func.name()
        );
        self.store.reset_all_to_top();
        self.executable_blocks.fill(true);
        for index in 0..self.func.num_edges() {
            let edge = Edge::new(index);
            self.executable_edges.set(index, !self.func.is_edge_removed(edge));
        }
        self.edge_worklist.clear();
        self.ssa_worklist.clear();
        VrpError::IterationLimit { limit }
    }

    fn visit_block(&mut self, block: Block) {
        log::trace!(target: "vrp:propagate", "{block} is executable");
        self.executable_blocks.set(block.index(), true);
        let func = self.func;
        for inst in func.block_insts(block) {
            self.visit_inst(inst);
        }
    }

    fn mark_edge_executable(&mut self, edge: Edge) {
        if !self.executable_edges.replace(edge.index(), true) {
            log::trace!(
                target: "vrp:propagate",
                "{edge} ({} -> {}) is executable",
                self.func.edge_source(edge),
                self.func.edge_dest(edge)
            );
            self.edge_worklist.push_back(edge);
        }
    }

    /// Re-visit the executable users of `value`, and of every name equivalent to it, as its range
    /// has changed
    fn push_users(&mut self, value: Value) {
        let Self {
            func,
            uses,
            equivalent_of,
            executable_blocks,
            queued,
            ssa_worklist,
            ..
        } = self;
        let names = core::iter::once(value).chain(equivalent_of[value].iter().copied());
        for name in names {
            for &user in uses[name].iter() {
                if executable_blocks[func.inst_block(user).index()]
                    && !queued.replace(user.index(), true)
                {
                    ssa_worklist.push_back(user);
                }
            }
        }
    }

    fn update(&mut self, value: Value, range: &ValueRange) -> ChangeResult {
        let change = self.store.update(value, range);
        if change.changed() {
            let range = self.store.get(value);
            log::debug!(target: "vrp:propagate", "{value} = {range}");
            for &equivalent in range.equivalences() {
                let dependents = &mut self.equivalent_of[equivalent];
                if !dependents.contains(&value) {
                    dependents.push(value);
                }
            }
            self.push_users(value);
        }
        change
    }

    fn visit_inst(&mut self, inst: Inst) {
        let func = self.func;
        let data = func.inst(inst);
        if data.is_phi() {
            return self.visit_phi(inst);
        }
        if data.is_terminator() {
            return self.visit_terminator(inst);
        }
        match extract_ranges(func, inst, &*self.store) {
            Some(ranges) => {
                for (value, range) in ranges {
                    self.update(value, &range);
                }
            }
            None => {
                log::trace!(target: "vrp:propagate", "{inst} cannot be modeled");
                for value in data.defs() {
                    if is_tracked(func, value) {
                        self.update(value, &ValueRange::Varying);
                    }
                }
            }
        }
    }

    fn visit_phi(&mut self, phi: Inst) {
        let func = self.func;
        let InstData::Phi { dest, args } = func.inst(phi) else {
            return;
        };
        let dest = *dest;
        let Some(ty) = func.value_type(dest).as_int() else {
            return;
        };

        let executable_edges = &self.executable_edges;
        let is_executable = |edge: Edge| executable_edges[edge.index()];
        let edge_count = args.iter().filter(|(edge, _)| is_executable(*edge)).count() as u32;
        let mut range = extract_range_from_phi(func, phi, &*self.store, &is_executable);

        // Revisiting with the same set of incoming edges means a value moved around a cycle, so
        // widen whichever bound moved to guarantee termination.
        let current = self.store.get(dest);
        if edge_count == self.phi_edge_counts[phi] {
            if let (Some((old_lo, old_hi)), Some((lo, hi))) = (current.bounds(ty), range.bounds(ty))
            {
                if lo < old_lo || hi > old_hi {
                    let lo = if lo < old_lo { ty.min_value() } else { lo };
                    let hi = if hi > old_hi { ty.max_value() } else { hi };
                    log::trace!(target: "vrp:propagate", "widening {dest} to [{lo}, {hi}]");
                    range = ValueRange::new(lo, hi, ty);
                }
            }
        }
        self.phi_edge_counts[phi] = edge_count;

        let range = adjust_range_with_loop(func, self.loops, self.config, phi, dest, range);
        if self.update(dest, &range).changed() {
            self.phi_visits[phi] += 1;
            if self.phi_visits[phi] > self.config.max_phi_visits() {
                log::debug!(
                    target: "vrp:propagate",
                    "{dest} changed more than {} times, forcing it to VARYING",
                    self.config.max_phi_visits()
                );
                self.update(dest, &ValueRange::Varying);
            }
        }
    }

    fn visit_terminator(&mut self, inst: Inst) {
        let func = self.func;
        match func.inst(inst) {
            InstData::Jump { edge } => self.mark_edge_executable(*edge),
            InstData::CondBranch {
                pred,
                lhs,
                rhs,
                then_edge,
                else_edge,
            } => {
                let taken = cond_branch_taken(
                    func,
                    *pred,
                    lhs,
                    rhs,
                    *then_edge,
                    *else_edge,
                    &*self.store,
                );
                match taken {
                    Taken::Nothing => (),
                    Taken::Edge(edge) => self.mark_edge_executable(edge),
                    Taken::All => {
                        self.mark_edge_executable(*then_edge);
                        self.mark_edge_executable(*else_edge);
                    }
                }
            }
            InstData::Switch {
                selector,
                cases,
                default,
            } => {
                let range = self.store.range_of_operand(func, selector);
                let Some(ty) = operand_int_type(func, selector) else {
                    return;
                };
                let targets = switch_targets(&range, ty, cases);
                log::trace!(
                    target: "vrp:propagate",
                    "switch on {selector} in {range} reaches cases {:?}, default: {}",
                    targets.cases,
                    targets.default_reachable
                );
                for index in targets.cases {
                    self.mark_edge_executable(cases[index].edge);
                }
                if targets.default_reachable {
                    self.mark_edge_executable(*default);
                }
            }
            _ => (),
        }
    }
}
