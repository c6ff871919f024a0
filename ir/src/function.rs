use alloc::vec::Vec;

use compact_str::CompactString;
use cranelift_entity::{PrimaryMap, SecondaryMap, packed_option::PackedOption};
use smallvec::SmallVec;

use crate::{
    Block, Edge, Inst, InstData, InstPosition, IrError, Operand, Type, Value, ValueDef,
};

#[derive(Debug, Clone)]
struct ValueData {
    ty: Type,
    def: ValueDef,
}

#[derive(Debug, Default, Clone)]
struct BlockData {
    phis: Vec<Inst>,
    body: Vec<Inst>,
    terminator: PackedOption<Inst>,
    preds: SmallVec<[Edge; 4]>,
    succs: SmallVec<[Edge; 4]>,
}

#[derive(Debug, Clone)]
struct EdgeData {
    from: Block,
    to: Block,
    removed: bool,
}

#[derive(Debug, Clone)]
struct InstNode {
    data: InstData,
    position: InstPosition,
}

/// A function in SSA form.
///
/// The function owns all of its entities: values, blocks, statements and control flow edges. All
/// entities are referred to by index, and indices are never reused, so a handle obtained at any
/// point remains a valid key for the lifetime of the function (though a removed edge is never
/// live again).
#[derive(Debug, Clone)]
pub struct Function {
    name: CompactString,
    params: Vec<Value>,
    result: Option<Type>,
    entry: Block,
    values: PrimaryMap<Value, ValueData>,
    blocks: PrimaryMap<Block, BlockData>,
    insts: PrimaryMap<Inst, InstNode>,
    edges: PrimaryMap<Edge, EdgeData>,
}

impl Function {
    /// Create a new function with the given parameter types, and an empty entry block.
    pub fn new(name: impl Into<CompactString>, params: &[Type], result: Option<Type>) -> Self {
        let mut blocks = PrimaryMap::new();
        let entry = blocks.push(BlockData::default());
        let mut values = PrimaryMap::new();
        let params = params
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                values.push(ValueData {
                    ty: *ty,
                    def: ValueDef::Param(index),
                })
            })
            .collect();
        Self {
            name: name.into(),
            params,
            result,
            entry,
            values,
            blocks,
            insts: PrimaryMap::new(),
            edges: PrimaryMap::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn entry_block(&self) -> Block {
        self.entry
    }

    #[inline]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    #[inline]
    pub fn result_type(&self) -> Option<Type> {
        self.result
    }
}

/// Values
impl Function {
    /// The number of SSA names created so far, which bounds the valid [Value] indices
    #[inline]
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = Value> + '_ {
        self.values.keys()
    }

    #[inline]
    pub fn is_valid_value(&self, value: Value) -> bool {
        self.values.is_valid(value)
    }

    #[inline]
    pub fn value_type(&self, value: Value) -> Type {
        self.values[value].ty
    }

    #[inline]
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.values[value].def
    }

    /// Get the statement defining `value`, if it is not a function parameter
    #[inline]
    pub fn defining_inst(&self, value: Value) -> Option<Inst> {
        self.values[value].def.inst()
    }

    pub fn operand_type(&self, operand: &Operand) -> Type {
        match operand {
            Operand::Value(value) => self.value_type(*value),
            Operand::Const(imm) => Type::Int(imm.ty()),
        }
    }

    /// Create a new SSA name, whose definition will be provided by a statement inserted later
    pub fn create_value(&mut self, ty: Type) -> Value {
        self.values.push(ValueData {
            ty,
            def: ValueDef::Detached,
        })
    }
}

/// Blocks
impl Function {
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> impl ExactSizeIterator<Item = Block> + '_ {
        self.blocks.keys()
    }

    #[inline]
    pub fn is_valid_block(&self, block: Block) -> bool {
        self.blocks.is_valid(block)
    }

    pub fn create_block(&mut self) -> Block {
        self.blocks.push(BlockData::default())
    }

    #[inline]
    pub fn phis(&self, block: Block) -> &[Inst] {
        &self.blocks[block].phis
    }

    /// The ordinary statements of `block`, excluding PHIs and the terminator
    #[inline]
    pub fn body(&self, block: Block) -> &[Inst] {
        &self.blocks[block].body
    }

    #[inline]
    pub fn terminator(&self, block: Block) -> Option<Inst> {
        self.blocks[block].terminator.expand()
    }

    /// All statements of `block` in execution order: PHIs, body, then the terminator
    pub fn block_insts(&self, block: Block) -> impl Iterator<Item = Inst> + '_ {
        let data = &self.blocks[block];
        data.phis
            .iter()
            .copied()
            .chain(data.body.iter().copied())
            .chain(data.terminator.expand())
    }

    /// The live incoming edges of `block`
    #[inline]
    pub fn preds(&self, block: Block) -> &[Edge] {
        &self.blocks[block].preds
    }

    /// The live outgoing edges of `block`
    #[inline]
    pub fn succs(&self, block: Block) -> &[Edge] {
        &self.blocks[block].succs
    }
}

/// Edges
impl Function {
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn edge_source(&self, edge: Edge) -> Block {
        self.edges[edge].from
    }

    #[inline]
    pub fn edge_dest(&self, edge: Edge) -> Block {
        self.edges[edge].to
    }

    #[inline]
    pub fn is_edge_removed(&self, edge: Edge) -> bool {
        self.edges[edge].removed
    }

    pub fn edge_between(&self, from: Block, to: Block) -> Option<Edge> {
        self.blocks[from].succs.iter().copied().find(|edge| self.edges[*edge].to == to)
    }

    /// Get the live edge from `from` to `to`, creating it if it does not exist yet
    pub fn ensure_edge(&mut self, from: Block, to: Block) -> Edge {
        if let Some(edge) = self.edge_between(from, to) {
            return edge;
        }
        let edge = self.edges.push(EdgeData {
            from,
            to,
            removed: false,
        });
        self.blocks[from].succs.push(edge);
        self.blocks[to].preds.push(edge);
        edge
    }

    /// Remove `edge` from the control flow graph.
    ///
    /// The PHI arguments associated with the edge are removed from the destination block. The
    /// terminator of the source block must already have been rewritten so as to no longer refer
    /// to `edge`.
    pub fn remove_edge(&mut self, edge: Edge) {
        let EdgeData { from, to, removed } = self.edges[edge];
        assert!(!removed, "{edge} has already been removed");
        debug_assert!(
            self.terminator(from)
                .is_none_or(|term| !self.insts[term].data.successor_edges().contains(&edge)),
            "cannot remove {edge}: it is still referenced by the terminator of {from}"
        );

        log::trace!(target: "vrp:ir", "removing {edge} ({from} -> {to})");
        self.edges[edge].removed = true;
        self.blocks[from].succs.retain(|e| *e != edge);
        self.blocks[to].preds.retain(|e| *e != edge);
        for phi in self.blocks[to].phis.clone() {
            if let InstData::Phi { args, .. } = &mut self.insts[phi].data {
                args.retain(|(e, _)| *e != edge);
            }
        }
    }
}

/// Statements
impl Function {
    #[inline]
    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    #[inline]
    pub fn inst(&self, inst: Inst) -> &InstData {
        &self.insts[inst].data
    }

    #[inline]
    pub fn inst_position(&self, inst: Inst) -> InstPosition {
        self.insts[inst].position
    }

    #[inline]
    pub fn inst_block(&self, inst: Inst) -> Block {
        self.insts[inst].position.block()
    }

    /// Append `data` to `block`.
    ///
    /// PHIs are appended to the PHI list, terminators become the terminator of the block, and
    /// everything else is appended to the body.
    pub fn append_inst(&mut self, block: Block, data: InstData) -> Result<Inst, IrError> {
        if !self.blocks.is_valid(block) {
            return Err(IrError::InvalidBlock(block));
        }
        if self.blocks[block].terminator.is_some() && !data.is_phi() {
            return Err(IrError::AlreadyTerminated(block));
        }
        for value in data.uses() {
            if !self.values.is_valid(value) {
                return Err(IrError::InvalidValue(value));
            }
        }

        let position = if data.is_phi() {
            InstPosition::Phi(block)
        } else if data.is_terminator() {
            InstPosition::Terminator(block)
        } else {
            InstPosition::Body(block)
        };
        let inst = self.insts.push(InstNode { data, position });
        match position {
            InstPosition::Phi(_) => self.blocks[block].phis.push(inst),
            InstPosition::Body(_) => self.blocks[block].body.push(inst),
            InstPosition::Terminator(_) => self.blocks[block].terminator = inst.into(),
        }
        self.attach_defs(inst);
        Ok(inst)
    }

    /// Insert `data` immediately before the body statement or terminator `before`
    pub fn insert_inst_before(&mut self, before: Inst, data: InstData) -> Inst {
        let (block, index) = self.body_insertion_point(before);
        self.insert_body_inst(block, index, data)
    }

    /// Insert `data` immediately after the body statement `after`
    pub fn insert_inst_after(&mut self, after: Inst, data: InstData) -> Inst {
        let (block, index) = self.body_insertion_point(after);
        assert!(
            matches!(self.insts[after].position, InstPosition::Body(_)),
            "cannot insert after {after}: it is not an ordinary statement"
        );
        self.insert_body_inst(block, index + 1, data)
    }

    fn body_insertion_point(&self, inst: Inst) -> (Block, usize) {
        match self.insts[inst].position {
            InstPosition::Body(block) => {
                let index = self.blocks[block]
                    .body
                    .iter()
                    .position(|i| *i == inst)
                    .unwrap_or_else(|| panic!("{inst} is not in the body of {block}"));
                (block, index)
            }
            InstPosition::Terminator(block) => (block, self.blocks[block].body.len()),
            InstPosition::Phi(block) => panic!("cannot insert statements among the phis of {block}"),
        }
    }

    fn insert_body_inst(&mut self, block: Block, index: usize, data: InstData) -> Inst {
        assert!(
            !data.is_phi() && !data.is_terminator(),
            "only ordinary statements may be inserted into a block body"
        );
        let inst = self.insts.push(InstNode {
            data,
            position: InstPosition::Body(block),
        });
        self.blocks[block].body.insert(index, inst);
        self.attach_defs(inst);
        inst
    }

    /// Replace the contents of `inst` with `data`, keeping its position.
    ///
    /// The kind of statement must be preserved, i.e. a terminator can only be replaced with another
    /// terminator. Values defined by the old statement but not by `data` become detached, and must
    /// be defined by some other statement before the function is used again.
    pub fn replace_inst(&mut self, inst: Inst, data: InstData) {
        let node = &self.insts[inst];
        assert_eq!(
            node.data.is_terminator(),
            data.is_terminator(),
            "replacement of {inst} must preserve whether it is a terminator"
        );
        assert_eq!(node.data.is_phi(), data.is_phi(), "replacement of {inst} must preserve phi-ness");

        let old = core::mem::replace(&mut self.insts[inst].data, data);
        for value in old.defs() {
            if self.values[value].def.inst() == Some(inst) {
                self.values[value].def = ValueDef::Detached;
            }
        }
        self.attach_defs(inst);
    }

    /// Replace the terminator of `block` with `data`, returning the previous terminator.
    ///
    /// Edges referenced by `data` must already exist. Edges which are no longer referenced are
    /// left in place, and must be removed with [Function::remove_edge].
    pub fn set_terminator(&mut self, block: Block, data: InstData) -> Option<Inst> {
        assert!(data.is_terminator(), "{block} cannot be terminated by a non-terminator");
        match self.terminator(block) {
            Some(term) => {
                self.replace_inst(term, data);
                Some(term)
            }
            None => {
                let inst = self.insts.push(InstNode {
                    data,
                    position: InstPosition::Terminator(block),
                });
                self.blocks[block].terminator = inst.into();
                None
            }
        }
    }

    /// Add an incoming value for `edge` to the PHI `phi`
    pub fn add_phi_arg(&mut self, phi: Inst, edge: Edge, operand: Operand) -> Result<(), IrError> {
        if let Some(value) = operand.as_value() {
            if !self.values.is_valid(value) {
                return Err(IrError::InvalidValue(value));
            }
        }
        match &mut self.insts[phi].data {
            InstData::Phi { args, .. } => {
                match args.iter_mut().find(|(e, _)| *e == edge) {
                    Some((_, existing)) => *existing = operand,
                    None => args.push((edge, operand)),
                }
                Ok(())
            }
            _ => Err(IrError::NotAPhi(phi)),
        }
    }

    fn attach_defs(&mut self, inst: Inst) {
        for (index, value) in self.insts[inst].data.defs().into_iter().enumerate() {
            self.values[value].def = ValueDef::Result(inst, index);
        }
    }

    /// Compute, for each value, the set of statements which read it
    pub fn compute_uses(&self) -> SecondaryMap<Value, SmallVec<[Inst; 4]>> {
        let mut uses = SecondaryMap::<Value, SmallVec<[Inst; 4]>>::with_capacity(self.num_values());
        for block in self.blocks.keys() {
            for inst in self.block_insts(block) {
                for value in self.insts[inst].data.uses() {
                    let users = &mut uses[value];
                    if !users.contains(&inst) {
                        users.push(inst);
                    }
                }
            }
        }
        uses
    }
}

/// Verification
impl Function {
    /// Check the structural invariants of the function
    pub fn verify(&self) -> Result<(), IrError> {
        for (block, data) in self.blocks.iter() {
            let Some(term) = data.terminator.expand() else {
                return Err(IrError::Unterminated(block));
            };

            let successors = self.insts[term].data.successor_edges();
            for edge in data.succs.iter() {
                if !successors.contains(edge) {
                    return Err(IrError::DanglingEdge { edge: *edge, block });
                }
            }

            for inst in self.block_insts(block) {
                for value in self.insts[inst].data.uses() {
                    if !self.values.is_valid(value) {
                        return Err(IrError::InvalidValue(value));
                    }
                }
            }

            if let InstData::Switch { cases, .. } = &self.insts[term].data {
                for (index, case) in cases.iter().enumerate() {
                    let overlaps = cases[..index]
                        .iter()
                        .any(|prev| prev.lo <= case.hi && case.lo <= prev.hi);
                    if case.lo > case.hi || overlaps {
                        return Err(IrError::InvalidSwitchCase {
                            lo: case.lo,
                            hi: case.hi,
                        });
                    }
                }
            }

            for phi in data.phis.iter() {
                let InstData::Phi { dest, args } = &self.insts[*phi].data else {
                    return Err(IrError::NotAPhi(*phi));
                };
                for (edge, _) in args.iter() {
                    if !data.preds.contains(edge) {
                        return Err(IrError::StrayPhiArgument {
                            phi: *dest,
                            edge: *edge,
                            block,
                        });
                    }
                }
                for edge in data.preds.iter() {
                    if !args.iter().any(|(e, _)| e == edge) {
                        return Err(IrError::MissingPhiArgument {
                            phi: *dest,
                            edge: *edge,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
