use smallvec::SmallVec;

use crate::{Block, Function, Inst, InstData};

/// A cursor over the ordinary statements and terminator of a block, which permits editing the
/// function while iterating.
///
/// The set of statements visited is fixed when the cursor is created: statements inserted through
/// the cursor are not visited, while statements it replaces are visited in their new form.
pub struct StmtCursor<'f> {
    func: &'f mut Function,
    block: Block,
    insts: SmallVec<[Inst; 16]>,
    next: usize,
    current: Option<Inst>,
}

impl<'f> StmtCursor<'f> {
    pub fn new(func: &'f mut Function, block: Block) -> Self {
        let insts = func.body(block).iter().copied().chain(func.terminator(block)).collect();
        Self {
            func,
            block,
            insts,
            next: 0,
            current: None,
        }
    }

    #[inline]
    pub fn block(&self) -> Block {
        self.block
    }

    #[inline]
    pub fn func(&self) -> &Function {
        self.func
    }

    #[inline]
    pub fn func_mut(&mut self) -> &mut Function {
        self.func
    }

    /// Advance to the next statement, returning it
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Inst> {
        let inst = self.insts.get(self.next).copied();
        if inst.is_some() {
            self.next += 1;
        }
        self.current = inst;
        inst
    }

    #[inline]
    pub fn current(&self) -> Option<Inst> {
        self.current
    }

    /// Insert `data` before the current statement
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not positioned on a statement.
    pub fn insert_before(&mut self, data: InstData) -> Inst {
        let current = self.current.unwrap_or_else(|| panic!("cursor is not positioned on a statement"));
        self.func.insert_inst_before(current, data)
    }

    /// Replace the contents of the current statement with `data`
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not positioned on a statement.
    pub fn replace(&mut self, data: InstData) {
        let current = self.current.unwrap_or_else(|| panic!("cursor is not positioned on a statement"));
        self.func.replace_inst(current, data);
    }
}
