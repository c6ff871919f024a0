#![no_std]
#![deny(warnings)]

extern crate alloc;
#[cfg(test)]
extern crate std;

mod builder;
mod cursor;
mod entities;
mod error;
mod function;
mod inst;
mod loops;
mod print;
mod types;

pub use self::{
    builder::{FunctionBuilder, imm},
    cursor::StmtCursor,
    entities::{Block, Edge, Inst, LoopId, Value},
    error::IrError,
    function::Function,
    inst::{
        BinaryOp, Callee, Expr, InstData, InstPosition, InternalFn, Operand, Predicate, SwitchCase,
        UnaryOp, ValueDef,
    },
    loops::{InductionInfo, LoopInfo, NoLoops, StaticLoopInfo},
    print::DisplayInst,
    types::{Immediate, IntType, Type},
};

pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, rustc_hash::FxBuildHasher>;

#[cfg(test)]
mod tests;
