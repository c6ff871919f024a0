#![no_std]
#![deny(warnings)]

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

mod edits;
mod pass;
mod simplify;
mod statistics;

pub use self::{
    edits::{DeferredEdits, FlushSummary, SwitchUpdate},
    pass::{PassOutcome, ValueRangePropagation, remove_range_assertions},
    simplify::{Simplification, Simplifier},
    statistics::{PassStatistic, Statistics},
};

#[cfg(test)]
mod tests;
