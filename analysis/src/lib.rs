#![no_std]
#![deny(warnings)]

extern crate alloc;
#[cfg(test)]
extern crate std;

mod change_result;
mod config;
mod error;
pub mod evaluate;
pub mod extract;
mod lattice;
mod loop_adjust;
mod propagate;
mod query;
mod range;
mod store;

pub use self::{
    change_result::ChangeResult,
    config::VrpConfig,
    error::VrpError,
    evaluate::{
        SwitchTargets, Taken, Truth, compare_names, cond_branch_taken, evaluate, evaluate_operands,
        switch_targets,
    },
    extract::{
        DefRanges, extract_range_basic, extract_range_for_var_from_comparison_expr,
        extract_range_from_assert, extract_range_from_expr, extract_range_from_phi,
        extract_ranges,
    },
    lattice::LatticeLike,
    loop_adjust::adjust_range_with_loop,
    propagate::{PropagationResult, propagate},
    query::{GlobalRanges, RangeQuery},
    range::{Interval, Pieces, ValueRange, arith},
    store::{RangeId, RangeStore},
};
