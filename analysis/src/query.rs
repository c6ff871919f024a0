use cranelift_entity::SecondaryMap;
use vrp_ir::{Function, IntType, Operand, Type, Value};

use crate::{LatticeLike, ValueRange};

/// A source of ranges for SSA names.
///
/// The extractor, the conditional evaluator and the statement simplifier are all written against
/// this trait, so that they can operate either on the ranges of a propagation session in progress,
/// or on the ranges attached to values once some earlier session completed.
pub trait RangeQuery {
    /// Get the range of `value`
    fn range_of(&self, value: Value) -> ValueRange;

    /// Get the range of `operand`, which is exact for constants, and VARYING for non-integers
    fn range_of_operand(&self, func: &Function, operand: &Operand) -> ValueRange {
        match operand {
            Operand::Const(imm) => ValueRange::constant(*imm),
            Operand::Value(value) if func.value_type(*value).is_int() => self.range_of(*value),
            Operand::Value(_) => ValueRange::Varying,
        }
    }
}

impl<Q: RangeQuery + ?Sized> RangeQuery for &Q {
    #[inline]
    fn range_of(&self, value: Value) -> ValueRange {
        (**self).range_of(value)
    }
}

/// The integer type of `operand`, if it has one
pub(crate) fn operand_int_type(func: &Function, operand: &Operand) -> Option<IntType> {
    func.operand_type(operand).as_int()
}

/// Ranges attached to SSA names outside of any propagation session.
///
/// Unlike a session, where a name without a range has not been reached yet, a name without a
/// global range may hold any value, so the default is VARYING. Global ranges carry no
/// equivalences, as those are only meaningful while the session that derived them is active.
#[derive(Debug, Clone)]
pub struct GlobalRanges {
    ranges: SecondaryMap<Value, ValueRange>,
}

impl Default for GlobalRanges {
    fn default() -> Self {
        Self {
            ranges: SecondaryMap::with_default(ValueRange::Varying),
        }
    }
}

impl GlobalRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refine the global range of `value` with `range`.
    ///
    /// Both the existing and the new range are known to hold, so the result is their
    /// intersection.
    pub fn refine(&mut self, value: Value, range: &ValueRange) {
        let refined = self.ranges[value].meet(&range.clone().without_equivalences());
        log::trace!(target: "vrp:store", "global range of {value} is now {refined}");
        self.ranges[value] = refined;
    }
}

impl RangeQuery for GlobalRanges {
    #[inline]
    fn range_of(&self, value: Value) -> ValueRange {
        self.ranges[value].clone()
    }
}

/// Whether `value` is an integer whose ranges are tracked
#[inline]
pub(crate) fn is_tracked(func: &Function, value: Value) -> bool {
    matches!(func.value_type(value), Type::Int(_))
}
