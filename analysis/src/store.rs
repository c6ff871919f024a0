use core::fmt;

use cranelift_entity::{PrimaryMap, SecondaryMap, entity_impl, packed_option::PackedOption};
use vrp_ir::{Function, Inst, Value};

use crate::{ChangeResult, GlobalRanges, LatticeLike, RangeQuery, ValueRange, query::is_tracked};

/// A slot in the range arena of a [RangeStore]
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeId(u32);
entity_impl!(RangeId, "range");

static UNDEFINED: ValueRange = ValueRange::Undefined;

/// The ranges of one propagation session.
///
/// Ranges live in an arena owned by the store, which is released all at once when the store is
/// torn down. Each SSA name is given a slot in the arena on the first write to it; until then its
/// range is UNDEFINED.
///
/// The store is sized to the number of SSA names in the function when the session starts. Values
/// created afterwards have no range in this session, and referring to them is a usage error.
pub struct RangeStore {
    arena: PrimaryMap<RangeId, ValueRange>,
    slots: SecondaryMap<Value, PackedOption<RangeId>>,
    num_values: usize,
    propagation_complete: bool,
}

impl RangeStore {
    pub fn new(num_values: usize) -> Self {
        Self {
            arena: PrimaryMap::with_capacity(num_values),
            slots: SecondaryMap::with_capacity(num_values),
            num_values,
            propagation_complete: false,
        }
    }

    /// Create a store for every SSA name currently defined in `func`
    #[inline]
    pub fn for_function(func: &Function) -> Self {
        Self::new(func.num_values())
    }

    #[inline]
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Returns true if `value` was defined when this session started
    #[inline]
    pub fn is_valid(&self, value: Value) -> bool {
        value.as_u32() < self.num_values as u32
    }

    #[track_caller]
    fn check(&self, value: Value) {
        assert!(
            self.is_valid(value),
            "{value} is not tracked by this range store (it only covers {} values)",
            self.num_values
        );
    }

    /// Get the current range of `value`
    pub fn get(&self, value: Value) -> &ValueRange {
        self.check(value);
        match self.slots[value].expand() {
            Some(id) => &self.arena[id],
            None => &UNDEFINED,
        }
    }

    /// Get the arena slot of `value`, allocating one if it has none yet
    pub fn allocate(&mut self, value: Value) -> RangeId {
        self.check(value);
        match self.slots[value].expand() {
            Some(id) => id,
            None => {
                let id = self.arena.push(ValueRange::Undefined);
                self.slots[value] = id.into();
                id
            }
        }
    }

    /// Replace the range of `value`
    pub fn set(&mut self, value: Value, range: ValueRange) {
        let id = self.allocate(value);
        log::trace!(target: "vrp:store", "setting range of {value} to {range}");
        self.arena[id] = range;
    }

    /// Merge `candidate` into the current range of `value`, returning whether that changed it.
    ///
    /// The merge is the lattice join, so ranges only grow through updates.
    pub fn update(&mut self, value: Value, candidate: &ValueRange) -> ChangeResult {
        let id = self.allocate(value);
        let current = &self.arena[id];
        let joined = current.join(candidate);
        debug_assert_eq!(joined.join(current), joined, "expected `join` to be monotonic");
        debug_assert_eq!(joined.join(candidate), joined, "expected `join` to be monotonic");

        let change = ChangeResult::of(current, &joined);
        if change.changed() {
            log::trace!(target: "vrp:store", "range of {value}: {current} -> {joined}");
            self.arena[id] = joined;
        }
        change
    }

    /// Set the range of every SSA name tracked by this store to VARYING
    pub fn reset_all_to_top(&mut self) {
        log::debug!(target: "vrp:store", "resetting all {} ranges to VARYING", self.num_values);
        for index in 0..self.num_values {
            let id = self.allocate(Value::from_u32(index as u32));
            self.arena[id] = ValueRange::Varying;
        }
    }

    /// Set the range of every integer SSA name defined by `inst` to VARYING
    pub fn set_defs_to_varying(&mut self, func: &Function, inst: Inst) -> ChangeResult {
        let mut change = ChangeResult::Unchanged;
        for value in func.inst(inst).defs() {
            if is_tracked(func, value) && self.is_valid(value) {
                change |= self.update(value, &ValueRange::Varying);
            }
        }
        change
    }

    /// Signal that propagation has reached its fixed point, and the ranges are final
    pub fn set_lattice_propagation_complete(&mut self) {
        self.propagation_complete = true;
    }

    #[inline]
    pub fn is_lattice_propagation_complete(&self) -> bool {
        self.propagation_complete
    }

    /// Iterate over the values which have been given a range in this session
    pub fn iter(&self) -> impl Iterator<Item = (Value, &ValueRange)> + '_ {
        self.slots
            .iter()
            .filter_map(|(value, slot)| slot.expand().map(|id| (value, &self.arena[id])))
    }

    /// Write the range of every value with a slot to `out`, one per line
    pub fn dump_all_value_ranges(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "Value ranges after VRP:")?;
        for (value, range) in self.iter() {
            writeln!(out, "{value}: {range}")?;
        }
        Ok(())
    }

    /// Attach the final ranges of this session to the values they describe.
    ///
    /// # Panics
    ///
    /// Panics if propagation has not completed, as intermediate ranges are not sound.
    pub fn promote_to_global(&self, globals: &mut GlobalRanges) {
        assert!(
            self.propagation_complete,
            "cannot promote ranges to global before propagation has completed"
        );
        for (value, range) in self.iter() {
            if range.as_interval().is_some() {
                globals.refine(value, range);
            }
        }
    }

    /// End the session, releasing every range it allocated.
    ///
    /// Returns the number of arena slots that were released.
    pub fn teardown(self) -> usize {
        let Self { arena, slots, .. } = self;
        debug_assert!(
            slots.values().filter_map(|slot| slot.expand()).all(|id| arena.is_valid(id)),
            "range store index refers to a slot outside of its arena"
        );
        let released = arena.len();
        log::trace!(target: "vrp:store", "released {released} range slots");
        released
    }
}

impl RangeQuery for RangeStore {
    /// Values created after the session started are VARYING
    fn range_of(&self, value: Value) -> ValueRange {
        if self.is_valid(value) {
            self.get(value).clone()
        } else {
            ValueRange::Varying
        }
    }
}

impl fmt::Debug for RangeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
