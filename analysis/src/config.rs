/// Configuration for the value range propagation solver, and the simplifications driven by it.
#[derive(Debug, Clone)]
pub struct VrpConfig {
    /// Whether the solver should consult the loop collaborator to bound loop-carried values
    use_loop_bounds: bool,
    /// Whether trip counts reported as exact may be used to bound both ends of an induction range
    trust_exact_trip_counts: bool,
    /// The number of times the range of a PHI may change before it is forced to VARYING
    max_phi_visits: u32,
    /// The number of worklist items the solver may process before giving up
    max_steps: usize,
    simplify_switches: bool,
    simplify_conversions: bool,
    simplify_internal_calls: bool,
    /// Whether to dump all ranges to the debug log once propagation completes
    dump_ranges: bool,
}

impl Default for VrpConfig {
    fn default() -> Self {
        Self {
            use_loop_bounds: true,
            trust_exact_trip_counts: false,
            max_phi_visits: 32,
            max_steps: 1_000_000,
            simplify_switches: true,
            simplify_conversions: true,
            simplify_internal_calls: true,
            dump_ranges: false,
        }
    }
}

impl VrpConfig {
    /// Get a new, default configuration
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub const fn use_loop_bounds(&self) -> bool {
        self.use_loop_bounds
    }

    #[inline(always)]
    pub const fn trust_exact_trip_counts(&self) -> bool {
        self.trust_exact_trip_counts
    }

    #[inline(always)]
    pub const fn max_phi_visits(&self) -> u32 {
        self.max_phi_visits
    }

    #[inline(always)]
    pub const fn max_steps(&self) -> usize {
        self.max_steps
    }

    #[inline(always)]
    pub const fn simplify_switches(&self) -> bool {
        self.simplify_switches
    }

    #[inline(always)]
    pub const fn simplify_conversions(&self) -> bool {
        self.simplify_conversions
    }

    #[inline(always)]
    pub const fn simplify_internal_calls(&self) -> bool {
        self.simplify_internal_calls
    }

    #[inline(always)]
    pub const fn dump_ranges(&self) -> bool {
        self.dump_ranges
    }

    /// Set whether the ranges of loop induction variables are bounded using the trip counts
    /// reported by the loop collaborator.
    ///
    /// Without loop bounds, the range of an induction variable whose PHI keeps changing is widened
    /// to the extreme of its type.
    pub fn set_use_loop_bounds(&mut self, yes: bool) -> &mut Self {
        self.use_loop_bounds = yes;
        self
    }

    /// Set whether a trip count which the loop collaborator reports as exact may be relied upon.
    ///
    /// When unset, every trip count is treated as an upper bound hint, and only the end of the
    /// induction range in the direction of the step is tightened.
    pub fn set_trust_exact_trip_counts(&mut self, yes: bool) -> &mut Self {
        self.trust_exact_trip_counts = yes;
        self
    }

    pub fn set_max_phi_visits(&mut self, limit: u32) -> &mut Self {
        self.max_phi_visits = limit;
        self
    }

    pub fn set_max_steps(&mut self, limit: usize) -> &mut Self {
        self.max_steps = limit;
        self
    }

    pub fn set_simplify_switches(&mut self, yes: bool) -> &mut Self {
        self.simplify_switches = yes;
        self
    }

    pub fn set_simplify_conversions(&mut self, yes: bool) -> &mut Self {
        self.simplify_conversions = yes;
        self
    }

    pub fn set_simplify_internal_calls(&mut self, yes: bool) -> &mut Self {
        self.simplify_internal_calls = yes;
        self
    }

    pub fn set_dump_ranges(&mut self, yes: bool) -> &mut Self {
        self.dump_ranges = yes;
        self
    }
}
