use vrp_ir::{Function, Inst, LoopInfo, Value};

use crate::{LatticeLike, ValueRange, VrpConfig};

/// Tighten the range of the PHI `phi`, defining `dest`, using what the loop collaborator knows
/// about `dest` as an induction variable of the loop headed by the block of `phi`.
///
/// The bound reported by the collaborator is only an upper bound on the number of iterations,
/// so only the end of the range the induction variable moves towards is clamped. When exactness
/// is both reported and trusted by `config`, both ends are clamped.
///
/// The range is returned unchanged if nothing is known, or if the bound contradicts it.
pub fn adjust_range_with_loop(
    func: &Function,
    loops: &dyn LoopInfo,
    config: &VrpConfig,
    phi: Inst,
    dest: Value,
    range: ValueRange,
) -> ValueRange {
    if !config.use_loop_bounds() || range.is_undefined() {
        return range;
    }
    let Some(ty) = func.value_type(dest).as_int() else {
        return range;
    };
    let header = func.inst_block(phi);
    let Some(info) = loops
        .loop_of_header(header)
        .and_then(|loop_id| loops.induction(loop_id, dest))
    else {
        return range;
    };

    let (min, max) = (ty.min_value(), ty.max_value());
    let limit = match info.value_bounds() {
        Some((lo, hi)) if info.exact && config.trust_exact_trip_counts() => {
            ValueRange::new(lo, hi, ty)
        }
        Some((_, hi)) if info.step >= 0 => ValueRange::new(min, hi, ty),
        Some((lo, _)) => ValueRange::new(lo, max, ty),
        // Without a trip count, a signed induction variable still cannot wrap past its start
        None if ty.is_signed() && info.step > 0 => ValueRange::new(info.init, max, ty),
        None if ty.is_signed() && info.step < 0 => ValueRange::new(min, info.init, ty),
        None => return range,
    };

    let adjusted = range.meet(&limit);
    if adjusted.is_undefined() {
        log::warn!(
            target: "vrp:loops",
            "bound {limit} of induction variable {dest} in {header} contradicts its range {range}"
        );
        return range;
    }
    if adjusted != range {
        log::debug!(target: "vrp:loops", "adjusted range of {dest} in {header}: {range} -> {adjusted}");
    }
    adjusted
}
