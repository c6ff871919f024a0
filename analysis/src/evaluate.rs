use smallvec::SmallVec;
use vrp_ir::{Edge, Function, IntType, Operand, Predicate, SwitchCase, Value};

use crate::{RangeQuery, ValueRange, query::operand_int_type};

/// The outcome of evaluating a comparison over ranges
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Truth {
    AlwaysTrue,
    AlwaysFalse,
    Unknown,
}

impl Truth {
    #[inline]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::AlwaysTrue } else { Self::AlwaysFalse }
    }

    #[inline]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Classify `pred` over a single pair of pieces
fn classify(pred: Predicate, (alo, ahi): (i128, i128), (blo, bhi): (i128, i128)) -> Option<bool> {
    match pred {
        Predicate::Eq if alo == ahi && blo == bhi && alo == blo => Some(true),
        Predicate::Eq if ahi < blo || bhi < alo => Some(false),
        Predicate::Eq => None,
        Predicate::Ne => classify(Predicate::Eq, (alo, ahi), (blo, bhi)).map(|eq| !eq),
        Predicate::Lt if ahi < blo => Some(true),
        Predicate::Lt if alo >= bhi => Some(false),
        Predicate::Le if ahi <= blo => Some(true),
        Predicate::Le if alo > bhi => Some(false),
        Predicate::Lt | Predicate::Le => None,
        Predicate::Gt | Predicate::Ge => classify(pred.swap(), (blo, bhi), (alo, ahi)),
    }
}

/// Decide whether `a pred b` holds for every pair of values drawn from `a` and `b`, for none of
/// them, or only for some.
///
/// Undefined operands produce [Truth::Unknown]: the comparison has not been reached yet.
pub fn evaluate(pred: Predicate, a: &ValueRange, b: &ValueRange, ty: IntType) -> Truth {
    if a.is_undefined() || b.is_undefined() {
        return Truth::Unknown;
    }

    // Compare single points directly when one side has exactly two possible values
    if let (Some((x, y)), Some(c)) = (a.two_valued(ty), b.as_singleton()) {
        let (first, second) = (pred.eval(x, c), pred.eval(y, c));
        return if first == second { Truth::from_bool(first) } else { Truth::Unknown };
    }
    if let (Some(c), Some((x, y))) = (a.as_singleton(), b.two_valued(ty)) {
        let (first, second) = (pred.eval(c, x), pred.eval(c, y));
        return if first == second { Truth::from_bool(first) } else { Truth::Unknown };
    }

    let (mut all_true, mut all_false) = (true, true);
    for pa in a.pieces(ty) {
        for pb in b.pieces(ty) {
            match classify(pred, pa, pb) {
                Some(true) => all_false = false,
                Some(false) => all_true = false,
                None => return Truth::Unknown,
            }
        }
    }
    match (all_true, all_false) {
        (true, _) => Truth::AlwaysTrue,
        (_, true) => Truth::AlwaysFalse,
        _ => Truth::Unknown,
    }
}

/// Evaluate `x pred y` for two SSA names, using their equivalence sets as well as their ranges.
///
/// Names known to be equal compare as equal regardless of their ranges. Otherwise, since every
/// member of an equivalence set holds the same value, the ranges of any pair of members may be
/// compared in place of `x` and `y`.
pub fn compare_names(
    pred: Predicate,
    x: Value,
    y: Value,
    ty: IntType,
    query: &dyn RangeQuery,
) -> Truth {
    let (rx, ry) = (query.range_of(x), query.range_of(y));
    let mut xs = SmallVec::<[Value; 4]>::from_slice(rx.equivalences());
    xs.push(x);
    let mut ys = SmallVec::<[Value; 4]>::from_slice(ry.equivalences());
    ys.push(y);

    if xs.iter().any(|name| ys.contains(name)) {
        log::trace!(target: "vrp:evaluate", "{x} and {y} are equivalent");
        return Truth::from_bool(pred.eval(0, 0));
    }

    let truth = evaluate(pred, &rx, &ry, ty);
    if truth.is_known() || rx.is_undefined() || ry.is_undefined() {
        return truth;
    }
    for &n1 in xs.iter() {
        for &n2 in ys.iter() {
            if (n1, n2) == (x, y) {
                continue;
            }
            let truth = evaluate(pred, &query.range_of(n1), &query.range_of(n2), ty);
            if truth.is_known() {
                log::trace!(
                    target: "vrp:evaluate",
                    "{x} {pred} {y} decided through {n1} {pred} {n2}: {truth:?}"
                );
                return truth;
            }
        }
    }
    Truth::Unknown
}

/// Evaluate `lhs pred rhs` for a comparison appearing in `func`
pub fn evaluate_operands(
    func: &Function,
    pred: Predicate,
    lhs: &Operand,
    rhs: &Operand,
    query: &dyn RangeQuery,
) -> Truth {
    let Some(ty) = operand_int_type(func, lhs) else {
        return Truth::Unknown;
    };
    if let (Operand::Value(x), Operand::Value(y)) = (lhs, rhs) {
        return compare_names(pred, *x, *y, ty, query);
    }
    let a = query.range_of_operand(func, lhs);
    let b = query.range_of_operand(func, rhs);
    evaluate(pred, &a, &b, ty)
}

/// The successors of a conditional branch which may be taken
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Taken {
    /// The condition has not been reached yet, or has no defined value
    Nothing,
    Edge(Edge),
    All,
}

/// Determine which successors of the conditional branch `lhs pred rhs` may be taken
pub fn cond_branch_taken(
    func: &Function,
    pred: Predicate,
    lhs: &Operand,
    rhs: &Operand,
    then_edge: Edge,
    else_edge: Edge,
    query: &dyn RangeQuery,
) -> Taken {
    if query.range_of_operand(func, lhs).is_undefined()
        || query.range_of_operand(func, rhs).is_undefined()
    {
        return Taken::Nothing;
    }
    match evaluate_operands(func, pred, lhs, rhs, query) {
        Truth::AlwaysTrue => Taken::Edge(then_edge),
        Truth::AlwaysFalse => Taken::Edge(else_edge),
        Truth::Unknown if then_edge == else_edge => Taken::Edge(then_edge),
        Truth::Unknown => Taken::All,
    }
}

/// The parts of a switch reachable given the range of its selector
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SwitchTargets {
    /// Indices of the cases the selector may match
    pub cases: SmallVec<[usize; 8]>,
    /// Whether the selector may match none of the cases
    pub default_reachable: bool,
}

impl SwitchTargets {
    /// Returns true if every case, and the default, may be reached
    pub fn all_reachable(&self, num_cases: usize) -> bool {
        self.default_reachable && self.cases.len() == num_cases
    }
}

/// Determine which cases of a switch may be selected by a selector in `selector`
pub fn switch_targets(selector: &ValueRange, ty: IntType, cases: &[SwitchCase]) -> SwitchTargets {
    let mut targets = SwitchTargets::default();
    let pieces = selector.pieces(ty);
    if pieces.is_empty() {
        return targets;
    }

    for (index, case) in cases.iter().enumerate() {
        if pieces.iter().any(|&(lo, hi)| lo <= case.hi && case.lo <= hi) {
            targets.cases.push(index);
        }
    }

    let mut covering = cases.iter().map(|case| (case.lo, case.hi)).collect::<SmallVec<[_; 8]>>();
    covering.sort_unstable();
    targets.default_reachable = pieces.iter().any(|&(lo, hi)| {
        let mut next = lo;
        for &(clo, chi) in covering.iter() {
            if chi < next {
                continue;
            }
            if clo > next {
                return true;
            }
            if chi >= hi {
                return false;
            }
            next = chi + 1;
        }
        true
    });
    targets
}
