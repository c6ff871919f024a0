use proptest::prelude::*;
use vrp_ir::{IntType, Value};

use super::*;

const I32: IntType = IntType::I32;
const U8: IntType = IntType::U8;

#[test]
fn normalization() {
    assert_eq!(ValueRange::new(0, 255, U8), ValueRange::Varying);
    assert_eq!(ValueRange::new(5, 4, U8), ValueRange::Undefined);
    assert_eq!(ValueRange::anti(0, 9, U8), ValueRange::new(10, 255, U8));
    assert_eq!(ValueRange::anti(200, 255, U8), ValueRange::new(0, 199, U8));
    assert_eq!(ValueRange::anti(0, 255, U8), ValueRange::Undefined);
    assert!(ValueRange::anti(1, 254, U8).is_anti_range());
    assert_eq!(ValueRange::new(-5, 300, U8), ValueRange::Varying);
}

#[test]
fn join_prefers_the_tighter_representation() {
    let a = ValueRange::new(0, 10, I32);
    let b = ValueRange::new(20, 30, I32);
    assert_eq!(a.join(&b), ValueRange::new(0, 30, I32));

    // A gap straddled by a hull covering almost everything is better expressed as an anti-range
    let lo = ValueRange::new(I32.min_value(), -100, I32);
    let hi = ValueRange::new(100, I32.max_value(), I32);
    assert_eq!(lo.join(&hi), ValueRange::anti(-99, 99, I32));

    assert_eq!(a.join(&ValueRange::Undefined), a);
    assert_eq!(a.join(&ValueRange::Varying), ValueRange::Varying);
}

#[test]
fn meet_of_anti_range_and_range() {
    let anti = ValueRange::anti(0, 0, I32);
    let range = ValueRange::new(0, 10, I32);
    assert_eq!(anti.meet(&range), ValueRange::new(1, 10, I32));
    assert_eq!(range.meet(&ValueRange::new(11, 20, I32)), ValueRange::Undefined);
    assert_eq!(range.meet(&ValueRange::Varying), range);
}

#[test]
fn equivalences_are_intersected_by_join_and_united_by_meet() {
    let (v1, v2, v3) = (Value::from_u32(1), Value::from_u32(2), Value::from_u32(3));
    let mut a = ValueRange::new(0, 10, I32);
    a.add_equivalences(&[v2, v1]);
    let b = ValueRange::new(5, 20, I32).with_equivalence(v2).with_equivalence(v3);

    assert_eq!(a.equivalences(), &[v1, v2]);
    assert_eq!(a.join(&b).equivalences(), &[v2]);
    assert_eq!(a.meet(&b).equivalences(), &[v1, v2, v3]);
}

#[test]
fn bit_knowledge() {
    let range = ValueRange::new(0x10, 0x1f, U8);
    assert_eq!(range.nonzero_bits(U8), (0x10, 0x1f));
    assert_eq!(ValueRange::Varying.nonzero_bits(U8), (0, 0xff));
    let negative = ValueRange::new(-4, -1, IntType::I8);
    assert_eq!(negative.nonzero_bits(IntType::I8), (0xfc, 0xff));
    assert_eq!(ValueRange::from_nonzero_bits(0xfc, 0xff, IntType::I8), negative);
}

#[test]
fn queries() {
    let range = ValueRange::new(3, 4, I32);
    assert_eq!(range.two_valued(I32), Some((3, 4)));
    assert_eq!(ValueRange::new(3, 5, I32).two_valued(I32), None);
    assert_eq!(ValueRange::singleton(7, I32).as_singleton(), Some(7));
    assert!(ValueRange::anti(0, 0, I32).contains(-1, I32));
    assert!(!ValueRange::anti(0, 0, I32).contains(0, I32));
    assert!(ValueRange::new(-2, 2, I32).may_be_zero(I32));
    assert!(ValueRange::new(0, 255, IntType::I32).fits_in(I32, U8));
    assert!(!ValueRange::new(-1, 255, IntType::I32).fits_in(I32, U8));
}

#[test]
fn display() {
    let range = ValueRange::anti(0, 0, I32).with_equivalence(Value::from_u32(4));
    assert_eq!(alloc::format!("{range}"), "i32 ~[0, 0]  EQUIVALENCES: { v4 } (1 elements)");
    assert_eq!(alloc::format!("{}", ValueRange::Varying), "VARYING");
}

fn any_range() -> impl Strategy<Value = ValueRange> {
    let (min, max) = (U8.min_value(), U8.max_value());
    prop_oneof![
        1 => Just(ValueRange::Undefined),
        1 => Just(ValueRange::Varying),
        6 => (min..=max, min..=max).prop_map(|(a, b)| ValueRange::new(a.min(b), a.max(b), U8)),
        3 => (min..=max, min..=max).prop_map(|(a, b)| ValueRange::anti(a.min(b), a.max(b), U8)),
    ]
}

fn set_of(range: &ValueRange) -> std::vec::Vec<i128> {
    (U8.min_value()..=U8.max_value()).filter(|x| range.contains(*x, U8)).collect()
}

proptest! {
    #[test]
    fn join_contains_both_operands(a in any_range(), b in any_range()) {
        let joined = a.join(&b);
        for x in set_of(&a).into_iter().chain(set_of(&b)) {
            prop_assert!(joined.contains(x, U8), "{x} in {a} or {b}, but not in {joined}");
        }
        prop_assert_eq!(joined.join(&a), joined.clone());
        prop_assert_eq!(joined.join(&b), joined);
    }

    #[test]
    fn join_is_idempotent(a in any_range()) {
        prop_assert_eq!(a.join(&a), a);
    }

    #[test]
    fn meet_contains_intersection(a in any_range(), b in any_range()) {
        let met = a.meet(&b);
        for x in set_of(&a) {
            if b.contains(x, U8) {
                prop_assert!(met.contains(x, U8), "{x} in {a} and {b}, but not in {met}");
            }
        }
        for x in set_of(&met) {
            prop_assert!(a.contains(x, U8) || b.contains(x, U8));
        }
    }
}
