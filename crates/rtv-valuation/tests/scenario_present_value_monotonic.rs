//! Present value never decreases as maturity approaches, and pins to face at
//! (and after) maturity.

use alloy_primitives::U256;
use proptest::prelude::*;
use rtv_valuation::{normalized_amount, precision, present_value, NativeUnits, Rate};

const DAY: u64 = 86_400;

#[test]
fn thirty_day_note_at_five_percent_discounts_to_expected_value() {
    // 1.0 unit of a 6-decimal instrument, base precision 1e6.
    let face = normalized_amount(&NativeUnits::par(6), U256::from(1_000_000u64), U256::from(1_000_000u64))
        .unwrap();
    assert_eq!(face, U256::from(1_000_000u64));

    let now = 1_700_000_000;
    let rate = Rate::from_decimal_str("0.05").unwrap();
    let pv = present_value(face, precision(6).unwrap(), now + 30 * DAY, rate, now).unwrap();

    // 1_000_000 / (1 + 0.05 * 30/365) with the year fraction truncated at 1e6.
    let expected = U256::from(995_907u64);
    let diff = if pv > expected { pv - expected } else { expected - pv };
    assert!(diff <= U256::from(1u64), "pv={pv}");
}

#[test]
fn one_second_before_maturity_is_just_under_face() {
    let rate = Rate::from_decimal_str("0.05").unwrap();
    let face = U256::from(1_000_000u64);
    let pv = present_value(face, U256::from(1_000_000u64), 1_001, rate, 1_000).unwrap();
    assert!(pv <= face);
    assert_eq!(present_value(face, U256::from(1_000_000u64), 1_001, rate, 1_001).unwrap(), face);
}

proptest! {
    #[test]
    fn pv_is_non_decreasing_as_time_to_maturity_shrinks(
        face in 1u64..=1_000_000_000_000u64,
        rate_bps in 0u64..=5_000u64,
        maturity in 1u64..=(5 * 365 * DAY),
        a in 0u64..=(6 * 365 * DAY),
        b in 0u64..=(6 * 365 * DAY),
    ) {
        let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
        let rate = Rate::from_bps(rate_bps);
        let face = U256::from(face);
        let bp = U256::from(1_000_000u64);

        let pv_earlier = present_value(face, bp, maturity, rate, earlier).unwrap();
        let pv_later = present_value(face, bp, maturity, rate, later).unwrap();

        prop_assert!(pv_earlier <= pv_later);
        prop_assert!(pv_later <= face);
        if later >= maturity {
            prop_assert_eq!(pv_later, face);
        }
    }
}
