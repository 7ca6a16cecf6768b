mod common;

use common::*;
use rtv_risk::*;
use rtv_schemas::U256;
use rtv_testkit::id_hash;

fn submit(s: &mut Strategy, amount: U256) -> Result<(), StrategyError> {
    let instrument = rtv_testkit::addr(0x11);
    let auction = rtv_testkit::addr(0xA1);
    s.submit_or_edit_offer(mgmt(), auction, instrument, id_hash(1), id_hash(0xF1), amount)
        .map(|_| ())
}

fn setup(params: RiskParameters) -> (std::rc::Rc<rtv_testkit::SimWorld>, Strategy) {
    let w = world();
    let mut s = strategy(&w, params);
    fund(&w, &mut s, usdc(1_000));
    let instrument = add_instrument(&w, 0x11, NOW + 30 * DAY, "0.05");
    add_auction(&w, 0xA1, 0xA2, instrument);
    (w, s)
}

#[test]
fn concentration_above_limit_is_rejected_without_side_effects() {
    let (w, mut s) = setup(params());

    let err = submit(&mut s, usdc(600)).unwrap_err();
    match err {
        StrategyError::ConcentrationTooHigh { ratio, limit, .. } => {
            assert_eq!(ratio, rate("0.6"));
            assert_eq!(limit, rate("0.5"));
        }
        other => panic!("expected ConcentrationTooHigh, got {other:?}"),
    }
    assert!(s.pending_offers().is_empty());
    assert_eq!(s.total_liquid_balance().unwrap(), usdc(1_000));
    assert_eq!(w.balance(base(), holder()), U256::ZERO);

    // At the limit exactly is fine.
    submit(&mut s, usdc(500)).unwrap();
}

#[test]
fn reserve_ratio_floor_is_enforced() {
    let mut p = params();
    p.concentration_limit = rate("1");
    let (_w, mut s) = setup(p);

    let err = submit(&mut s, usdc(950)).unwrap_err();
    assert_eq!(
        err,
        StrategyError::LiquidityBelowReserve {
            ratio: rate("0.05"),
            required: rate("0.1"),
        }
    );

    submit(&mut s, usdc(900)).unwrap();
    assert_eq!(s.liquid_reserve_ratio().unwrap(), rate("0.1"));
}

#[test]
fn weighted_maturity_above_threshold_is_rejected() {
    let mut p = params();
    p.concentration_limit = rate("1");
    p.time_to_maturity_threshold = 10 * DAY;
    let (_w, mut s) = setup(p);

    // 500 at 30 days against 500 liquid: 15 days.
    assert_eq!(
        submit(&mut s, usdc(500)).unwrap_err(),
        StrategyError::MaturityThresholdExceeded {
            weighted: 15 * DAY,
            threshold: 10 * DAY,
        }
    );

    // 250 against 750: 7.5 days.
    submit(&mut s, usdc(250)).unwrap();
}

#[test]
fn raising_the_threshold_unblocks_the_same_offer() {
    let mut p = params();
    p.concentration_limit = rate("1");
    p.time_to_maturity_threshold = 10 * DAY;
    let (_w, mut s) = setup(p);

    assert!(submit(&mut s, usdc(500)).is_err());
    s.set_time_to_maturity_threshold(mgmt(), 20 * DAY).unwrap();
    submit(&mut s, usdc(500)).unwrap();
    assert_eq!(s.pending_offers().len(), 1);
}

#[test]
fn at_the_limit_only_reductions_pass() {
    let (_w, mut s) = setup(params());
    submit(&mut s, usdc(500)).unwrap();

    // A second offer on the same instrument raises its share past 50%.
    let more = s.submit_or_edit_offer(
        mgmt(),
        rtv_testkit::addr(0xA1),
        rtv_testkit::addr(0x11),
        id_hash(2),
        id_hash(0xF1),
        usdc(1),
    );
    assert!(matches!(more, Err(StrategyError::ConcentrationTooHigh { .. })));

    submit(&mut s, usdc(400)).unwrap();
    assert_eq!(s.pending_offers().len(), 1);
    assert_eq!(s.total_liquid_balance().unwrap(), usdc(600));
}
