mod common;

use common::*;
use rtv_risk::*;
use rtv_schemas::{derive_offer_id, U256};
use rtv_testkit::id_hash;

#[test]
fn submit_then_shrink_then_delete_moves_liquidity_back_to_reserve() {
    let w = world();
    let mut s = strategy(&w, params());
    fund(&w, &mut s, usdc(1_000));
    let instrument = add_instrument(&w, 0x11, NOW + 30 * DAY, "0.05");
    let auction = add_auction(&w, 0xA1, 0xA2, instrument);

    let id = s
        .submit_or_edit_offer(mgmt(), auction.auction, instrument, id_hash(1), id_hash(0xF1), usdc(100))
        .unwrap();
    assert_eq!(id, derive_offer_id(id_hash(1), holder(), auction.offer_locker));
    assert_eq!(w.locked(auction.offer_locker, id).unwrap().amount, usdc(100));
    assert_eq!(s.pending_offers(), vec![id]);
    assert_eq!(s.total_liquid_balance().unwrap(), usdc(900));
    // Cash became an offer at par.
    assert_eq!(s.total_asset_value().unwrap(), usdc(1_000));
    assert_eq!(s.instrument_holding_value(instrument).unwrap(), usdc(100));

    // Same id_hash edits the existing offer down; the refund is re-deposited.
    let edited = s
        .submit_or_edit_offer(mgmt(), auction.auction, instrument, id_hash(1), id_hash(0xF2), usdc(40))
        .unwrap();
    assert_eq!(edited, id);
    assert_eq!(w.locked(auction.offer_locker, id).unwrap().amount, usdc(40));
    assert_eq!(s.pending().get(&id).unwrap().amount, usdc(40));
    assert_eq!(w.balance(base(), holder()), U256::ZERO);
    assert_eq!(s.total_liquid_balance().unwrap(), usdc(960));

    let report = s.delete_offers(mgmt(), auction.auction, &[id]).unwrap();
    assert_eq!(report.completed.cancelled, vec![id]);
    assert!(s.pending_offers().is_empty());
    assert!(w.locked(auction.offer_locker, id).is_none());
    assert_eq!(s.total_liquid_balance().unwrap(), usdc(1_000));
    assert_eq!(w.balance(base(), holder()), U256::ZERO);
}

#[test]
fn growing_an_offer_only_debits_the_difference() {
    let w = world();
    let mut s = strategy(&w, params());
    fund(&w, &mut s, usdc(1_000));
    let instrument = add_instrument(&w, 0x11, NOW + 30 * DAY, "0.05");
    let auction = add_auction(&w, 0xA1, 0xA2, instrument);

    s.submit_or_edit_offer(mgmt(), auction.auction, instrument, id_hash(1), id_hash(0xF1), usdc(100))
        .unwrap();
    s.submit_or_edit_offer(mgmt(), auction.auction, instrument, id_hash(1), id_hash(0xF1), usdc(250))
        .unwrap();

    assert_eq!(s.pending_offers().len(), 1);
    assert_eq!(s.total_liquid_balance().unwrap(), usdc(750));
    assert_eq!(s.total_asset_value().unwrap(), usdc(1_000));
}

#[test]
fn settled_auction_is_absorbed_into_holdings_at_the_same_value() {
    let w = world();
    let mut s = strategy(&w, params());
    fund(&w, &mut s, usdc(1_000));
    let instrument = add_instrument(&w, 0x11, NOW + 30 * DAY, "0.05");
    let auction = add_auction(&w, 0xA1, 0xA2, instrument);

    let id = s
        .submit_or_edit_offer(mgmt(), auction.auction, instrument, id_hash(1), id_hash(0xF1), usdc(100))
        .unwrap();
    w.complete_auction(auction.auction, &[(holder(), usdc(100))]).unwrap();

    let pv = s
        .calculate_instrument_present_value(instrument, rate("0.05"), usdc(100))
        .unwrap();
    let before = s.total_asset_value().unwrap();
    assert_eq!(before, usdc(900) + pv);

    let report = s.auction_closed(outsider()).unwrap();
    assert_eq!(report.completed.settled, vec![id]);
    assert_eq!(report.completed.absorbed, vec![instrument]);
    assert_eq!(s.holdings(), vec![instrument]);
    assert!(s.pending_offers().is_empty());
    assert_eq!(s.total_asset_value().unwrap(), before);
}

#[test]
fn offer_validation_rejects_bad_auctions() {
    let w = world();
    let mut s = strategy(&w, params());
    fund(&w, &mut s, usdc(1_000));
    let instrument = add_instrument(&w, 0x11, NOW + 30 * DAY, "0.05");
    let other = add_instrument(&w, 0x12, NOW + 60 * DAY, "0.05");
    let auction = add_auction(&w, 0xA1, 0xA2, instrument);

    let submit = |s: &mut Strategy, auction, instrument, amount| {
        s.submit_or_edit_offer(mgmt(), auction, instrument, id_hash(1), id_hash(0xF1), amount)
    };

    assert_eq!(
        submit(&mut s, auction.auction, instrument, U256::ZERO).unwrap_err(),
        StrategyError::ZeroAmount
    );
    assert_eq!(
        submit(&mut s, rtv_testkit::addr(0xAF), instrument, usdc(1)).unwrap_err(),
        StrategyError::InvalidAuction(rtv_testkit::addr(0xAF))
    );
    assert_eq!(
        submit(&mut s, auction.auction, other, usdc(1)).unwrap_err(),
        StrategyError::InstrumentMismatch {
            auction: auction.auction,
            expected: instrument,
            actual: other,
        }
    );

    w.complete_auction(auction.auction, &[]).unwrap();
    assert_eq!(
        submit(&mut s, auction.auction, instrument, usdc(1)).unwrap_err(),
        StrategyError::AuctionNotOpen(auction.auction)
    );
    assert!(s.pending_offers().is_empty());
}

#[test]
fn settlement_swept_after_maturity_is_redeemed_in_the_same_pass() {
    let w = world();
    let mut s = strategy(&w, params());
    fund(&w, &mut s, usdc(1_000));
    let instrument = add_instrument(&w, 0x11, NOW + 30 * DAY, "0.05");
    let auction = add_auction(&w, 0xA1, 0xA2, instrument);
    s.submit_or_edit_offer(mgmt(), auction.auction, instrument, id_hash(1), id_hash(2), usdc(100))
        .unwrap();
    w.complete_auction(auction.auction, &[(holder(), usdc(101))]).unwrap();

    w.advance(31 * DAY);
    let report = s.auction_closed(outsider()).unwrap();
    assert_eq!(report.completed.absorbed, vec![instrument]);
    assert_eq!(report.matured.redeemed, vec![instrument]);
    assert!(s.holdings().is_empty());
    assert!(s.pending_offers().is_empty());
    assert_eq!(w.balance(instrument, holder()), U256::ZERO);
    assert_eq!(s.total_asset_value().unwrap(), usdc(1_001));

    assert_eq!(s.auction_closed(outsider()).unwrap(), SweepReport::default());
}
