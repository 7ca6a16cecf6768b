#![allow(dead_code)]

use std::rc::Rc;

use rtv_risk::{RiskParameters, Strategy, StrategyIdentity};
use rtv_schemas::{Address, AuctionInfo, CollateralRatio, Collaborators, InstrumentTerms, U256};
use rtv_testkit::{addr, SimWorld};
use rtv_valuation::{NativeUnits, Rate};

pub const DAY: u64 = 86_400;
pub const NOW: u64 = 1_700_000_000;

/// 1 unit of the 6-decimal base asset.
pub const USDC: u64 = 1_000_000;

pub fn base() -> Address {
    addr(0xBA)
}

pub fn holder() -> Address {
    addr(0x57)
}

pub fn mgmt() -> Address {
    addr(0x4D)
}

pub fn outsider() -> Address {
    addr(0x99)
}

pub fn collateral_token() -> Address {
    addr(0xC0)
}

pub fn rate(s: &str) -> Rate {
    Rate::from_decimal_str(s).unwrap()
}

pub fn usdc(v: u64) -> U256 {
    U256::from(v) * U256::from(USDC)
}

pub fn world() -> Rc<SimWorld> {
    let w = SimWorld::new(NOW);
    w.add_asset(base(), 6);
    w.set_reserve(addr(0xEE), base());
    w
}

pub fn params() -> RiskParameters {
    RiskParameters {
        time_to_maturity_threshold: 365 * DAY,
        required_reserve_ratio: rate("0.1"),
        concentration_limit: rate("0.5"),
        discount_rate_markup: Rate::ZERO,
    }
}

pub fn strategy(w: &Rc<SimWorld>, params: RiskParameters) -> Strategy {
    strategy_with(w.collaborators(), params)
}

pub fn strategy_with(ext: Collaborators, params: RiskParameters) -> Strategy {
    let id = StrategyIdentity {
        address: holder(),
        management: mgmt(),
        base_asset: base(),
        base_precision: U256::from(USDC),
    };
    let mut s = Strategy::new(id, params, ext);
    s.set_collateral_token_param(mgmt(), collateral_token(), rate("1.2"))
        .unwrap();
    s
}

/// Credit `amount` base to the strategy and park it in the reserve.
pub fn fund(w: &SimWorld, s: &mut Strategy, amount: U256) {
    w.mint(base(), holder(), amount);
    s.sweep_and_rebalance(mgmt(), U256::ZERO).unwrap();
}

/// Recognized 6-decimal par instrument at `tag`, collateralized at 150%.
pub fn add_instrument(w: &SimWorld, tag: u8, maturity: u64, discount: &str) -> Address {
    let units = NativeUnits::par(6);
    let terms = InstrumentTerms {
        maturity,
        purchase_asset: base(),
        servicer: addr(tag ^ 0x80),
        collateral_manager: addr(tag ^ 0x40),
        decimals: units.decimals,
        redemption_value: units.redemption_value,
        redemption_haircut: units.redemption_haircut,
    };
    let instrument = addr(tag);
    w.add_instrument(
        instrument,
        terms,
        vec![CollateralRatio {
            token: collateral_token(),
            maintenance_ratio: rate("1.5"),
        }],
        rate(discount),
    );
    instrument
}

pub fn add_auction(w: &SimWorld, auction: u8, locker: u8, instrument: Address) -> AuctionInfo {
    let info = AuctionInfo {
        auction: addr(auction),
        instrument,
        offer_locker: addr(locker),
        start_time: NOW - DAY,
        end_time: NOW + DAY,
        completed: false,
        cancelled_for_withdrawal: false,
    };
    w.add_auction(info);
    info
}
