#![allow(dead_code)]

use std::rc::Rc;

use rtv_registry::{RegistryContext, RepoTokenRegistry};
use rtv_schemas::{Address, AuctionInfo, CollateralRatio, Collaborators, InstrumentTerms, U256};
use rtv_testkit::{addr, SimWorld};
use rtv_valuation::{NativeUnits, Rate};

pub const DAY: u64 = 86_400;
pub const NOW: u64 = 1_700_000_000;

pub fn base() -> Address {
    addr(0xBA)
}

pub fn holder() -> Address {
    addr(0x57)
}

pub fn collateral_token() -> Address {
    addr(0xC0)
}

pub fn rate(s: &str) -> Rate {
    Rate::from_decimal_str(s).unwrap()
}

pub fn u(v: u64) -> U256 {
    U256::from(v)
}

pub fn world() -> Rc<SimWorld> {
    let w = SimWorld::new(NOW);
    w.add_asset(base(), 6);
    w.set_reserve(addr(0xEE), base());
    w
}

pub fn terms(tag: u8, maturity: u64) -> InstrumentTerms {
    let units = NativeUnits::par(6);
    InstrumentTerms {
        maturity,
        purchase_asset: base(),
        servicer: addr(tag ^ 0x80),
        collateral_manager: addr(tag ^ 0x40),
        decimals: units.decimals,
        redemption_value: units.redemption_value,
        redemption_haircut: units.redemption_haircut,
    }
}

/// Recognized 6-decimal instrument at `tag`, collateralized at 150%.
pub fn add_instrument(w: &SimWorld, tag: u8, maturity: u64, discount: &str) -> Address {
    let instrument = addr(tag);
    w.add_instrument(
        instrument,
        terms(tag, maturity),
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

/// Repo registry accepting `collateral_token()` at 120% and above.
pub fn repo_registry() -> RepoTokenRegistry {
    let mut r = RepoTokenRegistry::new();
    r.set_collateral_token_param(collateral_token(), rate("1.2"));
    r
}

pub fn ctx<'a>(ext: &'a Collaborators, w: &SimWorld) -> RegistryContext<'a> {
    RegistryContext {
        ext,
        holder: holder(),
        base_asset: base(),
        base_precision: u(1_000_000),
        now: w.time(),
    }
}
