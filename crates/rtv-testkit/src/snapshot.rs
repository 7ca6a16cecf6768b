//! JSON world snapshots for offline simulation.
//!
//! Amounts are decimal strings (`"1000000"`), rates are decimal fractions
//! (`"0.05"`), addresses are 0x-hex.

use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result};
use rtv_schemas::{
    Address, AuctionInfo, CollateralRatio, InstrumentTerms, Timestamp, YieldReserve, U256,
};
use rtv_valuation::Rate;
use serde::{Deserialize, Serialize};

use crate::SimWorld;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldSnapshot {
    pub now: Timestamp,
    #[serde(default)]
    pub assets: Vec<AssetSpec>,
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,
    #[serde(default)]
    pub instruments: Vec<InstrumentSpec>,
    #[serde(default)]
    pub auctions: Vec<AuctionInfo>,
    #[serde(default)]
    pub reserve: Option<ReserveSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSpec {
    pub address: Address,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSpec {
    pub token: Address,
    pub owner: Address,
    #[serde(with = "dec")]
    pub amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralSpec {
    pub token: Address,
    #[serde(with = "rate_str")]
    pub maintenance_ratio: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub address: Address,
    pub maturity: Timestamp,
    pub purchase_asset: Address,
    pub servicer: Address,
    pub collateral_manager: Address,
    pub decimals: u8,
    #[serde(default = "par", with = "rate_str")]
    pub redemption_value: Rate,
    #[serde(default, with = "rate_str")]
    pub redemption_haircut: Rate,
    #[serde(with = "rate_str")]
    pub discount_rate: Rate,
    #[serde(default)]
    pub collateral: Vec<CollateralSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositSpec {
    pub owner: Address,
    #[serde(with = "dec")]
    pub amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSpec {
    pub address: Address,
    pub asset: Address,
    /// Minted to the owner, then deposited.
    #[serde(default)]
    pub deposits: Vec<DepositSpec>,
}

fn par() -> Rate {
    Rate::ONE
}

impl WorldSnapshot {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("invalid world snapshot json")
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read world snapshot: {path}"))?;
        Self::from_json_str(&raw).with_context(|| format!("in {path}"))
    }

    pub fn build(&self) -> Result<Rc<SimWorld>> {
        let world = SimWorld::new(self.now);

        for a in &self.assets {
            world.add_asset(a.address, a.decimals);
        }
        for i in &self.instruments {
            let terms = InstrumentTerms {
                maturity: i.maturity,
                purchase_asset: i.purchase_asset,
                servicer: i.servicer,
                collateral_manager: i.collateral_manager,
                decimals: i.decimals,
                redemption_value: i.redemption_value,
                redemption_haircut: i.redemption_haircut,
            };
            let collateral = i
                .collateral
                .iter()
                .map(|c| CollateralRatio {
                    token: c.token,
                    maintenance_ratio: c.maintenance_ratio,
                })
                .collect();
            world.add_instrument(i.address, terms, collateral, i.discount_rate);
        }
        for a in &self.auctions {
            world.add_auction(*a);
        }
        for b in &self.balances {
            world.mint(b.token, b.owner, b.amount);
        }
        if let Some(r) = &self.reserve {
            world.set_reserve(r.address, r.asset);
            for d in &r.deposits {
                world.mint(r.asset, d.owner, d.amount);
                world
                    .deposit(d.owner, d.amount)
                    .with_context(|| format!("reserve deposit for {}", d.owner))?;
            }
        }
        Ok(world)
    }
}

mod dec {
    use rtv_schemas::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(d)?;
        U256::from_str_radix(raw.trim(), 10).map_err(D::Error::custom)
    }
}

mod rate_str {
    use rtv_valuation::Rate;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Rate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Rate, D::Error> {
        let raw = String::deserialize(d)?;
        Rate::from_decimal_str(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "now": 1000,
        "assets": [{ "address": "0xbabababababababababababababababababababa", "decimals": 6 }],
        "balances": [{
            "token": "0xbabababababababababababababababababababa",
            "owner": "0x0101010101010101010101010101010101010101",
            "amount": "5000000"
        }],
        "instruments": [{
            "address": "0x1111111111111111111111111111111111111111",
            "maturity": 2592000,
            "purchase_asset": "0xbabababababababababababababababababababa",
            "servicer": "0x5555555555555555555555555555555555555555",
            "collateral_manager": "0xcccccccccccccccccccccccccccccccccccccccc",
            "decimals": 6,
            "discount_rate": "0.05",
            "collateral": [{ "token": "0xdddddddddddddddddddddddddddddddddddddddd", "maintenance_ratio": "1.5" }]
        }],
        "reserve": {
            "address": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
            "asset": "0xbabababababababababababababababababababa",
            "deposits": [{ "owner": "0x0101010101010101010101010101010101010101", "amount": "250" }]
        }
    }"#;

    #[test]
    fn loads_and_builds_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(SNAPSHOT.as_bytes()).unwrap();
        let path = f.path().to_str().unwrap().to_string();

        let snap = WorldSnapshot::load(&path).unwrap();
        assert_eq!(snap.instruments[0].redemption_value, Rate::ONE);
        assert_eq!(
            snap.instruments[0].discount_rate,
            Rate::from_decimal_str("0.05").unwrap()
        );

        let world = snap.build().unwrap();
        let base = Address::repeat_byte(0xBA);
        let me = Address::repeat_byte(0x01);
        assert_eq!(world.balance(base, me), U256::from(5_000_000u64));
        assert_eq!(world.balance_in_base_asset(me).unwrap(), U256::from(250u64));
        assert_eq!(world.time(), 1000);
    }

    #[test]
    fn rejects_non_decimal_amounts() {
        let bad = SNAPSHOT.replace("\"5000000\"", "\"5e6\"");
        assert!(WorldSnapshot::from_json_str(&bad).is_err());
    }
}
