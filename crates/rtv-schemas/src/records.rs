use alloy_primitives::{keccak256, Address, B256, U256};
use rtv_valuation::{NativeUnits, Rate};
use serde::{Deserialize, Serialize};

use crate::{OfferId, Timestamp};

/// Instrument metadata as published by the eligibility oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentTerms {
    pub maturity: Timestamp,
    /// Asset paid at redemption; must equal the strategy's base asset.
    pub purchase_asset: Address,
    pub servicer: Address,
    pub collateral_manager: Address,
    pub decimals: u8,
    pub redemption_value: Rate,
    #[serde(default)]
    pub redemption_haircut: Rate,
}

impl InstrumentTerms {
    pub fn units(&self) -> NativeUnits {
        NativeUnits {
            decimals: self.decimals,
            redemption_value: self.redemption_value,
            redemption_haircut: self.redemption_haircut,
        }
    }

    pub fn is_matured(&self, now: Timestamp) -> bool {
        now >= self.maturity
    }
}

/// Live maintenance ratio a collateral manager enforces for one collateral token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRatio {
    pub token: Address,
    pub maintenance_ratio: Rate,
}

/// Auction state as reported by the auction house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionInfo {
    pub auction: Address,
    /// Instrument the auction clears into.
    pub instrument: Address,
    pub offer_locker: Address,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub completed: bool,
    pub cancelled_for_withdrawal: bool,
}

impl AuctionInfo {
    /// Offer-locker acceptance window.
    ///
    /// Mirrors the locker's observable check `now > start || now < end`, which
    /// accepts every timestamp when `start < end`.
    pub fn is_open(&self, now: Timestamp) -> bool {
        now > self.start_time || now < self.end_time
    }
}

/// One offer handed to an offer locker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSubmission {
    /// Existing offer id when editing, caller id hash when creating.
    pub id: OfferId,
    pub offeror: Address,
    pub price_hash: B256,
    pub amount: U256,
    pub purchase_asset: Address,
}

/// `keccak256(id ‖ requester ‖ locker)`.
///
/// Two requesters reusing the same raw id against the same locker still get
/// distinct offer ids.
pub fn derive_offer_id(id: B256, requester: Address, locker: Address) -> OfferId {
    let mut buf = [0u8; 72];
    buf[..32].copy_from_slice(id.as_slice());
    buf[32..52].copy_from_slice(requester.as_slice());
    buf[52..].copy_from_slice(locker.as_slice());
    keccak256(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn offer_id_depends_on_every_input() {
        let id = B256::repeat_byte(7);
        let base = derive_offer_id(id, addr(1), addr(2));
        assert_eq!(base, derive_offer_id(id, addr(1), addr(2)));
        assert_ne!(base, derive_offer_id(id, addr(3), addr(2)));
        assert_ne!(base, derive_offer_id(id, addr(1), addr(3)));
        assert_ne!(base, derive_offer_id(B256::repeat_byte(8), addr(1), addr(2)));
        assert_ne!(base, B256::ZERO);
    }

    #[test]
    fn open_window_uses_either_bound() {
        let a = AuctionInfo {
            auction: addr(1),
            instrument: addr(2),
            offer_locker: addr(3),
            start_time: 100,
            end_time: 200,
            completed: false,
            cancelled_for_withdrawal: false,
        };
        assert!(a.is_open(50));
        assert!(a.is_open(150));
        assert!(a.is_open(250));

        // Only an inverted window can close it.
        let inverted = AuctionInfo {
            start_time: 200,
            end_time: 100,
            ..a
        };
        assert!(!inverted.is_open(150));
        assert!(inverted.is_open(201));
    }
}
