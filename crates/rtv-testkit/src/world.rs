//! In-memory world behind every collaborator seam.
//!
//! Mutating calls that revert leave the world exactly as it was; the state is
//! cloned before a multi-step mutation and restored on failure.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use rtv_schemas::{
    derive_offer_id, Address, AuctionHouse, AuctionInfo, B256, Clock, CollateralManager,
    CollateralRatio, Collaborators, DiscountRateOracle, EligibilityOracle, ExternalError,
    ExternalResult, InstrumentTerms, OfferId, OfferLocker, OfferSubmission, RepoServicer, Service,
    Timestamp, TokenLedger, YieldReserve, U256,
};
use rtv_valuation::{normalized_amount, precision, Rate};

/// Funds escrowed by an offer locker for one offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedOffer {
    pub offeror: Address,
    pub amount: U256,
    pub purchase_asset: Address,
    pub price_hash: B256,
}

#[derive(Debug, Clone, Default)]
struct Reserve {
    address: Address,
    asset: Address,
    total_shares: U256,
    shares: HashMap<Address, U256>,
}

#[derive(Debug, Clone, Default)]
struct WorldState {
    now: Timestamp,
    decimals: HashMap<Address, u8>,
    balances: BTreeMap<(Address, Address), U256>,
    recognized: HashSet<Address>,
    instruments: HashMap<Address, InstrumentTerms>,
    collateral: HashMap<Address, Vec<CollateralRatio>>,
    rates: HashMap<Address, Rate>,
    auctions: HashMap<Address, AuctionInfo>,
    locked: BTreeMap<(Address, OfferId), LockedOffer>,
    servicers: HashMap<Address, Address>,
    reserve: Reserve,
    failing: HashSet<Service>,
    failing_redemptions: HashSet<Address>,
}

fn reverted(service: Service, reason: &str) -> ExternalError {
    ExternalError::reverted(service, reason)
}

impl WorldState {
    fn balance(&self, token: Address, owner: Address) -> U256 {
        self.balances.get(&(token, owner)).copied().unwrap_or_default()
    }

    fn credit(&mut self, token: Address, owner: Address, amount: U256) {
        let slot = self.balances.entry((token, owner)).or_default();
        *slot = slot.saturating_add(amount);
    }

    fn debit(&mut self, token: Address, owner: Address, amount: U256) -> ExternalResult<()> {
        let have = self.balance(token, owner);
        if have < amount {
            return Err(reverted(Service::Tokens, "insufficient balance"));
        }
        self.balances.insert((token, owner), have - amount);
        Ok(())
    }

    fn move_tokens(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> ExternalResult<()> {
        self.debit(token, from, amount)?;
        self.credit(token, to, amount);
        Ok(())
    }

    fn reserve_assets(&self) -> U256 {
        self.balance(self.reserve.asset, self.reserve.address)
    }

    fn shares_to_assets(&self, shares: U256) -> U256 {
        let total = self.reserve.total_shares;
        if total.is_zero() {
            return U256::ZERO;
        }
        shares.saturating_mul(self.reserve_assets()) / total
    }

    fn lock_one(&mut self, locker: Address, sub: &OfferSubmission) -> ExternalResult<OfferId> {
        if sub.amount.is_zero() {
            return Err(reverted(Service::OfferLocker, "zero amount"));
        }
        if let Some(existing) = self.locked.get(&(locker, sub.id)).copied() {
            if existing.offeror != sub.offeror {
                return Err(reverted(Service::OfferLocker, "not the offeror"));
            }
            if sub.amount > existing.amount {
                self.move_tokens(sub.purchase_asset, sub.offeror, locker, sub.amount - existing.amount)?;
            } else if sub.amount < existing.amount {
                self.move_tokens(sub.purchase_asset, locker, sub.offeror, existing.amount - sub.amount)?;
            }
            self.locked.insert(
                (locker, sub.id),
                LockedOffer {
                    amount: sub.amount,
                    price_hash: sub.price_hash,
                    ..existing
                },
            );
            return Ok(sub.id);
        }

        let id = derive_offer_id(sub.id, sub.offeror, locker);
        if self.locked.contains_key(&(locker, id)) {
            return Err(reverted(Service::OfferLocker, "offer id already locked"));
        }
        self.move_tokens(sub.purchase_asset, sub.offeror, locker, sub.amount)?;
        self.locked.insert(
            (locker, id),
            LockedOffer {
                offeror: sub.offeror,
                amount: sub.amount,
                purchase_asset: sub.purchase_asset,
                price_hash: sub.price_hash,
            },
        );
        Ok(id)
    }

    fn unlock_one(&mut self, locker: Address, offer_id: OfferId) -> ExternalResult<()> {
        let Some(offer) = self.locked.remove(&(locker, offer_id)) else {
            return Err(reverted(Service::OfferLocker, "unknown offer"));
        };
        self.move_tokens(offer.purchase_asset, locker, offer.offeror, offer.amount)
    }
}

/// Shared in-memory world. Wrap in `Rc` and hand out [`SimWorld::collaborators`].
#[derive(Debug, Default)]
pub struct SimWorld {
    state: RefCell<WorldState>,
}

impl SimWorld {
    pub fn new(now: Timestamp) -> Rc<Self> {
        let world = SimWorld::default();
        world.state.borrow_mut().now = now;
        Rc::new(world)
    }

    pub fn collaborators(self: &Rc<Self>) -> Collaborators {
        Collaborators::from_single(self.clone())
    }

    fn guard(&self, service: Service) -> ExternalResult<()> {
        if self.state.borrow().failing.contains(&service) {
            return Err(reverted(service, "injected failure"));
        }
        Ok(())
    }

    /// Run `f` against the state, rolling back every change if it fails.
    fn atomically<T>(&self, f: impl FnOnce(&mut WorldState) -> ExternalResult<T>) -> ExternalResult<T> {
        let mut st = self.state.borrow_mut();
        let backup = st.clone();
        let out = f(&mut *st);
        if out.is_err() {
            *st = backup;
        }
        out
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    pub fn add_asset(&self, token: Address, decimals: u8) {
        self.state.borrow_mut().decimals.insert(token, decimals);
    }

    pub fn mint(&self, token: Address, owner: Address, amount: U256) {
        self.state.borrow_mut().credit(token, owner, amount);
    }

    pub fn burn(&self, token: Address, owner: Address, amount: U256) -> ExternalResult<()> {
        self.state.borrow_mut().debit(token, owner, amount)
    }

    /// Register an instrument as recognized, with its collateral table and a
    /// current discount rate.
    pub fn add_instrument(
        &self,
        instrument: Address,
        terms: InstrumentTerms,
        collateral: Vec<CollateralRatio>,
        rate: Rate,
    ) {
        let mut st = self.state.borrow_mut();
        st.recognized.insert(instrument);
        st.decimals.insert(instrument, terms.decimals);
        st.collateral.insert(terms.collateral_manager, collateral);
        st.servicers.insert(terms.servicer, instrument);
        st.instruments.insert(instrument, terms);
        st.rates.insert(instrument, rate);
    }

    pub fn set_recognized(&self, address: Address, recognized: bool) {
        let mut st = self.state.borrow_mut();
        if recognized {
            st.recognized.insert(address);
        } else {
            st.recognized.remove(&address);
        }
    }

    pub fn set_collateral(&self, manager: Address, ratios: Vec<CollateralRatio>) {
        self.state.borrow_mut().collateral.insert(manager, ratios);
    }

    pub fn set_rate(&self, instrument: Address, rate: Rate) {
        self.state.borrow_mut().rates.insert(instrument, rate);
    }

    pub fn clear_rate(&self, instrument: Address) {
        self.state.borrow_mut().rates.remove(&instrument);
    }

    pub fn add_auction(&self, auction: AuctionInfo) {
        let mut st = self.state.borrow_mut();
        st.recognized.insert(auction.auction);
        st.auctions.insert(auction.auction, auction);
    }

    pub fn set_reserve(&self, address: Address, asset: Address) {
        let mut st = self.state.borrow_mut();
        st.reserve.address = address;
        st.reserve.asset = asset;
    }

    /// Grow the reserve's assets without minting shares.
    pub fn accrue_reserve_yield(&self, amount: U256) {
        let mut st = self.state.borrow_mut();
        let (asset, address) = (st.reserve.asset, st.reserve.address);
        st.credit(asset, address, amount);
    }

    // -----------------------------------------------------------------------
    // Knobs
    // -----------------------------------------------------------------------

    pub fn set_now(&self, now: Timestamp) {
        self.state.borrow_mut().now = now;
    }

    pub fn advance(&self, secs: u64) {
        let mut st = self.state.borrow_mut();
        st.now = st.now.saturating_add(secs);
    }

    /// Every call to `service` reverts until [`SimWorld::recover`].
    pub fn fail(&self, service: Service) {
        self.state.borrow_mut().failing.insert(service);
    }

    pub fn recover(&self, service: Service) {
        self.state.borrow_mut().failing.remove(&service);
    }

    pub fn fail_redemption(&self, instrument: Address, failing: bool) {
        let mut st = self.state.borrow_mut();
        if failing {
            st.failing_redemptions.insert(instrument);
        } else {
            st.failing_redemptions.remove(&instrument);
        }
    }

    // -----------------------------------------------------------------------
    // Auction lifecycle
    // -----------------------------------------------------------------------

    /// Complete `auction`: every locked offer is consumed into the auction and
    /// `fills` instrument units are minted to their owners.
    pub fn complete_auction(&self, auction: Address, fills: &[(Address, U256)]) -> ExternalResult<()> {
        self.atomically(|st| {
            let Some(info) = st.auctions.get(&auction).copied() else {
                return Err(ExternalError::Unknown {
                    service: Service::Auctions,
                    address: auction,
                });
            };
            let consumed: Vec<(Address, OfferId)> = st
                .locked
                .keys()
                .filter(|(locker, _)| *locker == info.offer_locker)
                .copied()
                .collect();
            for key in consumed {
                if let Some(offer) = st.locked.remove(&key) {
                    st.move_tokens(offer.purchase_asset, info.offer_locker, auction, offer.amount)?;
                }
            }
            for (owner, units) in fills {
                st.credit(info.instrument, *owner, *units);
            }
            if let Some(a) = st.auctions.get_mut(&auction) {
                a.completed = true;
            }
            Ok(())
        })
    }

    pub fn cancel_for_withdrawal(&self, auction: Address) {
        if let Some(a) = self.state.borrow_mut().auctions.get_mut(&auction) {
            a.cancelled_for_withdrawal = true;
        }
    }

    pub fn set_auction_window(&self, auction: Address, start_time: Timestamp, end_time: Timestamp) {
        if let Some(a) = self.state.borrow_mut().auctions.get_mut(&auction) {
            a.start_time = start_time;
            a.end_time = end_time;
        }
    }

    /// Release a lock from the auction side, returning funds to the offeror.
    pub fn drop_lock(&self, locker: Address, offer_id: OfferId) -> ExternalResult<()> {
        self.atomically(|st| st.unlock_one(locker, offer_id))
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn time(&self) -> Timestamp {
        self.state.borrow().now
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.state.borrow().balance(token, owner)
    }

    pub fn locked(&self, locker: Address, offer_id: OfferId) -> Option<LockedOffer> {
        self.state.borrow().locked.get(&(locker, offer_id)).copied()
    }

    pub fn reserve_shares(&self, owner: Address) -> U256 {
        self.state
            .borrow()
            .reserve
            .shares
            .get(&owner)
            .copied()
            .unwrap_or_default()
    }

    pub fn reserve_address(&self) -> Address {
        self.state.borrow().reserve.address
    }
}

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

impl EligibilityOracle for SimWorld {
    fn is_recognized(&self, address: Address) -> ExternalResult<bool> {
        self.guard(Service::Eligibility)?;
        Ok(self.state.borrow().recognized.contains(&address))
    }

    fn instrument_terms(&self, instrument: Address) -> ExternalResult<InstrumentTerms> {
        self.guard(Service::Eligibility)?;
        self.state
            .borrow()
            .instruments
            .get(&instrument)
            .copied()
            .ok_or(ExternalError::Unknown {
                service: Service::Eligibility,
                address: instrument,
            })
    }
}

impl CollateralManager for SimWorld {
    fn collateral_ratios(&self, manager: Address) -> ExternalResult<Vec<CollateralRatio>> {
        self.guard(Service::Collateral)?;
        self.state
            .borrow()
            .collateral
            .get(&manager)
            .cloned()
            .ok_or(ExternalError::Unknown {
                service: Service::Collateral,
                address: manager,
            })
    }
}

impl DiscountRateOracle for SimWorld {
    fn discount_rate(&self, instrument: Address) -> ExternalResult<Rate> {
        self.guard(Service::Rates)?;
        self.state
            .borrow()
            .rates
            .get(&instrument)
            .copied()
            .ok_or(ExternalError::NoValidRate(instrument))
    }
}

impl AuctionHouse for SimWorld {
    fn auction(&self, auction: Address) -> ExternalResult<AuctionInfo> {
        self.guard(Service::Auctions)?;
        self.state
            .borrow()
            .auctions
            .get(&auction)
            .copied()
            .ok_or(ExternalError::Unknown {
                service: Service::Auctions,
                address: auction,
            })
    }
}

impl OfferLocker for SimWorld {
    fn locked_amount(&self, locker: Address, offer_id: OfferId) -> ExternalResult<U256> {
        self.guard(Service::OfferLocker)?;
        Ok(self
            .state
            .borrow()
            .locked
            .get(&(locker, offer_id))
            .map(|o| o.amount)
            .unwrap_or_default())
    }

    fn lock(&self, locker: Address, offers: &[OfferSubmission]) -> ExternalResult<Vec<OfferId>> {
        self.guard(Service::OfferLocker)?;
        self.atomically(|st| {
            let Some(auction) = st.auctions.values().find(|a| a.offer_locker == locker).copied()
            else {
                return Err(ExternalError::Unknown {
                    service: Service::OfferLocker,
                    address: locker,
                });
            };
            if auction.completed || !auction.is_open(st.now) {
                return Err(reverted(Service::OfferLocker, "auction not open"));
            }
            offers.iter().map(|sub| st.lock_one(locker, sub)).collect()
        })
    }

    fn unlock(&self, locker: Address, offer_ids: &[OfferId]) -> ExternalResult<()> {
        self.guard(Service::OfferLocker)?;
        self.atomically(|st| {
            for id in offer_ids {
                st.unlock_one(locker, *id)?;
            }
            Ok(())
        })
    }
}

impl RepoServicer for SimWorld {
    fn redeem(&self, servicer: Address, redeemer: Address, amount: U256) -> ExternalResult<()> {
        self.guard(Service::Servicer)?;
        self.atomically(|st| {
            let Some(instrument) = st.servicers.get(&servicer).copied() else {
                return Err(ExternalError::Unknown {
                    service: Service::Servicer,
                    address: servicer,
                });
            };
            if st.failing_redemptions.contains(&instrument) {
                return Err(reverted(Service::Servicer, "redemption reverted"));
            }
            let Some(terms) = st.instruments.get(&instrument).copied() else {
                return Err(ExternalError::Unknown {
                    service: Service::Servicer,
                    address: instrument,
                });
            };
            if !terms.is_matured(st.now) {
                return Err(reverted(Service::Servicer, "not matured"));
            }
            let Some(asset_decimals) = st.decimals.get(&terms.purchase_asset).copied() else {
                return Err(reverted(Service::Servicer, "purchase asset not registered"));
            };

            let base_precision =
                precision(asset_decimals).map_err(|e| reverted(Service::Servicer, &e.to_string()))?;
            let face = normalized_amount(&terms.units(), amount, base_precision)
                .map_err(|e| reverted(Service::Servicer, &e.to_string()))?;

            st.debit(instrument, redeemer, amount)?;
            st.credit(terms.purchase_asset, redeemer, face);
            Ok(())
        })
    }
}

impl TokenLedger for SimWorld {
    fn balance_of(&self, token: Address, owner: Address) -> ExternalResult<U256> {
        self.guard(Service::Tokens)?;
        Ok(self.state.borrow().balance(token, owner))
    }

    fn transfer(&self, token: Address, from: Address, to: Address, amount: U256) -> ExternalResult<()> {
        self.guard(Service::Tokens)?;
        self.atomically(|st| st.move_tokens(token, from, to, amount))
    }
}

impl YieldReserve for SimWorld {
    fn deposit(&self, owner: Address, assets: U256) -> ExternalResult<()> {
        self.guard(Service::Reserve)?;
        self.atomically(|st| {
            let total_assets = st.reserve_assets();
            let total_shares = st.reserve.total_shares;
            let shares = if total_shares.is_zero() || total_assets.is_zero() {
                assets
            } else {
                assets.saturating_mul(total_shares) / total_assets
            };
            let held = st.reserve.shares.get(&owner).copied().unwrap_or_default();
            let (Some(held), Some(total)) = (held.checked_add(shares), total_shares.checked_add(shares))
            else {
                return Err(reverted(Service::Reserve, "share overflow"));
            };
            let (asset, address) = (st.reserve.asset, st.reserve.address);
            st.move_tokens(asset, owner, address, assets)?;
            st.reserve.shares.insert(owner, held);
            st.reserve.total_shares = total;
            Ok(())
        })
    }

    fn shares_for(&self, assets: U256) -> ExternalResult<U256> {
        self.guard(Service::Reserve)?;
        let st = self.state.borrow();
        let total_assets = st.reserve_assets();
        let total_shares = st.reserve.total_shares;
        if total_shares.is_zero() || total_assets.is_zero() {
            return Ok(assets);
        }
        Ok(assets.saturating_mul(total_shares).div_ceil(total_assets))
    }

    fn withdraw_shares(&self, owner: Address, shares: U256) -> ExternalResult<U256> {
        self.guard(Service::Reserve)?;
        self.atomically(|st| {
            let held = st.reserve.shares.get(&owner).copied().unwrap_or_default();
            if held < shares {
                return Err(reverted(Service::Reserve, "insufficient shares"));
            }
            let Some(total) = st.reserve.total_shares.checked_sub(shares) else {
                return Err(reverted(Service::Reserve, "share underflow"));
            };
            let assets = st.shares_to_assets(shares);
            let (asset, address) = (st.reserve.asset, st.reserve.address);
            st.move_tokens(asset, address, owner, assets)?;
            st.reserve.shares.insert(owner, held - shares);
            st.reserve.total_shares = total;
            Ok(assets)
        })
    }

    fn balance_in_base_asset(&self, owner: Address) -> ExternalResult<U256> {
        self.guard(Service::Reserve)?;
        let st = self.state.borrow();
        let shares = st.reserve.shares.get(&owner).copied().unwrap_or_default();
        Ok(st.shares_to_assets(shares))
    }
}

impl Clock for SimWorld {
    fn now(&self) -> Timestamp {
        self.state.borrow().now
    }
}
