use crate::domain::holding::Holding;
use crate::domain::ports::{HoldingStoreBox, PaymentGatewayRef, PropertyStoreBox};
use crate::domain::property::{AccountId, Listing, Property, PropertyId};
use crate::error::{LedgerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// The ownership and rent engine: registry, investor sub-ledger and the
/// rent-distribution/withdrawal algorithm behind one entry point.
///
/// The engine owns its storage backends and the authority identity, and
/// borrows the payment gateway. Every mutating operation is all-or-nothing:
/// internal state is persisted only after the external transfer is confirmed
/// successful, or not at all.
pub struct OwnershipEngine {
    properties: PropertyStoreBox,
    holdings: HoldingStoreBox,
    gateway: PaymentGatewayRef,
    verifier: RwLock<AccountId>,
    /// Identity under which the service holds deposited rent until withdrawal.
    custody: AccountId,
    entry_flag: AtomicBool,
}

/// Call-level mutual exclusion over the payment-moving operations.
///
/// Acquired at the top of `buy_shares`, `pay_rent` and `withdraw_rent`; a
/// nested call into any of them while the flag is held fails with
/// `Reentrancy`. Released on drop, so every exit path clears it.
struct EntryGuard<'a>(&'a AtomicBool);

impl<'a> EntryGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .map_err(|_| LedgerError::Reentrancy)?;
        Ok(Self(flag))
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OwnershipEngine {
    /// Creates a new engine. `verifier` is the initial verification
    /// authority; `custody` is the account holding deposited rent at the
    /// gateway until holders withdraw.
    pub fn new(
        properties: PropertyStoreBox,
        holdings: HoldingStoreBox,
        gateway: PaymentGatewayRef,
        verifier: AccountId,
        custody: AccountId,
    ) -> Self {
        Self {
            properties,
            holdings,
            gateway,
            verifier: RwLock::new(verifier),
            custody,
            entry_flag: AtomicBool::new(false),
        }
    }

    /// Registers a property for fractional sale. The listing starts
    /// unverified with its full share inventory available.
    pub async fn list_property(&self, listing: Listing, caller: &AccountId) -> Result<PropertyId> {
        listing.validate()?;
        let id = self.properties.insert(listing, caller.clone()).await?;
        tracing::info!(property = %id, owner = %caller, "property listed");
        Ok(id)
    }

    /// Sets the verification flag of a property. Authority-only; idempotent,
    /// and may toggle back to `false` for revocation.
    pub async fn verify_property(
        &self,
        id: PropertyId,
        verified: bool,
        caller: &AccountId,
    ) -> Result<()> {
        if *self.verifier.read().await != *caller {
            return Err(LedgerError::Unauthorized);
        }
        let mut property = self.properties.get(id).await?.ok_or(LedgerError::NotFound(id))?;
        property.is_verified = verified;
        self.properties.update(property).await?;
        tracing::info!(property = %id, verified, "verification changed");
        Ok(())
    }

    /// Replaces the verification authority. Single point of trust: no grace
    /// period, no multi-sig.
    pub async fn set_verifier(&self, new_verifier: AccountId, caller: &AccountId) -> Result<()> {
        let mut verifier = self.verifier.write().await;
        if *verifier != *caller {
            return Err(LedgerError::Unauthorized);
        }
        if new_verifier.is_null() {
            return Err(LedgerError::InvalidInput("verifier identity is null".into()));
        }
        *verifier = new_verifier;
        Ok(())
    }

    pub async fn verifier(&self) -> AccountId {
        self.verifier.read().await.clone()
    }

    /// Purchases `shares` units of a verified property for the caller,
    /// moving `price_per_share * shares` of the property's payment token
    /// from the caller to the property owner.
    pub async fn buy_shares(&self, id: PropertyId, shares: u64, caller: &AccountId) -> Result<()> {
        let _guard = EntryGuard::acquire(&self.entry_flag)?;

        let mut property = self.properties.get(id).await?.ok_or(LedgerError::NotFound(id))?;
        if !property.is_verified {
            return Err(LedgerError::NotVerified(id));
        }
        let cost = property.share_cost(shares)?;
        property.reserve_shares(shares)?;

        let mut holding = self.holdings.get(id, caller).await?.unwrap_or_default();
        let first_purchase = holding.shares == 0;
        holding.add_shares(shares)?;

        // All fallible bookkeeping is staged above; nothing is persisted
        // until the external transfer is confirmed.
        let confirmed = self
            .gateway
            .transfer_from(&property.payment_token, caller, &property.owner, cost)
            .await?;
        if !confirmed {
            return Err(LedgerError::PaymentFailed);
        }

        if first_purchase {
            self.holdings.record_holder(id, caller.clone()).await?;
        }
        self.holdings.put(id, caller.clone(), holding).await?;
        self.properties.update(property).await?;
        tracing::info!(property = %id, buyer = %caller, shares, cost, "shares purchased");
        Ok(())
    }

    /// Deposits one lump rent payment and fans it out pro-rata across all
    /// current holders in holder-index insertion order.
    ///
    /// Uses floor division: `rent_per_share = amount / total_shares_sold`.
    /// The remainder `amount mod total_shares_sold` stays in custody
    /// uncredited; this truncation is a documented property of the pro-rata
    /// formula, not redistributed.
    pub async fn pay_rent(&self, id: PropertyId, amount: u128, caller: &AccountId) -> Result<()> {
        let _guard = EntryGuard::acquire(&self.entry_flag)?;

        let property = self.properties.get(id).await?.ok_or(LedgerError::NotFound(id))?;
        if !property.is_verified {
            return Err(LedgerError::NotVerified(id));
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let total_sold = property.total_shares_sold();
        if total_sold == 0 {
            return Err(LedgerError::NoShares);
        }

        // Stage the full fan-out before touching the gateway so an arithmetic
        // fault cannot strand collected funds.
        let rent_per_share = amount / u128::from(total_sold);
        let mut credited = Vec::new();
        for holder in self.holdings.holders(id).await? {
            let Some(mut holding) = self.holdings.get(id, &holder).await? else {
                continue;
            };
            if holding.shares == 0 {
                continue;
            }
            let credit = rent_per_share
                .checked_mul(u128::from(holding.shares))
                .ok_or(LedgerError::ArithmeticOverflow)?;
            holding.credit_rent(credit)?;
            credited.push((holder, holding));
        }

        let confirmed = self
            .gateway
            .transfer_from(&property.payment_token, caller, &self.custody, amount)
            .await?;
        if !confirmed {
            return Err(LedgerError::PaymentFailed);
        }

        for (holder, holding) in credited {
            self.holdings.put(id, holder, holding).await?;
        }
        tracing::info!(property = %id, depositor = %caller, amount, rent_per_share, "rent deposited");
        Ok(())
    }

    /// Pays out the caller's accrued rent for a property.
    ///
    /// The pending balance is zeroed in the ledger before the external
    /// transfer is requested, so a reentrant withdrawal sees nothing owed;
    /// on transfer failure the previous record is restored together with the
    /// `PaymentFailed` result.
    pub async fn withdraw_rent(&self, id: PropertyId, caller: &AccountId) -> Result<()> {
        let _guard = EntryGuard::acquire(&self.entry_flag)?;

        let property = self.properties.get(id).await?.ok_or(LedgerError::NotFound(id))?;
        let previous = self.holdings.get(id, caller).await?.unwrap_or_default();

        let mut cleared = previous.clone();
        let amount = cleared.take_pending_rent()?;
        self.holdings.put(id, caller.clone(), cleared).await?;

        let confirmed = self
            .gateway
            .transfer(&property.payment_token, caller, amount)
            .await?;
        if !confirmed {
            self.holdings.put(id, caller.clone(), previous).await?;
            return Err(LedgerError::PaymentFailed);
        }
        tracing::info!(property = %id, holder = %caller, amount, "rent withdrawn");
        Ok(())
    }

    /// Pure read: a holder's `(shares, pending_rent)` for a property. Returns
    /// zeros for a holder never recorded.
    pub async fn shareholder_balance(
        &self,
        id: PropertyId,
        holder: &AccountId,
    ) -> Result<(u64, u128)> {
        let holding = self.holdings.get(id, holder).await?.unwrap_or_default();
        Ok((holding.shares, holding.pending_rent))
    }

    pub async fn property(&self, id: PropertyId) -> Result<Option<Property>> {
        self.properties.get(id).await
    }

    pub async fn property_count(&self) -> Result<u64> {
        self.properties.count().await
    }

    pub async fn all_properties(&self) -> Result<Vec<Property>> {
        self.properties.all().await
    }

    pub async fn all_holdings(&self) -> Result<Vec<(PropertyId, AccountId, Holding)>> {
        self.holdings.all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::{
        InMemoryHoldingStore, InMemoryPropertyStore, InMemoryTokenGateway,
    };
    use std::sync::Arc;

    fn listing(total_shares: u64, price_per_share: u64) -> Listing {
        Listing {
            name: "Sea View".into(),
            location: "Lisbon".into(),
            total_shares,
            price_per_share,
            monthly_rent: 500,
            payment_token: "usd".into(),
        }
    }

    fn engine() -> (OwnershipEngine, Arc<InMemoryTokenGateway>) {
        let gateway = Arc::new(InMemoryTokenGateway::new("custody".into()));
        let engine = OwnershipEngine::new(
            Box::new(InMemoryPropertyStore::new()),
            Box::new(InMemoryHoldingStore::new()),
            gateway.clone(),
            "verifier".into(),
            "custody".into(),
        );
        (engine, gateway)
    }

    /// Lists and verifies one property and funds the given buyers.
    async fn listed_property(
        engine: &OwnershipEngine,
        gateway: &InMemoryTokenGateway,
        total_shares: u64,
        price_per_share: u64,
        funded: &[(&str, u128)],
    ) -> PropertyId {
        let id = engine
            .list_property(listing(total_shares, price_per_share), &"owner".into())
            .await
            .unwrap();
        engine.verify_property(id, true, &"verifier".into()).await.unwrap();
        for (account, amount) in funded {
            gateway.mint(&"usd".into(), &AccountId::new(*account), *amount).await.unwrap();
        }
        id
    }

    #[tokio::test]
    async fn test_list_property_assigns_monotonic_ids() {
        let (engine, _) = engine();
        let first = engine.list_property(listing(100, 10), &"owner".into()).await.unwrap();
        let second = engine.list_property(listing(50, 20), &"owner".into()).await.unwrap();
        assert_eq!(first, PropertyId(1));
        assert_eq!(second, PropertyId(2));
        assert_eq!(engine.property_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_property_rejects_invalid_input() {
        let (engine, _) = engine();
        let mut bad = listing(100, 10);
        bad.payment_token = AccountId::new("");
        assert!(matches!(
            engine.list_property(bad, &"owner".into()).await,
            Err(LedgerError::InvalidInput(_))
        ));
        assert_eq!(engine.property_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_verify_requires_authority() {
        let (engine, _) = engine();
        let id = engine.list_property(listing(100, 10), &"owner".into()).await.unwrap();

        assert!(matches!(
            engine.verify_property(id, true, &"owner".into()).await,
            Err(LedgerError::Unauthorized)
        ));
        assert!(matches!(
            engine.verify_property(PropertyId(99), true, &"verifier".into()).await,
            Err(LedgerError::NotFound(PropertyId(99)))
        ));

        engine.verify_property(id, true, &"verifier".into()).await.unwrap();
        assert!(engine.property(id).await.unwrap().unwrap().is_verified);

        // Revocation toggles back.
        engine.verify_property(id, false, &"verifier".into()).await.unwrap();
        assert!(!engine.property(id).await.unwrap().unwrap().is_verified);
    }

    #[tokio::test]
    async fn test_set_verifier_rotation() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.set_verifier("eve".into(), &"eve".into()).await,
            Err(LedgerError::Unauthorized)
        ));
        assert!(matches!(
            engine.set_verifier("".into(), &"verifier".into()).await,
            Err(LedgerError::InvalidInput(_))
        ));

        engine.set_verifier("auditor".into(), &"verifier".into()).await.unwrap();
        assert_eq!(engine.verifier().await, AccountId::new("auditor"));

        // The old authority is out.
        assert!(matches!(
            engine.set_verifier("verifier".into(), &"verifier".into()).await,
            Err(LedgerError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_buy_shares_requires_verification() {
        let (engine, gateway) = engine();
        let id = engine.list_property(listing(100, 10), &"owner".into()).await.unwrap();
        gateway.mint(&"usd".into(), &"alice".into(), 1_000).await.unwrap();

        assert!(matches!(
            engine.buy_shares(id, 10, &"alice".into()).await,
            Err(LedgerError::NotVerified(_))
        ));
        assert_eq!(engine.shareholder_balance(id, &"alice".into()).await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_buy_shares_moves_cost_to_owner() {
        let (engine, gateway) = engine();
        let id = listed_property(&engine, &gateway, 100, 10, &[("alice", 1_000)]).await;

        engine.buy_shares(id, 30, &"alice".into()).await.unwrap();

        let property = engine.property(id).await.unwrap().unwrap();
        assert_eq!(property.available_shares, 70);
        assert_eq!(property.total_shares_sold(), 30);
        assert_eq!(engine.shareholder_balance(id, &"alice".into()).await.unwrap(), (30, 0));
        assert_eq!(gateway.balance(&"usd".into(), &"alice".into()).await, 700);
        assert_eq!(gateway.balance(&"usd".into(), &"owner".into()).await, 300);
    }

    #[tokio::test]
    async fn test_buy_shares_amount_bounds() {
        let (engine, gateway) = engine();
        let id = listed_property(&engine, &gateway, 10, 1, &[("alice", 100)]).await;

        assert!(matches!(
            engine.buy_shares(id, 0, &"alice".into()).await,
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            engine.buy_shares(id, 11, &"alice".into()).await,
            Err(LedgerError::InvalidAmount)
        ));

        // Draining the inventory makes any further positive purchase fail.
        engine.buy_shares(id, 10, &"alice".into()).await.unwrap();
        let property = engine.property(id).await.unwrap().unwrap();
        assert_eq!(property.available_shares, 0);
        assert!(matches!(
            engine.buy_shares(id, 1, &"alice".into()).await,
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn test_buy_shares_payment_failure_leaves_state_untouched() {
        let (engine, gateway) = engine();
        // alice can afford 5 shares at most.
        let id = listed_property(&engine, &gateway, 100, 10, &[("alice", 50)]).await;

        assert!(matches!(
            engine.buy_shares(id, 30, &"alice".into()).await,
            Err(LedgerError::PaymentFailed)
        ));
        let property = engine.property(id).await.unwrap().unwrap();
        assert_eq!(property.available_shares, 100);
        assert_eq!(engine.shareholder_balance(id, &"alice".into()).await.unwrap(), (0, 0));
        assert_eq!(gateway.balance(&"usd".into(), &"alice".into()).await, 50);
    }

    #[tokio::test]
    async fn test_pay_rent_distributes_pro_rata() {
        let (engine, gateway) = engine();
        let id = listed_property(
            &engine,
            &gateway,
            100,
            10,
            &[("alice", 300), ("bob", 200), ("renter", 1_000)],
        )
        .await;

        engine.buy_shares(id, 30, &"alice".into()).await.unwrap();
        engine.buy_shares(id, 20, &"bob".into()).await.unwrap();

        // 1000 / 50 sold shares = 20 per share; no truncation loss here.
        engine.pay_rent(id, 1_000, &"renter".into()).await.unwrap();
        assert_eq!(engine.shareholder_balance(id, &"alice".into()).await.unwrap(), (30, 600));
        assert_eq!(engine.shareholder_balance(id, &"bob".into()).await.unwrap(), (20, 400));
        assert_eq!(gateway.balance(&"usd".into(), &"custody".into()).await, 1_000);
        assert_eq!(gateway.balance(&"usd".into(), &"renter".into()).await, 0);
    }

    #[tokio::test]
    async fn test_pay_rent_truncation_is_retained() {
        let (engine, gateway) = engine();
        let id = listed_property(
            &engine,
            &gateway,
            100,
            1,
            &[("alice", 30), ("bob", 20), ("renter", 1_003)],
        )
        .await;

        engine.buy_shares(id, 30, &"alice".into()).await.unwrap();
        engine.buy_shares(id, 20, &"bob".into()).await.unwrap();

        // floor(1003 / 50) = 20 per share; the remainder 3 stays in custody.
        engine.pay_rent(id, 1_003, &"renter".into()).await.unwrap();
        assert_eq!(engine.shareholder_balance(id, &"alice".into()).await.unwrap(), (30, 600));
        assert_eq!(engine.shareholder_balance(id, &"bob".into()).await.unwrap(), (20, 400));
        assert_eq!(gateway.balance(&"usd".into(), &"custody".into()).await, 1_003);
    }

    #[tokio::test]
    async fn test_pay_rent_preconditions() {
        let (engine, gateway) = engine();
        let id = listed_property(&engine, &gateway, 100, 10, &[("renter", 1_000)]).await;

        assert!(matches!(
            engine.pay_rent(id, 0, &"renter".into()).await,
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            engine.pay_rent(id, 100, &"renter".into()).await,
            Err(LedgerError::NoShares)
        ));
        assert!(matches!(
            engine.pay_rent(PropertyId(9), 100, &"renter".into()).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_withdraw_rent_pays_exactly_once() {
        let (engine, gateway) = engine();
        let id = listed_property(
            &engine,
            &gateway,
            100,
            10,
            &[("alice", 300), ("renter", 900)],
        )
        .await;
        engine.buy_shares(id, 30, &"alice".into()).await.unwrap();
        engine.pay_rent(id, 900, &"renter".into()).await.unwrap();

        engine.withdraw_rent(id, &"alice".into()).await.unwrap();
        assert_eq!(engine.shareholder_balance(id, &"alice".into()).await.unwrap(), (30, 0));
        assert_eq!(gateway.balance(&"usd".into(), &"alice".into()).await, 900);
        assert_eq!(gateway.balance(&"usd".into(), &"custody".into()).await, 0);

        assert!(matches!(
            engine.withdraw_rent(id, &"alice".into()).await,
            Err(LedgerError::NothingToWithdraw)
        ));
    }

    #[tokio::test]
    async fn test_later_buyer_accrues_from_next_deposit_only() {
        let (engine, gateway) = engine();
        let id = listed_property(
            &engine,
            &gateway,
            100,
            1,
            &[("alice", 100), ("bob", 100), ("renter", 200)],
        )
        .await;

        engine.buy_shares(id, 10, &"alice".into()).await.unwrap();
        engine.pay_rent(id, 100, &"renter".into()).await.unwrap();
        // bob buys after the first deposit and gets nothing from it.
        engine.buy_shares(id, 10, &"bob".into()).await.unwrap();
        assert_eq!(engine.shareholder_balance(id, &"bob".into()).await.unwrap(), (10, 0));

        engine.pay_rent(id, 100, &"renter".into()).await.unwrap();
        assert_eq!(engine.shareholder_balance(id, &"alice".into()).await.unwrap(), (10, 150));
        assert_eq!(engine.shareholder_balance(id, &"bob".into()).await.unwrap(), (10, 50));
    }

    #[tokio::test]
    async fn test_shares_conservation_invariant() {
        let (engine, gateway) = engine();
        let id = listed_property(
            &engine,
            &gateway,
            100,
            1,
            &[("alice", 100), ("bob", 100), ("carol", 100)],
        )
        .await;

        engine.buy_shares(id, 25, &"alice".into()).await.unwrap();
        engine.buy_shares(id, 35, &"bob".into()).await.unwrap();
        engine.buy_shares(id, 15, &"carol".into()).await.unwrap();
        engine.buy_shares(id, 5, &"alice".into()).await.unwrap();

        let property = engine.property(id).await.unwrap().unwrap();
        let held: u64 = engine
            .all_holdings()
            .await
            .unwrap()
            .iter()
            .map(|(_, _, holding)| holding.shares)
            .sum();
        assert_eq!(held, property.total_shares_sold());
        assert_eq!(property.available_shares, 20);
    }
}
