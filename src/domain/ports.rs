use super::holding::Holding;
use super::property::{AccountId, Listing, Property, PropertyId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Registry storage. Owns all `Property` records and the id counter.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Allocates the next id, stores the listing under it and returns it.
    async fn insert(&self, listing: Listing, owner: AccountId) -> Result<PropertyId>;
    async fn get(&self, id: PropertyId) -> Result<Option<Property>>;
    async fn update(&self, property: Property) -> Result<()>;
    async fn count(&self) -> Result<u64>;
    async fn all(&self) -> Result<Vec<Property>>;
}

/// Investor sub-ledger storage, including the append-only per-property
/// holder index used for rent fan-out.
#[async_trait]
pub trait HoldingStore: Send + Sync {
    async fn get(&self, property: PropertyId, holder: &AccountId) -> Result<Option<Holding>>;
    async fn put(&self, property: PropertyId, holder: AccountId, holding: Holding) -> Result<()>;
    /// Holder identities for a property in insertion order. The sequence
    /// never shrinks and contains each identity at most once.
    async fn holders(&self, property: PropertyId) -> Result<Vec<AccountId>>;
    /// Appends an identity to the holder index. Called exactly once per
    /// holder, when its share count first becomes non-zero.
    async fn record_holder(&self, property: PropertyId, holder: AccountId) -> Result<()>;
    async fn all(&self) -> Result<Vec<(PropertyId, AccountId, Holding)>>;
}

/// External payment-currency mover. Consumed, never owned, by the engine:
/// a `false` result is treated identically to an error and aborts the
/// surrounding operation with `PaymentFailed`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Moves `amount` of `token` between two external accounts.
    async fn transfer_from(
        &self,
        token: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<bool>;

    /// Pays `amount` of `token` out of the gateway's custody account.
    async fn transfer(&self, token: &AccountId, to: &AccountId, amount: u128) -> Result<bool>;
}

pub type PropertyStoreBox = Box<dyn PropertyStore>;
pub type HoldingStoreBox = Box<dyn HoldingStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
