use crate::domain::holding::Holding;
use crate::domain::ports::{HoldingStore, PaymentGateway, PropertyStore};
use crate::domain::property::{AccountId, Listing, Property, PropertyId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory property registry.
///
/// Properties are never deleted, so the next id is always `len + 1`.
/// Ideal for testing or single-run processing where persistence is not
/// required.
#[derive(Default, Clone)]
pub struct InMemoryPropertyStore {
    properties: Arc<RwLock<BTreeMap<u64, Property>>>,
}

impl InMemoryPropertyStore {
    /// Creates a new, empty in-memory property store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for InMemoryPropertyStore {
    async fn insert(&self, listing: Listing, owner: AccountId) -> Result<PropertyId> {
        let mut properties = self.properties.write().await;
        let id = PropertyId(properties.len() as u64 + 1);
        properties.insert(id.0, listing.into_property(id, owner));
        Ok(id)
    }

    async fn get(&self, id: PropertyId) -> Result<Option<Property>> {
        let properties = self.properties.read().await;
        Ok(properties.get(&id.0).cloned())
    }

    async fn update(&self, property: Property) -> Result<()> {
        let mut properties = self.properties.write().await;
        properties.insert(property.id.0, property);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let properties = self.properties.read().await;
        Ok(properties.len() as u64)
    }

    async fn all(&self) -> Result<Vec<Property>> {
        let properties = self.properties.read().await;
        Ok(properties.values().cloned().collect())
    }
}

#[derive(Default)]
struct HoldingTable {
    holdings: HashMap<(PropertyId, AccountId), Holding>,
    /// Append-only holder index per property, in first-purchase order.
    index: BTreeMap<PropertyId, Vec<AccountId>>,
}

/// A thread-safe in-memory investor sub-ledger.
#[derive(Default, Clone)]
pub struct InMemoryHoldingStore {
    inner: Arc<RwLock<HoldingTable>>,
}

impl InMemoryHoldingStore {
    /// Creates a new, empty in-memory holding store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HoldingStore for InMemoryHoldingStore {
    async fn get(&self, property: PropertyId, holder: &AccountId) -> Result<Option<Holding>> {
        let table = self.inner.read().await;
        Ok(table.holdings.get(&(property, holder.clone())).cloned())
    }

    async fn put(&self, property: PropertyId, holder: AccountId, holding: Holding) -> Result<()> {
        let mut table = self.inner.write().await;
        table.holdings.insert((property, holder), holding);
        Ok(())
    }

    async fn holders(&self, property: PropertyId) -> Result<Vec<AccountId>> {
        let table = self.inner.read().await;
        Ok(table.index.get(&property).cloned().unwrap_or_default())
    }

    async fn record_holder(&self, property: PropertyId, holder: AccountId) -> Result<()> {
        let mut table = self.inner.write().await;
        table.index.entry(property).or_default().push(holder);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(PropertyId, AccountId, Holding)>> {
        let table = self.inner.read().await;
        let mut rows = Vec::new();
        for (property, holders) in &table.index {
            for holder in holders {
                if let Some(holding) = table.holdings.get(&(*property, holder.clone())) {
                    rows.push((*property, holder.clone(), holding.clone()));
                }
            }
        }
        Ok(rows)
    }
}

/// An in-memory payment-token ledger implementing the gateway port.
///
/// Balances are keyed by (token, account). Transfers report `Ok(false)` on
/// insufficient funds, which the engine surfaces as `PaymentFailed`; `mint`
/// funds accounts for tests and single-run CLI processing.
#[derive(Clone)]
pub struct InMemoryTokenGateway {
    custody: AccountId,
    balances: Arc<RwLock<HashMap<(AccountId, AccountId), u128>>>,
}

impl InMemoryTokenGateway {
    pub fn new(custody: AccountId) -> Self {
        Self {
            custody,
            balances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn mint(&self, token: &AccountId, account: &AccountId, amount: u128) -> Result<()> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry((token.clone(), account.clone())).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(())
    }

    pub async fn balance(&self, token: &AccountId, account: &AccountId) -> u128 {
        let balances = self.balances.read().await;
        balances
            .get(&(token.clone(), account.clone()))
            .copied()
            .unwrap_or_default()
    }

    async fn move_tokens(
        &self,
        token: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<bool> {
        let mut balances = self.balances.write().await;
        let from_key = (token.clone(), from.clone());
        let to_key = (token.clone(), to.clone());
        let available = balances.get(&from_key).copied().unwrap_or_default();
        if available < amount {
            return Ok(false);
        }
        // A self-transfer must not create value.
        if from_key == to_key {
            return Ok(true);
        }
        let to_balance = balances.get(&to_key).copied().unwrap_or_default();
        let credited = to_balance
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        balances.insert(from_key, available - amount);
        balances.insert(to_key, credited);
        Ok(true)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryTokenGateway {
    async fn transfer_from(
        &self,
        token: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<bool> {
        self.move_tokens(token, from, to, amount).await
    }

    async fn transfer(&self, token: &AccountId, to: &AccountId, amount: u128) -> Result<bool> {
        let custody = self.custody.clone();
        self.move_tokens(token, &custody, to, amount).await
    }
}
