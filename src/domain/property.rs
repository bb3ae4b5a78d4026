use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of an acting principal or a payment token.
///
/// The empty string is the null identity and is rejected wherever an identity
/// is required (payment token at listing time, new authority).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Monotonically increasing property identifier, assigned once at listing
/// time starting from 1 and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct PropertyId(pub u64);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A listing request: the immutable share economics of a property as supplied
/// by its owner, validated before an id is allocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub location: String,
    pub total_shares: u64,
    pub price_per_share: u64,
    /// Informational only; nothing enforces that deposited rent matches it.
    pub monthly_rent: u64,
    pub payment_token: AccountId,
}

impl Listing {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(LedgerError::InvalidInput("property name is empty".into()));
        }
        if self.total_shares == 0 {
            return Err(LedgerError::InvalidInput("total shares must be non-zero".into()));
        }
        if self.price_per_share == 0 {
            return Err(LedgerError::InvalidInput("price per share must be non-zero".into()));
        }
        if self.payment_token.is_null() {
            return Err(LedgerError::InvalidInput("payment token identity is null".into()));
        }
        Ok(())
    }

    /// Builds the stored record once the registry has allocated an id.
    pub fn into_property(self, id: PropertyId, owner: AccountId) -> Property {
        Property {
            id,
            name: self.name,
            location: self.location,
            total_shares: self.total_shares,
            price_per_share: self.price_per_share,
            available_shares: self.total_shares,
            monthly_rent: self.monthly_rent,
            is_verified: false,
            owner,
            payment_token: self.payment_token,
        }
    }
}

/// A registered fractional-ownership property.
///
/// `total_shares` and `price_per_share` are fixed at listing time;
/// `available_shares` only ever decreases, and `0 <= available_shares <=
/// total_shares` holds at all times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub location: String,
    pub total_shares: u64,
    pub price_per_share: u64,
    pub available_shares: u64,
    pub monthly_rent: u64,
    pub is_verified: bool,
    /// Receives purchase proceeds.
    pub owner: AccountId,
    pub payment_token: AccountId,
}

impl Property {
    pub fn total_shares_sold(&self) -> u64 {
        self.total_shares - self.available_shares
    }

    /// Cost of buying `shares` units, widened to `u128` so the multiply
    /// cannot wrap silently.
    pub fn share_cost(&self, shares: u64) -> Result<u128> {
        u128::from(self.price_per_share)
            .checked_mul(u128::from(shares))
            .ok_or(LedgerError::ArithmeticOverflow)
    }

    /// Takes `shares` units out of the available inventory.
    pub fn reserve_shares(&mut self, shares: u64) -> Result<()> {
        if shares == 0 || shares > self.available_shares {
            return Err(LedgerError::InvalidAmount);
        }
        self.available_shares -= shares;
        Ok(())
    }
}
