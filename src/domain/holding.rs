use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Per-(property, holder) sub-ledger record.
///
/// Created implicitly on a holder's first purchase. `shares` never decreases
/// in the current operation set; `pending_rent` accrues on rent fan-out and
/// is cleared to zero atomically with each withdrawal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Holding {
    pub shares: u64,
    pub pending_rent: u128,
}

impl Holding {
    pub fn add_shares(&mut self, shares: u64) -> Result<()> {
        self.shares = self
            .shares
            .checked_add(shares)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn credit_rent(&mut self, amount: u128) -> Result<()> {
        self.pending_rent = self
            .pending_rent
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Clears the accrued rent and returns the cleared amount.
    pub fn take_pending_rent(&mut self) -> Result<u128> {
        if self.pending_rent == 0 {
            return Err(LedgerError::NothingToWithdraw);
        }
        Ok(std::mem::take(&mut self.pending_rent))
    }
}
