use crate::domain::property::PropertyId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failure taxonomy for the ownership and rent ledger.
///
/// Every operation either completes fully or fails with one of these variants
/// leaving no partial state change behind. Nothing is retried internally; the
/// caller resubmits.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("property {0} not found")]
    NotFound(PropertyId),
    #[error("caller is not the verification authority")]
    Unauthorized,
    #[error("property {0} is not verified")]
    NotVerified(PropertyId),
    #[error("share or rent amount is zero or out of range")]
    InvalidAmount,
    #[error("external payment transfer failed")]
    PaymentFailed,
    #[error("property has no shares sold")]
    NoShares,
    #[error("no pending rent to withdraw")]
    NothingToWithdraw,
    #[error("reentrant call into a guarded operation")]
    Reentrancy,
    #[error("arithmetic overflow in value computation")]
    ArithmeticOverflow,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}
