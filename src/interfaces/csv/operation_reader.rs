use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

/// The operations drivable from a CSV stream.
///
/// `mint` funds an account on the in-memory token ledger; everything else
/// maps one-to-one onto an engine entry point.
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    List,
    Verify,
    SetVerifier,
    Mint,
    Buy,
    PayRent,
    Withdraw,
}

/// One row of the operations CSV. Columns beyond `op` and `caller` are
/// optional; each operation reads the subset it needs.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Operation {
    pub op: OperationKind,
    pub caller: String,
    #[serde(default)]
    pub property: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub shares: Option<u64>,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub rent: Option<u64>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub amount: Option<u128>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub account: Option<String>,
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<Operation>`,
/// handling whitespace trimming and flexible record lengths automatically.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations,
    /// so large files stream without loading fully into memory.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
