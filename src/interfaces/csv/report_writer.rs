use crate::domain::holding::Holding;
use crate::domain::property::{AccountId, Property, PropertyId};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct HoldingRow<'a> {
    property: u64,
    holder: &'a str,
    shares: u64,
    pending_rent: u128,
}

/// Writes the final registry and sub-ledger state as two CSV tables.
pub struct ReportWriter<W: Write> {
    inner: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_properties(&mut self, properties: &[Property]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(&mut self.inner);
        for property in properties {
            writer.serialize(property)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_holdings(&mut self, holdings: &[(PropertyId, AccountId, Holding)]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(&mut self.inner);
        for (property, holder, holding) in holdings {
            writer.serialize(HoldingRow {
                property: property.0,
                holder: holder.as_str(),
                shares: holding.shares,
                pending_rent: holding.pending_rent,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}
