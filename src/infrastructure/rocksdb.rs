use crate::domain::holding::Holding;
use crate::domain::ports::{HoldingStore, PropertyStore};
use crate::domain::property::{AccountId, Listing, Property, PropertyId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for property records.
pub const CF_PROPERTIES: &str = "properties";
/// Column Family for investor holdings.
pub const CF_HOLDINGS: &str = "holdings";
/// Column Family for the property counter and per-property holder indexes.
pub const CF_META: &str = "meta";

const PROPERTY_COUNT_KEY: &[u8] = b"property_count";

/// A persistent store implementation using RocksDB.
///
/// Serves both `PropertyStore` and `HoldingStore` from one database using
/// separate Column Families. Holding keys are `"{property_id}/{holder}"`;
/// the property id cannot contain `/`, so the split is unambiguous.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_PROPERTIES, Options::default()),
            ColumnFamilyDescriptor::new(CF_HOLDINGS, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| {
            LedgerError::Internal(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {e}"),
            )))
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            LedgerError::Internal(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Deserialization error: {e}"),
            )))
        })
    }

    fn holding_key(property: PropertyId, holder: &AccountId) -> Vec<u8> {
        format!("{}/{}", property.0, holder).into_bytes()
    }

    fn index_key(property: PropertyId) -> Vec<u8> {
        format!("holders/{}", property.0).into_bytes()
    }

    fn read_count(&self) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, PROPERTY_COUNT_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    LedgerError::Internal(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "corrupt property counter",
                    )))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl PropertyStore for RocksDBStore {
    async fn insert(&self, listing: Listing, owner: AccountId) -> Result<PropertyId> {
        let id = PropertyId(self.read_count()? + 1);
        let property = listing.into_property(id, owner);

        let cf = self.cf(CF_PROPERTIES)?;
        self.db.put_cf(cf, id.0.to_be_bytes(), Self::encode(&property)?)?;
        let meta = self.cf(CF_META)?;
        self.db.put_cf(meta, PROPERTY_COUNT_KEY, id.0.to_be_bytes())?;

        Ok(id)
    }

    async fn get(&self, id: PropertyId) -> Result<Option<Property>> {
        let cf = self.cf(CF_PROPERTIES)?;
        match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, property: Property) -> Result<()> {
        let cf = self.cf(CF_PROPERTIES)?;
        self.db
            .put_cf(cf, property.id.0.to_be_bytes(), Self::encode(&property)?)?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        self.read_count()
    }

    async fn all(&self) -> Result<Vec<Property>> {
        let cf = self.cf(CF_PROPERTIES)?;
        let mut properties = Vec::new();
        // Big-endian id keys make iteration order the listing order.
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            properties.push(Self::decode(&value)?);
        }
        Ok(properties)
    }
}

#[async_trait]
impl HoldingStore for RocksDBStore {
    async fn get(&self, property: PropertyId, holder: &AccountId) -> Result<Option<Holding>> {
        let cf = self.cf(CF_HOLDINGS)?;
        match self.db.get_cf(cf, Self::holding_key(property, holder))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, property: PropertyId, holder: AccountId, holding: Holding) -> Result<()> {
        let cf = self.cf(CF_HOLDINGS)?;
        self.db
            .put_cf(cf, Self::holding_key(property, &holder), Self::encode(&holding)?)?;
        Ok(())
    }

    async fn holders(&self, property: PropertyId) -> Result<Vec<AccountId>> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, Self::index_key(property))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn record_holder(&self, property: PropertyId, holder: AccountId) -> Result<()> {
        let mut holders = HoldingStore::holders(self, property).await?;
        holders.push(holder);
        let cf = self.cf(CF_META)?;
        self.db
            .put_cf(cf, Self::index_key(property), Self::encode(&holders)?)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(PropertyId, AccountId, Holding)>> {
        let cf = self.cf(CF_HOLDINGS)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec()).map_err(|e| {
                LedgerError::Internal(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("corrupt holding key: {e}"),
                )))
            })?;
            let (id, holder) = key.split_once('/').ok_or_else(|| {
                LedgerError::Internal(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "corrupt holding key: missing separator",
                )))
            })?;
            let id = id.parse::<u64>().map_err(|e| {
                LedgerError::Internal(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("corrupt holding key: {e}"),
                )))
            })?;
            rows.push((PropertyId(id), AccountId::new(holder), Self::decode(&value)?));
        }
        Ok(rows)
    }
}
