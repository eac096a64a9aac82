use crate::errors::StoreError;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary key field of every stored document.
pub const ID_FIELD: &str = "_id";

/// A `(database, collection)` coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    #[must_use]
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { database: database.into(), collection: collection.into() }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Native document identifier (a 12-byte `ObjectId`, written as 24 hex digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub ObjectId);

impl RecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// Parses the hex form used on the wire by request handlers.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidId` if `s` is not a 24-digit hex string.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        ObjectId::parse_str(s).map(Self).map_err(|_| StoreError::InvalidId(s.to_string()))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RecordId {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl From<ObjectId> for RecordId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl From<RecordId> for bson::Bson {
    fn from(id: RecordId) -> Self {
        Self::ObjectId(id.0)
    }
}

/// Full address of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub namespace: Namespace,
    pub id: String,
}

impl RecordRef {
    #[must_use]
    pub fn new(database: &str, collection: &str, id: &str) -> Self {
        Self { namespace: Namespace::new(database, collection), id: id.to_string() }
    }

    /// # Errors
    /// Returns `StoreError::InvalidId` if the id is not a valid `ObjectId`.
    pub fn record_id(&self) -> Result<RecordId, StoreError> {
        RecordId::parse(&self.id)
    }
}

/// Pagination for multi-document reads. A `limit` of `Some(0)` means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    #[must_use]
    pub const fn page(skip: u64, limit: u64) -> Self {
        Self { skip, limit: Some(limit) }
    }

    /// Effective limit, folding `Some(0)` into "unbounded".
    #[must_use]
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit.filter(|l| *l > 0)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_round_trips_through_hex() {
        let id = RecordId::new();
        assert_eq!(RecordId::parse(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn record_id_rejects_garbage() {
        assert!(matches!(RecordId::parse("not-a-valid-id"), Err(StoreError::InvalidId(s)) if s == "not-a-valid-id"));
        assert!(RecordId::parse("").is_err());
        assert!(RecordId::parse("507f1f77bcf86cd79943901").is_err());
    }

    #[test]
    fn zero_limit_is_unbounded() {
        assert_eq!(FindOptions::page(0, 0).effective_limit(), None);
        assert_eq!(FindOptions::page(5, 3).effective_limit(), Some(3));
        assert_eq!(FindOptions::default().effective_limit(), None);
    }

    #[test]
    fn namespace_display() {
        assert_eq!(Namespace::new("horus", "crumbs").to_string(), "horus.crumbs");
    }
}
