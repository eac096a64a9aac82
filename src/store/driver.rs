use crate::errors::Result;
use crate::types::{DeleteReport, FindOptions, Namespace, UpdateReport};
use bson::{Bson, Document as BsonDocument};
use std::future::Future;

/// The document-database operations the facade issues. Every method is one
/// round trip; implementations must not retry.
///
/// Dropping a returned future abandons the round trip. Implementations apply
/// each mutation atomically so an abandoned call leaves nothing half-written.
pub trait DocumentDriver: Send + Sync {
    /// Inserts `doc`, assigning `_id` when absent. Returns the stored `_id`.
    fn insert_one(&self, ns: &Namespace, doc: BsonDocument) -> impl Future<Output = Result<Bson>> + Send;

    fn find(
        &self,
        ns: &Namespace,
        filter: BsonDocument,
        opts: FindOptions,
    ) -> impl Future<Output = Result<Vec<BsonDocument>>> + Send;

    fn find_one(
        &self,
        ns: &Namespace,
        filter: BsonDocument,
    ) -> impl Future<Output = Result<Option<BsonDocument>>> + Send;

    /// Applies `update` to the first document matching `filter`.
    fn update_one(
        &self,
        ns: &Namespace,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> impl Future<Output = Result<UpdateReport>> + Send;

    fn delete_one(
        &self,
        ns: &Namespace,
        filter: BsonDocument,
    ) -> impl Future<Output = Result<DeleteReport>> + Send;

    /// Counts matches, stopping at `limit` when given.
    fn count(
        &self,
        ns: &Namespace,
        filter: BsonDocument,
        limit: Option<u64>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Creates an index over `keys` and returns its name.
    fn create_index(
        &self,
        ns: &Namespace,
        keys: BsonDocument,
    ) -> impl Future<Output = Result<String>> + Send;

    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Index name the store derives from its key document, e.g. `location_2dsphere`.
#[must_use]
pub fn index_name(keys: &BsonDocument) -> String {
    keys.iter()
        .map(|(k, v)| match v {
            Bson::String(s) => format!("{k}_{s}"),
            other => format!("{k}_{other}"),
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn index_names_follow_store_convention() {
        assert_eq!(index_name(&doc! {"location": "2dsphere"}), "location_2dsphere");
        assert_eq!(index_name(&doc! {"email": 1, "user": -1}), "email_1_user_-1");
    }
}
