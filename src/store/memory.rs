//! In-process [`DocumentDriver`] honoring the builders' operator vocabulary.

use super::driver::{DocumentDriver, index_name};
use super::eval::{Match, apply_update, eval_filter};
use crate::errors::{Result, StoreError};
use crate::types::{DeleteReport, FindOptions, ID_FIELD, Namespace, RecordId, UpdateReport};
use bson::{Bson, Document as BsonDocument};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct CollectionData {
    docs: Vec<BsonDocument>,
    indexes: Vec<String>,
}

#[derive(Default)]
pub struct MemoryDriver {
    collections: RwLock<HashMap<Namespace, CollectionData>>,
    fail_next: Mutex<Option<String>>,
    round_trips: AtomicU64,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next round trip fail with a driver error carrying `msg`.
    pub fn fail_next(&self, msg: impl Into<String>) {
        *self.fail_next.lock() = Some(msg.into());
    }

    /// Number of round trips served so far, failed ones included.
    #[must_use]
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self, ns: &Namespace) -> usize {
        self.collections.read().get(ns).map_or(0, |c| c.docs.len())
    }

    #[must_use]
    pub fn is_empty(&self, ns: &Namespace) -> bool {
        self.len(ns) == 0
    }

    #[must_use]
    pub fn indexes(&self, ns: &Namespace) -> Vec<String> {
        self.collections.read().get(ns).map(|c| c.indexes.clone()).unwrap_or_default()
    }

    fn begin(&self) -> Result<()> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        match self.fail_next.lock().take() {
            Some(msg) => Err(StoreError::Driver(msg)),
            None => Ok(()),
        }
    }

    /// Matching documents in store order, or nearest first when the filter
    /// carries a proximity operator.
    fn matching(docs: &[BsonDocument], filter: &BsonDocument) -> Result<Vec<(usize, Match)>> {
        let mut hits = Vec::new();
        for (i, d) in docs.iter().enumerate() {
            let m = eval_filter(d, filter)?;
            if m.is_match() {
                hits.push((i, m));
            }
        }
        if hits.iter().any(|(_, m)| matches!(m, Match::At(_))) {
            hits.sort_by(|(_, a), (_, b)| {
                let da = if let Match::At(d) = a { *d } else { 0.0 };
                let db = if let Match::At(d) = b { *d } else { 0.0 };
                da.total_cmp(&db)
            });
        }
        Ok(hits)
    }

    /// The document every single-document verb acts on: the head of
    /// [`Self::matching`], so reads and writes agree on "first".
    fn first_match(docs: &[BsonDocument], filter: &BsonDocument) -> Result<Option<usize>> {
        Ok(Self::matching(docs, filter)?.first().map(|(i, _)| *i))
    }
}

fn page<T>(items: Vec<T>, opts: FindOptions) -> Vec<T> {
    let skip = usize::try_from(opts.skip).unwrap_or(usize::MAX);
    let take = opts.effective_limit().map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
    items.into_iter().skip(skip).take(take).collect()
}

impl DocumentDriver for MemoryDriver {
    async fn insert_one(&self, ns: &Namespace, mut doc: BsonDocument) -> Result<Bson> {
        self.begin()?;
        if !doc.contains_key(ID_FIELD) {
            doc.insert(ID_FIELD, RecordId::new());
        }
        let id = doc.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
        let mut cols = self.collections.write();
        let col = cols.entry(ns.clone()).or_default();
        if col.docs.iter().any(|d| d.get(ID_FIELD) == Some(&id)) {
            return Err(StoreError::Driver(format!("duplicate key {ID_FIELD}: {id}")));
        }
        col.docs.push(doc);
        Ok(id)
    }

    async fn find(&self, ns: &Namespace, filter: BsonDocument, opts: FindOptions) -> Result<Vec<BsonDocument>> {
        self.begin()?;
        let cols = self.collections.read();
        let Some(col) = cols.get(ns) else { return Ok(Vec::new()) };
        let hits = Self::matching(&col.docs, &filter)?;
        Ok(page(hits, opts).into_iter().map(|(i, _)| col.docs[i].clone()).collect())
    }

    async fn find_one(&self, ns: &Namespace, filter: BsonDocument) -> Result<Option<BsonDocument>> {
        self.begin()?;
        let cols = self.collections.read();
        let Some(col) = cols.get(ns) else { return Ok(None) };
        Ok(Self::first_match(&col.docs, &filter)?.map(|i| col.docs[i].clone()))
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateReport> {
        self.begin()?;
        let mut cols = self.collections.write();
        let Some(col) = cols.get_mut(ns) else { return Ok(UpdateReport::default()) };
        let Some(i) = Self::first_match(&col.docs, &filter)? else {
            return Ok(UpdateReport::default());
        };
        let modified = apply_update(&mut col.docs[i], &update)?;
        Ok(UpdateReport { matched: 1, modified: u64::from(modified) })
    }

    async fn delete_one(&self, ns: &Namespace, filter: BsonDocument) -> Result<DeleteReport> {
        self.begin()?;
        let mut cols = self.collections.write();
        let Some(col) = cols.get_mut(ns) else { return Ok(DeleteReport::default()) };
        let Some(i) = Self::first_match(&col.docs, &filter)? else {
            return Ok(DeleteReport::default());
        };
        col.docs.remove(i);
        Ok(DeleteReport { deleted: 1 })
    }

    async fn count(&self, ns: &Namespace, filter: BsonDocument, limit: Option<u64>) -> Result<u64> {
        self.begin()?;
        let cols = self.collections.read();
        let Some(col) = cols.get(ns) else { return Ok(0) };
        let cap = limit.filter(|l| *l > 0).unwrap_or(u64::MAX);
        let mut n = 0u64;
        for d in &col.docs {
            if n >= cap {
                break;
            }
            if eval_filter(d, &filter)?.is_match() {
                n += 1;
            }
        }
        Ok(n)
    }

    async fn create_index(&self, ns: &Namespace, keys: BsonDocument) -> Result<String> {
        self.begin()?;
        if keys.is_empty() {
            return Err(StoreError::Driver("index key document must not be empty".into()));
        }
        let name = index_name(&keys);
        let mut cols = self.collections.write();
        let col = cols.entry(ns.clone()).or_default();
        if !col.indexes.contains(&name) {
            col.indexes.push(name.clone());
        }
        Ok(name)
    }

    async fn ping(&self) -> Result<()> {
        self.begin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn ns() -> Namespace {
        Namespace::new("t", "docs")
    }

    #[tokio::test]
    async fn insert_assigns_object_id() {
        let d = MemoryDriver::new();
        let id = d.insert_one(&ns(), doc! {"a": 1}).await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(d.len(&ns()), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let d = MemoryDriver::new();
        d.insert_one(&ns(), doc! {"_id": 7}).await.unwrap();
        assert!(matches!(d.insert_one(&ns(), doc! {"_id": 7}).await, Err(StoreError::Driver(_))));
    }

    #[tokio::test]
    async fn count_stops_at_limit() {
        let d = MemoryDriver::new();
        for i in 0..5 {
            d.insert_one(&ns(), doc! {"k": "x", "i": i}).await.unwrap();
        }
        assert_eq!(d.count(&ns(), doc! {"k": "x"}, Some(1)).await.unwrap(), 1);
        assert_eq!(d.count(&ns(), doc! {"k": "x"}, None).await.unwrap(), 5);
        assert_eq!(d.count(&ns(), doc! {"k": "y"}, Some(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fail_next_is_consumed_once() {
        let d = MemoryDriver::new();
        d.fail_next("connection reset");
        assert!(matches!(d.ping().await, Err(StoreError::Driver(m)) if m == "connection reset"));
        assert!(d.ping().await.is_ok());
        assert_eq!(d.round_trips(), 2);
    }

    #[tokio::test]
    async fn find_pages_in_store_order() {
        let d = MemoryDriver::new();
        for i in 0..6 {
            d.insert_one(&ns(), doc! {"i": i}).await.unwrap();
        }
        let got = d.find(&ns(), doc! {}, FindOptions::page(2, 3)).await.unwrap();
        let is: Vec<i32> = got.iter().map(|d| d.get_i32("i").unwrap()).collect();
        assert_eq!(is, [2, 3, 4]);
        let all = d.find(&ns(), doc! {}, FindOptions::page(0, 0)).await.unwrap();
        assert_eq!(all.len(), 6);
    }

    #[tokio::test]
    async fn single_document_verbs_agree_on_nearest() {
        let d = MemoryDriver::new();
        for (name, lat) in [("far", 0.0005), ("near", 0.0001)] {
            let loc = doc! {"type": "Point", "coordinates": [0.0, lat]};
            d.insert_one(&ns(), doc! {"name": name, "location": loc}).await.unwrap();
        }
        let near = doc! {"location": {"$near": {
            "$geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
            "$maxDistance": 1000.0,
        }}};
        let found = d.find_one(&ns(), near.clone()).await.unwrap().unwrap();
        assert_eq!(found.get_str("name").unwrap(), "near");

        let report = d.update_one(&ns(), near.clone(), doc! {"$set": {"hit": true}}).await.unwrap();
        assert_eq!(report.matched, 1);
        let hit = d.find_one(&ns(), doc! {"hit": true}).await.unwrap().unwrap();
        assert_eq!(hit.get_str("name").unwrap(), "near");

        d.delete_one(&ns(), near).await.unwrap();
        let left = d.find(&ns(), doc! {}, FindOptions::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].get_str("name").unwrap(), "far");
    }
}
