use super::driver::DocumentDriver;
use crate::errors::{Result, StoreError};
use crate::logger;
use crate::models::Record;
use crate::query::{FilterSpec, SPATIAL_FIELD, SPATIAL_INDEX_TYPE, SpatialCommand, UpdateCommand};
use crate::types::{FindOptions, ID_FIELD, Namespace, RecordId, RecordRef};
use bson::{Bson, Document as BsonDocument};
use std::sync::Arc;

/// Entry point for request handlers. Builds command documents and issues
/// exactly one driver round trip per call.
pub struct DocumentStore<D> {
    driver: Arc<D>,
}

impl<D> Clone for DocumentStore<D> {
    fn clone(&self) -> Self {
        Self { driver: Arc::clone(&self.driver) }
    }
}

fn id_filter(id: RecordId) -> BsonDocument {
    let mut filter = BsonDocument::new();
    filter.insert(ID_FIELD, id);
    filter
}

impl<D: DocumentDriver> DocumentStore<D> {
    pub fn new(driver: D) -> Self {
        Self { driver: Arc::new(driver) }
    }

    pub const fn from_shared(driver: Arc<D>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn driver_failure(verb: &str, ns: &Namespace, err: StoreError) -> StoreError {
        match err {
            StoreError::Driver(msg) => {
                log::error!("{verb} on {ns} failed: {msg}");
                StoreError::Driver(format!("{verb} {ns}: {msg}"))
            }
            other => {
                log::error!("{verb} on {ns} failed: {other}");
                other
            }
        }
    }

    /// Inserts a document and returns its identifier.
    ///
    /// # Errors
    /// `Driver` if the round trip fails or the store returns a non-ObjectId key.
    pub async fn create(&self, ns: &Namespace, doc: BsonDocument) -> Result<RecordId> {
        log::debug!("create on {ns}");
        let inserted = self
            .driver
            .insert_one(ns, doc)
            .await
            .map_err(|e| Self::driver_failure("create", ns, e))?;
        let Bson::ObjectId(oid) = inserted else {
            return Err(StoreError::Driver(format!("create {ns}: failed to get objectID, got {inserted}")));
        };
        let id = RecordId(oid);
        logger::audit("create", &ns.to_string(), Some(&id.to_hex()));
        Ok(id)
    }

    /// # Errors
    /// `InvalidId` before any round trip, `NotFound` on no match, `Driver` on failure.
    pub async fn read(&self, ns: &Namespace, id: &str) -> Result<BsonDocument> {
        let rid = RecordId::parse(id)?;
        log::debug!("read {id} on {ns}");
        self.driver
            .find_one(ns, id_filter(rid))
            .await
            .map_err(|e| Self::driver_failure("read", ns, e))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Pagination passes through to the driver unchanged.
    ///
    /// # Errors
    /// `Driver` on failure.
    pub async fn read_many(
        &self,
        ns: &Namespace,
        filter: &FilterSpec,
        opts: FindOptions,
    ) -> Result<Vec<BsonDocument>> {
        log::debug!("read_many on {ns} terms={} skip={} limit={:?}", filter.len(), opts.skip, opts.limit);
        self.driver
            .find(ns, filter.to_document(), opts)
            .await
            .map_err(|e| Self::driver_failure("read_many", ns, e))
    }

    /// First document matching `filter`.
    ///
    /// # Errors
    /// `NotFound` on no match, `Driver` on failure.
    pub async fn find_one(&self, ns: &Namespace, filter: &FilterSpec) -> Result<BsonDocument> {
        let filter = filter.to_document();
        log::debug!("find_one on {ns} filter={filter}");
        self.driver
            .find_one(ns, filter.clone())
            .await
            .map_err(|e| Self::driver_failure("find_one", ns, e))?
            .ok_or_else(|| StoreError::NotFound(filter.to_string()))
    }

    /// # Errors
    /// `InvalidId` before any round trip, `NotFound` when nothing matched,
    /// `Driver` on failure.
    pub async fn update(&self, ns: &Namespace, id: &str, cmd: &UpdateCommand) -> Result<()> {
        let rid = RecordId::parse(id)?;
        log::debug!("update {id} on {ns} with {}", cmd.operator);
        let report = self
            .driver
            .update_one(ns, id_filter(rid), cmd.to_document())
            .await
            .map_err(|e| Self::driver_failure("update", ns, e))?;
        log::debug!("update count: {}", report.matched);
        if report.matched == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        logger::audit("update", &ns.to_string(), Some(id));
        Ok(())
    }

    /// Updates the first document matching `filter`.
    ///
    /// # Errors
    /// `NotFound` when nothing matched, `Driver` on failure.
    pub async fn update_one(&self, ns: &Namespace, filter: &FilterSpec, cmd: &UpdateCommand) -> Result<()> {
        let filter = filter.to_document();
        log::debug!("update_one on {ns} filter={filter} with {}", cmd.operator);
        let report = self
            .driver
            .update_one(ns, filter.clone(), cmd.to_document())
            .await
            .map_err(|e| Self::driver_failure("update_one", ns, e))?;
        if report.matched == 0 {
            return Err(StoreError::NotFound(filter.to_string()));
        }
        logger::audit("update", &ns.to_string(), None);
        Ok(())
    }

    /// # Errors
    /// `InvalidId` before any round trip, `NotFound` when nothing was deleted,
    /// `Driver` on failure.
    pub async fn delete(&self, ns: &Namespace, id: &str) -> Result<()> {
        let rid = RecordId::parse(id)?;
        log::debug!("delete {id} on {ns}");
        let report = self
            .driver
            .delete_one(ns, id_filter(rid))
            .await
            .map_err(|e| Self::driver_failure("delete", ns, e))?;
        log::debug!("deleted count: {}", report.deleted);
        if report.deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        logger::audit("delete", &ns.to_string(), Some(id));
        Ok(())
    }

    /// Deletes the first document matching `filter`.
    ///
    /// # Errors
    /// `NotFound` when nothing was deleted, `Driver` on failure.
    pub async fn delete_one(&self, ns: &Namespace, filter: &FilterSpec) -> Result<()> {
        let filter = filter.to_document();
        log::debug!("delete_one on {ns} filter={filter}");
        let report = self
            .driver
            .delete_one(ns, filter.clone())
            .await
            .map_err(|e| Self::driver_failure("delete_one", ns, e))?;
        if report.deleted == 0 {
            return Err(StoreError::NotFound(filter.to_string()));
        }
        logger::audit("delete", &ns.to_string(), None);
        Ok(())
    }

    /// [`Self::read`] addressed by a full record reference.
    ///
    /// # Errors
    /// As [`Self::read`].
    pub async fn read_ref(&self, at: &RecordRef) -> Result<BsonDocument> {
        self.read(&at.namespace, &at.id).await
    }

    /// # Errors
    /// As [`Self::update`].
    pub async fn update_ref(&self, at: &RecordRef, cmd: &UpdateCommand) -> Result<()> {
        self.update(&at.namespace, &at.id, cmd).await
    }

    /// # Errors
    /// As [`Self::delete`].
    pub async fn delete_ref(&self, at: &RecordRef) -> Result<()> {
        self.delete(&at.namespace, &at.id).await
    }

    /// # Errors
    /// `Driver` on failure.
    pub async fn exists(&self, ns: &Namespace, filter: &FilterSpec) -> Result<bool> {
        log::debug!("exists on {ns}");
        let n = self
            .driver
            .count(ns, filter.to_document(), Some(1))
            .await
            .map_err(|e| Self::driver_failure("exists", ns, e))?;
        Ok(n > 0)
    }

    /// # Errors
    /// `InvalidShapeForOperator` or `InvalidDistance` before any round trip,
    /// `Driver` on failure.
    pub async fn spatial_query(&self, ns: &Namespace, cmd: &SpatialCommand) -> Result<Vec<BsonDocument>> {
        cmd.validate()?;
        log::debug!("spatial_query on {ns} op={} shape={}", cmd.operator(), cmd.geometry().kind);
        self.driver
            .find(ns, cmd.to_filter(), FindOptions::default())
            .await
            .map_err(|e| Self::driver_failure("spatial_query", ns, e))
    }

    /// Creates the `2dsphere` index the spherical operators need.
    ///
    /// # Errors
    /// `Driver` on failure.
    pub async fn ensure_spatial_index(&self, ns: &Namespace) -> Result<String> {
        let mut keys = BsonDocument::new();
        keys.insert(SPATIAL_FIELD, SPATIAL_INDEX_TYPE);
        let name = self
            .driver
            .create_index(ns, keys)
            .await
            .map_err(|e| Self::driver_failure("create_index", ns, e))?;
        log::info!("spatial index {name} ready on {ns}");
        Ok(name)
    }

    /// # Errors
    /// `Driver` if the store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        self.driver.ping().await.map_err(|e| match e {
            StoreError::Driver(msg) => {
                log::warn!("ping failed: {msg}");
                StoreError::Driver(format!("failed to successfully ping store: {msg}"))
            }
            other => other,
        })
    }

    /// # Errors
    /// As [`Self::create`], plus `Bson` if the record cannot be encoded.
    pub async fn create_record<R: Record>(&self, ns: &Namespace, record: &R) -> Result<RecordId> {
        self.create(ns, record.to_document()?).await
    }

    /// # Errors
    /// As [`Self::read`], plus `Bson` if the stored document has another shape.
    pub async fn read_record<R: Record>(&self, ns: &Namespace, id: &str) -> Result<R> {
        R::from_document(self.read(ns, id).await?)
    }

    /// # Errors
    /// As [`Self::find_one`], plus `Bson` on shape mismatch.
    pub async fn find_one_record<R: Record>(&self, ns: &Namespace, filter: &FilterSpec) -> Result<R> {
        R::from_document(self.find_one(ns, filter).await?)
    }

    /// # Errors
    /// As [`Self::read_many`], plus `Bson` on shape mismatch.
    pub async fn read_many_records<R: Record>(
        &self,
        ns: &Namespace,
        filter: &FilterSpec,
        opts: FindOptions,
    ) -> Result<Vec<R>> {
        self.read_many(ns, filter, opts).await?.into_iter().map(R::from_document).collect()
    }

    /// # Errors
    /// As [`Self::spatial_query`], plus `Bson` on shape mismatch.
    pub async fn spatial_query_records<R: Record>(
        &self,
        ns: &Namespace,
        cmd: &SpatialCommand,
    ) -> Result<Vec<R>> {
        self.spatial_query(ns, cmd).await?.into_iter().map(R::from_document).collect()
    }
}
