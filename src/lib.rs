pub mod cli;
pub mod config;
pub mod errors;
pub mod logger;
pub mod models;
pub mod query;
pub mod store;
pub mod types;

pub use crate::errors::{Result, StoreError};
pub use crate::query::{
    FilterSpec, Shape, ShapeType, SpatialCommand, SpatialOperator, UpdateCommand, UpdateOperator,
    build_filter, build_spatial_command, build_update_command,
};
pub use crate::store::{DocumentDriver, DocumentStore, MemoryDriver};
pub use crate::types::{FindOptions, Namespace, RecordId, RecordRef};

/// Initializes process logging from the `HORUS_LOG_*` environment variables.
///
/// Call once at service start-up, before the first store call.
///
/// # Errors
/// Returns an error if the log directory or appenders cannot be created.
pub fn init() -> Result<()> {
    logger::configure_from_env().map(|_| ())
}
