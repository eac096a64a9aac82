use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Shape {shape} not allowed for operator {operator}")]
    InvalidShapeForOperator { shape: String, operator: String },

    #[error("Invalid distance: {0}")]
    InvalidDistance(String),

    #[error("Invalid document ID: {0}")]
    InvalidId(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("BSON: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// True for errors detected before any store round trip.
    #[must_use]
    pub const fn is_rejected_locally(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperator(_)
                | Self::InvalidShapeForOperator { .. }
                | Self::InvalidDistance(_)
                | Self::InvalidId(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
