use core_model::DatasetKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The dataset has no storage partition, i.e. it was never imported
    #[error("No partition exists for dataset {0}")]
    NoPartition(DatasetKey),

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

impl BridgeError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        BridgeError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
