use crate::serializer::FormatError;
use uuid::Uuid;

/// Errors returned by the component id store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The token or a stored payload can't be decoded. The interaction is invalid, not expired.
    #[error("malformed component id: {0}")]
    Format(#[from] FormatError),
    /// The token is already associated with a live record. Retry with a fresh token.
    #[error("component id {0} already exists")]
    AlreadyExists(Uuid),
    #[error("component id database error: {0}")]
    Database(#[from] sqlx::Error),
}
