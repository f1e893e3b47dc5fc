use async_trait::async_trait;
use thiserror::Error;

use crate::{Document, FieldOp, Fields, Query};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An unknown or internal error happened within the store.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A write targeted a document that doesn't exist.
    #[error("{collection}:{id} doesn't exist")]
    Missing { collection: String, id: String },
    /// The query needs a composite index the store doesn't have.
    #[error("query on {collection} requires a composite index")]
    IndexRequired { collection: String },
}

/// Collection-scoped access to a schemaless document store.
///
/// Implementations assign document ids and stamp `created_at` at insert and
/// `updated_at` on every write; callers never supply either. Array operations
/// on a single document are atomic, as is [`update_many`] across documents.
/// Nothing else is transactional.
///
/// [`update_many`]: DocumentStore::update_many
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document by id, `None` if it doesn't exist.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Creates a document with a store-assigned id, returning it.
    async fn insert(&self, collection: &str, fields: Fields) -> StoreResult<Document>;

    /// Applies field operations to one document, returning the updated
    /// document. Fails with [`StoreError::Missing`] if it doesn't exist.
    async fn update(&self, collection: &str, id: &str, ops: Vec<FieldOp>) -> StoreResult<Document>;

    /// Runs a composed query against a collection.
    async fn query(&self, collection: &str, query: Query) -> StoreResult<Vec<Document>>;

    /// Applies the same field operations to many documents as one batch.
    /// Either every document is updated or none are. Returns the number of
    /// documents written.
    async fn update_many(
        &self,
        collection: &str,
        ids: &[String],
        ops: Vec<FieldOp>,
    ) -> StoreResult<usize>;
}
