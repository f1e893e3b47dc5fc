use std::sync::Arc;

use beatmarket_store::{fields, Direction, DocRef, DocumentStore, Query};

use crate::collections::{BEATS, COMMENTS, USERS};
use crate::error::DataResult;
use crate::mapper::FromDocument;
use crate::{CommentRecord, NewComment};

/// Comments on beats. Immutable once written; this layer has no update or
/// delete for them.
pub struct CommentRepository<S> {
    store: Arc<S>,
}

impl<S> CommentRepository<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_comment: NewComment) -> DataResult<CommentRecord> {
        let doc = self
            .store
            .insert(
                COMMENTS,
                fields! {
                    "beat" => DocRef::new(BEATS, new_comment.beat),
                    "user" => DocRef::new(USERS, new_comment.user),
                    "content" => new_comment.content,
                },
            )
            .await?;

        Ok(CommentRecord::from_document(&doc))
    }

    /// A beat's comments, newest first.
    pub async fn find_by_beat(&self, beat_id: &str) -> DataResult<Vec<CommentRecord>> {
        let docs = self
            .store
            .query(
                COMMENTS,
                Query::new()
                    .filter_eq("beat", DocRef::new(BEATS, beat_id))
                    .order_by("created_at", Direction::Descending),
            )
            .await?;

        Ok(docs.iter().map(CommentRecord::from_document).collect())
    }
}
