use std::sync::Arc;

use beatmarket_store::{
    fields, Direction, DocRef, Document, DocumentStore, FieldOp, Query, StoreError, Value,
};
use log::warn;

use crate::collections::{NOTIFICATIONS, USERS};
use crate::error::{required, DataResult};
use crate::mapper::FromDocument;
use crate::{NewNotification, NotificationRecord};

/// Per-user notifications.
pub struct NotificationRepository<S> {
    store: Arc<S>,
}

impl<S> NotificationRepository<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_notification: NewNotification) -> DataResult<NotificationRecord> {
        let doc = self
            .store
            .insert(
                NOTIFICATIONS,
                fields! {
                    "user" => DocRef::new(USERS, new_notification.user),
                    "kind" => new_notification.kind,
                    "title" => new_notification.title,
                    "body" => new_notification.body,
                    // Carried opaquely; which collection it names depends
                    // on the kind
                    "related_id" => new_notification.related_id,
                    "read" => false,
                },
            )
            .await?;

        Ok(NotificationRecord::from_document(&doc))
    }

    /// A user's notifications, newest first.
    ///
    /// Stores missing the composite index for the ordered form serve the
    /// flat query instead and the ordering happens here; that outcome is
    /// routine, not an error.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> DataResult<Vec<NotificationRecord>> {
        let mut flat = Query::new().filter_eq("user", DocRef::new(USERS, user_id));

        if unread_only {
            flat = flat.filter_eq("read", false);
        }

        let ordered = flat
            .clone()
            .order_by("created_at", Direction::Descending);

        let docs = match self.store.query(NOTIFICATIONS, ordered).await {
            Ok(docs) => docs,
            Err(StoreError::IndexRequired { collection }) => {
                warn!("no composite index on {collection}, sorting notifications in memory");

                let mut docs = self.store.query(NOTIFICATIONS, flat).await?;
                docs.sort_by_key(|doc| std::cmp::Reverse(created_at(doc)));
                docs
            }
            Err(e) => return Err(e.into()),
        };

        Ok(docs.iter().map(NotificationRecord::from_document).collect())
    }

    pub async fn mark_read(&self, id: &str) -> DataResult<()> {
        required(
            self.store.get(NOTIFICATIONS, id).await?,
            "notification",
            "id",
        )?;

        self.store
            .update(
                NOTIFICATIONS,
                id,
                vec![FieldOp::Set("read".to_string(), true.into())],
            )
            .await?;

        Ok(())
    }

    /// Flips every unread notification of the user in one atomic batch,
    /// returning how many were flipped.
    pub async fn mark_all_read(&self, user_id: &str) -> DataResult<usize> {
        let unread = self
            .store
            .query(
                NOTIFICATIONS,
                Query::new()
                    .filter_eq("user", DocRef::new(USERS, user_id))
                    .filter_eq("read", false),
            )
            .await?;

        if unread.is_empty() {
            return Ok(0);
        }

        let ids: Vec<_> = unread.iter().map(|doc| doc.id.clone()).collect();
        let updated = self
            .store
            .update_many(
                NOTIFICATIONS,
                &ids,
                vec![FieldOp::Set("read".to_string(), true.into())],
            )
            .await?;

        Ok(updated)
    }
}

fn created_at(doc: &Document) -> chrono::DateTime<chrono::Utc> {
    doc.field("created_at")
        .and_then(Value::as_timestamp)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataError;
    use beatmarket_store::MemoryStore;

    fn repo(store: MemoryStore) -> NotificationRepository<MemoryStore> {
        NotificationRepository::new(Arc::new(store))
    }

    async fn notify(repo: &NotificationRepository<MemoryStore>, user: &str, title: &str) -> String {
        repo.create(NewNotification {
            user: user.to_string(),
            kind: "sale".to_string(),
            title: title.to_string(),
            body: format!("{title} body"),
            related_id: Some("p1".to_string()),
        })
        .await
        .expect("notification is created")
        .id
    }

    #[tokio::test]
    async fn test_find_by_user_orders_and_filters() {
        let repo = repo(MemoryStore::new());

        notify(&repo, "u1", "first").await;
        let second = notify(&repo, "u1", "second").await;
        notify(&repo, "u2", "other").await;

        let all = repo.find_by_user("u1", false).await.unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["second", "first"]);
        assert_eq!(all[0].related_id.as_deref(), Some("p1"));

        repo.mark_read(&second).await.unwrap();

        let unread = repo.find_by_user("u1", true).await.unwrap();
        let titles: Vec<_> = unread.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["first"]);
    }

    #[tokio::test]
    async fn test_missing_index_falls_back_to_in_memory_ordering() {
        let repo = repo(MemoryStore::strict());

        notify(&repo, "u1", "first").await;
        notify(&repo, "u1", "second").await;

        let all = repo.find_by_user("u1", false).await.unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();

        assert_eq!(titles, ["second", "first"]);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let repo = repo(MemoryStore::new());

        notify(&repo, "u1", "first").await;
        notify(&repo, "u1", "second").await;

        assert_eq!(repo.mark_all_read("u1").await.unwrap(), 2);
        assert_eq!(repo.mark_all_read("u1").await.unwrap(), 0);
        assert!(repo.find_by_user("u1", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_requires_notification() {
        let repo = repo(MemoryStore::new());

        let result = repo.mark_read("ghost").await;
        assert!(matches!(result, Err(DataError::NotFound { .. })));
    }
}
