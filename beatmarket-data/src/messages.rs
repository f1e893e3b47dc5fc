use std::collections::HashMap;
use std::sync::Arc;

use beatmarket_store::{
    fields, Direction, DocRef, Document, DocumentStore, FieldOp, Query, StoreResult, Value,
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::try_join;

use crate::collections::{MESSAGES, USERS};
use crate::error::DataResult;
use crate::mapper::{reference_field, string_field, FromDocument};
use crate::{ConversationSummary, MessageRecord, NewMessage};

/// Direct messages and the conversation summaries derived from them.
pub struct MessageRepository<S> {
    store: Arc<S>,
}

/// Running aggregate for one counterpart while folding the two message
/// streams.
struct Thread {
    last_at: DateTime<Utc>,
    last_message: String,
    unread_count: usize,
}

impl<S> MessageRepository<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_message: NewMessage) -> DataResult<MessageRecord> {
        let doc = self
            .store
            .insert(
                MESSAGES,
                fields! {
                    "sender" => DocRef::new(USERS, new_message.sender),
                    "receiver" => DocRef::new(USERS, new_message.receiver),
                    "content" => new_message.content,
                    "read" => false,
                },
            )
            .await?;

        Ok(MessageRecord::from_document(&doc))
    }

    /// Every message between two users, oldest first.
    ///
    /// The store only composes equality predicates, so each direction is
    /// its own query and the two streams are merged here by timestamp.
    pub async fn conversation(&self, user_a: &str, user_b: &str) -> DataResult<Vec<MessageRecord>> {
        let (a_to_b, b_to_a) = try_join!(
            self.direction(user_a, user_b),
            self.direction(user_b, user_a),
        )?;

        let mut docs: Vec<_> = a_to_b.into_iter().chain(b_to_a).collect();
        docs.sort_by_key(created_at);

        Ok(docs.iter().map(MessageRecord::from_document).collect())
    }

    /// One summary per counterpart the user has exchanged messages with,
    /// most recent conversation first.
    ///
    /// This walks every message involving the user on each call; there is
    /// no materialized conversation index.
    pub async fn conversations(&self, user_id: &str) -> DataResult<Vec<ConversationSummary>> {
        let user = DocRef::new(USERS, user_id);

        let (sent, received) = try_join!(
            self.store
                .query(MESSAGES, Query::new().filter_eq("sender", user.clone())),
            self.store
                .query(MESSAGES, Query::new().filter_eq("receiver", user)),
        )?;

        let mut threads: HashMap<String, Thread> = HashMap::new();

        for doc in sent.iter().chain(received.iter()) {
            let sender = reference_field(doc, "sender");
            let receiver = reference_field(doc, "receiver");

            let counterpart = if sender == user_id {
                receiver.clone()
            } else {
                sender.clone()
            };

            let thread = threads.entry(counterpart).or_insert_with(|| Thread {
                last_at: DateTime::<Utc>::MIN_UTC,
                last_message: String::new(),
                unread_count: 0,
            });

            // The newer of the two directions wins by timestamp, regardless
            // of which query produced it
            let at = created_at(doc);

            if at > thread.last_at {
                thread.last_at = at;
                thread.last_message = string_field(doc, "content");
            }

            if receiver == user_id && !doc.field("read").and_then(Value::as_bool).unwrap_or(false)
            {
                thread.unread_count += 1;
            }
        }

        let mut summaries: Vec<_> = threads.into_iter().collect();
        summaries.sort_by(|(_, a), (_, b)| b.last_at.cmp(&a.last_at));

        Ok(summaries
            .into_iter()
            .map(|(counterpart, thread)| ConversationSummary {
                counterpart,
                last_message: thread.last_message,
                last_message_at: (thread.last_at > DateTime::<Utc>::MIN_UTC)
                    .then(|| thread.last_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
                unread_count: thread.unread_count,
            })
            .collect())
    }

    /// Marks everything the counterpart sent to the user as read, as one
    /// atomic batch. Returns the number of messages flipped; new unread
    /// messages arriving between the query and the batch stay unread.
    pub async fn mark_read(&self, user_id: &str, other_user_id: &str) -> DataResult<usize> {
        let unread = self
            .store
            .query(
                MESSAGES,
                Query::new()
                    .filter_eq("sender", DocRef::new(USERS, other_user_id))
                    .filter_eq("receiver", DocRef::new(USERS, user_id))
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
                MESSAGES,
                &ids,
                vec![FieldOp::Set("read".to_string(), true.into())],
            )
            .await?;

        Ok(updated)
    }

    async fn direction(&self, sender: &str, receiver: &str) -> StoreResult<Vec<Document>> {
        self.store
            .query(
                MESSAGES,
                Query::new()
                    .filter_eq("sender", DocRef::new(USERS, sender))
                    .filter_eq("receiver", DocRef::new(USERS, receiver))
                    .order_by("created_at", Direction::Ascending),
            )
            .await
    }
}

fn created_at(doc: &Document) -> DateTime<Utc> {
    doc.field("created_at")
        .and_then(Value::as_timestamp)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    use beatmarket_store::MemoryStore;

    fn repo() -> MessageRepository<MemoryStore> {
        MessageRepository::new(Arc::new(MemoryStore::new()))
    }

    async fn send(repo: &MessageRepository<MemoryStore>, from: &str, to: &str, content: &str) {
        repo.create(NewMessage {
            sender: from.to_string(),
            receiver: to.to_string(),
            content: content.to_string(),
        })
        .await
        .expect("message is created");
    }

    #[tokio::test]
    async fn test_conversation_merges_both_directions_in_order() {
        let repo = repo();

        send(&repo, "alice", "bob", "one").await;
        send(&repo, "bob", "alice", "two").await;
        send(&repo, "alice", "bob", "three").await;
        send(&repo, "carol", "bob", "noise").await;

        let conversation = repo.conversation("alice", "bob").await.unwrap();
        let contents: Vec<_> = conversation.iter().map(|m| m.content.as_str()).collect();

        assert_eq!(contents, ["one", "two", "three"]);
        assert!(conversation.iter().all(|m| !m.read));
    }

    #[tokio::test]
    async fn test_conversations_aggregate_per_counterpart() {
        let repo = repo();

        send(&repo, "alice", "bob", "hey").await;
        send(&repo, "bob", "alice", "yo").await;
        send(&repo, "carol", "bob", "new beat up").await;
        send(&repo, "carol", "bob", "check it").await;

        let summaries = repo.conversations("bob").await.unwrap();
        assert_eq!(summaries.len(), 2);

        // Carol's thread is newer and comes first
        assert_eq!(summaries[0].counterpart, "carol");
        assert_eq!(summaries[0].last_message, "check it");
        assert_eq!(summaries[0].unread_count, 2);

        // Bob's own reply is the latest in the alice thread but doesn't
        // count as unread for him
        assert_eq!(summaries[1].counterpart, "alice");
        assert_eq!(summaries[1].last_message, "yo");
        assert_eq!(summaries[1].unread_count, 1);
    }

    #[tokio::test]
    async fn test_mark_read_flips_one_direction_once() {
        let repo = repo();

        send(&repo, "alice", "bob", "one").await;
        send(&repo, "alice", "bob", "two").await;
        send(&repo, "bob", "alice", "reply").await;

        let flipped = repo.mark_read("bob", "alice").await.unwrap();
        assert_eq!(flipped, 2);

        let summaries = repo.conversations("bob").await.unwrap();
        assert_eq!(summaries[0].unread_count, 0);

        // Alice still hasn't read bob's reply
        let summaries = repo.conversations("alice").await.unwrap();
        assert_eq!(summaries[0].unread_count, 1);

        let flipped = repo.mark_read("bob", "alice").await.unwrap();
        assert_eq!(flipped, 0);
    }
}
