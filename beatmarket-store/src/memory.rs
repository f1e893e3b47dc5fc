use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::{
    Condition, Direction, Document, DocumentStore, FieldOp, Fields, Query, StoreError, StoreResult,
    Value,
};

type Collection = RwLock<BTreeMap<String, Fields>>;

/// An in-process document store, used in tests and local development.
///
/// Each collection sits behind its own lock, which is what makes
/// `update_many` all-or-nothing within a collection. Write timestamps are
/// strictly monotonic so ordering by `created_at` never ties.
pub struct MemoryStore {
    collections: DashMap<String, Collection>,
    last_stamp: Mutex<DateTime<Utc>>,
    strict_indexes: bool,
}

impl MemoryStore {
    const ID_LENGTH: usize = 20;

    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            last_stamp: Mutex::new(DateTime::<Utc>::MIN_UTC),
            strict_indexes: false,
        }
    }

    /// A store that refuses compound queries, behaving like a server
    /// missing every composite index.
    pub fn strict() -> Self {
        Self {
            strict_indexes: true,
            ..Self::new()
        }
    }

    fn generate_id() -> String {
        let mut rng = thread_rng();

        std::iter::repeat(())
            .map(|_| rng.sample(Alphanumeric) as char)
            .take(Self::ID_LENGTH)
            .collect()
    }

    /// The next server-assigned write timestamp.
    fn stamp(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock();
        let mut now = Utc::now();

        if now <= *last {
            now = *last + Duration::microseconds(1);
        }

        *last = now;
        now
    }

    fn matches(fields: &Fields, conditions: &[Condition]) -> bool {
        conditions.iter().all(|condition| match condition {
            Condition::Eq(field, value) => fields.get(field) == Some(value),
            Condition::Gte(field, value) => fields
                .get(field)
                .and_then(|f| f.compare(value))
                .is_some_and(|o| o != Ordering::Less),
            Condition::Lte(field, value) => fields
                .get(field)
                .and_then(|f| f.compare(value))
                .is_some_and(|o| o != Ordering::Greater),
        })
    }

    fn apply_ops(fields: &mut Fields, ops: &[FieldOp]) {
        for op in ops {
            match op {
                FieldOp::Set(field, value) => {
                    fields.insert(field.clone(), value.clone());
                }
                FieldOp::ArrayAdd(field, value) => {
                    let entry = fields
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));

                    if let Value::Array(items) = entry {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }
                }
                FieldOp::ArrayRemove(field, value) => {
                    if let Some(Value::Array(items)) = fields.get_mut(field) {
                        items.retain(|item| item != value);
                    }
                }
                FieldOp::Increment(field, amount) => {
                    let current = fields.get(field).and_then(Value::as_int).unwrap_or(0);
                    fields.insert(field.clone(), Value::Int(current + amount));
                }
            }
        }
    }

    fn sort(docs: &mut [Document], field: &str, direction: Direction) {
        docs.sort_by(|a, b| {
            let ordering = match (a.field(field), b.field(field)) {
                (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
                // Documents without the field sort last
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };

            match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let document = self.collections.get(collection).and_then(|col| {
            col.read().get(id).map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            })
        });

        Ok(document)
    }

    async fn insert(&self, collection: &str, mut fields: Fields) -> StoreResult<Document> {
        let id = Self::generate_id();
        let now = self.stamp();

        fields.insert("created_at".to_string(), Value::Timestamp(now));
        fields.insert("updated_at".to_string(), Value::Timestamp(now));

        self.collections
            .entry(collection.to_string())
            .or_default()
            .write()
            .insert(id.clone(), fields.clone());

        Ok(Document { id, fields })
    }

    async fn update(&self, collection: &str, id: &str, ops: Vec<FieldOp>) -> StoreResult<Document> {
        let missing = || StoreError::Missing {
            collection: collection.to_string(),
            id: id.to_string(),
        };

        let col = self.collections.get(collection).ok_or_else(missing)?;
        let mut guard = col.write();
        let fields = guard.get_mut(id).ok_or_else(missing)?;

        Self::apply_ops(fields, &ops);
        fields.insert("updated_at".to_string(), Value::Timestamp(self.stamp()));

        Ok(Document {
            id: id.to_string(),
            fields: fields.clone(),
        })
    }

    async fn query(&self, collection: &str, query: Query) -> StoreResult<Vec<Document>> {
        if self.strict_indexes && query.is_compound() {
            return Err(StoreError::IndexRequired {
                collection: collection.to_string(),
            });
        }

        let Some(col) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<_> = col
            .read()
            .iter()
            .filter(|(_, fields)| Self::matches(fields, &query.conditions))
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            Self::sort(&mut docs, field, *direction);
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }

        Ok(docs)
    }

    async fn update_many(
        &self,
        collection: &str,
        ids: &[String],
        ops: Vec<FieldOp>,
    ) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let col = self
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::Missing {
                collection: collection.to_string(),
                id: ids[0].clone(),
            })?;

        let mut guard = col.write();

        // The whole batch fails before anything is written if any document
        // is missing
        for id in ids {
            if !guard.contains_key(id) {
                return Err(StoreError::Missing {
                    collection: collection.to_string(),
                    id: id.clone(),
                });
            }
        }

        let now = self.stamp();

        for id in ids {
            let fields = guard.get_mut(id).expect("document is present");

            Self::apply_ops(fields, &ops);
            fields.insert("updated_at".to_string(), Value::Timestamp(now));
        }

        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();

        let doc = store
            .insert("beats", fields! { "title" => "Midnight" })
            .await
            .expect("insert succeeds");

        assert_eq!(doc.id.len(), MemoryStore::ID_LENGTH);
        assert!(doc.field("created_at").is_some());
        assert!(doc.field("updated_at").is_some());

        let fetched = store.get("beats", &doc.id).await.expect("get succeeds");
        assert_eq!(fetched.expect("document exists").id, doc.id);

        let missing = store.get("beats", "nope").await.expect("get succeeds");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_array_ops_have_set_semantics() {
        let store = MemoryStore::new();
        let doc = store.insert("users", Fields::new()).await.unwrap();

        let add = |value: &str| vec![FieldOp::ArrayAdd("likes".into(), value.into())];

        store.update("users", &doc.id, add("a")).await.unwrap();
        store.update("users", &doc.id, add("a")).await.unwrap();
        let doc = store.update("users", &doc.id, add("b")).await.unwrap();

        assert_eq!(
            doc.field("likes").and_then(Value::as_array).unwrap().len(),
            2
        );

        let doc = store
            .update(
                "users",
                &doc.id,
                vec![FieldOp::ArrayRemove("likes".into(), "a".into())],
            )
            .await
            .unwrap();

        assert_eq!(
            doc.field("likes").and_then(Value::as_array).unwrap(),
            &[Value::from("b")]
        );
    }

    #[tokio::test]
    async fn test_increment() {
        let store = MemoryStore::new();
        let doc = store.insert("beats", Fields::new()).await.unwrap();

        let doc = store
            .update(
                "beats",
                &doc.id,
                vec![FieldOp::Increment("plays".into(), 3)],
            )
            .await
            .unwrap();

        assert_eq!(doc.field("plays").and_then(Value::as_int), Some(3));
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_limits() {
        let store = MemoryStore::new();

        for (title, price) in [("a", 100i64), ("b", 300), ("c", 200)] {
            store
                .insert("beats", fields! { "title" => title, "price" => price })
                .await
                .unwrap();
        }

        let docs = store
            .query(
                "beats",
                Query::new()
                    .filter_gte("price", 150i64)
                    .order_by("price", Direction::Descending)
                    .limit(1),
            )
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].field("title").and_then(Value::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_insertion_order_is_recoverable_from_timestamps() {
        let store = MemoryStore::new();

        for title in ["first", "second", "third"] {
            store
                .insert("beats", fields! { "title" => title })
                .await
                .unwrap();
        }

        let docs = store
            .query(
                "beats",
                Query::new().order_by("created_at", Direction::Descending),
            )
            .await
            .unwrap();

        let titles: Vec<_> = docs
            .iter()
            .map(|d| d.field("title").and_then(Value::as_str).unwrap())
            .collect();

        assert_eq!(titles, ["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_strict_store_reports_missing_index() {
        let store = MemoryStore::strict();
        store.insert("notifications", Fields::new()).await.unwrap();

        let result = store
            .query(
                "notifications",
                Query::new()
                    .filter_eq("user", "u1")
                    .order_by("created_at", Direction::Descending),
            )
            .await;

        assert!(matches!(result, Err(StoreError::IndexRequired { .. })));

        let flat = store
            .query("notifications", Query::new().filter_eq("user", "u1"))
            .await;

        assert!(flat.is_ok());
    }

    #[tokio::test]
    async fn test_update_many_is_all_or_nothing() {
        let store = MemoryStore::new();

        let doc = store
            .insert("messages", fields! { "read" => false })
            .await
            .unwrap();

        let ids = vec![doc.id.clone(), "missing".to_string()];
        let ops = vec![FieldOp::Set("read".into(), true.into())];

        let result = store.update_many("messages", &ids, ops.clone()).await;
        assert!(matches!(result, Err(StoreError::Missing { .. })));

        // The existing document must be untouched by the failed batch
        let doc = store.get("messages", &doc.id).await.unwrap().unwrap();
        assert_eq!(doc.field("read").and_then(Value::as_bool), Some(false));

        let count = store
            .update_many("messages", &ids[..1], ops)
            .await
            .expect("batch succeeds");
        assert_eq!(count, 1);
    }
}
