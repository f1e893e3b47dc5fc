use std::sync::Arc;

use beatmarket_store::{
    fields, Direction, DocRef, Document, DocumentStore, FieldOp, Query, Value,
};
use futures_util::future::try_join_all;

use crate::collections::{BEATS, USERS};
use crate::error::{required, DataResult};
use crate::mapper::{opt_string_field, reference_list_field, string_field, FromDocument};
use crate::util::push_set;
use crate::{BeatFilters, BeatPatch, BeatRecord, LikeOutcome, NewBeat};

/// Beats listed on the marketplace.
pub struct BeatRepository<S> {
    store: Arc<S>,
}

impl<S> BeatRepository<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_beat: NewBeat) -> DataResult<BeatRecord> {
        let producer = required(
            self.store.get(USERS, &new_beat.producer).await?,
            "user",
            "producer",
        )?;

        let tags = new_beat.tags.into_iter().map(Value::from).collect();

        let doc = self
            .store
            .insert(
                BEATS,
                fields! {
                    "title" => new_beat.title,
                    "description" => new_beat.description,
                    "genre" => new_beat.genre,
                    "bpm" => new_beat.bpm as i64,
                    "key" => new_beat.key,
                    "price" => new_beat.price as i64,
                    "audio_url" => new_beat.audio_url,
                    "preview_url" => new_beat.preview_url,
                    "artwork_url" => new_beat.artwork_url,
                    "tags" => Value::Array(tags),
                    "producer" => DocRef::new(USERS, new_beat.producer),
                    "plays" => 0i64,
                    "likes" => Vec::<Value>::new(),
                    "is_deleted" => false,
                },
            )
            .await?;

        let mut record = BeatRecord::from_document(&doc);
        attach_producer(&mut record, Some(&producer));

        Ok(record)
    }

    /// Point lookup. Soft-deleted beats are still returned here; only
    /// listings exclude them.
    pub async fn find_by_id(&self, id: &str) -> DataResult<Option<BeatRecord>> {
        let Some(doc) = self.store.get(BEATS, id).await? else {
            return Ok(None);
        };

        Ok(Some(self.populate(&doc).await?))
    }

    /// Lists non-deleted beats, newest first.
    ///
    /// The pipeline order is a contract: store-side filters run first, then
    /// every row's producer is resolved, then the free-text search narrows
    /// the populated set, and the page is sliced last. Reordering these
    /// steps changes which results a page contains.
    pub async fn find_many(
        &self,
        filters: BeatFilters,
        page: usize,
        limit: usize,
    ) -> DataResult<Vec<BeatRecord>> {
        let mut query = Query::new()
            .filter_eq("is_deleted", false)
            .order_by("created_at", Direction::Descending);

        if let Some(genre) = filters.genre {
            query = query.filter_eq("genre", genre);
        }
        if let Some(min_price) = filters.min_price {
            query = query.filter_gte("price", min_price as i64);
        }
        if let Some(max_price) = filters.max_price {
            query = query.filter_lte("price", max_price as i64);
        }
        if let Some(bpm) = filters.bpm {
            query = query.filter_eq("bpm", bpm as i64);
        }
        if let Some(producer) = filters.producer {
            query = query.filter_eq("producer", DocRef::new(USERS, producer));
        }

        let docs = self.store.query(BEATS, query).await?;

        let mut records = try_join_all(docs.iter().map(|doc| self.populate(doc))).await?;

        if let Some(search) = filters.search {
            let needle = search.to_lowercase();

            records.retain(|beat| {
                beat.title.to_lowercase().contains(&needle)
                    || beat.description.to_lowercase().contains(&needle)
                    || beat.genre.to_lowercase().contains(&needle)
            });
        }

        let start = page.max(1) - 1;

        Ok(records
            .into_iter()
            .skip(start * limit)
            .take(limit)
            .collect())
    }

    pub async fn update(&self, id: &str, patch: BeatPatch) -> DataResult<BeatRecord> {
        required(self.store.get(BEATS, id).await?, "beat", "id")?;

        let mut ops = Vec::new();

        push_set(&mut ops, "title", patch.title);
        push_set(&mut ops, "description", patch.description);
        push_set(&mut ops, "genre", patch.genre);
        push_set(&mut ops, "bpm", patch.bpm.map(|b| b as i64));
        push_set(&mut ops, "key", patch.key);
        push_set(&mut ops, "price", patch.price.map(|p| p as i64));
        push_set(&mut ops, "artwork_url", patch.artwork_url);
        push_set(
            &mut ops,
            "tags",
            patch
                .tags
                .map(|tags| Value::Array(tags.into_iter().map(Value::from).collect())),
        );

        let doc = self.store.update(BEATS, id, ops).await?;

        self.populate(&doc).await
    }

    /// Flags the beat as deleted instead of removing it; there is no hard
    /// delete.
    pub async fn soft_delete(&self, id: &str) -> DataResult<()> {
        required(self.store.get(BEATS, id).await?, "beat", "id")?;

        self.store
            .update(
                BEATS,
                id,
                vec![FieldOp::Set("is_deleted".to_string(), true.into())],
            )
            .await?;

        Ok(())
    }

    /// Toggles the user's like on the beat, based on membership at the time
    /// of the read. Concurrent toggles for the same pair can race.
    pub async fn like(&self, beat_id: &str, user_id: &str) -> DataResult<LikeOutcome> {
        let doc = required(self.store.get(BEATS, beat_id).await?, "beat", "id")?;
        let likes = reference_list_field(&doc, "likes");

        let op = if likes.iter().any(|id| id == user_id) {
            FieldOp::ArrayRemove("likes".to_string(), user_id.into())
        } else {
            FieldOp::ArrayAdd("likes".to_string(), user_id.into())
        };

        let liked = matches!(op, FieldOp::ArrayAdd(..));

        self.store.update(BEATS, beat_id, vec![op]).await?;

        Ok(LikeOutcome { liked })
    }

    /// Bumps the play counter.
    pub async fn record_play(&self, id: &str) -> DataResult<()> {
        required(self.store.get(BEATS, id).await?, "beat", "id")?;

        self.store
            .update(BEATS, id, vec![FieldOp::Increment("plays".to_string(), 1)])
            .await?;

        Ok(())
    }

    /// Maps a document and resolves its producer's display details.
    async fn populate(&self, doc: &Document) -> DataResult<BeatRecord> {
        let mut record = BeatRecord::from_document(doc);
        let producer = self.store.get(USERS, &record.producer).await?;

        attach_producer(&mut record, producer.as_ref());

        Ok(record)
    }
}

/// Missing producers leave the display fields empty rather than failing the
/// read.
fn attach_producer(record: &mut BeatRecord, producer: Option<&Document>) {
    if let Some(producer) = producer {
        record.producer_name = Some(string_field(producer, "display_name"));
        record.producer_picture = opt_string_field(producer, "profile_picture");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountType, DataError, DataLayer, NewUser};
    use beatmarket_store::MemoryStore;

    async fn layer_with_producer() -> (DataLayer<MemoryStore>, String) {
        let layer = DataLayer::new(MemoryStore::new());

        let producer = layer
            .users
            .create(NewUser {
                username: "prod".to_string(),
                email: "prod@example.com".to_string(),
                account_type: AccountType::Producer,
                display_name: "Prod".to_string(),
                bio: None,
                profile_picture: Some("https://cdn.example.com/prod.png".to_string()),
            })
            .await
            .unwrap();

        (layer, producer.id)
    }

    fn new_beat(producer: &str, title: &str, genre: &str, price: u64) -> NewBeat {
        NewBeat {
            title: title.to_string(),
            description: format!("{title} description"),
            genre: genre.to_string(),
            bpm: 140,
            key: "Am".to_string(),
            price,
            audio_url: "https://cdn.example.com/a.wav".to_string(),
            preview_url: "https://cdn.example.com/a.mp3".to_string(),
            artwork_url: "https://cdn.example.com/a.png".to_string(),
            tags: vec![],
            producer: producer.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_initializes_and_populates() {
        let (layer, producer) = layer_with_producer().await;

        let beat = layer
            .beats
            .create(new_beat(&producer, "Midnight", "trap", 1000))
            .await
            .unwrap();

        assert_eq!(beat.plays, 0);
        assert!(beat.likes.is_empty());
        assert!(!beat.is_deleted);
        assert_eq!(beat.producer, producer);
        assert_eq!(beat.producer_name.as_deref(), Some("Prod"));
    }

    #[tokio::test]
    async fn test_create_requires_producer() {
        let (layer, _) = layer_with_producer().await;

        let result = layer
            .beats
            .create(new_beat("ghost", "Midnight", "trap", 1000))
            .await;

        assert!(matches!(result, Err(DataError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_find_many_filters_search_and_pagination() {
        let (layer, producer) = layer_with_producer().await;

        for (title, genre, price) in [
            ("Afro Sunrise", "afrobeat", 1500u64),
            ("Lagos Nights", "afrobeat", 2500),
            ("Cold Trap", "trap", 1000),
            ("Afro Trap", "trap", 2000),
        ] {
            layer
                .beats
                .create(new_beat(&producer, title, genre, price))
                .await
                .unwrap();
        }

        // Genre filter plus text search; the search narrows the filtered set
        let found = layer
            .beats
            .find_many(
                BeatFilters {
                    genre: Some("afrobeat".to_string()),
                    search: Some("afro".to_string()),
                    ..Default::default()
                },
                1,
                10,
            )
            .await
            .unwrap();

        let titles: Vec<_> = found.iter().map(|b| b.title.as_str()).collect();
        // "Lagos Nights" matches through its genre, newest first
        assert_eq!(titles, ["Lagos Nights", "Afro Sunrise"]);
        assert!(found.iter().all(|b| b.producer_name.is_some()));

        // Price range
        let found = layer
            .beats
            .find_many(
                BeatFilters {
                    min_price: Some(1800),
                    max_price: Some(2200),
                    ..Default::default()
                },
                1,
                10,
            )
            .await
            .unwrap();

        let titles: Vec<_> = found.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Afro Trap"]);

        // Pagination slices the ordered set, never exceeding the limit
        let page_one = layer
            .beats
            .find_many(BeatFilters::default(), 1, 3)
            .await
            .unwrap();
        let page_two = layer
            .beats
            .find_many(BeatFilters::default(), 2, 3)
            .await
            .unwrap();

        assert_eq!(page_one.len(), 3);
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].title, "Afro Sunrise");
    }

    #[tokio::test]
    async fn test_soft_deleted_beats_leave_listings() {
        let (layer, producer) = layer_with_producer().await;

        let beat = layer
            .beats
            .create(new_beat(&producer, "Midnight", "trap", 1000))
            .await
            .unwrap();

        layer.beats.soft_delete(&beat.id).await.unwrap();

        let listed = layer
            .beats
            .find_many(BeatFilters::default(), 1, 10)
            .await
            .unwrap();
        assert!(listed.is_empty());

        // Still reachable by id, flagged
        let direct = layer.beats.find_by_id(&beat.id).await.unwrap().unwrap();
        assert!(direct.is_deleted);
    }

    #[tokio::test]
    async fn test_like_toggles_membership() {
        let (layer, producer) = layer_with_producer().await;

        let beat = layer
            .beats
            .create(new_beat(&producer, "Midnight", "trap", 1000))
            .await
            .unwrap();

        assert!(layer.beats.like(&beat.id, "u1").await.unwrap().liked);
        assert!(layer.beats.like(&beat.id, "u2").await.unwrap().liked);

        let now = layer.beats.find_by_id(&beat.id).await.unwrap().unwrap();
        assert_eq!(now.likes, ["u1", "u2"]);

        // An even number of toggles restores the initial state
        assert!(!layer.beats.like(&beat.id, "u1").await.unwrap().liked);
        assert!(!layer.beats.like(&beat.id, "u2").await.unwrap().liked);

        let now = layer.beats.find_by_id(&beat.id).await.unwrap().unwrap();
        assert!(now.likes.is_empty());
    }

    #[tokio::test]
    async fn test_record_play_increments() {
        let (layer, producer) = layer_with_producer().await;

        let beat = layer
            .beats
            .create(new_beat(&producer, "Midnight", "trap", 1000))
            .await
            .unwrap();

        layer.beats.record_play(&beat.id).await.unwrap();
        layer.beats.record_play(&beat.id).await.unwrap();

        let now = layer.beats.find_by_id(&beat.id).await.unwrap().unwrap();
        assert_eq!(now.plays, 2);
    }

    #[tokio::test]
    async fn test_update_keeps_unrelated_fields() {
        let (layer, producer) = layer_with_producer().await;

        let beat = layer
            .beats
            .create(new_beat(&producer, "Midnight", "trap", 1000))
            .await
            .unwrap();

        let updated = layer
            .beats
            .update(
                &beat.id,
                BeatPatch {
                    price: Some(2000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, 2000);
        assert_eq!(updated.title, "Midnight");
        assert_eq!(updated.producer_name.as_deref(), Some("Prod"));
    }
}
