use std::collections::HashMap;
use std::sync::Arc;

use beatmarket_store::{fields, Direction, DocumentStore, FieldOp, Query, Value};
use futures_util::try_join;

use crate::collections::USERS;
use crate::error::{required, DataResult, EnsureVacant};
use crate::mapper::{reference_list_field, FromDocument};
use crate::util::push_set;
use crate::{ChangeOutcome, NewUser, UserPatch, UserRecord};

/// Accounts and the follow graph between them.
pub struct UserRepository<S> {
    store: Arc<S>,
}

impl<S> UserRepository<S>
where
    S: DocumentStore,
{
    /// Upper bound sentinel for prefix range queries.
    const PREFIX_CEILING: char = '\u{f8ff}';

    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates an account. Usernames and emails are unique, but only by
    /// checking for an existing document first; the store itself enforces
    /// nothing.
    pub async fn create(&self, new_user: NewUser) -> DataResult<UserRecord> {
        self.find_by_username(&new_user.username)
            .await
            .ensure_vacant("user", "username", &new_user.username)?;
        self.find_by_email(&new_user.email)
            .await
            .ensure_vacant("user", "email", &new_user.email)?;

        let doc = self
            .store
            .insert(
                USERS,
                fields! {
                    "username" => new_user.username,
                    "email" => new_user.email,
                    "account_type" => new_user.account_type.as_str(),
                    "display_name" => new_user.display_name,
                    "bio" => new_user.bio,
                    "profile_picture" => new_user.profile_picture,
                    "followers" => Vec::<Value>::new(),
                    "following" => Vec::<Value>::new(),
                },
            )
            .await?;

        Ok(UserRecord::from_document(&doc))
    }

    pub async fn find_by_id(&self, id: &str) -> DataResult<Option<UserRecord>> {
        let doc = self.store.get(USERS, id).await?;

        Ok(doc.map(|d| UserRecord::from_document(&d)))
    }

    pub async fn find_by_email(&self, email: &str) -> DataResult<Option<UserRecord>> {
        self.find_one_by("email", email).await
    }

    pub async fn find_by_username(&self, username: &str) -> DataResult<Option<UserRecord>> {
        self.find_one_by("username", username).await
    }

    async fn find_one_by(&self, field: &str, value: &str) -> DataResult<Option<UserRecord>> {
        let docs = self
            .store
            .query(USERS, Query::new().filter_eq(field, value).limit(1))
            .await?;

        Ok(docs.first().map(UserRecord::from_document))
    }

    pub async fn update(&self, id: &str, patch: UserPatch) -> DataResult<UserRecord> {
        required(self.find_by_id(id).await?, "user", "id")?;

        let mut ops = Vec::new();

        push_set(&mut ops, "display_name", patch.display_name);
        push_set(&mut ops, "bio", patch.bio);
        push_set(&mut ops, "profile_picture", patch.profile_picture);
        push_set(&mut ops, "account_type", patch.account_type.map(|a| a.as_str()));

        let doc = self.store.update(USERS, id, ops).await?;

        Ok(UserRecord::from_document(&doc))
    }

    /// Stores the password hash an account's first login produced.
    pub async fn set_password_hash(&self, id: &str, hash: &str) -> DataResult<()> {
        required(self.find_by_id(id).await?, "user", "id")?;

        self.store
            .update(
                USERS,
                id,
                vec![FieldOp::Set("password_hash".to_string(), hash.into())],
            )
            .await?;

        Ok(())
    }

    /// Finds accounts whose username starts with the given prefix.
    pub async fn search(&self, prefix: &str, limit: usize) -> DataResult<Vec<UserRecord>> {
        let ceiling = format!("{prefix}{}", Self::PREFIX_CEILING);

        let docs = self
            .store
            .query(
                USERS,
                Query::new()
                    .filter_gte("username", prefix)
                    .filter_lte("username", ceiling.as_str())
                    .order_by("username", Direction::Ascending)
                    .limit(limit),
            )
            .await?;

        Ok(docs.iter().map(UserRecord::from_document).collect())
    }

    /// Makes `follower_id` follow `followee_id`, mirroring the relationship
    /// on both documents. Following someone twice is a no-op, not an error.
    ///
    /// The two writes are individually atomic but not transactional; an
    /// interruption between them leaves the pair asymmetric until
    /// [`reconcile_follow_graph`](Self::reconcile_follow_graph) repairs it.
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> DataResult<ChangeOutcome> {
        let (follower, followee) = try_join!(
            self.store.get(USERS, follower_id),
            self.store.get(USERS, followee_id),
        )?;

        let follower = required(follower, "user", "follower")?;
        required(followee, "user", "followee")?;

        let following = reference_list_field(&follower, "following");

        if following.iter().any(|id| id == followee_id) {
            return Ok(ChangeOutcome { changed: false });
        }

        self.store
            .update(
                USERS,
                follower_id,
                vec![FieldOp::ArrayAdd("following".to_string(), followee_id.into())],
            )
            .await?;
        self.store
            .update(
                USERS,
                followee_id,
                vec![FieldOp::ArrayAdd("followers".to_string(), follower_id.into())],
            )
            .await?;

        Ok(ChangeOutcome { changed: true })
    }

    /// Symmetric removal with the same idempotence and non-transactional
    /// properties as [`follow`](Self::follow).
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> DataResult<ChangeOutcome> {
        let (follower, followee) = try_join!(
            self.store.get(USERS, follower_id),
            self.store.get(USERS, followee_id),
        )?;

        let follower = required(follower, "user", "follower")?;
        required(followee, "user", "followee")?;

        let following = reference_list_field(&follower, "following");

        if !following.iter().any(|id| id == followee_id) {
            return Ok(ChangeOutcome { changed: false });
        }

        self.store
            .update(
                USERS,
                follower_id,
                vec![FieldOp::ArrayRemove("following".to_string(), followee_id.into())],
            )
            .await?;
        self.store
            .update(
                USERS,
                followee_id,
                vec![FieldOp::ArrayRemove("followers".to_string(), follower_id.into())],
            )
            .await?;

        Ok(ChangeOutcome { changed: true })
    }

    /// Repairs asymmetric follow relationships left behind by interrupted
    /// follow calls, by re-adding the missing mirror-side membership.
    /// Returns the number of memberships restored.
    pub async fn reconcile_follow_graph(&self) -> DataResult<usize> {
        let docs = self.store.query(USERS, Query::new()).await?;

        let graph: HashMap<String, (Vec<String>, Vec<String>)> = docs
            .iter()
            .map(|doc| {
                (
                    doc.id.clone(),
                    (
                        reference_list_field(doc, "followers"),
                        reference_list_field(doc, "following"),
                    ),
                )
            })
            .collect();

        let mut repairs = 0;

        for (id, (followers, following)) in &graph {
            for followee in following {
                let Some((their_followers, _)) = graph.get(followee) else {
                    continue;
                };

                if !their_followers.contains(id) {
                    self.store
                        .update(
                            USERS,
                            followee,
                            vec![FieldOp::ArrayAdd("followers".to_string(), id.as_str().into())],
                        )
                        .await?;
                    repairs += 1;
                }
            }

            for follower in followers {
                let Some((_, their_following)) = graph.get(follower) else {
                    continue;
                };

                if !their_following.contains(id) {
                    self.store
                        .update(
                            USERS,
                            follower,
                            vec![FieldOp::ArrayAdd("following".to_string(), id.as_str().into())],
                        )
                        .await?;
                    repairs += 1;
                }
            }
        }

        Ok(repairs)
    }
}
