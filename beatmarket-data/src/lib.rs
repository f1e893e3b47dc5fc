mod beats;
mod comments;
mod error;
mod mapper;
mod messages;
mod notifications;
mod purchases;
mod records;
mod tenants;
mod users;
mod util;

use std::sync::Arc;

pub use beats::*;
pub use comments::*;
pub use error::*;
pub use mapper::FromDocument;
pub use messages::*;
pub use notifications::*;
pub use purchases::*;
pub use records::*;
pub use tenants::*;
pub use users::*;

use beatmarket_store::DocumentStore;

/// Collection names shared by the reference-resolution convention.
pub(crate) mod collections {
    pub const USERS: &str = "users";
    pub const BEATS: &str = "beats";
    pub const PURCHASES: &str = "purchases";
    pub const COMMENTS: &str = "comments";
    pub const MESSAGES: &str = "messages";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const TENANTS: &str = "tenants";
}

/// The beatmarket data layer, one repository per entity over a shared store.
pub struct DataLayer<S> {
    pub users: UserRepository<S>,
    pub beats: BeatRepository<S>,
    pub purchases: PurchaseRepository<S>,
    pub comments: CommentRepository<S>,
    pub messages: MessageRepository<S>,
    pub notifications: NotificationRepository<S>,
    pub tenants: TenantRepository<S>,
}

impl<S> DataLayer<S>
where
    S: DocumentStore,
{
    pub fn new(store: S) -> Self {
        let store = Arc::new(store);

        Self {
            users: UserRepository::new(store.clone()),
            beats: BeatRepository::new(store.clone()),
            purchases: PurchaseRepository::new(store.clone()),
            comments: CommentRepository::new(store.clone()),
            messages: MessageRepository::new(store.clone()),
            notifications: NotificationRepository::new(store.clone()),
            tenants: TenantRepository::new(store),
        }
    }
}
