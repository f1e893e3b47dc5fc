use serde::Serialize;

/// What an account can do on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Producer,
    Artist,
    Fan,
    Admin,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Producer => "producer",
            AccountType::Artist => "artist",
            AccountType::Fan => "fan",
            AccountType::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "producer" => Some(AccountType::Producer),
            "artist" => Some(AccountType::Artist),
            "fan" => Some(AccountType::Fan),
            "admin" => Some(AccountType::Admin),
            _ => None,
        }
    }
}

/// Where a purchase is in its payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// A marketplace account
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Absent until the account's first login stores one
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub account_type: AccountType,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    /// Ids of users following this account
    pub followers: Vec<String>,
    /// Ids of users this account follows
    pub following: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub account_type: AccountType,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Default)]
pub struct UserPatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub account_type: Option<AccountType>,
}

/// A beat listed on the marketplace
#[derive(Debug, Clone, Serialize)]
pub struct BeatRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub bpm: u32,
    /// Musical key, e.g. "C#m"
    pub key: String,
    /// Price in minor currency units
    pub price: u64,
    pub audio_url: String,
    pub preview_url: String,
    pub artwork_url: String,
    pub tags: Vec<String>,
    pub plays: u64,
    pub is_deleted: bool,
    /// Id of the producer that owns this beat
    pub producer: String,
    /// Ids of users that like this beat
    pub likes: Vec<String>,
    /// Producer details resolved at read time, absent if the producer
    /// could not be resolved
    pub producer_name: Option<String>,
    pub producer_picture: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug)]
pub struct NewBeat {
    pub title: String,
    pub description: String,
    pub genre: String,
    pub bpm: u32,
    pub key: String,
    pub price: u64,
    pub audio_url: String,
    pub preview_url: String,
    pub artwork_url: String,
    pub tags: Vec<String>,
    pub producer: String,
}

#[derive(Debug, Default)]
pub struct BeatPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub bpm: Option<u32>,
    pub key: Option<String>,
    pub price: Option<u64>,
    pub artwork_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Filters applied by the beat listing
#[derive(Debug, Default)]
pub struct BeatFilters {
    pub genre: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub bpm: Option<u32>,
    pub producer: Option<String>,
    /// Case-insensitive substring match over title, description, and genre
    pub search: Option<String>,
}

/// A completed or in-flight sale of a beat
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRecord {
    pub id: String,
    pub beat: String,
    pub buyer: String,
    pub seller: String,
    /// Gross amount in minor currency units
    pub amount: u64,
    pub platform_fee: u64,
    pub seller_amount: u64,
    pub status: PaymentStatus,
    pub download_url: Option<String>,
    /// Human-facing license code, issued once and never reassigned
    pub license_id: String,
    /// Details resolved at read time for listings
    pub beat_title: Option<String>,
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug)]
pub struct NewPurchase {
    pub beat: String,
    pub buyer: String,
    pub seller: String,
    pub amount: u64,
    pub platform_fee: u64,
    pub seller_amount: u64,
}

/// Note the absence of a license field; a license id can't be reassigned
#[derive(Debug, Default)]
pub struct PurchasePatch {
    pub status: Option<PaymentStatus>,
    pub download_url: Option<String>,
}

/// A comment left on a beat
#[derive(Debug, Clone, Serialize)]
pub struct CommentRecord {
    pub id: String,
    pub beat: String,
    pub user: String,
    pub content: String,
    pub created_at: Option<String>,
}

#[derive(Debug)]
pub struct NewComment {
    pub beat: String,
    pub user: String,
    pub content: String,
}

/// A direct message between two users
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub read: bool,
    pub created_at: Option<String>,
}

#[derive(Debug)]
pub struct NewMessage {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

/// One row of a user's conversation list
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    /// The other participant
    pub counterpart: String,
    pub last_message: String,
    pub last_message_at: Option<String>,
    /// Unread messages where this user is the receiver
    pub unread_count: usize,
}

/// Something a user should be told about
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: String,
    pub user: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    /// Id of the entity this notification is about, carried opaquely
    pub related_id: Option<String>,
    pub read: bool,
    pub created_at: Option<String>,
}

#[derive(Debug)]
pub struct NewNotification {
    pub user: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub related_id: Option<String>,
}

/// A white-label tenant of the platform
#[derive(Debug, Clone, Serialize)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub description: Option<String>,
    pub active: bool,
    pub admin_ids: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug)]
pub struct NewTenant {
    pub name: String,
    pub domain: String,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
}

/// Result of an operation that may be an idempotent no-op
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChangeOutcome {
    /// False when the operation found nothing to do
    pub changed: bool,
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeOutcome {
    /// Whether the user likes the beat after the call
    pub liked: bool,
}
