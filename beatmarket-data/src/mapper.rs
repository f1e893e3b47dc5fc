//! Conversion from raw stored documents to plain application records.
//!
//! Everything here is total and free of store I/O: a missing or oddly-typed
//! field degrades to an empty value instead of failing, timestamps become
//! RFC 3339 strings, and reference fields are reduced to the bare id of the
//! document they point to. Resolving a reference into a full record is
//! always a separate repository call.

use beatmarket_store::{Document, Value};
use chrono::SecondsFormat;

use crate::{
    AccountType, BeatRecord, CommentRecord, MessageRecord, NotificationRecord, PaymentStatus,
    PurchaseRecord, TenantRecord, UserRecord,
};

/// A plain record that can be read out of a stored document.
pub trait FromDocument {
    fn from_document(doc: &Document) -> Self;
}

pub(crate) fn string_field(doc: &Document, field: &str) -> String {
    opt_string_field(doc, field).unwrap_or_default()
}

pub(crate) fn opt_string_field(doc: &Document, field: &str) -> Option<String> {
    doc.field(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

pub(crate) fn int_field(doc: &Document, field: &str) -> i64 {
    doc.field(field).and_then(Value::as_int).unwrap_or(0)
}

pub(crate) fn bool_field(doc: &Document, field: &str) -> bool {
    doc.field(field).and_then(Value::as_bool).unwrap_or(false)
}

/// Renders a store-native timestamp as an RFC 3339 string, `None` if absent.
pub(crate) fn timestamp_field(doc: &Document, field: &str) -> Option<String> {
    doc.field(field)
        .and_then(Value::as_timestamp)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Reduces a reference value to the bare id of the document it points to.
/// A plain string is taken to already be a bare id.
fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::Reference(r) => Some(r.id.clone()),
        Value::Str(s) => Some(s.clone()),
        _ => None,
    }
}

pub(crate) fn reference_field(doc: &Document, field: &str) -> String {
    opt_reference_field(doc, field).unwrap_or_default()
}

pub(crate) fn opt_reference_field(doc: &Document, field: &str) -> Option<String> {
    doc.field(field).and_then(reference_id)
}

/// Reduces an array of references to bare ids, element-wise.
pub(crate) fn reference_list_field(doc: &Document, field: &str) -> Vec<String> {
    doc.field(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(reference_id).collect())
        .unwrap_or_default()
}

pub(crate) fn string_list_field(doc: &Document, field: &str) -> Vec<String> {
    doc.field(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl FromDocument for UserRecord {
    fn from_document(doc: &Document) -> Self {
        UserRecord {
            id: doc.id.clone(),
            username: string_field(doc, "username"),
            email: string_field(doc, "email"),
            password_hash: opt_string_field(doc, "password_hash"),
            // Unknown account types read as the least privileged one
            account_type: AccountType::parse(&string_field(doc, "account_type"))
                .unwrap_or(AccountType::Fan),
            display_name: string_field(doc, "display_name"),
            bio: opt_string_field(doc, "bio"),
            profile_picture: opt_string_field(doc, "profile_picture"),
            followers: reference_list_field(doc, "followers"),
            following: reference_list_field(doc, "following"),
            created_at: timestamp_field(doc, "created_at"),
            updated_at: timestamp_field(doc, "updated_at"),
        }
    }
}

impl FromDocument for BeatRecord {
    fn from_document(doc: &Document) -> Self {
        BeatRecord {
            id: doc.id.clone(),
            title: string_field(doc, "title"),
            description: string_field(doc, "description"),
            genre: string_field(doc, "genre"),
            bpm: int_field(doc, "bpm").max(0) as u32,
            key: string_field(doc, "key"),
            price: int_field(doc, "price").max(0) as u64,
            audio_url: string_field(doc, "audio_url"),
            preview_url: string_field(doc, "preview_url"),
            artwork_url: string_field(doc, "artwork_url"),
            tags: string_list_field(doc, "tags"),
            plays: int_field(doc, "plays").max(0) as u64,
            is_deleted: bool_field(doc, "is_deleted"),
            producer: reference_field(doc, "producer"),
            likes: reference_list_field(doc, "likes"),
            producer_name: None,
            producer_picture: None,
            created_at: timestamp_field(doc, "created_at"),
            updated_at: timestamp_field(doc, "updated_at"),
        }
    }
}

impl FromDocument for PurchaseRecord {
    fn from_document(doc: &Document) -> Self {
        PurchaseRecord {
            id: doc.id.clone(),
            beat: reference_field(doc, "beat"),
            buyer: reference_field(doc, "buyer"),
            seller: reference_field(doc, "seller"),
            amount: int_field(doc, "amount").max(0) as u64,
            platform_fee: int_field(doc, "platform_fee").max(0) as u64,
            seller_amount: int_field(doc, "seller_amount").max(0) as u64,
            status: PaymentStatus::parse(&string_field(doc, "status"))
                .unwrap_or(PaymentStatus::Pending),
            download_url: opt_string_field(doc, "download_url"),
            license_id: string_field(doc, "license_id"),
            beat_title: None,
            buyer_name: None,
            seller_name: None,
            created_at: timestamp_field(doc, "created_at"),
            updated_at: timestamp_field(doc, "updated_at"),
        }
    }
}

impl FromDocument for CommentRecord {
    fn from_document(doc: &Document) -> Self {
        CommentRecord {
            id: doc.id.clone(),
            beat: reference_field(doc, "beat"),
            user: reference_field(doc, "user"),
            content: string_field(doc, "content"),
            created_at: timestamp_field(doc, "created_at"),
        }
    }
}

impl FromDocument for MessageRecord {
    fn from_document(doc: &Document) -> Self {
        MessageRecord {
            id: doc.id.clone(),
            sender: reference_field(doc, "sender"),
            receiver: reference_field(doc, "receiver"),
            content: string_field(doc, "content"),
            read: bool_field(doc, "read"),
            created_at: timestamp_field(doc, "created_at"),
        }
    }
}

impl FromDocument for NotificationRecord {
    fn from_document(doc: &Document) -> Self {
        NotificationRecord {
            id: doc.id.clone(),
            user: reference_field(doc, "user"),
            kind: string_field(doc, "kind"),
            title: string_field(doc, "title"),
            body: string_field(doc, "body"),
            related_id: opt_reference_field(doc, "related_id"),
            read: bool_field(doc, "read"),
            created_at: timestamp_field(doc, "created_at"),
        }
    }
}

impl FromDocument for TenantRecord {
    fn from_document(doc: &Document) -> Self {
        TenantRecord {
            id: doc.id.clone(),
            name: string_field(doc, "name"),
            domain: string_field(doc, "domain"),
            description: opt_string_field(doc, "description"),
            active: bool_field(doc, "active"),
            admin_ids: reference_list_field(doc, "admin_ids"),
            created_at: timestamp_field(doc, "created_at"),
            updated_at: timestamp_field(doc, "updated_at"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatmarket_store::{fields, DocRef, Fields, Value};
    use chrono::{TimeZone, Utc};

    fn doc(fields: Fields) -> Document {
        Document {
            id: "d1".to_string(),
            fields,
        }
    }

    #[test]
    fn test_timestamps_become_rfc3339_or_none() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let doc = doc(fields! { "created_at" => at });

        assert_eq!(
            timestamp_field(&doc, "created_at").as_deref(),
            Some("2024-05-01T12:00:00.000000Z")
        );
        assert_eq!(timestamp_field(&doc, "updated_at"), None);
    }

    #[test]
    fn test_references_reduce_to_bare_ids() {
        let doc = doc(fields! {
            "producer" => DocRef::new("users", "u1"),
            "related_id" => "b2",
            "likes" => vec![
                Value::from(DocRef::new("users", "u2")),
                Value::from("u3"),
            ],
        });

        assert_eq!(reference_field(&doc, "producer"), "u1");
        assert_eq!(opt_reference_field(&doc, "related_id").as_deref(), Some("b2"));
        assert_eq!(reference_list_field(&doc, "likes"), ["u2", "u3"]);
    }

    #[test]
    fn test_user_record_without_password() {
        let doc = doc(fields! {
            "username" => "alice",
            "email" => "alice@example.com",
            "account_type" => "producer",
            "display_name" => "Alice",
        });

        let record = UserRecord::from_document(&doc);

        assert_eq!(record.username, "alice");
        assert_eq!(record.account_type, AccountType::Producer);
        assert_eq!(record.password_hash, None);
        assert!(record.followers.is_empty());

        // The password hash never serializes
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
