use std::sync::Arc;

use beatmarket_store::{fields, Direction, DocRef, Document, DocumentStore, Query};
use chrono::Utc;
use futures_util::{future::try_join_all, try_join};

use crate::collections::{BEATS, PURCHASES, USERS};
use crate::error::{required, DataResult};
use crate::mapper::{string_field, FromDocument};
use crate::util::{push_set, random_code};
use crate::{NewPurchase, PaymentStatus, PurchasePatch, PurchaseRecord};

/// Sales of beats, each carrying an issued license.
pub struct PurchaseRepository<S> {
    store: Arc<S>,
}

impl<S> PurchaseRepository<S>
where
    S: DocumentStore,
{
    const LICENSE_PREFIX: &'static str = "BM";
    const LICENSE_CODE_LENGTH: usize = 5;

    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Records a new sale with a pending status and a freshly issued
    /// license id. The license id is distinct from the document id and
    /// never changes after this call.
    pub async fn create(&self, new_purchase: NewPurchase) -> DataResult<PurchaseRecord> {
        let doc = self
            .store
            .insert(
                PURCHASES,
                fields! {
                    "beat" => DocRef::new(BEATS, new_purchase.beat),
                    "buyer" => DocRef::new(USERS, new_purchase.buyer),
                    "seller" => DocRef::new(USERS, new_purchase.seller),
                    "amount" => new_purchase.amount as i64,
                    "platform_fee" => new_purchase.platform_fee as i64,
                    "seller_amount" => new_purchase.seller_amount as i64,
                    "status" => PaymentStatus::Pending.as_str(),
                    "license_id" => Self::issue_license_id(),
                },
            )
            .await?;

        Ok(PurchaseRecord::from_document(&doc))
    }

    pub async fn find_by_id(&self, id: &str) -> DataResult<Option<PurchaseRecord>> {
        let Some(doc) = self.store.get(PURCHASES, id).await? else {
            return Ok(None);
        };

        Ok(Some(self.populate(&doc).await?))
    }

    /// A buyer's purchases, newest first.
    pub async fn find_by_buyer(
        &self,
        buyer_id: &str,
        status: Option<PaymentStatus>,
    ) -> DataResult<Vec<PurchaseRecord>> {
        self.find_by_party("buyer", buyer_id, status).await
    }

    /// A seller's sales, newest first.
    pub async fn find_by_seller(
        &self,
        seller_id: &str,
        status: Option<PaymentStatus>,
    ) -> DataResult<Vec<PurchaseRecord>> {
        self.find_by_party("seller", seller_id, status).await
    }

    /// Transitions the payment status or attaches a download url. There is
    /// deliberately no way to touch the license id here.
    pub async fn update(&self, id: &str, patch: PurchasePatch) -> DataResult<PurchaseRecord> {
        required(self.store.get(PURCHASES, id).await?, "purchase", "id")?;

        let mut ops = Vec::new();

        push_set(&mut ops, "status", patch.status.map(|s| s.as_str()));
        push_set(&mut ops, "download_url", patch.download_url);

        let doc = self.store.update(PURCHASES, id, ops).await?;

        Ok(PurchaseRecord::from_document(&doc))
    }

    async fn find_by_party(
        &self,
        field: &str,
        user_id: &str,
        status: Option<PaymentStatus>,
    ) -> DataResult<Vec<PurchaseRecord>> {
        let mut query = Query::new()
            .filter_eq(field, DocRef::new(USERS, user_id))
            .order_by("created_at", Direction::Descending);

        if let Some(status) = status {
            query = query.filter_eq("status", status.as_str());
        }

        let docs = self.store.query(PURCHASES, query).await?;

        try_join_all(docs.iter().map(|doc| self.populate(doc))).await
    }

    /// Maps a document and resolves the beat and both parties for display.
    /// Rows referencing since-removed documents keep their bare ids.
    async fn populate(&self, doc: &Document) -> DataResult<PurchaseRecord> {
        let mut record = PurchaseRecord::from_document(doc);

        let (beat, buyer, seller) = try_join!(
            self.store.get(BEATS, &record.beat),
            self.store.get(USERS, &record.buyer),
            self.store.get(USERS, &record.seller),
        )?;

        record.beat_title = beat.map(|b| string_field(&b, "title"));
        record.buyer_name = buyer.map(|b| string_field(&b, "display_name"));
        record.seller_name = seller.map(|s| string_field(&s, "display_name"));

        Ok(record)
    }

    /// License ids look like `BM-20240501-7Q2FX`: a fixed prefix, the UTC
    /// date of issuance, and a random code.
    fn issue_license_id() -> String {
        format!(
            "{}-{}-{}",
            Self::LICENSE_PREFIX,
            Utc::now().format("%Y%m%d"),
            random_code(Self::LICENSE_CODE_LENGTH),
        )
    }
}
