use std::sync::Arc;

use beatmarket_store::{fields, Direction, DocumentStore, FieldOp, Query, Value};
use futures_util::try_join;

use crate::collections::{TENANTS, USERS};
use crate::error::{required, DataResult, EnsureVacant};
use crate::mapper::{reference_list_field, FromDocument};
use crate::util::push_set;
use crate::{ChangeOutcome, NewTenant, TenantPatch, TenantRecord};

/// White-label tenants and their admin sets.
pub struct TenantRepository<S> {
    store: Arc<S>,
}

impl<S> TenantRepository<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a tenant. Names are kept unique the same way usernames are:
    /// a lookup before the write, nothing store-enforced.
    pub async fn create(&self, new_tenant: NewTenant) -> DataResult<TenantRecord> {
        self.find_by_name(&new_tenant.name)
            .await
            .ensure_vacant("tenant", "name", &new_tenant.name)?;

        let doc = self
            .store
            .insert(
                TENANTS,
                fields! {
                    "name" => new_tenant.name,
                    "domain" => new_tenant.domain,
                    "description" => new_tenant.description,
                    "active" => true,
                    "admin_ids" => Vec::<Value>::new(),
                },
            )
            .await?;

        Ok(TenantRecord::from_document(&doc))
    }

    pub async fn find_by_id(&self, id: &str) -> DataResult<Option<TenantRecord>> {
        let doc = self.store.get(TENANTS, id).await?;

        Ok(doc.map(|d| TenantRecord::from_document(&d)))
    }

    pub async fn find_by_name(&self, name: &str) -> DataResult<Option<TenantRecord>> {
        let docs = self
            .store
            .query(TENANTS, Query::new().filter_eq("name", name).limit(1))
            .await?;

        Ok(docs.first().map(TenantRecord::from_document))
    }

    pub async fn find_all(&self, active_only: bool) -> DataResult<Vec<TenantRecord>> {
        let mut query = Query::new().order_by("created_at", Direction::Descending);

        if active_only {
            query = query.filter_eq("active", true);
        }

        let docs = self.store.query(TENANTS, query).await?;

        Ok(docs.iter().map(TenantRecord::from_document).collect())
    }

    pub async fn update(&self, id: &str, patch: TenantPatch) -> DataResult<TenantRecord> {
        required(self.find_by_id(id).await?, "tenant", "id")?;

        let mut ops = Vec::new();

        push_set(&mut ops, "name", patch.name);
        push_set(&mut ops, "domain", patch.domain);
        push_set(&mut ops, "description", patch.description);

        let doc = self.store.update(TENANTS, id, ops).await?;

        Ok(TenantRecord::from_document(&doc))
    }

    /// Flags the tenant inactive instead of removing it.
    pub async fn deactivate(&self, id: &str) -> DataResult<()> {
        required(self.find_by_id(id).await?, "tenant", "id")?;

        self.store
            .update(
                TENANTS,
                id,
                vec![FieldOp::Set("active".to_string(), false.into())],
            )
            .await?;

        Ok(())
    }

    /// Grants a user tenant admin rights. Adding an existing admin is a
    /// no-op, not an error.
    pub async fn add_admin(&self, tenant_id: &str, user_id: &str) -> DataResult<ChangeOutcome> {
        let (tenant, user) = try_join!(
            self.store.get(TENANTS, tenant_id),
            self.store.get(USERS, user_id),
        )?;

        let tenant = required(tenant, "tenant", "id")?;
        required(user, "user", "id")?;

        let admin_ids = reference_list_field(&tenant, "admin_ids");

        if admin_ids.iter().any(|id| id == user_id) {
            return Ok(ChangeOutcome { changed: false });
        }

        self.store
            .update(
                TENANTS,
                tenant_id,
                vec![FieldOp::ArrayAdd("admin_ids".to_string(), user_id.into())],
            )
            .await?;

        Ok(ChangeOutcome { changed: true })
    }

    pub async fn remove_admin(&self, tenant_id: &str, user_id: &str) -> DataResult<ChangeOutcome> {
        let tenant = required(self.store.get(TENANTS, tenant_id).await?, "tenant", "id")?;
        let admin_ids = reference_list_field(&tenant, "admin_ids");

        if !admin_ids.iter().any(|id| id == user_id) {
            return Ok(ChangeOutcome { changed: false });
        }

        self.store
            .update(
                TENANTS,
                tenant_id,
                vec![FieldOp::ArrayRemove("admin_ids".to_string(), user_id.into())],
            )
            .await?;

        Ok(ChangeOutcome { changed: true })
    }
}
