//! Composable tenant and soft-delete predicates, and a generic store applying them
//!
//! Every query against a tenant-owned table goes through a [`Scope`]. The scope
//! is explicit at the call site: there is no implicit per-model filtering, and
//! the default produced from a missing ambient tenant matches nothing.

use super::map_conflict_if_duplicate;
use crate::domain::StringUuid;
use crate::error::{AppError, Result};
use crate::service::context::ambient;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{Encode, FromRow, MySql, MySqlPool, QueryBuilder, Type};
use std::marker::PhantomData;

/// Company predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantFilter {
    /// No company restriction (platform-level access)
    Any,
    Only(StringUuid),
    /// Matches no rows
    Nothing,
}

/// Soft-delete predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Liveness {
    #[default]
    Live,
    IncludeDeleted,
    DeletedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub tenant: TenantFilter,
    pub liveness: Liveness,
}

impl Scope {
    /// Rows of one tenant that are not soft-deleted.
    pub fn tenant(tenant_id: StringUuid) -> Self {
        Self {
            tenant: TenantFilter::Only(tenant_id),
            liveness: Liveness::Live,
        }
    }

    /// Rows of the tenant bound to the current task, or nothing when none is bound.
    pub fn ambient() -> Self {
        let tenant = match ambient::current_tenant_id() {
            Some(id) => TenantFilter::Only(id),
            None => TenantFilter::Nothing,
        };
        Self {
            tenant,
            liveness: Liveness::Live,
        }
    }

    /// Every tenant; only the soft-delete predicate applies.
    pub fn unscoped() -> Self {
        Self {
            tenant: TenantFilter::Any,
            liveness: Liveness::Live,
        }
    }

    pub fn including_deleted(mut self) -> Self {
        self.liveness = Liveness::IncludeDeleted;
        self
    }

    pub fn deleted_only(mut self) -> Self {
        self.liveness = Liveness::DeletedOnly;
        self
    }

    /// Append ` WHERE <predicates>` to `qb`.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, MySql>, tenant_column: &str) {
        qb.push(" WHERE ");
        match self.tenant {
            TenantFilter::Any => qb.push("1 = 1"),
            TenantFilter::Only(id) => qb.push(tenant_column).push(" = ").push_bind(id),
            TenantFilter::Nothing => qb.push("1 = 0"),
        };
        match self.liveness {
            Liveness::Live => {
                qb.push(" AND is_deleted = FALSE");
            }
            Liveness::IncludeDeleted => {}
            Liveness::DeletedOnly => {
                qb.push(" AND is_deleted = TRUE");
            }
        }
    }

    /// In-memory evaluation of the same predicate.
    pub fn admits(&self, tenant_id: StringUuid, is_deleted: bool) -> bool {
        let tenant_ok = match self.tenant {
            TenantFilter::Any => true,
            TenantFilter::Only(id) => id == tenant_id,
            TenantFilter::Nothing => false,
        };
        let liveness_ok = match self.liveness {
            Liveness::Live => !is_deleted,
            Liveness::IncludeDeleted => true,
            Liveness::DeletedOnly => is_deleted,
        };
        tenant_ok && liveness_ok
    }
}

/// A soft-deletable row served through [`ScopedStore`].
///
/// Tables must carry `id`, `is_deleted`, `deleted_at`, `deleted_by`,
/// `created_at` and `updated_at` columns.
pub trait ScopedEntity: for<'r> FromRow<'r, MySqlRow> + Send + Unpin + 'static {
    const TABLE: &'static str;
    /// Select list, in `FromRow` order
    const COLUMNS: &'static str;
    /// Column holding the owning tenant id (`id` for the tenants table itself)
    const TENANT_COLUMN: &'static str;
}

/// Generic data access for [`ScopedEntity`] tables.
pub struct ScopedStore<E> {
    pool: MySqlPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for ScopedStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: ScopedEntity> ScopedStore<E> {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn select(scope: &Scope) -> QueryBuilder<'static, MySql> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM {}", E::COLUMNS, E::TABLE));
        scope.push_where(&mut qb, E::TENANT_COLUMN);
        qb
    }

    pub async fn find(&self, scope: Scope, id: StringUuid) -> Result<Option<E>> {
        let mut qb = Self::select(&scope);
        qb.push(" AND id = ").push_bind(id);
        let row = qb.build_query_as::<E>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn list(&self, scope: Scope) -> Result<Vec<E>> {
        let mut qb = Self::select(&scope);
        qb.push(" ORDER BY created_at ASC");
        let rows = qb.build_query_as::<E>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Whether any row within `scope` has `column = value`.
    pub async fn exists<V>(&self, scope: Scope, column: &'static str, value: V) -> Result<bool>
    where
        V: for<'q> Encode<'q, MySql> + Type<MySql> + Send + 'static,
    {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", E::TABLE));
        scope.push_where(&mut qb, E::TENANT_COLUMN);
        qb.push(" AND ").push(column).push(" = ").push_bind(value);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count > 0)
    }

    pub async fn soft_delete(
        &self,
        id: StringUuid,
        actor: Option<StringUuid>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = ?, deleted_by = ?, updated_at = ? \
             WHERE id = ? AND is_deleted = FALSE",
            E::TABLE
        );
        let result = sqlx::query(&sql)
            .bind(now)
            .bind(actor)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", E::TABLE, id)));
        }
        Ok(())
    }

    /// Clear every deletion field in a single statement.
    pub async fn restore(&self, id: StringUuid) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET is_deleted = FALSE, deleted_at = NULL, deleted_by = NULL, updated_at = NOW() \
             WHERE id = ? AND is_deleted = TRUE",
            E::TABLE
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_conflict_if_duplicate(e, &format!("{} {} conflicts with a live record", E::TABLE, id))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Deleted {} {} not found",
                E::TABLE,
                id
            )));
        }
        Ok(())
    }

    /// Physical delete. Not recoverable.
    pub async fn hard_delete(&self, id: StringUuid) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", E::TABLE, id)));
        }
        Ok(())
    }
}
