//! Role permission set repository

use crate::domain::{Capability, RoleLevel, RolePermissionSet, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::{MySqlConnection, MySqlPool};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RolePermissionRepository: Send + Sync {
    async fn find(
        &self,
        tenant_id: StringUuid,
        role_level: RoleLevel,
    ) -> Result<Option<RolePermissionSet>>;
    async fn list(&self, tenant_id: StringUuid) -> Result<Vec<RolePermissionSet>>;
    /// Overwrite every flag of an existing row
    async fn save(&self, set: &RolePermissionSet) -> Result<RolePermissionSet>;
}

pub struct RolePermissionRepositoryImpl {
    pool: MySqlPool,
}

impl RolePermissionRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn capability_columns() -> String {
    Capability::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn select_sql(filter: &str) -> String {
    format!(
        "SELECT tenant_id, role_level, {}, updated_at FROM role_permission_sets WHERE {}",
        capability_columns(),
        filter
    )
}

/// Insert a seeded row. Used inside the tenant provisioning transaction.
pub(crate) async fn insert_role_permission_set(
    conn: &mut MySqlConnection,
    set: &RolePermissionSet,
) -> Result<()> {
    let placeholders = vec!["?"; Capability::COUNT].join(", ");
    let sql = format!(
        "INSERT INTO role_permission_sets (tenant_id, role_level, {}, updated_at) VALUES (?, ?, {}, ?)",
        capability_columns(),
        placeholders
    );

    let mut query = sqlx::query(&sql).bind(set.tenant_id).bind(set.role_level);
    for capability in Capability::ALL {
        query = query.bind(set.get(capability));
    }
    query.bind(set.updated_at).execute(&mut *conn).await?;
    Ok(())
}

#[async_trait]
impl RolePermissionRepository for RolePermissionRepositoryImpl {
    async fn find(
        &self,
        tenant_id: StringUuid,
        role_level: RoleLevel,
    ) -> Result<Option<RolePermissionSet>> {
        let sql = select_sql("tenant_id = ? AND role_level = ?");
        let set = sqlx::query_as::<_, RolePermissionSet>(&sql)
            .bind(tenant_id)
            .bind(role_level)
            .fetch_optional(&self.pool)
            .await?;

        Ok(set)
    }

    async fn list(&self, tenant_id: StringUuid) -> Result<Vec<RolePermissionSet>> {
        let sql = select_sql("tenant_id = ?");
        let mut sets = sqlx::query_as::<_, RolePermissionSet>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        sets.sort_by_key(|s| s.role_level);
        Ok(sets)
    }

    async fn save(&self, set: &RolePermissionSet) -> Result<RolePermissionSet> {
        let assignments = Capability::ALL
            .iter()
            .map(|c| format!("{} = ?", c.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE role_permission_sets SET {}, updated_at = ? WHERE tenant_id = ? AND role_level = ?",
            assignments
        );

        let mut query = sqlx::query(&sql);
        for capability in Capability::ALL {
            query = query.bind(set.get(capability));
        }
        let result = query
            .bind(set.updated_at)
            .bind(set.tenant_id)
            .bind(set.role_level)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Role permissions for {} in tenant {} not found",
                set.role_level, set.tenant_id
            )));
        }

        self.find(set.tenant_id, set.role_level).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Failed to reload role permissions"))
        })
    }
}
