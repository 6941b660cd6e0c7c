//! Session-stored tenant selector

use crate::domain::StringUuid;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Raw stored selector. May be stale or malformed.
    async fn get_selected_tenant(&self, session_key: &str) -> Result<Option<String>>;
    async fn set_selected_tenant(&self, session_key: &str, tenant_id: StringUuid) -> Result<()>;
    async fn clear_selected_tenant(&self, session_key: &str) -> Result<()>;
}

pub struct SessionRepositoryImpl {
    pool: MySqlPool,
}

impl SessionRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SessionRepositoryImpl {
    async fn get_selected_tenant(&self, session_key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT selected_tenant_id FROM tenant_sessions WHERE session_key = ?",
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set_selected_tenant(&self, session_key: &str, tenant_id: StringUuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenant_sessions (session_key, selected_tenant_id, updated_at)
            VALUES (?, ?, NOW())
            ON DUPLICATE KEY UPDATE selected_tenant_id = VALUES(selected_tenant_id), updated_at = NOW()
            "#,
        )
        .bind(session_key)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_selected_tenant(&self, session_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM tenant_sessions WHERE session_key = ?")
            .bind(session_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
