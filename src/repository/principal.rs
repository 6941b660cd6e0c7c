//! Principal repository (read-only view of the identity store)

use crate::domain::{Principal, StringUuid};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Principal>>;
}

pub struct PrincipalRepositoryImpl {
    pool: MySqlPool,
}

impl PrincipalRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalRepository for PrincipalRepositoryImpl {
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, email, is_superuser, is_staff, is_active
            FROM principals
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }
}
