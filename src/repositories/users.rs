use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::user::{AuthProvider, NewUser, User};

/// The relational identity store.
///
/// A session resolves to a user through `find_by_id`; login resolves a
/// provider identity through `find_by_provider` and falls back to
/// `create`. Absence is a normal outcome everywhere, never an error.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<User>>;

    async fn create(&self, new_user: NewUser) -> Result<User>;

    /// Refreshes the profile fields reported by the identity provider.
    async fn update_profile(
        &self,
        id: Uuid,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<Option<User>>;
}

/// PostgreSQL-backed `UserRepository`.
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, display_name, avatar_url, provider, provider_id,
                       created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .await?;

        let row = client.query_opt(&stmt, &[&id]).await?;
        Ok(row.as_ref().map(User::from_row))
    }

    async fn find_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, display_name, avatar_url, provider, provider_id,
                       created_at, updated_at
                FROM users
                WHERE provider = $1 AND provider_id = $2
                "#,
            )
            .await?;

        let row = client.query_opt(&stmt, &[&provider, &provider_id]).await?;
        Ok(row.as_ref().map(User::from_row))
    }

    async fn create(&self, new_user: NewUser) -> Result<User> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO users (id, display_name, avatar_url, provider, provider_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, display_name, avatar_url, provider, provider_id,
                          created_at, updated_at
                "#,
            )
            .await?;

        let row = client
            .query_one(
                &stmt,
                &[
                    &new_user.id,
                    &new_user.display_name,
                    &new_user.avatar_url,
                    &new_user.provider,
                    &new_user.provider_id,
                ],
            )
            .await?;

        Ok(User::from_row(&row))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                UPDATE users
                SET display_name = $2, avatar_url = $3, updated_at = now()
                WHERE id = $1
                RETURNING id, display_name, avatar_url, provider, provider_id,
                          created_at, updated_at
                "#,
            )
            .await?;

        let row = client
            .query_opt(&stmt, &[&id, &display_name, &avatar_url])
            .await?;
        Ok(row.as_ref().map(User::from_row))
    }
}
