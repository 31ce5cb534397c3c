//! User account database operations

use super::models::User;
use super::pool::{DbError, DbPool};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, name, avatar_url, created_at, updated_at, last_sign_in_at, metadata";

fn row_to_user(row: &tokio_postgres::Row) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_sign_in_at: row.get("last_sign_in_at"),
        metadata: row.get("metadata"),
    }
}

/// Fields accepted by a profile update. None leaves the column untouched.
#[derive(Debug, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Option<Value>,
}

/// Repository for user operations
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"),
                &[&email],
            )
            .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn create(&self, email: &str, name: Option<&str>) -> Result<User, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                &format!(
                    "INSERT INTO users (email, name, updated_at) VALUES ($1, $2, NOW()) \
                     RETURNING {USER_COLUMNS}"
                ),
                &[&email, &name],
            )
            .await?;

        let user = row_to_user(&row);
        info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    /// Update profile fields; omitted fields keep their current value
    pub async fn update_profile(&self, id: Uuid, update: UpdateProfile) -> Result<Option<User>, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &format!(
                    r#"
                    UPDATE users SET
                        name = COALESCE($2, name),
                        avatar_url = COALESCE($3, avatar_url),
                        metadata = COALESCE($4, metadata),
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING {USER_COLUMNS}
                    "#
                ),
                &[&id, &update.name, &update.avatar_url, &update.metadata],
            )
            .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn record_sign_in(&self, id: Uuid) -> Result<(), DbError> {
        let client = self.pool.get().await?;

        client
            .execute("UPDATE users SET last_sign_in_at = NOW() WHERE id = $1", &[&id])
            .await?;

        Ok(())
    }

    /// Delete an account. Keys, usage events and passkeys cascade.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let client = self.pool.get().await?;

        let deleted = client.execute("DELETE FROM users WHERE id = $1", &[&id]).await?;

        if deleted > 0 {
            warn!(user_id = %id, "User account deleted");
        }

        Ok(deleted > 0)
    }
}
