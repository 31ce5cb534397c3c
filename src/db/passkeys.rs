//! Passkey credential registry operations
//!
//! WebAuthn ceremony verification is delegated to the auth frontend; this
//! repository only manages the stored credential records.

use super::models::Passkey;
use super::pool::{DbError, DbPool};
use tracing::{info, warn};
use uuid::Uuid;

const PASSKEY_COLUMNS: &str = "id, user_id, credential_id, public_key, device_type, \
     friendly_name, sign_count, created_at, last_used_at";

fn row_to_passkey(row: &tokio_postgres::Row) -> Passkey {
    Passkey {
        id: row.get("id"),
        user_id: row.get("user_id"),
        credential_id: row.get("credential_id"),
        public_key: row.get("public_key"),
        device_type: row.get("device_type"),
        friendly_name: row.get("friendly_name"),
        sign_count: row.get("sign_count"),
        created_at: row.get("created_at"),
        last_used_at: row.get("last_used_at"),
    }
}

/// A verified credential to register
#[derive(Debug)]
pub struct RegisterPasskey {
    pub user_id: Uuid,
    pub credential_id: String,
    pub public_key: String,
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
}

/// Repository for passkey registry operations
pub struct PasskeyRepository {
    pool: DbPool,
}

impl PasskeyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a credential the auth frontend has already verified
    pub async fn register(&self, request: RegisterPasskey) -> Result<Passkey, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                &format!(
                    r#"
                    INSERT INTO passkeys (user_id, credential_id, public_key, device_type, friendly_name)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {PASSKEY_COLUMNS}
                    "#
                ),
                &[
                    &request.user_id,
                    &request.credential_id,
                    &request.public_key,
                    &request.device_type,
                    &request.friendly_name,
                ],
            )
            .await?;

        let passkey = row_to_passkey(&row);
        info!(passkey_id = %passkey.id, user_id = %passkey.user_id, "Registered passkey");
        Ok(passkey)
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Passkey>, DbError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                &format!(
                    "SELECT {PASSKEY_COLUMNS} FROM passkeys \
                     WHERE user_id = $1 ORDER BY created_at DESC"
                ),
                &[&user_id],
            )
            .await?;

        Ok(rows.iter().map(row_to_passkey).collect())
    }

    /// Rename a passkey, scoped to its owner
    pub async fn rename(&self, id: Uuid, user_id: Uuid, friendly_name: &str) -> Result<bool, DbError> {
        let client = self.pool.get().await?;

        let updated = client
            .execute(
                "UPDATE passkeys SET friendly_name = $3 WHERE id = $1 AND user_id = $2",
                &[&id, &user_id, &friendly_name],
            )
            .await?;

        Ok(updated > 0)
    }

    /// Bump the signature counter after a successful assertion upstream
    pub async fn record_use(&self, id: Uuid, user_id: Uuid, sign_count: i64) -> Result<bool, DbError> {
        let client = self.pool.get().await?;

        let updated = client
            .execute(
                "UPDATE passkeys SET sign_count = $3, last_used_at = NOW() \
                 WHERE id = $1 AND user_id = $2",
                &[&id, &user_id, &sign_count],
            )
            .await?;

        Ok(updated > 0)
    }

    /// Delete a passkey, scoped to its owner
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, DbError> {
        let client = self.pool.get().await?;

        let deleted = client
            .execute(
                "DELETE FROM passkeys WHERE id = $1 AND user_id = $2",
                &[&id, &user_id],
            )
            .await?;

        if deleted > 0 {
            warn!(passkey_id = %id, user_id = %user_id, "Passkey deleted");
        }

        Ok(deleted > 0)
    }
}
