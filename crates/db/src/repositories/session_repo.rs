//! Refresh-token sessions (`user_sessions`).
//!
//! Only the SHA-256 digest of a refresh token is stored. A session is live
//! while it is neither revoked nor past `expires_at`.

use sqlx::PgPool;
use formcraft_core::types::DbId;

use crate::models::session::{CreateSession, UserSession};

const COLUMNS: &str = "id, user_id, refresh_token_hash, expires_at, is_revoked, created_at, updated_at";

const INSERT: &str = "INSERT INTO user_sessions (user_id, refresh_token_hash, expires_at) \
                      VALUES ($1, $2, $3)";

pub struct SessionRepo;

impl SessionRepo {
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<UserSession, sqlx::Error> {
        sqlx::query_as::<_, UserSession>(&format!("{INSERT} RETURNING {COLUMNS}"))
            .bind(input.user_id)
            .bind(&input.refresh_token_hash)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_active_by_token_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_sessions
             WHERE refresh_token_hash = $1 AND NOT is_revoked AND expires_at > NOW()"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Revoke `old_id` and insert `replacement` in one transaction.
    ///
    /// Returns `None` when `old_id` was already revoked, so a refresh token
    /// presented twice concurrently yields at most one new session.
    pub async fn rotate(
        pool: &PgPool,
        old_id: DbId,
        replacement: &CreateSession,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE user_sessions SET is_revoked = TRUE WHERE id = $1 AND NOT is_revoked",
        )
        .bind(old_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if revoked == 0 {
            return Ok(None);
        }

        let session = sqlx::query_as::<_, UserSession>(&format!("{INSERT} RETURNING {COLUMNS}"))
            .bind(replacement.user_id)
            .bind(&replacement.refresh_token_hash)
            .bind(replacement.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(session))
    }

    pub async fn revoke_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        sqlx::query("UPDATE user_sessions SET is_revoked = TRUE WHERE user_id = $1 AND NOT is_revoked")
            .bind(user_id)
            .execute(pool)
            .await
            .map(|result| result.rows_affected())
    }

    /// Remove sessions that can never be used again.
    pub async fn delete_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM user_sessions WHERE is_revoked OR expires_at <= NOW()")
            .execute(pool)
            .await
            .map(|result| result.rows_affected())
    }
}
