//! Repository for the `questionnaires` table.
//!
//! Every query is scoped by owner: a survey that exists but belongs to
//! someone else is indistinguishable from a missing one.

use sqlx::PgPool;
use formcraft_core::types::DbId;

use crate::models::survey::{Survey, SurveySummary, UpdateSurvey};

const COLUMNS: &str = "id, user_id, title, schema_json, ui_schema_json, image_path, \
                        created_at, updated_at";

pub struct SurveyRepo;

impl SurveyRepo {
    /// Insert an empty survey unless the owner already holds `limit` rows.
    ///
    /// The count and insert run as one statement, serialized per owner by a
    /// row lock on the user, so a rejected creation writes nothing. Returns
    /// `None` when the limit is reached.
    pub async fn create_within_limit(
        pool: &PgPool,
        owner_id: DbId,
        title: &str,
        limit: i64,
    ) -> Result<Option<Survey>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO questionnaires (user_id, title, schema_json, ui_schema_json)
             SELECT $1, $2, '{{}}'::jsonb, '{{}}'::jsonb
             WHERE (SELECT COUNT(*) FROM questionnaires WHERE user_id = $1) < $3
             RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, Survey>(&query)
            .bind(owner_id)
            .bind(title)
            .bind(limit)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    pub async fn count_for_owner(pool: &PgPool, owner_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM questionnaires WHERE user_id = $1")
                .bind(owner_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// Newest first.
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<SurveySummary>, sqlx::Error> {
        sqlx::query_as::<_, SurveySummary>(
            "SELECT id, title, created_at FROM questionnaires
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<Survey>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM questionnaires WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Survey>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Save title and schemas. Only non-`None` fields are applied.
    pub async fn update_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
        input: &UpdateSurvey,
    ) -> Result<Option<Survey>, sqlx::Error> {
        let query = format!(
            "UPDATE questionnaires SET
                title = COALESCE($3, title),
                schema_json = COALESCE($4, schema_json),
                ui_schema_json = COALESCE($5, ui_schema_json)
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Survey>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(&input.title)
            .bind(&input.schema_json)
            .bind(&input.ui_schema_json)
            .fetch_optional(pool)
            .await
    }

    /// Record the stored template path. Returns `false` if no row matched.
    pub async fn set_image_path(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
        image_path: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE questionnaires SET image_path = $3 WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(image_path)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM questionnaires WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
