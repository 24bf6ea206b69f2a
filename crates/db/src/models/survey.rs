//! Survey (`questionnaires` table) model and DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use formcraft_core::types::{DbId, Timestamp};

/// A full survey row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Survey {
    pub id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub schema_json: Value,
    pub ui_schema_json: Value,
    pub image_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// List entry: what the dashboard shows.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SurveySummary {
    pub id: DbId,
    pub title: String,
    pub created_at: Timestamp,
}

/// DTO for creating a survey. New surveys start with empty schemas.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSurvey {
    pub title: String,
}

/// DTO for saving a survey. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSurvey {
    pub title: Option<String>,
    pub schema_json: Option<Value>,
    pub ui_schema_json: Option<Value>,
}
