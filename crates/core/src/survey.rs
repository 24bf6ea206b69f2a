//! Survey record rules shared by the API and persistence layers.

use crate::error::CoreError;
use crate::types::DbId;

/// Maximum number of surveys a single owner may hold.
pub const MAX_SURVEYS_PER_OWNER: i64 = 5;

pub const MAX_TITLE_LENGTH: usize = 200;

/// Trim and check a survey title. Returns the trimmed title.
pub fn validate_title(title: &str) -> Result<String, CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Survey title is required".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Survey title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Package name under which the build service stores a survey's images, and
/// the storage folder for its uploaded template.
pub fn image_package_name(owner_id: DbId, survey_id: DbId) -> String {
    format!("user_{owner_id}_q_{survey_id}")
}
