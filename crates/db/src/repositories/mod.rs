//! Repository structs. Each is zero-sized and takes the pool per call.

pub mod session_repo;
pub mod survey_repo;
pub mod user_repo;

pub use session_repo::SessionRepo;
pub use survey_repo::SurveyRepo;
pub use user_repo::UserRepo;
