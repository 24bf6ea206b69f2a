use std::sync::Arc;

use formcraft_assistant::LlmClient;
use formcraft_builder::{BuildTracker, DeployService};

use crate::config::ServerConfig;
use crate::editor::EditorSessionManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: formcraft_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Chat completion backend used by editor chat turns.
    pub assistant: Arc<dyn LlmClient>,
    /// Script generation and remote deploys.
    pub deployer: Arc<dyn DeployService>,
    /// Per-survey build state and poll tasks.
    pub builds: Arc<BuildTracker>,
    /// Live editing sessions.
    pub editor: Arc<EditorSessionManager>,
}
