//! Client for the external build/deploy service and the per-survey build
//! tracker that polls it.

pub mod api;
pub mod config;
pub mod tracker;

pub use api::{
    BuildRequest, BuildService, BuilderApi, BuilderApiError, DeployScriptRequest, DeployService,
    RemoteDeployRequest,
};
pub use config::BuilderConfig;
pub use tracker::BuildTracker;
