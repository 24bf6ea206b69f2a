//! REST client for the build/deploy service.
//!
//! Endpoints: `GET /list`, `POST /build/{id}`, `DELETE /delete_image`,
//! `POST /generate_deploy_script`, `POST /deploy-remote`. Error bodies follow
//! the FastAPI convention `{"detail": ...}`; the detail is kept so it can be
//! shown to the user.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use formcraft_core::deployment::{DeployOs, ImageInfo};
use formcraft_core::types::DbId;

use crate::config::BuilderConfig;

/// Everything the build service needs to produce an image for one survey.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRequest {
    #[serde(skip)]
    pub survey_id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub schema: Value,
    pub ui_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployScriptRequest {
    pub image: String,
    pub os: DeployOs,
    pub port: u16,
    pub qid: DbId,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteDeployRequest {
    pub image: String,
    pub ip: String,
    pub user: String,
    pub key: String,
    pub port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum BuilderApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx status. `detail` is the service's explanation, when it gave one.
    #[error("Build service error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    ApiError { status: u16, detail: Option<String> },

    /// 2xx answer whose body reports a failure (`{"status": "error"}`).
    #[error("Build service rejected the request: {0}")]
    Rejected(String),
}

impl BuilderApiError {
    /// Message fit to show a user, if the service provided one.
    pub fn user_detail(&self) -> Option<&str> {
        match self {
            Self::ApiError { detail, .. } => detail.as_deref(),
            Self::Rejected(message) => Some(message),
            Self::Request(_) => None,
        }
    }
}

/// The subset of the build service the tracker depends on.
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn list_images(&self, owner_id: DbId, survey_id: DbId) -> Result<Vec<ImageInfo>, BuilderApiError>;

    /// Ask for a build. Success means "accepted", not "done".
    async fn trigger_build(&self, request: &BuildRequest) -> Result<(), BuilderApiError>;

    async fn delete_image(&self, owner_id: DbId, survey_id: DbId, tag: &str) -> Result<(), BuilderApiError>;
}

/// Deployment helpers that proxy straight through to the service.
#[async_trait]
pub trait DeployService: Send + Sync {
    /// Fetch an OS-specific local deploy script as text.
    async fn generate_deploy_script(&self, request: &DeployScriptRequest) -> Result<String, BuilderApiError>;

    /// Deploy an image to a remote VM over SSH. Returns the service's report.
    async fn deploy_remote(&self, request: &RemoteDeployRequest) -> Result<Value, BuilderApiError>;
}

pub struct BuilderApi {
    client: reqwest::Client,
    config: BuilderConfig,
}

#[derive(Deserialize)]
struct ImageList {
    #[serde(default)]
    images: Vec<ImageInfo>,
}

#[derive(Deserialize)]
struct StatusBody {
    status: Option<String>,
    message: Option<String>,
}

impl BuilderApi {
    pub fn new(config: BuilderConfig) -> Result<Self, BuilderApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: reqwest::Client, config: BuilderConfig) -> Self {
        Self { client, config }
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BuilderApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BuilderApiError::ApiError {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BuilderApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl BuildService for BuilderApi {
    async fn list_images(&self, owner_id: DbId, survey_id: DbId) -> Result<Vec<ImageInfo>, BuilderApiError> {
        let response = self
            .authorized(self.client.get(self.url("/list")))
            .query(&[("questionnaire_id", survey_id), ("user_id", owner_id)])
            .send()
            .await?;
        let list: ImageList = Self::parse_response(response).await?;
        Ok(list.images)
    }

    async fn trigger_build(&self, request: &BuildRequest) -> Result<(), BuilderApiError> {
        let response = self
            .authorized(self.client.post(self.url(&format!("/build/{}", request.survey_id))))
            .json(request)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn delete_image(&self, owner_id: DbId, survey_id: DbId, tag: &str) -> Result<(), BuilderApiError> {
        let response = self
            .authorized(self.client.delete(self.url("/delete_image")))
            .query(&[
                ("questionnaire_id", survey_id.to_string()),
                ("user_id", owner_id.to_string()),
                ("tag", tag.to_string()),
            ])
            .send()
            .await?;
        let body: StatusBody = Self::parse_response(response).await?;
        if body.status.as_deref() == Some("error") {
            return Err(BuilderApiError::Rejected(
                body.message.unwrap_or_else(|| "Image deletion failed".into()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DeployService for BuilderApi {
    async fn generate_deploy_script(&self, request: &DeployScriptRequest) -> Result<String, BuilderApiError> {
        let response = self
            .authorized(self.client.post(self.url("/generate_deploy_script")))
            .json(request)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?)
    }

    async fn deploy_remote(&self, request: &RemoteDeployRequest) -> Result<Value, BuilderApiError> {
        let response = self
            .authorized(self.client.post(self.url("/deploy-remote")))
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }
}

/// Pull `detail` out of a FastAPI-style error body. Non-string details
/// (validation error lists) are passed through as JSON text.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
