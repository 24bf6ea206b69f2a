#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use formcraft_api::auth::jwt::{generate_access_token, JwtConfig};
use formcraft_api::auth::password::hash_password;
use formcraft_api::config::ServerConfig;
use formcraft_api::editor::EditorSessionManager;
use formcraft_api::router::build_app_router;
use formcraft_api::state::AppState;
use formcraft_assistant::{AssistantError, ChatMessage, LlmClient};
use formcraft_builder::{
    BuildRequest, BuildService, BuildTracker, BuilderApiError, DeployScriptRequest, DeployService,
    RemoteDeployRequest,
};
use formcraft_core::deployment::ImageInfo;
use formcraft_core::types::DbId;
use formcraft_db::models::survey::Survey;
use formcraft_db::models::user::{CreateUser, User};
use formcraft_db::repositories::{SurveyRepo, UserRepo};

pub const TEST_PASSWORD: &str = "test_password_123!";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Replies are served in order; once exhausted every call fails.
#[derive(Default)]
pub struct FakeLlm {
    replies: Mutex<VecDeque<Result<String, ()>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeLlm {
    pub fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn fail(&self) {
        self.replies.lock().unwrap().push_back(Err(()));
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            _ => Err(AssistantError::ApiError {
                status: 503,
                body: "unavailable".into(),
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeBuildService {
    pub images: Mutex<Vec<ImageInfo>>,
    /// `Some(detail)` makes the next triggers fail with that detail.
    pub trigger_error: Mutex<Option<String>>,
    pub list_fails: Mutex<bool>,
    pub triggered: Mutex<Vec<BuildRequest>>,
    pub deleted: Mutex<Vec<(DbId, DbId, String)>>,
}

impl FakeBuildService {
    pub fn publish_latest(&self, name: &str) {
        self.images.lock().unwrap().push(ImageInfo {
            name: name.to_string(),
            tag: "latest".into(),
            updated_at: None,
        });
    }
}

#[async_trait]
impl BuildService for FakeBuildService {
    async fn list_images(&self, _owner_id: DbId, _survey_id: DbId) -> Result<Vec<ImageInfo>, BuilderApiError> {
        if *self.list_fails.lock().unwrap() {
            return Err(BuilderApiError::ApiError { status: 500, detail: None });
        }
        Ok(self.images.lock().unwrap().clone())
    }

    async fn trigger_build(&self, request: &BuildRequest) -> Result<(), BuilderApiError> {
        if let Some(detail) = self.trigger_error.lock().unwrap().clone() {
            return Err(BuilderApiError::ApiError {
                status: 400,
                detail: Some(detail),
            });
        }
        self.triggered.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn delete_image(&self, owner_id: DbId, survey_id: DbId, tag: &str) -> Result<(), BuilderApiError> {
        self.deleted
            .lock()
            .unwrap()
            .push((owner_id, survey_id, tag.to_string()));
        self.images.lock().unwrap().retain(|image| image.tag != tag);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDeployer {
    pub scripts: Mutex<Vec<DeployScriptRequest>>,
    pub remotes: Mutex<Vec<RemoteDeployRequest>>,
}

#[async_trait]
impl DeployService for FakeDeployer {
    async fn generate_deploy_script(&self, request: &DeployScriptRequest) -> Result<String, BuilderApiError> {
        self.scripts.lock().unwrap().push(request.clone());
        Ok(format!("#!/bin/bash\ndocker pull {}\n", request.image))
    }

    async fn deploy_remote(&self, request: &RemoteDeployRequest) -> Result<Value, BuilderApiError> {
        self.remotes.lock().unwrap().push(request.clone());
        Ok(serde_json::json!({"status": "ok", "url": format!("http://{}:5000", request.ip)}))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub fn test_jwt() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-long-enough".to_string(),
        access_token_expiry_mins: 15,
        refresh_token_expiry_days: 7,
    }
}

pub fn test_config(storage_root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        storage_root: storage_root.to_path_buf(),
        editor_idle_mins: 60,
        jwt: test_jwt(),
    }
}

/// The full router plus handles on its fakes.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub llm: Arc<FakeLlm>,
    pub build_service: Arc<FakeBuildService>,
    pub deployer: Arc<FakeDeployer>,
    pub builds: Arc<BuildTracker>,
    pub storage: tempfile::TempDir,
}

impl TestApp {
    pub fn new(pool: PgPool) -> Self {
        let storage = tempfile::tempdir().expect("temp dir should be created");
        let config = test_config(storage.path());

        let llm = Arc::new(FakeLlm::default());
        let build_service = Arc::new(FakeBuildService::default());
        let deployer = Arc::new(FakeDeployer::default());
        let builds = Arc::new(BuildTracker::new(build_service.clone()));

        let state = AppState {
            pool: pool.clone(),
            config: Arc::new(config.clone()),
            assistant: llm.clone(),
            deployer: deployer.clone(),
            builds: Arc::clone(&builds),
            editor: Arc::new(EditorSessionManager::new(Duration::from_secs(3600))),
        };

        Self {
            router: build_app_router(state, &config),
            pool,
            llm,
            build_service,
            deployer,
            builds,
            storage,
        }
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn create_user(pool: &PgPool, username: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@test.com"),
            password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
        },
    )
    .await
    .expect("user creation should succeed")
}

pub fn token_for(user_id: DbId) -> String {
    generate_access_token(user_id, &test_jwt()).expect("token generation should succeed")
}

/// A user and a bearer token for them.
pub async fn signed_in(pool: &PgPool, username: &str) -> (User, String) {
    let user = create_user(pool, username).await;
    let token = token_for(user.id);
    (user, token)
}

pub async fn create_survey(pool: &PgPool, owner_id: DbId, title: &str) -> Survey {
    SurveyRepo::create_within_limit(pool, owner_id, title, 5)
        .await
        .expect("insert should succeed")
        .expect("owner should be under the limit")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("router should answer")
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, json_request("GET", uri, None, None)).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, json_request("GET", uri, Some(token), None)).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, json_request("POST", uri, None, Some(body))).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, json_request("POST", uri, Some(token), Some(body))).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, json_request("POST", uri, Some(token), None)).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, json_request("PUT", uri, Some(token), Some(body))).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, json_request("DELETE", uri, Some(token), None)).await
}

/// Assert the status and the `code` of a JSON error body.
pub async fn assert_error(response: Response, status: StatusCode, code: &str) -> Value {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected error body: {json}");
    json
}
