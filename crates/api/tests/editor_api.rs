//! HTTP-level tests for editing sessions: manual edits, patches, assistant
//! turns, preview and save.

mod common;

use axum::http::StatusCode;
use common::{
    assert_error, body_json, create_survey, delete_auth, get_auth, post_auth, post_json_auth,
    put_json_auth, signed_in, TestApp,
};
use formcraft_assistant::turn::{COMMUNICATION_FAILED, PATCH_WARNING};
use formcraft_core::conversation::GREETING;
use formcraft_db::models::survey::Survey;
use formcraft_db::repositories::SurveyRepo;
use serde_json::{json, Value};
use sqlx::PgPool;

/// Sign in, create a survey and open an editor on it. Returns
/// `(token, survey, session_uri)`.
async fn open_session(test: &TestApp, username: &str) -> (String, Survey, String) {
    let (user, token) = signed_in(&test.pool, username).await;
    let survey = create_survey(&test.pool, user.id, "Customer feedback").await;

    let response = post_auth(
        test.app(),
        &format!("/api/v1/surveys/{}/editor", survey.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let sid = json["data"]["session_id"].as_str().unwrap().to_string();
    (token, survey, format!("/api/v1/editor/{sid}"))
}

fn add_name_patch() -> Value {
    json!([{"op": "add", "path": "/properties/name", "value": {"type": "string", "title": "Name"}}])
}

#[sqlx::test(migrations = "../db/migrations")]
async fn open_session_greets_and_snapshots(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, survey, uri) = open_session(&test, "editor").await;

    let json = body_json(get_auth(test.app(), &uri, &token).await).await;
    assert_eq!(json["data"]["survey_id"], survey.id);
    assert_eq!(json["data"]["title"], "Customer feedback");
    assert_eq!(json["data"]["version"], 0);
    assert_eq!(json["data"]["messages"][0]["role"], "assistant");
    assert_eq!(json["data"]["messages"][0]["content"], GREETING);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sessions_are_private(pool: PgPool) {
    let test = TestApp::new(pool);
    let (_token, _survey, uri) = open_session(&test, "owner").await;
    let (_intruder, intruder_token) = signed_in(&test.pool, "intruder").await;

    let response = get_auth(test.app(), &uri, &intruder_token).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let response = delete_auth(test.app(), &uri, &intruder_token).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn patch_applies_and_bumps_version(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, _, uri) = open_session(&test, "patcher").await;

    let response = post_json_auth(
        test.app(),
        &format!("{uri}/patch"),
        json!({"target": "schema", "patch": add_name_patch()}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["version"], 1);
    assert_eq!(
        json["data"]["schema"],
        json!({
            "type": "object",
            "properties": {"name": {"type": "string", "title": "Name"}},
            "required": []
        })
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn rejected_patch_leaves_document_unchanged(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, _, uri) = open_session(&test, "careful").await;
    let before = body_json(get_auth(test.app(), &uri, &token).await).await;

    let response = post_json_auth(
        test.app(),
        &format!("{uri}/patch"),
        json!({"target": "schema", "patch": [{"op": "remove", "path": "/properties/missing"}]}),
        &token,
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    let response = post_json_auth(
        test.app(),
        &format!("{uri}/patch"),
        json!({"target": "ui_schema", "patch": [{"op": "frobnicate", "path": "/x"}]}),
        &token,
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    let after = body_json(get_auth(test.app(), &uri, &token).await).await;
    assert_eq!(after["data"]["schema"], before["data"]["schema"]);
    assert_eq!(after["data"]["ui_schema"], before["data"]["ui_schema"]);
    assert_eq!(after["data"]["version"], 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn manual_edit_is_all_or_nothing(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, _, uri) = open_session(&test, "typist").await;

    let response = put_json_auth(
        test.app(),
        &uri,
        json!({"title": "Renamed", "schema_text": "{\"type\": \"object\", "}),
        &token,
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
    let json = body_json(get_auth(test.app(), &uri, &token).await).await;
    assert_eq!(json["data"]["title"], "Customer feedback");

    let response = put_json_auth(
        test.app(),
        &uri,
        json!({
            "title": "Renamed",
            "schema_text": "{\"type\": \"object\", \"properties\": {}}",
            "ui_schema_text": ""
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Renamed");
    assert_eq!(json["data"]["ui_schema"], json!({}));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn chat_turn_applies_modifications(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, _, uri) = open_session(&test, "chatter").await;
    test.llm.reply(
        &json!({
            "response": "I added a required email field.",
            "modifications": {
                "title": "Contact form",
                "schemaPatch": [
                    {"op": "add", "path": "/properties/email", "value": {"type": "string", "format": "email"}},
                    {"op": "add", "path": "/required/-", "value": "email"}
                ]
            }
        })
        .to_string(),
    );

    let response = post_json_auth(
        test.app(),
        &format!("{uri}/chat"),
        json!({"message": "Add an email field"}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["outcome"]["status"], "completed");
    assert_eq!(data["outcome"]["title_changed"], true);
    assert_eq!(data["outcome"]["schema"]["result"], "applied");
    assert_eq!(data["session"]["title"], "Contact form");
    assert_eq!(data["session"]["schema"]["required"], json!(["email"]));
    assert_eq!(data["session"]["messages"].as_array().unwrap().len(), 3);

    // The model saw the current documents.
    let requests = test.llm.requests.lock().unwrap();
    assert!(requests[0]
        .iter()
        .any(|m| m.content.starts_with("Current Schema:")));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn chat_keeps_ui_change_when_schema_patch_fails(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, _, uri) = open_session(&test, "partial").await;
    test.llm.reply(
        &json!({
            "response": "Done.",
            "modifications": {
                "schemaPatch": [{"op": "remove", "path": "/properties/missing"}],
                "uiSchemaPatch": [{"op": "add", "path": "/comments", "value": {"ui:widget": "textarea"}}]
            }
        })
        .to_string(),
    );

    let json = body_json(
        post_json_auth(
            test.app(),
            &format!("{uri}/chat"),
            json!({"message": "Tweak it"}),
            &token,
        )
        .await,
    )
    .await;
    let data = &json["data"];
    assert_eq!(data["outcome"]["schema"]["result"], "rejected");
    assert_eq!(data["outcome"]["ui_schema"]["result"], "applied");
    assert_eq!(data["session"]["ui_schema"]["comments"]["ui:widget"], "textarea");

    let warnings = data["session"]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["content"] == PATCH_WARNING)
        .count();
    assert_eq!(warnings, 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn chat_upstream_failure_is_reported_in_conversation(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, _, uri) = open_session(&test, "unlucky").await;
    test.llm.fail();

    let response = post_json_auth(
        test.app(),
        &format!("{uri}/chat"),
        json!({"message": "Hello"}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["outcome"]["status"], "upstream_failed");
    assert_eq!(json["data"]["session"]["version"], 0);
    let messages = json["data"]["session"]["messages"].as_array().unwrap();
    assert_eq!(messages.last().unwrap()["content"], COMMUNICATION_FAILED);

    let response = post_json_auth(
        test.app(),
        &format!("{uri}/chat"),
        json!({"message": "   "}),
        &token,
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn preview_renders_and_validates(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, _, uri) = open_session(&test, "previewer").await;
    post_json_auth(
        test.app(),
        &format!("{uri}/patch"),
        json!({"target": "schema", "patch": [
            {"op": "add", "path": "/properties/name", "value": {"type": "string", "title": "Name"}},
            {"op": "add", "path": "/required/-", "value": "name"}
        ]}),
        &token,
    )
    .await;

    let json = body_json(get_auth(test.app(), &format!("{uri}/preview"), &token).await).await;
    let field = &json["data"]["fields"][0];
    assert_eq!(field["name"], "name");
    assert_eq!(field["label"], "Name");
    assert_eq!(field["required"], true);

    let response = post_json_auth(
        test.app(),
        &format!("{uri}/preview/validate"),
        json!({"data": {}}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["report"]["valid"], false);
    assert_eq!(json["data"]["report"]["errors"][0]["field"], "/name");

    let json = body_json(
        post_json_auth(
            test.app(),
            &format!("{uri}/preview/validate"),
            json!({"data": {"name": "Ada"}}),
            &token,
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["report"]["valid"], true);
    assert_eq!(json["data"]["form"]["fields"][0]["initial"], "Ada");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn save_persists_and_close_ends_session(pool: PgPool) {
    let test = TestApp::new(pool);
    let (token, survey, uri) = open_session(&test, "saver").await;
    post_json_auth(
        test.app(),
        &format!("{uri}/patch"),
        json!({"target": "schema", "patch": add_name_patch()}),
        &token,
    )
    .await;

    let response = post_auth(test.app(), &format!("{uri}/save"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let saved = SurveyRepo::find_for_owner(&test.pool, survey.id, survey.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.schema_json["properties"]["name"]["type"], "string");

    let response = delete_auth(test.app(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = get_auth(test.app(), &uri, &token).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}
