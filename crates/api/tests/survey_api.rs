//! HTTP-level tests for survey CRUD, ownership and the per-owner limit.

mod common;

use axum::http::StatusCode;
use common::{
    assert_error, body_json, create_survey, delete_auth, get_auth, post_json_auth, put_json_auth,
    signed_in, TestApp,
};
use formcraft_db::repositories::SurveyRepo;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../db/migrations")]
async fn create_starts_empty_and_lists_newest_first(pool: PgPool) {
    let test = TestApp::new(pool.clone());
    let (_user, token) = signed_in(&pool, "owner").await;

    for title in ["First", "Second"] {
        let response =
            post_json_auth(test.app(), "/api/v1/surveys", json!({ "title": title }), &token).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["schema_json"], json!({}));
        assert_eq!(json["data"]["ui_schema_json"], json!({}));
    }

    let json = body_json(get_auth(test.app(), "/api/v1/surveys", &token).await).await;
    let titles: Vec<_> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["Second", "First"]);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn title_is_validated(pool: PgPool) {
    let test = TestApp::new(pool.clone());
    let (_user, token) = signed_in(&pool, "owner").await;

    let response =
        post_json_auth(test.app(), "/api/v1/surveys", json!({ "title": "   " }), &token).await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    let long = "x".repeat(201);
    let response =
        post_json_auth(test.app(), "/api/v1/surveys", json!({ "title": long }), &token).await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sixth_survey_is_rejected_without_a_write(pool: PgPool) {
    let test = TestApp::new(pool.clone());
    let (user, token) = signed_in(&pool, "prolific").await;
    for i in 0..5 {
        create_survey(&pool, user.id, &format!("Survey {i}")).await;
    }

    let response =
        post_json_auth(test.app(), "/api/v1/surveys", json!({ "title": "Sixth" }), &token).await;
    assert_error(response, StatusCode::CONFLICT, "CONFLICT").await;

    assert_eq!(SurveyRepo::count_for_owner(&pool, user.id).await.unwrap(), 5);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn other_users_surveys_are_not_found(pool: PgPool) {
    let test = TestApp::new(pool.clone());
    let (alice, _) = signed_in(&pool, "alice").await;
    let (_bob, bob_token) = signed_in(&pool, "bob").await;
    let survey = create_survey(&pool, alice.id, "Private").await;
    let uri = format!("/api/v1/surveys/{}", survey.id);

    let response = get_auth(test.app(), &uri, &bob_token).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let response = put_json_auth(test.app(), &uri, json!({ "title": "Mine now" }), &bob_token).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let response = delete_auth(test.app(), &uri, &bob_token).await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let json = body_json(get_auth(test.app(), "/api/v1/surveys", &bob_token).await).await;
    assert_eq!(json["data"], json!([]));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn update_saves_given_fields(pool: PgPool) {
    let test = TestApp::new(pool.clone());
    let (user, token) = signed_in(&pool, "saver").await;
    let survey = create_survey(&pool, user.id, "Draft").await;
    let uri = format!("/api/v1/surveys/{}", survey.id);

    let schema = json!({"type": "object", "properties": {"age": {"type": "integer"}}});
    let response = put_json_auth(test.app(), &uri, json!({ "schema_json": schema }), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Draft");
    assert_eq!(json["data"]["schema_json"], schema);

    let response = put_json_auth(test.app(), &uri, json!({ "schema_json": [1, 2] }), &token).await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn delete_removes_row_and_requests_image_deletion(pool: PgPool) {
    let test = TestApp::new(pool.clone());
    let (user, token) = signed_in(&pool, "deleter").await;
    let survey = create_survey(&pool, user.id, "Doomed").await;
    test.build_service.publish_latest("user_1_q_1");

    let uri = format!("/api/v1/surveys/{}", survey.id);
    let response = delete_auth(test.app(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(SurveyRepo::find_for_owner(&pool, survey.id, user.id)
        .await
        .unwrap()
        .is_none());
    let deleted = test.build_service.deleted.lock().unwrap().clone();
    assert_eq!(deleted, vec![(user.id, survey.id, "latest".to_string())]);
}
