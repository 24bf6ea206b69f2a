use formcraft_core::survey::MAX_SURVEYS_PER_OWNER;
use formcraft_db::models::survey::UpdateSurvey;
use formcraft_db::models::user::CreateUser;
use formcraft_db::repositories::{SurveyRepo, UserRepo};
use serde_json::json;
use sqlx::PgPool;

async fn make_user(pool: &PgPool, name: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "not-a-real-hash".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

#[sqlx::test(migrations = "./migrations")]
async fn test_bootstrap(pool: PgPool) {
    formcraft_db::health_check(&pool).await.unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn test_new_survey_starts_empty(pool: PgPool) {
    let owner = make_user(&pool, "alice").await;
    let survey = SurveyRepo::create_within_limit(&pool, owner, "Feedback", MAX_SURVEYS_PER_OWNER)
        .await
        .unwrap()
        .expect("under the limit");

    assert_eq!(survey.title, "Feedback");
    assert_eq!(survey.schema_json, json!({}));
    assert_eq!(survey.ui_schema_json, json!({}));
    assert!(survey.image_path.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_sixth_survey_rejected_without_write(pool: PgPool) {
    let owner = make_user(&pool, "bob").await;
    for i in 0..MAX_SURVEYS_PER_OWNER {
        let created =
            SurveyRepo::create_within_limit(&pool, owner, &format!("S{i}"), MAX_SURVEYS_PER_OWNER)
                .await
                .unwrap();
        assert!(created.is_some());
    }

    let sixth = SurveyRepo::create_within_limit(&pool, owner, "S6", MAX_SURVEYS_PER_OWNER)
        .await
        .unwrap();
    assert!(sixth.is_none());
    assert_eq!(
        SurveyRepo::count_for_owner(&pool, owner).await.unwrap(),
        MAX_SURVEYS_PER_OWNER
    );

    // The limit is per owner.
    let other = make_user(&pool, "carol").await;
    assert!(SurveyRepo::create_within_limit(&pool, other, "Mine", MAX_SURVEYS_PER_OWNER)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_queries_are_scoped_by_owner(pool: PgPool) {
    let alice = make_user(&pool, "alice").await;
    let mallory = make_user(&pool, "mallory").await;
    let survey = SurveyRepo::create_within_limit(&pool, alice, "Private", 5)
        .await
        .unwrap()
        .unwrap();

    assert!(SurveyRepo::find_for_owner(&pool, survey.id, mallory)
        .await
        .unwrap()
        .is_none());
    assert!(SurveyRepo::list_for_owner(&pool, mallory).await.unwrap().is_empty());
    assert!(!SurveyRepo::delete_for_owner(&pool, survey.id, mallory).await.unwrap());
    assert!(SurveyRepo::find_for_owner(&pool, survey.id, alice)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_applies_only_given_fields(pool: PgPool) {
    let owner = make_user(&pool, "dave").await;
    let survey = SurveyRepo::create_within_limit(&pool, owner, "Old", 5)
        .await
        .unwrap()
        .unwrap();

    let schema = json!({"type": "object", "properties": {"q1": {"type": "string"}}, "required": []});
    let updated = SurveyRepo::update_for_owner(
        &pool,
        survey.id,
        owner,
        &UpdateSurvey {
            schema_json: Some(schema.clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(updated.title, "Old");
    assert_eq!(updated.schema_json, schema);
    assert_eq!(updated.ui_schema_json, json!({}));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_is_newest_first(pool: PgPool) {
    let owner = make_user(&pool, "erin").await;
    for title in ["first", "second", "third"] {
        SurveyRepo::create_within_limit(&pool, owner, title, 5)
            .await
            .unwrap();
    }
    let titles: Vec<String> = SurveyRepo::list_for_owner(&pool, owner)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
}
