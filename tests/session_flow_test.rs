use std::collections::HashMap;
use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use theory_test_backend::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

struct Fixture {
    app: Router,
    license_type_id: i32,
    /// question id -> (correct answer id, a wrong answer id)
    answers: HashMap<i64, (i64, i64)>,
}

async fn setup() -> Option<Fixture> {
    dotenvy::dotenv().ok();
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set; skipping database-backed test");
            return None;
        }
    };

    let config = Config {
        server_address: "127.0.0.1:0".to_string(),
        database_url,
        jwt_secret: "session_flow_secret".to_string(),
        token_ttl_hours: 1,
        api_rps: 1000,
        db_max_connections: 5,
        cors_origins: Vec::new(),
    };
    let pool = create_pool(&config).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");

    let (license_type_id, answers) = seed_questions(&pool, 5).await;
    Some(Fixture {
        app: theory_test_backend::app(AppState::new(pool, config)),
        license_type_id,
        answers,
    })
}

/// Own license type so random selection only sees this test's questions.
async fn seed_questions(pool: &PgPool, count: usize) -> (i32, HashMap<i64, (i64, i64)>) {
    let suffix = Uuid::new_v4().simple().to_string();
    let license_type_id: i32 = sqlx::query_scalar(
        "INSERT INTO license_types (code, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("T{}", &suffix[..8]))
    .bind("Flow test licence")
    .fetch_one(pool)
    .await
    .expect("license type");

    let category_id: i32 =
        sqlx::query_scalar("INSERT INTO categories (name) VALUES ($1) RETURNING id")
            .bind(format!("Flow test {}", &suffix[..8]))
            .fetch_one(pool)
            .await
            .expect("category");

    let mut answers = HashMap::new();
    for n in 0..count {
        let question_id: i64 = sqlx::query_scalar(
            "INSERT INTO questions (category_id, text, explanation) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(category_id)
        .bind(format!("Question {}", n))
        .bind("Because the sign says so")
        .fetch_one(pool)
        .await
        .expect("question");

        sqlx::query("INSERT INTO license_type_question (license_type_id, question_id) VALUES ($1, $2)")
            .bind(license_type_id)
            .bind(question_id)
            .execute(pool)
            .await
            .expect("link");

        let mut ids = Vec::new();
        for position in 1..=3 {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO answers (question_id, text, position, is_correct) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(question_id)
            .bind(format!("Answer {}", position))
            .bind(position)
            .bind(position == 1)
            .fetch_one(pool)
            .await
            .expect("answer");
            ids.push(id);
        }
        answers.insert(question_id, (ids[0], ids[1]));
    }
    (license_type_id, answers)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let res = app.clone().oneshot(req).await.expect("response");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), 4 * 1024 * 1024).await.expect("body");
    (status, serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null))
}

async fn login(app: &Router) -> String {
    let (status, profile) = send(app, "POST", "/api/profiles", None, Some(json!({ "name": "Flow learner" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = profile["id"].as_str().expect("profile id");

    let (status, token) = send(app, "POST", &format!("/api/profiles/{}/select", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(token["token_type"], "Bearer");
    token["token"].as_str().expect("token").to_string()
}

async fn start(fx: &Fixture, token: &str) -> JsonValue {
    let (status, session) = send(
        &fx.app,
        "POST",
        "/api/sessions",
        Some(token),
        Some(json!({
            "license_type_id": fx.license_type_id,
            "question_count": 5,
            "time_per_question": 60,
            "failure_threshold": 20
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", session);
    session
}

fn score(session: &JsonValue) -> f64 {
    match &session["score_percentage"] {
        JsonValue::String(s) => s.parse().expect("decimal score"),
        other => other.as_f64().expect("numeric score"),
    }
}

fn current_question_id(session: &JsonValue) -> i64 {
    session["current_question"]["id"].as_i64().expect("current question")
}

#[tokio::test]
async fn second_mistake_over_threshold_fails_the_session() {
    let Some(fx) = setup().await else { return };
    let token = login(&fx.app).await;

    let session = start(&fx, &token).await;
    assert_eq!(session["status"], "in_progress");
    assert_eq!(session["total_questions"], 5);
    assert_eq!(session["allowed_mistakes"], 1);
    assert_eq!(session["time_remaining"], 300);
    let id = session["id"].as_str().expect("session id").to_string();
    assert!(session["current_question"].get("explanation").is_none());
    assert!(session.get("answers_given").is_none());

    let q1 = current_question_id(&session);
    let (_, wrong1) = fx.answers[&q1];
    let (status, res) = send(
        &fx.app,
        "POST",
        &format!("/api/sessions/{}/answer", id),
        Some(&token),
        Some(json!({ "question_id": q1, "answer_id": wrong1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", res);
    assert_eq!(res["is_correct"], false);
    assert_eq!(res["correct_answer_id"], fx.answers[&q1].0);
    assert_eq!(res["explanation"], "Because the sign says so");
    assert_eq!(res["session"]["status"], "in_progress");
    assert_eq!(res["session"]["wrong_count"], 1);

    // Same question again is a conflict.
    let (status, _) = send(
        &fx.app,
        "POST",
        &format!("/api/sessions/{}/answer", id),
        Some(&token),
        Some(json!({ "question_id": q1, "answer_id": fx.answers[&q1].0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let q2 = current_question_id(&res["session"]);
    assert_ne!(q1, q2);
    let (_, res) = send(
        &fx.app,
        "POST",
        &format!("/api/sessions/{}/answer", id),
        Some(&token),
        Some(json!({ "question_id": q2, "answer_id": fx.answers[&q2].1 })),
    )
    .await;
    assert_eq!(res["session"]["status"], "failed");
    assert_eq!(res["session"]["is_finished"], true);
    assert_eq!(score(&res["session"]), 0.0);
    assert!(res["session"]["finished_at"].is_string());

    let (status, res) = send(&fx.app, "POST", &format!("/api/sessions/{}/abandon", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["abandoned"], false);
    assert_eq!(res["session"]["status"], "failed");
}

#[tokio::test]
async fn answering_everything_correctly_passes() {
    let Some(fx) = setup().await else { return };
    let token = login(&fx.app).await;

    let mut session = start(&fx, &token).await;
    let id = session["id"].as_str().expect("session id").to_string();
    for _ in 0..5 {
        let q = current_question_id(&session);
        let (status, res) = send(
            &fx.app,
            "POST",
            &format!("/api/sessions/{}/answer", id),
            Some(&token),
            Some(json!({ "question_id": q, "answer_id": fx.answers[&q].0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", res);
        assert_eq!(res["is_correct"], true);
        session = res["session"].clone();
    }

    assert_eq!(session["status"], "passed");
    assert_eq!(session["correct_count"], 5);
    assert_eq!(score(&session), 100.0);
    assert_eq!(session["progress_percentage"], 100.0);
    assert!(session["current_question"].is_null());

    let (status, stats) = send(&fx.app, "GET", "/api/sessions/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_status"]["passed"], 1);
    assert_eq!(stats["pass_rate"], 100.0);

    let (_, progress) = send(&fx.app, "GET", "/api/progress", Some(&token), None).await;
    assert!(progress["mastered"].as_i64().unwrap_or_default() >= 5);
}

#[tokio::test]
async fn paused_session_is_abandoned_by_a_new_start() {
    let Some(fx) = setup().await else { return };
    let token = login(&fx.app).await;

    let first = start(&fx, &token).await;
    let first_id = first["id"].as_str().expect("session id").to_string();

    let (status, paused) = send(&fx.app, "POST", &format!("/api/sessions/{}/pause", first_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paused["result"], "applied");
    assert_eq!(paused["session"]["status"], "paused");
    assert!(paused["session"]["remaining_time_seconds"].as_i64().unwrap_or_default() > 0);

    let q = current_question_id(&first);
    let (status, _) = send(
        &fx.app,
        "POST",
        &format!("/api/sessions/{}/answer", first_id),
        Some(&token),
        Some(json!({ "question_id": q, "answer_id": fx.answers[&q].0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let second = start(&fx, &token).await;
    assert_ne!(second["id"], first["id"]);

    let (_, first_now) = send(&fx.app, "GET", &format!("/api/sessions/{}", first_id), Some(&token), None).await;
    assert_eq!(first_now["status"], "abandoned");
    assert_eq!(first_now["is_finished"], true);
    assert_eq!(first_now["has_result"], false);
    assert!(first_now["finished_at"].is_string());

    let second_id = second["id"].as_str().expect("session id");
    let (_, res) = send(&fx.app, "POST", &format!("/api/sessions/{}/abandon", second_id), Some(&token), None).await;
    assert_eq!(res["abandoned"], true);
    assert_eq!(res["session"]["status"], "abandoned");

    let (_, history) = send(&fx.app, "GET", "/api/sessions?status=abandoned", Some(&token), None).await;
    assert_eq!(history["total"], 2);
}

#[tokio::test]
async fn other_profiles_cannot_see_a_session() {
    let Some(fx) = setup().await else { return };
    let owner = login(&fx.app).await;
    let stranger = login(&fx.app).await;

    let session = start(&fx, &owner).await;
    let id = session["id"].as_str().expect("session id");

    let (status, _) = send(&fx.app, "GET", &format!("/api/sessions/{}", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&fx.app, "POST", &format!("/api/sessions/{}/abandon", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
