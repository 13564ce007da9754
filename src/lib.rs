pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::{
    auth_service::AuthService, progress_service::ProgressService,
    question_service::QuestionService, session_service::SessionService,
};

const MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub session_service: SessionService,
    pub question_service: QuestionService,
    pub progress_service: ProgressService,
    pub auth_service: AuthService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);

        let session_service = SessionService::new(pool.clone());
        let question_service = QuestionService::new(pool.clone());
        let progress_service = ProgressService::new(pool.clone());
        let auth_service = AuthService::new(pool.clone(), config.clone());

        Self {
            pool,
            config,
            session_service,
            question_service,
            progress_service,
            auth_service,
        }
    }
}

/// Full HTTP surface: public reference data and profile selection, plus the
/// bearer-protected session and progress routes.
pub fn app(state: AppState) -> Router {
    let public_api = Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::ready))
        .route(
            "/api/profiles",
            get(routes::profiles::list_profiles).post(routes::profiles::create_profile),
        )
        .route(
            "/api/profiles/:id/select",
            post(routes::profiles::select_profile),
        )
        .route(
            "/api/license-types",
            get(routes::questions::list_license_types),
        )
        .route("/api/categories", get(routes::questions::list_categories))
        .route("/api/questions", get(routes::questions::list_questions))
        .route("/api/questions/:id", get(routes::questions::get_question))
        .route("/api/templates", get(routes::questions::list_templates));

    let protected_api = Router::new()
        .route(
            "/api/sessions",
            get(routes::sessions::list_sessions).post(routes::sessions::create_session),
        )
        .route("/api/sessions/stats", get(routes::sessions::get_stats))
        .route("/api/sessions/:id", get(routes::sessions::get_session))
        .route(
            "/api/sessions/:id/answer",
            post(routes::sessions::answer_question),
        )
        .route("/api/sessions/:id/skip", post(routes::sessions::skip_question))
        .route(
            "/api/sessions/:id/navigate",
            post(routes::sessions::navigate),
        )
        .route("/api/sessions/:id/pause", post(routes::sessions::pause))
        .route("/api/sessions/:id/resume", post(routes::sessions::resume))
        .route("/api/sessions/:id/abandon", post(routes::sessions::abandon))
        .route("/api/sessions/:id/finish", post(routes::sessions::finish))
        .route(
            "/api/progress",
            get(routes::progress::get_overview).delete(routes::progress::reset_progress),
        )
        .route(
            "/api/progress/bookmarks",
            get(routes::progress::list_bookmarks),
        )
        .route(
            "/api/progress/bookmarks/:question_id",
            post(routes::progress::set_bookmark),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let cors = middleware::cors::cors_layer(&state.config.cors_origins);

    public_api
        .merge(protected_api)
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::RateLimiter::new(state.config.api_rps),
            middleware::rate_limit::rps_middleware,
        ))
        .with_state(state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
