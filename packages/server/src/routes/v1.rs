use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/problems", problem_routes())
        .nest("/submissions", submission_routes())
}

fn problem_routes() -> Router<AppState> {
    Router::new().route(
        "/{id}/submissions",
        post(handlers::submission::create_submission),
    )
}

fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::submission::list_submissions))
        .route("/{id}", get(handlers::submission::get_submission))
        .route("/{id}/progress", get(handlers::progress::submission_progress))
}
