pub mod config;
pub mod database;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Arbiter Online Judge API",
        version = "1.0.0",
        description = "Submission intake and live evaluation results"
    ),
    paths(
        handlers::submission::create_submission,
        handlers::submission::list_submissions,
        handlers::submission::get_submission,
    ),
    tags(
        (name = "Submissions", description = "Submission intake and results"),
    )
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
