use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    routing::{get, post},
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::AppState;

mod common;
pub mod csp;
mod workflows;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest_service(
            "/static",
            <ServeDir as ServiceExt<Request>>::map_response(
                ServeDir::new("static"),
                |mut response| {
                    // Cache the stylesheet for a day, mark must-revalidate
                    response.headers_mut().insert(
                        header::CACHE_CONTROL,
                        HeaderValue::from_static("public, max-age=86400, must-revalidate"),
                    );
                    response
                },
            ),
        )
        .route("/", get(workflows::index))
        .route("/workflows", get(workflows::list))
        .route("/workflows/new", get(workflows::new))
        .route("/workflows/new", post(workflows::new_save))
        .route("/workflows/{workflow_id}", get(workflows::edit))
        .route("/workflows/{workflow_id}", post(workflows::edit_save))
        .route("/workflows/{workflow_id}/delete", get(workflows::delete_confirm))
        .route("/workflows/{workflow_id}/delete", post(workflows::delete))
        .route("/scope", post(crate::scope::set_scope))
}
