// Handlers module
// HTML page handlers

pub mod about;
pub mod follow;
pub mod posts;
pub mod users;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::models::Post;
use crate::pagination::Page;
use crate::state::{AppState, SharedState};
use crate::store::PostScope;

/// Health check handler
/// Returns "OK" with 200 status once the store answers
pub async fn health_check(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await?;
    Ok((StatusCode::OK, "OK"))
}

/// Fallback for unmatched routes
pub async fn page_not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("No route for {}", uri.path()))
}

/// 302 Found to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Numeric path segments; anything else is a missing page rather than a bad request.
pub(crate) fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found(format!("Post '{}'", raw)))
}

/// Counts the scope, resolves the requested page and fetches only that window.
pub(crate) async fn list_page(
    state: &AppState,
    scope: PostScope,
    requested: Option<&str>,
) -> Result<Page<Post>, AppError> {
    let total = state.store.count_posts(scope).await?;
    let window = state.paginator.locate(total, requested);
    let items = state.store.list_posts(scope, window.offset, window.limit).await?;
    Ok(state.paginator.page(window, items))
}

pub(crate) fn profile_path(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub(crate) fn post_path(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}
