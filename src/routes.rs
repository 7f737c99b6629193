// Router
// Every page route, the media files and the layers around them

use axum::{extract::DefaultBodyLimit, middleware::from_fn, routing::get, Router};
use tower_http::services::ServeDir;

use crate::handlers::{
    about::{about_author, about_tech},
    follow::{follow_index, profile_follow, profile_unfollow},
    health_check, page_not_found,
    posts::{
        add_comment, add_comment_page, group_posts, index, post_create, post_create_page, post_detail, post_edit,
        post_edit_page, profile,
    },
    users::{login, login_page, logout, signup, signup_page},
};
use crate::middleware::{create_middleware_stack, create_session_layer, render_error_pages};
use crate::state::SharedState;

/// Create the Axum router with all endpoints and middleware
pub fn create_router(state: SharedState, secure_cookies: bool) -> Router {
    let media = ServeDir::new(state.media.root());
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Listings
        .route("/", get(index))
        .route("/group/:slug/", get(group_posts))
        .route("/profile/:username/", get(profile))
        .route("/follow/", get(follow_index))
        // Posts
        .route("/create/", get(post_create_page).post(post_create).layer(upload_limit))
        .route("/posts/:post_id/", get(post_detail))
        .route("/posts/:post_id/edit/", get(post_edit_page).post(post_edit).layer(upload_limit))
        .route("/posts/:post_id/comment/", get(add_comment_page).post(add_comment))
        // Following
        .route("/profile/:username/follow/", get(profile_follow))
        .route("/profile/:username/unfollow/", get(profile_unfollow))
        // Accounts
        .route("/auth/signup/", get(signup_page).post(signup))
        .route("/auth/login/", get(login_page).post(login))
        .route("/auth/logout/", get(logout))
        // Static pages
        .route("/about/author/", get(about_author))
        .route("/about/tech/", get(about_tech))
        // Uploaded images
        .nest_service("/media", media)
        .fallback(page_not_found)
        .with_state(state)
        .layer(create_session_layer(secure_cookies))
        .layer(from_fn(render_error_pages))
        .layer(create_middleware_stack())
}
