// Follow handlers
// Subscriptions between authors and the feed they produce

use axum::{
    extract::{Path, Query, State},
    response::{Html, Response},
};
use tracing::info;

use super::{found, list_page, profile_path};
use crate::access::{follow_decision, FollowDecision};
use crate::auth::RequireUser;
use crate::error::AppError;
use crate::models::User;
use crate::pagination::PageQuery;
use crate::state::SharedState;
use crate::store::PostScope;
use crate::templates::{render, FollowTemplate, Nav};

/// Posts by followed authors
/// GET /follow/
pub async fn follow_index(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = list_page(&state, PostScope::FollowedBy(user.id), query.page.as_deref()).await?;

    render(&FollowTemplate {
        nav: Nav::for_viewer(Some(&user)),
        page,
    })
}

/// Follow an author; repeating it or following yourself changes nothing
/// GET /profile/:username/follow/
pub async fn profile_follow(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;

    match follow_decision(&user, &author) {
        FollowDecision::SelfFollow => {
            info!("{} tried to follow themselves, ignoring", user.username);
        }
        FollowDecision::Follow => {
            if state.store.follow(user.id, author.id).await? {
                info!("{} now follows {}", user.username, author.username);
            }
        }
    }

    Ok(found(&profile_path(&author.username)))
}

/// Unfollow an author; a missing edge is not an error
/// GET /profile/:username/unfollow/
pub async fn profile_unfollow(
    State(state): State<SharedState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;

    if state.store.unfollow(user.id, author.id).await? {
        info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(found(&profile_path(&author.username)))
}

async fn load_author(state: &SharedState, username: &str) -> Result<User, AppError> {
    state
        .store
        .user_by_username(username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User '{}'", username)))
}
