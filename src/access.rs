// Access rules
// Who may change which post, who may follow whom, and where guests are sent

use crate::error::AppError;
use crate::models::{Post, User};
use crate::store::Store;

pub const LOGIN_PATH: &str = "/auth/login/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDecision {
    Allowed,
    /// The viewer is not the author; the caller sends them to the read-only page.
    NotAuthor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDecision {
    Follow,
    /// Following yourself is ignored rather than reported.
    SelfFollow,
}

pub fn edit_decision(viewer: &User, post: &Post) -> EditDecision {
    if post.author_id == viewer.id {
        EditDecision::Allowed
    } else {
        EditDecision::NotAuthor
    }
}

pub fn follow_decision(viewer: &User, author: &User) -> FollowDecision {
    if viewer.id == author.id {
        FollowDecision::SelfFollow
    } else {
        FollowDecision::Follow
    }
}

/// Profile `following` flag. Guests never follow anyone, so the store is only asked for signed-in viewers.
pub async fn following_flag(store: &dyn Store, viewer: Option<&User>, author: &User) -> Result<bool, AppError> {
    match viewer {
        Some(viewer) => store.is_following(viewer.id, author.id).await,
        None => Ok(false),
    }
}

/// Login URL carrying the originally requested path in `next`.
/// Slashes stay literal; every other reserved character is percent-encoded.
pub fn login_redirect(path_and_query: &str) -> String {
    let next: String = url::form_urlencoded::byte_serialize(path_and_query.as_bytes()).collect();
    format!("{}?next={}", LOGIN_PATH, next.replace("%2F", "/"))
}

/// Only local absolute paths are honoured as post-login destinations.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();

    let local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.contains(['\r', '\n']);

    local.then_some(next)
}
