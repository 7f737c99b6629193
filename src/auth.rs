// Authentication
// Session-backed extractors for the current viewer

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::debug;

use crate::access::login_redirect;
use crate::error::AppError;
use crate::handlers::found;
use crate::models::User;
use crate::state::SharedState;

pub const USER_SESSION_KEY: &str = "user_id";

/// The signed-in user, if any.
pub struct CurrentUser(pub Option<User>);

/// A signed-in user; guests are redirected to the login page with `next` set.
pub struct RequireUser(pub User);

/// Resolves the session's user id; a stale id (user gone) is dropped from the session.
pub async fn session_user(session: &Session, state: &SharedState) -> Result<Option<User>, AppError> {
    let Some(user_id) = session.get::<i64>(USER_SESSION_KEY).await? else {
        return Ok(None);
    };

    match state.store.user_by_id(user_id).await? {
        Some(user) => Ok(Some(user)),
        None => {
            debug!("Session refers to missing user {}, signing out", user_id);
            session.remove::<i64>(USER_SESSION_KEY).await?;
            Ok(None)
        }
    }
}

pub async fn sign_in(session: &Session, user: &User) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(USER_SESSION_KEY, user.id).await?;
    Ok(())
}

pub async fn sign_out(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

#[async_trait]
impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let user = session_user(&session, state)
            .await
            .map_err(IntoResponse::into_response)?;

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<SharedState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        match user {
            Some(user) => Ok(RequireUser(user)),
            None => {
                let requested = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                debug!("Guest requested {}, redirecting to login", requested);
                Err(found(&login_redirect(requested)))
            }
        }
    }
}
