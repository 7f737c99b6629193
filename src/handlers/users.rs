// User handlers
// Sign-up, login and logout

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use super::found;
use crate::access::safe_next;
use crate::auth::{sign_in, sign_out, CurrentUser};
use crate::csrf::{csrf_token, verify_csrf};
use crate::error::AppError;
use crate::models::{FormErrors, LoginForm, NewUser, SignupForm, User};
use crate::state::SharedState;
use crate::templates::{render, LoginTemplate, Nav, SignupTemplate};

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Query parameters for the login page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Sign-up form
/// GET /auth/signup/
pub async fn signup_page(
    CurrentUser(viewer): CurrentUser,
    session: Session,
) -> Result<Html<String>, AppError> {
    let token = csrf_token(&session).await?;
    render(&signup_template(viewer.as_ref(), &SignupForm::default(), token))
}

/// Register and sign in
/// POST /auth/signup/
pub async fn signup(
    State(state): State<SharedState>,
    CurrentUser(viewer): CurrentUser,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    verify_csrf(&session, &form.csrf_token).await?;

    let (username, email) = match form.validate() {
        Ok(cleaned) => cleaned,
        Err(errors) => return rerender_signup(viewer.as_ref(), &session, &form, &errors).await,
    };

    if state.store.user_by_username(&username).await?.is_some() {
        let mut errors = FormErrors::new();
        errors.add("username", USERNAME_TAKEN);
        return rerender_signup(viewer.as_ref(), &session, &form, &errors).await;
    }

    let new_user = NewUser {
        username,
        email,
        password_hash: User::hash_password(&form.password)?,
    };

    let user = match state.store.create_user(new_user).await {
        Ok(user) => user,
        Err(AppError::Conflict(_)) => {
            let mut errors = FormErrors::new();
            errors.add("username", USERNAME_TAKEN);
            return rerender_signup(viewer.as_ref(), &session, &form, &errors).await;
        }
        Err(e) => return Err(e),
    };

    sign_in(&session, &user).await?;
    info!("Registered user {} with id {}", user.username, user.id);

    Ok(found("/"))
}

/// Login form
/// GET /auth/login/?next=<path>
pub async fn login_page(
    CurrentUser(viewer): CurrentUser,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    render(&LoginTemplate {
        nav: Nav::for_viewer(viewer.as_ref()),
        username: String::new(),
        next: query.next.unwrap_or_default(),
        error: String::new(),
        csrf_token: csrf_token(&session).await?,
    })
}

/// Check credentials and continue to `next`
/// POST /auth/login/
pub async fn login(
    State(state): State<SharedState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    verify_csrf(&session, &form.csrf_token).await?;

    let user = state
        .store
        .user_by_username(form.username.trim())
        .await?
        .filter(|user| user.verify_password(&form.password));

    let Some(user) = user else {
        info!("Failed login attempt for '{}'", form.username.trim());
        let template = LoginTemplate {
            nav: Nav::default(),
            username: form.username.trim().to_string(),
            next: form.next.clone().unwrap_or_default(),
            error: BAD_CREDENTIALS.to_string(),
            csrf_token: csrf_token(&session).await?,
        };
        return Ok(render(&template)?.into_response());
    };

    sign_in(&session, &user).await?;
    info!("User {} logged in", user.username);

    let destination = safe_next(form.next.as_deref()).unwrap_or("/");
    Ok(found(destination))
}

/// GET /auth/logout/
pub async fn logout(session: Session) -> Result<Response, AppError> {
    sign_out(&session).await?;
    Ok(found("/"))
}

async fn rerender_signup(
    viewer: Option<&User>,
    session: &Session,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let token = csrf_token(session).await?;
    let template = signup_template(viewer, form, token).with_errors(errors);
    Ok(render(&template)?.into_response())
}

fn signup_template(viewer: Option<&User>, form: &SignupForm, csrf_token: String) -> SignupTemplate {
    SignupTemplate {
        nav: Nav::for_viewer(viewer),
        username: form.username.clone(),
        email: form.email.clone(),
        username_errors: Vec::new(),
        email_errors: Vec::new(),
        password_errors: Vec::new(),
        password_confirm_errors: Vec::new(),
        csrf_token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestApp, TEST_PASSWORD};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_signup_registers_and_signs_in() {
        let app = TestApp::new().await;
        let mut client = app.client();

        let token = client.csrf_token().await;
        let response = client
            .post_form(
                "/auth/signup/",
                &[
                    ("username", "newcomer"),
                    ("email", "newcomer@example.com"),
                    ("password", "long-password"),
                    ("password_confirm", "long-password"),
                    ("csrf_token", &token),
                ],
            )
            .await;

        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.location.as_deref(), Some("/"));

        let user = app.state.store.user_by_username("newcomer").await.unwrap().unwrap();
        assert!(user.verify_password("long-password"));

        let feed = client.get("/follow/").await;
        assert_eq!(feed.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signup_rejects_taken_username() {
        let app = TestApp::new().await;
        app.create_user("taken").await;
        let mut client = app.client();

        let token = client.csrf_token().await;
        let response = client
            .post_form(
                "/auth/signup/",
                &[
                    ("username", "taken"),
                    ("password", "long-password"),
                    ("password_confirm", "long-password"),
                    ("csrf_token", &token),
                ],
            )
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.contains(USERNAME_TAKEN));
    }

    #[tokio::test]
    async fn test_login_follows_local_next_only() {
        let app = TestApp::new().await;
        app.create_user("writer").await;

        let mut client = app.client();
        let token = client.csrf_token().await;
        let response = client
            .post_form(
                "/auth/login/",
                &[
                    ("username", "writer"),
                    ("password", TEST_PASSWORD),
                    ("next", "/create/"),
                    ("csrf_token", &token),
                ],
            )
            .await;
        assert_eq!(response.location.as_deref(), Some("/create/"));

        let mut client = app.client();
        let token = client.csrf_token().await;
        let response = client
            .post_form(
                "/auth/login/",
                &[
                    ("username", "writer"),
                    ("password", TEST_PASSWORD),
                    ("next", "https://evil.example/"),
                    ("csrf_token", &token),
                ],
            )
            .await;
        assert_eq!(response.location.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_wrong_password_redisplays_login() {
        let app = TestApp::new().await;
        app.create_user("writer").await;
        let mut client = app.client();

        let token = client.csrf_token().await;
        let response = client
            .post_form(
                "/auth/login/",
                &[("username", "writer"), ("password", "nope"), ("csrf_token", &token)],
            )
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.contains("Please enter a correct username and password."));
        assert_eq!(client.get("/follow/").await.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_logout_ends_the_session() {
        let app = TestApp::new().await;
        let writer = app.create_user("writer").await;
        let mut client = app.client_for(&writer).await;
        assert_eq!(client.get("/follow/").await.status, StatusCode::OK);

        let response = client.get("/auth/logout/").await;
        assert_eq!(response.status, StatusCode::FOUND);

        let response = client.get("/follow/").await;
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.location.as_deref(), Some("/auth/login/?next=/follow/"));
    }
}
