use axum::{
    extract::Request,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use askama::Template;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tower_sessions::{cookie::SameSite, MemoryStore as SessionMemoryStore, SessionManagerLayer};
use tracing::{error, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ErrorPage;
use crate::templates::{CsrfFailureTemplate, Nav, NotFoundTemplate, ServerErrorTemplate};

pub const SESSION_COOKIE_NAME: &str = "postboard_session";

/// Creates the complete middleware stack for the application
pub fn create_middleware_stack() -> ServiceBuilder<
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            TraceLayer<
                tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
                DefaultMakeSpan,
                DefaultOnRequest,
                DefaultOnResponse,
            >,
            tower::layer::util::Identity,
        >,
    >,
> {
    ServiceBuilder::new()
        // Request/response logging with tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Request timeout handling (30 seconds)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

/// Cookie sessions kept in process memory
/// `secure` marks the cookie HTTPS-only (production).
pub fn create_session_layer(secure: bool) -> SessionManagerLayer<SessionMemoryStore> {
    SessionManagerLayer::new(SessionMemoryStore::default())
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_name(SESSION_COOKIE_NAME)
        .with_http_only(true)
}

/// Replaces the body of marked error responses with the matching HTML page.
/// Status codes are left as the handler set them.
pub async fn render_error_pages(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };
    let status = response.status();

    let rendered = match page {
        ErrorPage::NotFound => NotFoundTemplate { nav: Nav::default(), path }.render(),
        ErrorPage::ServerError => ServerErrorTemplate { nav: Nav::default(), path }.render(),
        ErrorPage::CsrfFailure => CsrfFailureTemplate { nav: Nav::default() }.render(),
    };

    match rendered {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!("Failed to render {:?} page: {}", page, e);
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}

/// Initialize structured logging with JSON format
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    // Create environment filter for log levels
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize tracing subscriber with JSON formatting
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(true)
                .with_target(true)
                .with_thread_ids(true)
        )
        .try_init()?;

    tracing::info!("Structured logging initialized with JSON format");
    Ok(())
}
