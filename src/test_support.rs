// Test helpers
// Drives the full router in-process with a cookie-carrying client

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;

use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        HeaderValue, Method, Request, StatusCode,
    },
    Router,
};
use tower::ServiceExt;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::memory::MemoryStore;
use crate::middleware::SESSION_COOKIE_NAME;
use crate::models::{Comment, Group, NewGroup, NewUser, Post, PostDraft, User};
use crate::routes::create_router;
use crate::state::{AppState, SharedState};
use crate::store::{PostScope, Store};

pub const TEST_PASSWORD: &str = "test-password-123";

/// 1x1 GIF
pub const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";

const BOUNDARY: &str = "postboard-test-boundary";

// Hashing is slow; every test user shares one hash of TEST_PASSWORD.
fn shared_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| User::hash_password(TEST_PASSWORD).expect("hashing the test password"))
        .clone()
}

/// One application instance over a fresh in-memory store and media directory.
pub struct TestApp {
    pub state: SharedState,
    router: Router,
    media_root: PathBuf,
}

/// A browser: its own cookie jar against a shared app.
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

pub struct TestFile<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

impl TestApp {
    /// Cache entries outlive any single test.
    pub async fn new() -> Self {
        Self::with_config(|config| config.index_cache_ttl = Duration::from_secs(60)).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), adjust).await
    }

    pub async fn with_store(store: Arc<dyn Store>, adjust: impl FnOnce(&mut Config)) -> Self {
        let media_root = std::env::temp_dir().join(format!("postboard-test-{}", Uuid::new_v4()));
        let mut config = Config::in_memory(media_root.clone());
        adjust(&mut config);

        let state = AppState::new(store, &config);
        let router = create_router(state.clone(), false);

        TestApp {
            state,
            router,
            media_root,
        }
    }

    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// A client already logged in as `user`.
    pub async fn client_for(&self, user: &User) -> TestClient {
        let mut client = self.client();
        client.login(&user.username).await;
        client
    }

    pub fn media_root(&self) -> &PathBuf {
        &self.media_root
    }

    pub async fn create_user(&self, username: &str) -> User {
        self.state
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: shared_password_hash(),
            })
            .await
            .expect("creating test user")
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        self.state
            .store
            .create_group(NewGroup::new(title, slug, "Test description"))
            .await
            .expect("creating test group")
    }

    pub async fn create_post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.state
            .store
            .create_post(
                author.id,
                PostDraft {
                    text: text.to_string(),
                    group_id: group.map(|g| g.id),
                    image: None,
                },
            )
            .await
            .expect("creating test post")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}

impl TestClient {
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish();

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(&mut self, uri: &str, fields: &[(&str, &str)], image: Option<TestFile<'_>>) -> TestResponse {
        let mut body: Vec<u8> = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }

        if let Some(file) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, file.file_name, file.content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(file.data);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// The session's CSRF token, read from the login form.
    pub async fn csrf_token(&mut self) -> String {
        let page = self.get("/auth/login/").await;
        extract_csrf_token(&page.body).expect("login page carries a CSRF token")
    }

    pub async fn login(&mut self, username: &str) {
        let token = self.csrf_token().await;
        let response = self
            .post_form(
                "/auth/login/",
                &[("username", username), ("password", TEST_PASSWORD), ("csrf_token", &token)],
            )
            .await;
        assert_eq!(response.status, StatusCode::FOUND, "login as {} failed", username);
    }

    async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(ref cookie) = self.cookie {
            request
                .headers_mut()
                .insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        for value in response.headers().get_all(SET_COOKIE) {
            self.store_cookie(value.to_str().unwrap());
        }

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    fn store_cookie(&mut self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default().trim();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        if name != SESSION_COOKIE_NAME {
            return;
        }

        let expired = set_cookie.to_ascii_lowercase().contains("max-age=0");
        self.cookie = if expired || value.is_empty() {
            None
        } else {
            Some(pair.to_string())
        };
    }
}

/// In-memory store that can be switched into failing like a lost database:
/// health checks and post writes error, reads keep working.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    broken: AtomicBool,
}

impl FlakyStore {
    pub fn break_down(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.broken.load(Ordering::SeqCst) {
            Err(AppError::Database("Database connection unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.check()?;
        self.inner.health_check().await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        self.inner.create_user(new_user).await
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        self.inner.user_by_id(id).await
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.inner.user_by_username(username).await
    }

    async fn create_group(&self, new_group: NewGroup) -> Result<Group, AppError> {
        self.inner.create_group(new_group).await
    }

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>, AppError> {
        self.inner.group_by_slug(slug).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        self.inner.list_groups().await
    }

    async fn create_post(&self, author_id: i64, draft: PostDraft) -> Result<Post, AppError> {
        self.check()?;
        self.inner.create_post(author_id, draft).await
    }

    async fn update_post(&self, post_id: i64, draft: PostDraft) -> Result<Post, AppError> {
        self.check()?;
        self.inner.update_post(post_id, draft).await
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool, AppError> {
        self.inner.delete_post(post_id).await
    }

    async fn post_by_id(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        self.inner.post_by_id(post_id).await
    }

    async fn count_posts(&self, scope: PostScope) -> Result<usize, AppError> {
        self.inner.count_posts(scope).await
    }

    async fn list_posts(&self, scope: PostScope, offset: usize, limit: usize) -> Result<Vec<Post>, AppError> {
        self.inner.list_posts(scope, offset, limit).await
    }

    async fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment, AppError> {
        self.inner.create_comment(post_id, author_id, text).await
    }

    async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        self.inner.comments_for_post(post_id).await
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        self.inner.follow(user_id, author_id).await
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        self.inner.unfollow(user_id, author_id).await
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        self.inner.is_following(user_id, author_id).await
    }
}

/// A GIF header padded with zeros to `len` bytes.
pub fn padded_gif(len: usize) -> Vec<u8> {
    let mut data = b"GIF89a".to_vec();
    data.resize(len.max(data.len()), 0);
    data
}

pub fn extract_csrf_token(html: &str) -> Option<String> {
    let marker = "name=\"csrf_token\" value=\"";
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}

/// Number of post cards rendered on a listing page.
pub fn count_post_cards(html: &str) -> usize {
    html.matches("class=\"post-card\"").count()
}
