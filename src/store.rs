// Store module
// Data-access interface shared by the PostgreSQL and in-memory backends

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Comment, Group, NewGroup, NewUser, Post, PostDraft, User};

/// Which posts a listing covers. Every listing is ordered newest first,
/// with the higher id first when timestamps tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create_group(&self, new_group: NewGroup) -> Result<Group, AppError>;
    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>, AppError>;
    async fn list_groups(&self) -> Result<Vec<Group>, AppError>;

    async fn create_post(&self, author_id: i64, draft: PostDraft) -> Result<Post, AppError>;
    async fn update_post(&self, post_id: i64, draft: PostDraft) -> Result<Post, AppError>;
    /// Returns whether a post was removed.
    async fn delete_post(&self, post_id: i64) -> Result<bool, AppError>;
    async fn post_by_id(&self, post_id: i64) -> Result<Option<Post>, AppError>;
    async fn count_posts(&self, scope: PostScope) -> Result<usize, AppError>;
    async fn list_posts(&self, scope: PostScope, offset: usize, limit: usize) -> Result<Vec<Post>, AppError>;

    async fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment, AppError>;
    /// Comments of a post in insertion order.
    async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError>;

    /// Creates the edge unless it exists. Returns whether a row was inserted.
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError>;
    /// Removes the edge if present. Returns whether a row was deleted.
    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError>;
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, AppError>;
}
