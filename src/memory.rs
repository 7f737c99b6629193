// In-process store
// Same contract as the PostgreSQL backend, kept behind a single RwLock

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::AppError;
use crate::models::{Comment, Follow, Group, NewGroup, NewUser, Post, PostDraft, User};
use crate::store::{PostScope, Store};

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    text: String,
    created_at: DateTime<Utc>,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    groups: BTreeMap<i64, Group>,
    posts: BTreeMap<i64, PostRow>,
    comments: BTreeMap<i64, CommentRow>,
    follows: HashSet<Follow>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn join_post(&self, row: &PostRow) -> Result<Post, AppError> {
        let author = self.users.get(&row.author_id).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("post {} references missing user {}", row.id, row.author_id))
        })?;

        Ok(Post {
            id: row.id,
            text: row.text.clone(),
            created_at: row.created_at,
            author_id: row.author_id,
            author_username: author.username.clone(),
            group: row
                .group_id
                .and_then(|id| self.groups.get(&id))
                .map(Group::to_ref),
            image: row.image.clone(),
        })
    }

    fn join_comment(&self, row: &CommentRow) -> Comment {
        Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            author_username: self
                .users
                .get(&row.author_id)
                .map(|u| u.username.clone())
                .unwrap_or_default(),
            text: row.text.clone(),
            created_at: row.created_at,
        }
    }

    fn in_scope(&self, row: &PostRow, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(group_id) => row.group_id == Some(group_id),
            PostScope::Author(author_id) => row.author_id == author_id,
            PostScope::FollowedBy(user_id) => self.follows.contains(&Follow::new(user_id, row.author_id)),
        }
    }

    /// Newest first; ids break timestamp ties.
    fn scoped_posts(&self, scope: PostScope) -> Vec<&PostRow> {
        let mut rows: Vec<&PostRow> = self
            .posts
            .values()
            .filter(|row| self.in_scope(row, scope))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows
    }

    fn check_foreign_keys(&self, author_id: i64, group_id: Option<i64>) -> Result<(), AppError> {
        if !self.users.contains_key(&author_id) {
            return Err(AppError::validation("Referenced resource does not exist"));
        }
        if let Some(group_id) = group_id {
            if !self.groups.contains_key(&group_id) {
                return Err(AppError::validation("Referenced resource does not exist"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.username == new_user.username) {
            return Err(AppError::conflict("A user with that username already exists"));
        }

        let id = tables.allocate_id();
        let user = User {
            id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());

        info!("Created user {} with id: {}", user.username, user.id);
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_group(&self, new_group: NewGroup) -> Result<Group, AppError> {
        new_group.validate().map_err(AppError::Validation)?;

        let mut tables = self.tables.write().await;

        if tables.groups.values().any(|g| g.slug == new_group.slug) {
            return Err(AppError::conflict("A group with that slug already exists"));
        }

        let id = tables.allocate_id();
        let group = Group {
            id,
            title: new_group.title,
            slug: new_group.slug,
            description: new_group.description,
        };
        tables.groups.insert(id, group.clone());

        info!("Created group '{}' with id: {}", group.slug, group.id);
        Ok(group)
    }

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.values().find(|g| g.slug == slug).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        let tables = self.tables.read().await;
        let mut groups: Vec<Group> = tables.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn create_post(&self, author_id: i64, draft: PostDraft) -> Result<Post, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_foreign_keys(author_id, draft.group_id)?;

        let id = tables.allocate_id();
        let row = PostRow {
            id,
            text: draft.text,
            created_at: Utc::now(),
            author_id,
            group_id: draft.group_id,
            image: draft.image,
        };
        tables.posts.insert(id, row.clone());

        info!("Created post with id: {} for author id: {}", id, author_id);
        tables.join_post(&row)
    }

    async fn update_post(&self, post_id: i64, draft: PostDraft) -> Result<Post, AppError> {
        let mut tables = self.tables.write().await;

        let author_id = tables
            .posts
            .get(&post_id)
            .map(|row| row.author_id)
            .ok_or_else(|| AppError::not_found(format!("Post with id {}", post_id)))?;
        tables.check_foreign_keys(author_id, draft.group_id)?;

        let row = match tables.posts.get_mut(&post_id) {
            Some(row) => {
                row.text = draft.text;
                row.group_id = draft.group_id;
                row.image = draft.image;
                row.clone()
            }
            None => return Err(AppError::not_found(format!("Post with id {}", post_id))),
        };

        info!("Updated post with id: {}", post_id);
        tables.join_post(&row)
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;

        let removed = tables.posts.remove(&post_id).is_some();
        if removed {
            tables.comments.retain(|_, c| c.post_id != post_id);
            info!("Deleted post with id: {}", post_id);
        }
        Ok(removed)
    }

    async fn post_by_id(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        let tables = self.tables.read().await;
        tables.posts.get(&post_id).map(|row| tables.join_post(row)).transpose()
    }

    async fn count_posts(&self, scope: PostScope) -> Result<usize, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.values().filter(|row| tables.in_scope(row, scope)).count())
    }

    async fn list_posts(&self, scope: PostScope, offset: usize, limit: usize) -> Result<Vec<Post>, AppError> {
        let tables = self.tables.read().await;
        tables
            .scoped_posts(scope)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| tables.join_post(row))
            .collect()
    }

    async fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment, AppError> {
        let mut tables = self.tables.write().await;

        if !tables.posts.contains_key(&post_id) || !tables.users.contains_key(&author_id) {
            return Err(AppError::validation("Referenced resource does not exist"));
        }

        let id = tables.allocate_id();
        let row = CommentRow {
            id,
            post_id,
            author_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        tables.comments.insert(id, row.clone());

        info!("Created comment {} on post {}", id, post_id);
        Ok(tables.join_comment(&row))
    }

    async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|c| tables.join_comment(c))
            .collect())
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&user_id) || !tables.users.contains_key(&author_id) {
            return Err(AppError::validation("Referenced resource does not exist"));
        }

        Ok(tables.follows.insert(Follow::new(user_id, author_id)))
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.follows.remove(&Follow::new(user_id, author_id)))
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.follows.contains(&Follow::new(user_id, author_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: String::new(),
            password_hash: "unused".to_string(),
        }
    }

    fn draft(text: &str, group_id: Option<i64>) -> PostDraft {
        PostDraft {
            text: text.to_string(),
            group_id,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_usernames_are_unique() {
        let store = MemoryStore::new();
        assert_ok!(store.create_user(new_user("writer")).await);

        let duplicate = store.create_user(new_user("writer")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_group_scope_only_returns_group_posts() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("writer")).await.unwrap();
        let rust = store.create_group(NewGroup::new("Rust", "rust", "")).await.unwrap();
        let go = store.create_group(NewGroup::new("Go", "go", "")).await.unwrap();

        store.create_post(author.id, draft("one", Some(rust.id))).await.unwrap();
        store.create_post(author.id, draft("two", Some(go.id))).await.unwrap();
        store.create_post(author.id, draft("three", None)).await.unwrap();

        let posts = store.list_posts(PostScope::Group(rust.id), 0, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts.iter().all(|p| p.group_id() == Some(rust.id)));
        assert_eq!(store.count_posts(PostScope::All).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_with_id_tiebreak() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("writer")).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.create_post(author.id, draft(&format!("post {}", i), None)).await.unwrap().id);
        }

        let listed: Vec<i64> = store
            .list_posts(PostScope::All, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);

        let window = store.list_posts(PostScope::All, 3, 10).await.unwrap();
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn test_follow_edges_are_unique() {
        let store = MemoryStore::new();
        let reader = store.create_user(new_user("reader")).await.unwrap();
        let author = store.create_user(new_user("author")).await.unwrap();

        assert!(store.follow(reader.id, author.id).await.unwrap());
        assert!(!store.follow(reader.id, author.id).await.unwrap());
        assert!(store.is_following(reader.id, author.id).await.unwrap());
        assert!(!store.is_following(author.id, reader.id).await.unwrap());

        assert!(store.unfollow(reader.id, author.id).await.unwrap());
        assert!(!store.unfollow(reader.id, author.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_followed_scope() {
        let store = MemoryStore::new();
        let reader = store.create_user(new_user("reader")).await.unwrap();
        let author = store.create_user(new_user("author")).await.unwrap();
        let other = store.create_user(new_user("other")).await.unwrap();

        store.create_post(author.id, draft("followed", None)).await.unwrap();
        store.create_post(other.id, draft("not followed", None)).await.unwrap();
        store.follow(reader.id, author.id).await.unwrap();

        let feed = store.list_posts(PostScope::FollowedBy(reader.id), 0, 10).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author_username, "author");
        assert_eq!(store.count_posts(PostScope::FollowedBy(other.id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_post_foreign_keys_are_checked() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("writer")).await.unwrap();

        assert_err!(store.create_post(author.id + 100, draft("x", None)).await);
        assert_err!(store.create_post(author.id, draft("x", Some(999))).await);
        assert_err!(store.update_post(999, draft("x", None)).await);
    }

    #[tokio::test]
    async fn test_comments_keep_insertion_order_and_die_with_post() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("writer")).await.unwrap();
        let post = store.create_post(author.id, draft("x", None)).await.unwrap();

        store.create_comment(post.id, author.id, "first").await.unwrap();
        store.create_comment(post.id, author.id, "second").await.unwrap();

        let texts: Vec<String> = store
            .comments_for_post(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);

        assert!(store.delete_post(post.id).await.unwrap());
        assert!(store.comments_for_post(post.id).await.unwrap().is_empty());
        assert!(!store.delete_post(post.id).await.unwrap());
    }
}
