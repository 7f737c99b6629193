use async_trait::async_trait;
use deadpool_postgres::{Config, Object, Pool, PoolConfig, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::models::{Comment, Group, GroupRef, NewGroup, NewUser, Post, PostDraft, User};
use crate::store::{PostScope, Store};

/// PostgreSQL への接続プールを握るリポジトリ層。
/// Deadpool の `Pool` を内部に保持し、`Store` トレイトの各操作を SQL で実装する。
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.text, p.created_at, p.author_id, u.username, g.id, g.slug, g.title, p.image
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const POST_ORDER: &str = "ORDER BY p.created_at DESC, p.id DESC";

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

const GROUP_COLUMNS: &str = "id, title, slug, description";

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

impl Database {
    /// 接続プールを構築し、起動時に疎通確認まで実施する。
    pub async fn new(config: DatabaseConfig) -> Result<Self, AppError> {
        info!("Creating PostgreSQL connection pool for host: {}:{}", config.host, config.port);

        let pool = Self::create_pool(config)?;

        let db = Database { pool };
        db.health_check().await?;

        Ok(db)
    }

    /// Deadpool 用の `Config` を組み立ててプールを生成する内部関数。
    /// `DATABASE_URL` が与えられていればそれを優先し、SSL モードは `native_tls` で実現する。
    fn create_pool(config: DatabaseConfig) -> Result<Pool, AppError> {
        let mut pg_config = Config::new();

        if let Some(url) = config.connection_string {
            pg_config.url = Some(url);
        } else {
            pg_config.host = Some(config.host);
            pg_config.port = Some(config.port);
            pg_config.dbname = Some(config.database);
            pg_config.user = Some(config.username);
            pg_config.password = Some(config.password);
        }

        pg_config.ssl_mode = Some(match config.ssl_mode.as_str() {
            "disable" => deadpool_postgres::SslMode::Disable,
            "allow" | "prefer" => deadpool_postgres::SslMode::Prefer,
            "require" => deadpool_postgres::SslMode::Require,
            other => {
                warn!("SSL mode '{}' is enforced as 'require' without certificate pinning", other);
                deadpool_postgres::SslMode::Require
            }
        });

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(config.max_connections as usize);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pool_config.timeouts.create = Some(config.connection_timeout);
        pg_config.pool = Some(pool_config);

        let tls_connector = TlsConnector::builder()
            .build()
            .map_err(|e| {
                error!("Failed to create TLS connector: {}", e);
                AppError::Database(format!("TLS connector creation failed: {}", e))
            })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                AppError::Database(format!("Connection pool creation failed: {}", e))
            })
    }

    /// プールから接続を借りる小さなラッパー。
    async fn get_connection(&self) -> Result<Object, AppError> {
        self.pool.get().await.map_err(AppError::from)
    }

    /// アプリ起動時にテーブル群を CREATE する簡易マイグレーター。
    /// SQL をリテラル文字列で保持しておき、`client.execute` を順番に呼び出している。
    pub async fn migrate(&self) -> Result<(), AppError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        let statements: [(&str, &str); 9] = [
            ("users table", r#"
                CREATE TABLE IF NOT EXISTS users (
                    id BIGSERIAL PRIMARY KEY,
                    username VARCHAR(150) NOT NULL UNIQUE,
                    email VARCHAR(254) NOT NULL DEFAULT '',
                    password_hash TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
            "#),
            ("groups table", r#"
                CREATE TABLE IF NOT EXISTS post_groups (
                    id BIGSERIAL PRIMARY KEY,
                    title VARCHAR(200) NOT NULL,
                    slug VARCHAR(200) NOT NULL UNIQUE,
                    description TEXT NOT NULL DEFAULT ''
                )
            "#),
            ("posts table", r#"
                CREATE TABLE IF NOT EXISTS posts (
                    id BIGSERIAL PRIMARY KEY,
                    text TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    group_id BIGINT REFERENCES post_groups(id) ON DELETE SET NULL,
                    image VARCHAR(255)
                )
            "#),
            ("posts created_at index", "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC, id DESC)"),
            ("posts author index", "CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id)"),
            ("posts group index", "CREATE INDEX IF NOT EXISTS idx_posts_group_id ON posts(group_id)"),
            ("comments table", r#"
                CREATE TABLE IF NOT EXISTS comments (
                    id BIGSERIAL PRIMARY KEY,
                    post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    text TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
            "#),
            ("follows table", r#"
                CREATE TABLE IF NOT EXISTS follows (
                    id BIGSERIAL PRIMARY KEY,
                    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    CONSTRAINT follows_unique_pair UNIQUE (user_id, author_id)
                )
            "#),
            ("comments post index", "CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id)"),
        ];

        for (name, sql) in statements {
            client.execute(sql, &[])
                .await
                .map_err(|e| {
                    error!("Failed to create {}: {}", name, e);
                    AppError::Database(format!("Migration step '{}' failed: {}", name, e))
                })?;
        }

        info!("Database migrations completed successfully");
        Ok(())
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        email: row.get(2),
        password_hash: row.get(3),
        created_at: row.get(4),
    }
}

fn group_from_row(row: &Row) -> Group {
    Group {
        id: row.get(0),
        title: row.get(1),
        slug: row.get(2),
        description: row.get(3),
    }
}

fn post_from_row(row: &Row) -> Post {
    let group_id: Option<i64> = row.get(5);

    Post {
        id: row.get(0),
        text: row.get(1),
        created_at: row.get(2),
        author_id: row.get(3),
        author_username: row.get(4),
        group: group_id.map(|id| GroupRef {
            id,
            slug: row.get(6),
            title: row.get(7),
        }),
        image: row.get(8),
    }
}

fn comment_from_row(row: &Row) -> Comment {
    Comment {
        id: row.get(0),
        post_id: row.get(1),
        author_id: row.get(2),
        author_username: row.get(3),
        text: row.get(4),
        created_at: row.get(5),
    }
}

/// `PostScope` を WHERE 句と、その唯一のパラメータに変換する。
fn scope_filter(scope: PostScope) -> (&'static str, Option<i64>) {
    match scope {
        PostScope::All => ("", None),
        PostScope::Group(group_id) => ("WHERE p.group_id = $1", Some(group_id)),
        PostScope::Author(author_id) => ("WHERE p.author_id = $1", Some(author_id)),
        PostScope::FollowedBy(user_id) => (
            "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = $1)",
            Some(user_id),
        ),
    }
}

#[async_trait]
impl Store for Database {
    /// `SELECT 1` を投げて DB が生きているか確認する。
    async fn health_check(&self) -> Result<(), AppError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[])
            .await
            .map_err(|e| {
                error!("Database health check failed: {}", e);
                AppError::Database(format!("Health check failed: {}", e))
            })?;

        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let client = self.get_connection().await?;

        let query = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        let row = client
            .query_one(&query, &[&new_user.username, &new_user.email, &new_user.password_hash])
            .await
            .map_err(AppError::from)?;

        let user = user_from_row(&row);
        info!("Created user {} with id: {}", user.username, user.id);
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&id]).await.map_err(AppError::from)?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&username]).await.map_err(AppError::from)?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn create_group(&self, new_group: NewGroup) -> Result<Group, AppError> {
        new_group.validate().map_err(AppError::Validation)?;

        let client = self.get_connection().await?;
        let query = format!(
            "INSERT INTO post_groups (title, slug, description) VALUES ($1, $2, $3) RETURNING {}",
            GROUP_COLUMNS
        );

        let row = client
            .query_one(&query, &[&new_group.title, &new_group.slug, &new_group.description])
            .await
            .map_err(AppError::from)?;

        let group = group_from_row(&row);
        info!("Created group '{}' with id: {}", group.slug, group.id);
        Ok(group)
    }

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM post_groups WHERE slug = $1", GROUP_COLUMNS);

        let row = client.query_opt(&query, &[&slug]).await.map_err(AppError::from)?;
        Ok(row.as_ref().map(group_from_row))
    }

    async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM post_groups ORDER BY title, id", GROUP_COLUMNS);

        let rows = client.query(&query, &[]).await.map_err(AppError::from)?;
        Ok(rows.iter().map(group_from_row).collect())
    }

    async fn create_post(&self, author_id: i64, draft: PostDraft) -> Result<Post, AppError> {
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        "#;

        let row = client
            .query_one(query, &[&draft.text, &author_id, &draft.group_id, &draft.image])
            .await
            .map_err(AppError::from)?;
        let post_id: i64 = row.get(0);

        info!("Created post with id: {} for author id: {}", post_id, author_id);

        self.post_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("post {} vanished after insert", post_id)))
    }

    async fn update_post(&self, post_id: i64, draft: PostDraft) -> Result<Post, AppError> {
        let client = self.get_connection().await?;

        let query = "UPDATE posts SET text = $1, group_id = $2, image = $3 WHERE id = $4";
        let updated = client
            .execute(query, &[&draft.text, &draft.group_id, &draft.image, &post_id])
            .await
            .map_err(AppError::from)?;

        if updated == 0 {
            return Err(AppError::not_found(format!("Post with id {}", post_id)));
        }

        info!("Updated post with id: {}", post_id);

        self.post_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post with id {}", post_id)))
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool, AppError> {
        let client = self.get_connection().await?;

        let deleted = client
            .execute("DELETE FROM posts WHERE id = $1", &[&post_id])
            .await
            .map_err(AppError::from)?;

        if deleted > 0 {
            info!("Deleted post with id: {}", post_id);
        }
        Ok(deleted > 0)
    }

    async fn post_by_id(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("{} WHERE p.id = $1", POST_SELECT);

        let row = client.query_opt(&query, &[&post_id]).await.map_err(AppError::from)?;
        Ok(row.as_ref().map(post_from_row))
    }

    async fn count_posts(&self, scope: PostScope) -> Result<usize, AppError> {
        let client = self.get_connection().await?;
        let (filter, param) = scope_filter(scope);
        let query = format!("SELECT COUNT(*) FROM posts p {}", filter);

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref id) = param {
            params.push(id);
        }

        let row = client.query_one(&query, &params).await.map_err(AppError::from)?;
        let count: i64 = row.get(0);
        Ok(count as usize)
    }

    /// WHERE 句のパラメータ数に応じて LIMIT / OFFSET のプレースホルダ番号をずらしている。
    async fn list_posts(&self, scope: PostScope, offset: usize, limit: usize) -> Result<Vec<Post>, AppError> {
        let client = self.get_connection().await?;
        let (filter, param) = scope_filter(scope);

        let limit = limit as i64;
        let offset = offset as i64;

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref id) = param {
            params.push(id);
        }
        let limit_index = params.len() + 1;
        params.push(&limit);
        params.push(&offset);

        let query = format!(
            "{} {} {} LIMIT ${} OFFSET ${}",
            POST_SELECT,
            filter,
            POST_ORDER,
            limit_index,
            limit_index + 1
        );

        let rows = client.query(&query, &params).await.map_err(AppError::from)?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment, AppError> {
        let client = self.get_connection().await?;

        let query = r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, post_id, author_id, text, created_at
            )
            SELECT i.id, i.post_id, i.author_id, u.username, i.text, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.author_id
        "#;

        let row = client
            .query_one(query, &[&post_id, &author_id, &text])
            .await
            .map_err(AppError::from)?;

        let comment = comment_from_row(&row);
        info!("Created comment {} on post {}", comment.id, post_id);
        Ok(comment)
    }

    async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let client = self.get_connection().await?;
        let query = format!("{} WHERE c.post_id = $1 ORDER BY c.id", COMMENT_SELECT);

        let rows = client.query(&query, &[&post_id]).await.map_err(AppError::from)?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// `ON CONFLICT DO NOTHING` で二重フォローを防ぎ、挿入件数で新規かどうかを判定する。
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let client = self.get_connection().await?;

        let inserted = client
            .execute(
                "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT (user_id, author_id) DO NOTHING",
                &[&user_id, &author_id],
            )
            .await
            .map_err(AppError::from)?;

        Ok(inserted > 0)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let client = self.get_connection().await?;

        let deleted = client
            .execute(
                "DELETE FROM follows WHERE user_id = $1 AND author_id = $2",
                &[&user_id, &author_id],
            )
            .await
            .map_err(AppError::from)?;

        Ok(deleted > 0)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, AppError> {
        let client = self.get_connection().await?;

        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
                &[&user_id, &author_id],
            )
            .await
            .map_err(AppError::from)?;

        Ok(row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_filter_parameters() {
        assert_eq!(scope_filter(PostScope::All), ("", None));
        assert_eq!(scope_filter(PostScope::Group(3)).1, Some(3));
        assert_eq!(scope_filter(PostScope::Author(4)).1, Some(4));

        let (sql, param) = scope_filter(PostScope::FollowedBy(5));
        assert!(sql.contains("follows"));
        assert_eq!(param, Some(5));
    }
}
