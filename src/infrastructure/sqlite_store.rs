use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::str::FromStr;
use tracing::{debug, info};

use crate::core::{
    from_millis, to_millis, GroupId, Page, PageRequest, PageWindow, PostId, UserId,
};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::infrastructure::store::{EntityStore, PostFilter, PostUpdate};
use crate::models::{
    Comment, CommentView, Group, GroupRef, Image, NewGroup, NewPost, Post, PostChanges, PostView,
    User,
};
use crate::services::validation::INVALID_CHOICE;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        date_joined INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id INTEGER REFERENCES post_groups(id) ON DELETE SET NULL,
        image BLOB,
        image_content_type TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        text TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS follows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        UNIQUE (user_id, author_id),
        CHECK (user_id <> author_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        UNIQUE (user_id, post_id),
        CHECK (user_id <> author_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id)",
];

const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.text, p.created_at, p.author_id, u.username AS author,
           p.group_id, g.slug AS group_slug, g.title AS group_title,
           (p.image IS NOT NULL) AS has_image,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const POST_SELECT: &str = "SELECT id, text, created_at, author_id, group_id, (image IS NOT NULL) AS has_image FROM posts";

/// SQLite implementation of the entity store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        if !in_memory {
            let filename = options.clone().get_filename();
            if let Some(parent) = filename.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        AppError::ConfigurationError(format!(
                            "Failed to create database directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
        }

        // An in-memory database lives exactly as long as its connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e))
        })?;

        let store = Self { pool };
        store.initialize().await?;
        info!(url, "entity store ready");
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Creates tables and indexes; safe to run against an existing database.
    pub async fn initialize(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to create schema: {}", e)))?;
        }
        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        date_joined: from_millis(row.try_get("date_joined")?),
    })
}

fn group_from_row(row: &SqliteRow) -> Result<Group, sqlx::Error> {
    Ok(Group {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        created_at: from_millis(row.try_get("created_at")?),
        author_id: row.try_get("author_id")?,
        group_id: row.try_get("group_id")?,
        has_image: row.try_get::<i64, _>("has_image")? != 0,
    })
}

fn post_view_from_row(row: &SqliteRow) -> Result<PostView, sqlx::Error> {
    let id: PostId = row.try_get("id")?;
    let group_id: Option<GroupId> = row.try_get("group_id")?;
    let group = match group_id {
        Some(group_id) => Some(GroupRef {
            id: group_id,
            slug: row.try_get("group_slug")?,
            title: row.try_get("group_title")?,
        }),
        None => None,
    };
    let has_image = row.try_get::<i64, _>("has_image")? != 0;

    Ok(PostView {
        id,
        text: row.try_get("text")?,
        created_at: from_millis(row.try_get("created_at")?),
        author_id: row.try_get("author_id")?,
        author: row.try_get("author")?,
        group,
        image_url: has_image.then(|| PostView::image_path(id)),
        comment_count: row.try_get::<i64, _>("comment_count")? as u64,
        like_count: row.try_get::<i64, _>("like_count")? as u64,
        liked: None,
    })
}

/// A post write that races `delete_group` trips the group foreign key; report
/// it the way a missing group is reported on the form.
fn post_write_error(err: sqlx::Error, group_id: Option<GroupId>) -> AppError {
    match &err {
        sqlx::Error::Database(db) if group_id.is_some() && db.is_foreign_key_violation() => {
            AppError::Validation(FieldErrors::single("group", INVALID_CHOICE))
        }
        _ => err.into(),
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            qb.push(" WHERE p.group_id = ");
            qb.push_bind(*group_id);
        }
        PostFilter::Author(author_id) => {
            qb.push(" WHERE p.author_id = ");
            qb.push_bind(*author_id);
        }
        PostFilter::Authors(author_ids) if author_ids.is_empty() => {
            qb.push(" WHERE 0");
        }
        PostFilter::Authors(author_ids) => {
            qb.push(" WHERE p.author_id IN (");
            let mut separated = qb.separated(", ");
            for author_id in author_ids {
                separated.push_bind(*author_id);
            }
            separated.push_unseparated(")");
        }
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn create_user(&self, username: &str) -> AppResult<Option<User>> {
        let now = to_millis(Utc::now());
        let result = sqlx::query(
            "INSERT INTO users (username, date_joined) VALUES (?, ?) ON CONFLICT(username) DO NOTHING",
        )
        .bind(username)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(User {
            id: UserId(result.last_insert_rowid()),
            username: username.to_string(),
            date_joined: from_millis(now),
        }))
    }

    async fn find_user(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT id, username, date_joined FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn create_group(&self, group: NewGroup) -> AppResult<Option<Group>> {
        let result = sqlx::query(
            "INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?) ON CONFLICT(slug) DO NOTHING",
        )
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Group {
            id: GroupId(result.last_insert_rowid()),
            title: group.title,
            slug: group.slug,
            description: group.description,
        }))
    }

    async fn get_group(&self, id: GroupId) -> AppResult<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(group_from_row).transpose()?)
    }

    async fn find_group(&self, slug: &str) -> AppResult<Option<Group>> {
        let row =
            sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.as_ref().map(group_from_row).transpose()?)
    }

    async fn delete_group(&self, id: GroupId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM post_groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_post(&self, post: NewPost, created_at: DateTime<Utc>) -> AppResult<Post> {
        let (image, content_type) = match post.image {
            Some(image) => (Some(image.bytes), Some(image.content_type)),
            None => (None, None),
        };
        let has_image = image.is_some();
        let group_id = post.group_id;

        let result = sqlx::query(
            "INSERT INTO posts (text, created_at, author_id, group_id, image, image_content_type) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&post.text)
        .bind(to_millis(created_at))
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(image)
        .bind(content_type)
        .execute(&self.pool)
        .await
        .map_err(|err| post_write_error(err, group_id))?;

        Ok(Post {
            id: PostId(result.last_insert_rowid()),
            text: post.text,
            created_at,
            author_id: post.author_id,
            group_id: post.group_id,
            has_image,
        })
    }

    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", POST_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(post_from_row).transpose()?)
    }

    async fn get_post_view(&self, id: PostId) -> AppResult<Option<PostView>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?", POST_VIEW_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(post_view_from_row).transpose()?)
    }

    async fn post_image(&self, id: PostId) -> AppResult<Option<Image>> {
        let row = sqlx::query(
            "SELECT image, image_content_type FROM posts WHERE id = ? AND image IS NOT NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Image {
                bytes: row.try_get("image")?,
                content_type: row
                    .try_get::<Option<String>, _>("image_content_type")?
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            })),
            None => Ok(None),
        }
    }

    async fn update_post(
        &self,
        id: PostId,
        editor: UserId,
        changes: PostChanges,
    ) -> AppResult<PostUpdate> {
        let mut tx = self.pool.begin().await?;
        let group_id = changes.group.flatten();

        if !changes.is_empty() {
            let mut qb = QueryBuilder::<Sqlite>::new("UPDATE posts SET ");
            let mut assignments = qb.separated(", ");
            if let Some(text) = changes.text {
                assignments.push("text = ");
                assignments.push_bind_unseparated(text);
            }
            if let Some(group_id) = changes.group {
                assignments.push("group_id = ");
                assignments.push_bind_unseparated(group_id);
            }
            if let Some(image) = changes.image {
                assignments.push("image = ");
                assignments.push_bind_unseparated(image.bytes);
                assignments.push("image_content_type = ");
                assignments.push_bind_unseparated(image.content_type);
            }
            qb.push(" WHERE id = ");
            qb.push_bind(id);
            qb.push(" AND author_id = ");
            qb.push_bind(editor);

            let result = qb
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|err| post_write_error(err, group_id))?;
            debug!(post_id = %id, rows = result.rows_affected(), "post update applied");
        }

        let row = sqlx::query(&format!("{} WHERE id = ?", POST_SELECT))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let outcome = match row.as_ref().map(post_from_row).transpose()? {
            None => PostUpdate::NotFound,
            Some(post) if post.author_id != editor => PostUpdate::NotAuthor,
            Some(post) => PostUpdate::Updated(post),
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn post_page(
        &self,
        filter: &PostFilter,
        request: PageRequest,
    ) -> AppResult<Page<PostView>> {
        let mut tx = self.pool.begin().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
        push_filter(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *tx)
            .await?;

        let window = PageWindow::resolve(request, total.max(0) as u64);

        let mut select = QueryBuilder::<Sqlite>::new(POST_VIEW_SELECT);
        push_filter(&mut select, filter);
        select.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        select.push_bind(window.limit() as i64);
        select.push(" OFFSET ");
        select.push_bind(window.offset() as i64);
        let rows = select.build().fetch_all(&mut *tx).await?;

        tx.commit().await?;

        let items = rows
            .iter()
            .map(post_view_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(window.into_page(items))
    }

    async fn insert_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<Option<Comment>> {
        let result = sqlx::query(
            "INSERT INTO comments (post_id, author_id, text, created_at) SELECT id, ?, ?, ? FROM posts WHERE id = ?",
        )
        .bind(author_id)
        .bind(text)
        .bind(to_millis(created_at))
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Comment {
            id: result.last_insert_rowid().into(),
            post_id,
            author_id,
            text: text.to_string(),
            created_at,
        }))
    }

    async fn list_comments(&self, post_id: PostId) -> AppResult<Vec<CommentView>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, u.username AS author, c.text, c.created_at
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ?
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<CommentView, sqlx::Error> {
                Ok(CommentView {
                    id: row.try_get("id")?,
                    author: row.try_get("author")?,
                    text: row.try_get("text")?,
                    created_at: from_millis(row.try_get("created_at")?),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(AppError::from)
    }

    async fn insert_follow(&self, user: UserId, author: UserId) -> AppResult<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
                .bind(user)
                .bind(author)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_follow(&self, user: UserId, author: UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user)
            .bind(author)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn follow_exists(&self, user: UserId, author: UserId) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user)
            .bind(author)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn followed_author_ids(&self, user: UserId) -> AppResult<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, UserId>(
            "SELECT author_id FROM follows WHERE user_id = ? ORDER BY author_id",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn count_followers(&self, author: UserId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE author_id = ?")
            .bind(author)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_following(&self, user: UserId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ?")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn insert_like(&self, user: UserId, post: PostId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO likes (user_id, author_id, post_id)
            SELECT ?, author_id, id FROM posts WHERE id = ? AND author_id <> ?
            "#,
        )
        .bind(user)
        .bind(post)
        .bind(user)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_like(&self, user: UserId, post: PostId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user)
            .bind(post)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn like_exists(&self, user: UserId, post: PostId) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user)
            .bind(post)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn liked_post_ids(&self, user: UserId, posts: &[PostId]) -> AppResult<Vec<PostId>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT post_id FROM likes WHERE user_id = ");
        qb.push_bind(user);
        qb.push(" AND post_id IN (");
        let mut separated = qb.separated(", ");
        for post in posts {
            separated.push_bind(*post);
        }
        separated.push_unseparated(")");

        let ids = qb.build_query_scalar::<PostId>().fetch_all(&self.pool).await?;
        Ok(ids)
    }

    async fn count_likes(&self, post: PostId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
