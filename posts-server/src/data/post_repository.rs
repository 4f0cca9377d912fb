use crate::domain::error::DomainError;
use crate::domain::post::{NewPost, Page, Post, PostChanges};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError>;
    async fn update(&self, id: i64, changes: PostChanges) -> Result<Option<Post>, DomainError>;
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
    async fn list_latest(&self, page: u32, per_page: u32) -> Result<Page<Post>, DomainError>;
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError> {
        let now = Utc::now();
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (image, title, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, image, title, content, created_at, updated_at
            "#,
        )
        .bind(&post.image)
        .bind(&post.title)
        .bind(&post.content)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create post: {}", e);
            DomainError::Persistence(format!("database error: {}", e))
        })?;

        info!(post_id = post.id, image = %post.image, "post created");
        Ok(post)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, image, title, content, created_at, updated_at
            FROM posts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error find_by_id {}: {}", id, e);
            DomainError::Persistence(e.to_string())
        })
    }

    async fn update(&self, id: i64, changes: PostChanges) -> Result<Option<Post>, DomainError> {
        let now = Utc::now();
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET
                title = $1,
                content = $2,
                image = COALESCE($3, image),
                updated_at = $4
            WHERE id = $5
            RETURNING id, image, title, content, created_at, updated_at
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(changes.image.as_deref())
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update post {}: {}", id, e);
            DomainError::Persistence(e.to_string())
        })?;

        if post.is_some() {
            info!(post_id = id, "post updated");
        }

        Ok(post)
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to delete post {}: {}", id, e);
                DomainError::Persistence(e.to_string())
            })?;

        if deleted.rows_affected() == 0 {
            return Err(DomainError::PostNotFound(id));
        }

        info!(post_id = id, "post deleted");
        Ok(())
    }

    async fn list_latest(&self, page: u32, per_page: u32) -> Result<Page<Post>, DomainError> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while counting posts: {}", e);
                DomainError::Persistence(e.to_string())
            })?;

        let items = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, image, title, content, created_at, updated_at
            FROM posts
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching posts: {}", e);
            DomainError::Persistence(e.to_string())
        })?;

        Ok(Page {
            items,
            page,
            per_page,
            total: total.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../migrations/0001_create_posts.sql");

    fn column(name: &str) -> &'static str {
        SCHEMA
            .lines()
            .map(str::trim)
            .find(|line| line.split_whitespace().next() == Some(name))
            .unwrap()
    }

    #[test]
    fn text_columns_have_no_length_cap() {
        // validation sets no upper bound on title or content
        assert!(column("title").contains("TEXT"), "{}", column("title"));
        assert!(column("content").contains("TEXT"), "{}", column("content"));
    }
}
