//! Process-local post store, used when no database is configured and by tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use crate::data::post_repository::PostRepository;
use crate::domain::error::DomainError;
use crate::domain::post::{NewPost, Page, Post, PostChanges};

#[derive(Default)]
struct State {
    last_id: i64,
    posts: BTreeMap<i64, Post>,
}

#[derive(Default)]
pub struct InMemoryPostRepository {
    state: RwLock<State>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.posts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let now = Utc::now();
        let post = Post {
            id: state.last_id,
            image: post.image,
            title: post.title,
            content: post.content,
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(post.id, post.clone());

        info!(post_id = post.id, image = %post.image, "post created");
        Ok(post)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }

    async fn update(&self, id: i64, changes: PostChanges) -> Result<Option<Post>, DomainError> {
        let mut state = self.state.write().await;
        let Some(post) = state.posts.get_mut(&id) else {
            return Ok(None);
        };

        post.title = changes.title;
        post.content = changes.content;
        if let Some(image) = changes.image {
            post.image = image;
        }
        post.updated_at = Utc::now();

        info!(post_id = id, "post updated");
        Ok(Some(post.clone()))
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        match self.state.write().await.posts.remove(&id) {
            Some(_) => {
                info!(post_id = id, "post deleted");
                Ok(())
            }
            None => Err(DomainError::PostNotFound(id)),
        }
    }

    async fn list_latest(&self, page: u32, per_page: u32) -> Result<Page<Post>, DomainError> {
        let page = page.max(1);
        let state = self.state.read().await;

        let mut posts: Vec<&Post> = state.posts.values().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let skip = (page as usize - 1).saturating_mul(per_page as usize);
        let items = posts
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            page,
            per_page,
            total: state.posts.len() as u64,
        })
    }
}
