use std::sync::Arc;

use crate::data::post_repository::PostRepository;
use crate::domain::error::DomainError;
use crate::domain::post::{NewPost, Page, Post, PostChanges, PostInput};
use crate::infrastructure::file_store::{FileStore, join_path};
use tracing::{instrument, warn};

/// Logical folder every post image lives in.
pub const POSTS_FOLDER: &str = "posts";
pub const PAGE_SIZE: u32 = 5;

/// The posts resource: validation in front of the post store and the file store.
///
/// File and record writes are separate steps. A failed record write leaves the
/// freshly stored image behind, and image cleanup failures never block the
/// record change.
#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    files: Arc<dyn FileStore>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>, files: Arc<dyn FileStore>) -> Self {
        Self { repo, files }
    }

    pub fn image_path(image: &str) -> String {
        join_path(POSTS_FOLDER, image)
    }

    pub async fn list_posts(&self, page: u32) -> Result<Page<Post>, DomainError> {
        self.repo.list_latest(page.max(1), PAGE_SIZE).await
    }

    pub async fn get_post(&self, id: i64) -> Result<Post, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    /// Bytes of a stored post image, if the file exists.
    pub async fn get_image(&self, name: &str) -> Result<Option<bytes::Bytes>, DomainError> {
        self.files.get(&Self::image_path(name)).await
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_post(&self, input: PostInput) -> Result<Post, DomainError> {
        let valid = input.validate(true)?;
        let Some((image, extension)) = valid.image else {
            return Err(DomainError::Internal("validated create input without image".into()));
        };

        let image_name = image.hash_name(extension);
        self.files
            .put_file_as(POSTS_FOLDER, &image_name, image.data)
            .await?;

        let new_post = NewPost {
            image: image_name.clone(),
            title: valid.title,
            content: valid.content,
        };
        self.repo.create(new_post).await.inspect_err(|e| {
            warn!(image = %image_name, error = %e, "post not created, stored image left orphaned");
        })
    }

    #[instrument(skip(self, input))]
    pub async fn update_post(&self, id: i64, input: PostInput) -> Result<Post, DomainError> {
        let current = self.get_post(id).await?;
        let valid = input.validate(false)?;

        let image = match valid.image {
            Some((upload, extension)) => {
                let image_name = upload.hash_name(extension);
                self.files
                    .put_file_as(POSTS_FOLDER, &image_name, upload.data)
                    .await?;
                self.remove_image(&current.image).await;
                Some(image_name)
            }
            None => None,
        };

        let changes = PostChanges {
            title: valid.title,
            content: valid.content,
            image,
        };
        self.repo
            .update(id, changes)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    #[instrument(skip(self, post), fields(post_id = post.id))]
    pub async fn delete_post(&self, post: &Post) -> Result<(), DomainError> {
        self.remove_image(&post.image).await;
        self.repo.delete(post.id).await
    }

    async fn remove_image(&self, image: &str) {
        let path = Self::image_path(image);
        if let Err(e) = self.files.delete(&path).await {
            warn!(path = %path, error = %e, "failed to delete post image, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryPostRepository;
    use crate::data::post_repository::MockPostRepository;
    use crate::domain::upload::ImageUpload;
    use crate::infrastructure::file_store::{MemoryFileStore, MockFileStore};
    use bytes::Bytes;
    use chrono::Utc;

    struct Fixture {
        repo: Arc<InMemoryPostRepository>,
        files: Arc<MemoryFileStore>,
        service: PostService,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryPostRepository::new());
        let files = Arc::new(MemoryFileStore::new());
        let service = PostService::new(repo.clone(), files.clone());
        Fixture {
            repo,
            files,
            service,
        }
    }

    /// A JPEG whose body ends with `tag`, so fixtures stay distinguishable.
    fn jpeg(tag: &[u8]) -> ImageUpload {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(tag);
        ImageUpload::new(Some("photo.jpg".into()), Some(mime::IMAGE_JPEG), Bytes::from(data))
    }

    fn input(title: &str, content: &str, image: Option<ImageUpload>) -> PostInput {
        PostInput {
            title: title.into(),
            content: content.into(),
            image,
        }
    }

    fn stored_post(id: i64, image: &str) -> Post {
        Post {
            id,
            image: image.into(),
            title: "Stored title".into(),
            content: "Stored content body".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_stores_file_and_record() {
        let f = fixture();
        let post = f
            .service
            .create_post(input("Hello World", "This is my first post", Some(jpeg(b"jpeg"))))
            .await
            .unwrap();

        assert_eq!(post.title, "Hello World");
        assert_eq!(post.content, "This is my first post");
        assert!(post.image.ends_with(".jpg"));
        assert!(f.files.exists(&PostService::image_path(&post.image)).await.unwrap());

        let fetched = f.service.get_post(post.id).await.unwrap();
        assert_eq!(fetched, post);
    }

    #[tokio::test]
    async fn invalid_create_has_no_side_effects() {
        let f = fixture();
        let err = f
            .service
            .create_post(input("Hi", "This is my first post", Some(jpeg(b"jpeg"))))
            .await
            .unwrap_err();

        assert!(err.validation_errors().unwrap().has("title"));
        assert!(f.repo.is_empty().await);
        assert!(f.files.paths().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let f = fixture();
        assert!(matches!(
            f.service.get_post(99).await,
            Err(DomainError::PostNotFound(99))
        ));
        assert!(matches!(
            f.service
                .update_post(99, input("Hello World", "This is my first post", None))
                .await,
            Err(DomainError::PostNotFound(99))
        ));
    }

    #[tokio::test]
    async fn listing_twice_gives_the_same_page() {
        let f = fixture();
        for n in 0..7 {
            f.service
                .create_post(input(
                    &format!("Title number {n}"),
                    "Enough content here",
                    Some(jpeg(b"jpeg")),
                ))
                .await
                .unwrap();
        }

        let first = f.service.list_posts(1).await.unwrap();
        let again = f.service.list_posts(1).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first.items.len(), PAGE_SIZE as usize);
        assert_eq!(first.items[0].title, "Title number 6");
        assert_eq!(f.service.list_posts(2).await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn update_without_image_keeps_image() {
        let f = fixture();
        let post = f
            .service
            .create_post(input("Hello World", "This is my first post", Some(jpeg(b"jpeg"))))
            .await
            .unwrap();

        let updated = f
            .service
            .update_post(post.id, input("New title", "Brand new content", None))
            .await
            .unwrap();

        assert_eq!(updated.image, post.image);
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.content, "Brand new content");
        assert!(f.files.exists(&PostService::image_path(&post.image)).await.unwrap());
    }

    #[tokio::test]
    async fn update_with_image_replaces_file() {
        let f = fixture();
        let post = f
            .service
            .create_post(input("Hello World", "This is my first post", Some(jpeg(b"old"))))
            .await
            .unwrap();

        let png = ImageUpload::new(
            Some("new.png".into()),
            Some(mime::IMAGE_PNG),
            Bytes::from_static(b"\x89PNG\r\n\x1a\nnew"),
        );
        let updated = f
            .service
            .update_post(post.id, input("Hello World", "This is my first post", Some(png)))
            .await
            .unwrap();

        assert_ne!(updated.image, post.image);
        assert!(updated.image.ends_with(".png"));
        assert_eq!(
            f.files.paths().await,
            vec![PostService::image_path(&updated.image)]
        );
    }

    #[tokio::test]
    async fn invalid_update_leaves_post_untouched() {
        let f = fixture();
        let post = f
            .service
            .create_post(input("Hello World", "This is my first post", Some(jpeg(b"jpeg"))))
            .await
            .unwrap();

        let err = f
            .service
            .update_post(post.id, input("Hello World", "short", Some(jpeg(b"other"))))
            .await
            .unwrap_err();

        assert!(err.validation_errors().unwrap().has("content"));
        assert_eq!(f.service.get_post(post.id).await.unwrap(), post);
        assert_eq!(f.files.paths().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_record_and_file() {
        let f = fixture();
        let post = f
            .service
            .create_post(input("Hello World", "This is my first post", Some(jpeg(b"jpeg"))))
            .await
            .unwrap();

        f.service.delete_post(&post).await.unwrap();

        assert!(matches!(
            f.service.get_post(post.id).await,
            Err(DomainError::PostNotFound(_))
        ));
        assert!(f.files.paths().await.is_empty());
    }

    #[tokio::test]
    async fn failed_image_write_creates_no_record() {
        let mut files = MockFileStore::new();
        files
            .expect_put_file_as()
            .returning(|_, _, _| Err(DomainError::Storage("disk full".into())));
        let mut repo = MockPostRepository::new();
        repo.expect_create().never();

        let service = PostService::new(Arc::new(repo), Arc::new(files));
        let err = service
            .create_post(input("Hello World", "This is my first post", Some(jpeg(b"jpeg"))))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Storage(_)));
    }

    #[tokio::test]
    async fn failed_record_write_surfaces_and_keeps_file() {
        let mut files = MockFileStore::new();
        files
            .expect_put_file_as()
            .times(1)
            .returning(|folder, name, _| Ok(join_path(folder, name)));
        files.expect_delete().never();
        let mut repo = MockPostRepository::new();
        repo.expect_create()
            .returning(|_| Err(DomainError::Persistence("connection reset".into())));

        let service = PostService::new(Arc::new(repo), Arc::new(files));
        let err = service
            .create_post(input("Hello World", "This is my first post", Some(jpeg(b"jpeg"))))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Persistence(_)));
    }

    #[tokio::test]
    async fn old_image_cleanup_failure_does_not_block_update() {
        let mut repo = MockPostRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(stored_post(id, "old.jpg"))));
        repo.expect_update()
            .withf(|id, changes| *id == 5 && changes.image.is_some())
            .returning(|id, changes| {
                let mut post = stored_post(id, &changes.image.unwrap());
                post.title = changes.title;
                post.content = changes.content;
                Ok(Some(post))
            });

        let mut files = MockFileStore::new();
        files
            .expect_put_file_as()
            .returning(|folder, name, _| Ok(join_path(folder, name)));
        files
            .expect_delete()
            .withf(|path| path.to_string() == "posts/old.jpg")
            .times(1)
            .returning(|_| Err(DomainError::Storage("permission denied".into())));

        let service = PostService::new(Arc::new(repo), Arc::new(files));
        let updated = service
            .update_post(5, input("Hello World", "This is my first post", Some(jpeg(b"new"))))
            .await
            .unwrap();

        assert_ne!(updated.image, "old.jpg");
        assert_eq!(updated.title, "Hello World");
    }

    #[tokio::test]
    async fn image_cleanup_failure_does_not_block_delete() {
        let mut files = MockFileStore::new();
        files
            .expect_delete()
            .times(1)
            .returning(|_| Err(DomainError::Storage("io error".into())));
        let mut repo = MockPostRepository::new();
        repo.expect_delete().withf(|id| *id == 3).times(1).returning(|_| Ok(()));

        let service = PostService::new(Arc::new(repo), Arc::new(files));
        service.delete_post(&stored_post(3, "a.png")).await.unwrap();
    }

    #[tokio::test]
    async fn failed_record_delete_surfaces() {
        let mut files = MockFileStore::new();
        files.expect_delete().returning(|_| Ok(()));
        let mut repo = MockPostRepository::new();
        repo.expect_delete()
            .returning(|_| Err(DomainError::Persistence("locked".into())));

        let service = PostService::new(Arc::new(repo), Arc::new(files));
        let err = service.delete_post(&stored_post(3, "a.png")).await.unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
    }
}
