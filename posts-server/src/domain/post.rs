use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, ValidationErrors};
use crate::domain::upload::{ImageUpload, MAX_IMAGE_KILOBYTES};

pub const TITLE_MIN_CHARS: usize = 5;
pub const CONTENT_MIN_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub image: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a post that does not exist yet; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub image: String,
    pub title: String,
    pub content: String,
}

/// Fields written by an update. `image: None` keeps the stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

/// One page of a newest-first listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn last_page(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.per_page)) as u32
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.last_page()
    }
}

/// A submitted post form, create or update.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    pub image: Option<ImageUpload>,
}

/// Input that passed validation. `image` carries the storage extension.
#[derive(Debug, Clone)]
pub struct ValidPostInput {
    pub title: String,
    pub content: String,
    pub image: Option<(ImageUpload, &'static str)>,
}

impl PostInput {
    pub fn validate(self, image_required: bool) -> Result<ValidPostInput, DomainError> {
        let mut errors = ValidationErrors::default();

        let image = match self.image {
            None if image_required => {
                errors.push("image", required_message("image"));
                None
            }
            None => None,
            Some(image) => check_image(image, &mut errors),
        };
        check_text("title", &self.title, TITLE_MIN_CHARS, &mut errors);
        check_text("content", &self.content, CONTENT_MIN_CHARS, &mut errors);

        errors.into_result()?;
        Ok(ValidPostInput {
            title: self.title,
            content: self.content,
            image,
        })
    }
}

fn check_image(
    image: ImageUpload,
    errors: &mut ValidationErrors,
) -> Option<(ImageUpload, &'static str)> {
    let extension = image.image_extension();
    if extension.is_none() {
        errors.push(
            "image",
            "The image field must be a file of type: jpeg, png, jpg, gif, svg.",
        );
    }
    if image.exceeds_limit() {
        errors.push(
            "image",
            format!(
                "The image field must not be greater than {} kilobytes.",
                MAX_IMAGE_KILOBYTES
            ),
        );
        return None;
    }
    extension.map(|ext| (image, ext))
}

fn check_text(field: &'static str, value: &str, min_chars: usize, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.push(field, required_message(field));
    } else if value.chars().count() < min_chars {
        errors.push(
            field,
            format!("The {} field must be at least {} characters.", field, min_chars),
        );
    }
}

fn required_message(field: &str) -> String {
    format!("The {} field is required.", field)
}
