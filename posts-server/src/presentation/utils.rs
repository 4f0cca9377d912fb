use actix_multipart::{Field, Multipart};
use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::domain::error::DomainError;
use crate::domain::post::PostInput;
use crate::domain::upload::{ImageUpload, MAX_IMAGE_BYTES};

pub const FLASH_COOKIE: &str = "flash";
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// One-shot status shown on the post list after a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Saved,
    Updated,
    Deleted,
}

impl Flash {
    pub fn message(self) -> &'static str {
        match self {
            Flash::Saved => "Data Berhasil Disimpan!",
            Flash::Updated => "Data Berhasil Diubah!",
            Flash::Deleted => "Data Berhasil Dihapus!",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Flash::Saved => "saved",
            Flash::Updated => "updated",
            Flash::Deleted => "deleted",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "saved" => Some(Flash::Saved),
            "updated" => Some(Flash::Updated),
            "deleted" => Some(Flash::Deleted),
            _ => None,
        }
    }

    pub fn from_request(req: &HttpRequest) -> Option<Self> {
        req.cookie(FLASH_COOKIE)
            .and_then(|cookie| Self::from_key(cookie.value()))
    }

    fn cookie(self) -> Cookie<'static> {
        Cookie::build(FLASH_COOKIE, self.key())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::minutes(5))
            .finish()
    }
}

/// 303 to the post list carrying the flash cookie.
pub fn redirect_to_index(flash: Flash) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/posts"))
        .cookie(flash.cookie())
        .finish()
}

/// Cookie that clears a flash once it has been shown.
pub fn flash_removal() -> Cookie<'static> {
    let mut cookie = Cookie::build(FLASH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Reads a post form (`title`, `content`, `image`) from a multipart body.
///
/// Text is trimmed. An image part with neither a file name nor bytes counts
/// as no image. Image bytes past the size limit are counted, not kept.
pub async fn read_post_form(mut payload: Multipart) -> Result<PostInput, DomainError> {
    let mut input = PostInput::default();

    while let Some(field) = payload.next().await {
        let field = field.map_err(|e| DomainError::InvalidForm(format!("multipart error: {}", e)))?;
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "title" => input.title = read_text(field).await?,
            "content" => input.content = read_text(field).await?,
            "image" => input.image = read_image(field).await?,
            _ => drain(field).await?,
        }
    }

    Ok(input)
}

async fn read_text(mut field: Field) -> Result<String, DomainError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| DomainError::InvalidForm(format!("read error: {}", e)))?;
        if buf.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(DomainError::InvalidForm("text field too large".into()));
        }
        buf.extend_from_slice(&chunk);
    }
    let text = String::from_utf8(buf.to_vec())
        .map_err(|_| DomainError::InvalidForm("text field is not valid UTF-8".into()))?;
    Ok(text.trim().to_string())
}

async fn read_image(mut field: Field) -> Result<Option<ImageUpload>, DomainError> {
    let file_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(|name| name.to_string())
        .filter(|name| !name.is_empty());
    let content_type = field.content_type().cloned();

    let mut buf = BytesMut::new();
    let mut size = 0usize;
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| DomainError::InvalidForm(format!("read error: {}", e)))?;
        size += chunk.len();
        let room = (MAX_IMAGE_BYTES + 1).saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    if file_name.is_none() && size == 0 {
        return Ok(None);
    }

    let mut image = ImageUpload::new(file_name, content_type, Bytes::from(buf));
    image.size = size;
    Ok(Some(image))
}

async fn drain(mut field: Field) -> Result<(), DomainError> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|e| DomainError::InvalidForm(format!("read error: {}", e)))?;
    }
    Ok(())
}
