use bytes::Bytes;
use mime::Mime;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const MAX_IMAGE_KILOBYTES: usize = 2048;
pub const MAX_IMAGE_BYTES: usize = MAX_IMAGE_KILOBYTES * 1024;

/// Raster types recognised from their leading bytes, and the stored extension.
const RASTER_TYPES: [(&str, &str); 3] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
];

/// How far into the body an `<svg` root element is looked for.
const SVG_SNIFF_BYTES: usize = 1024;

const HASH_NAME_LEN: usize = 40;

/// An uploaded image as received, before it is written anywhere.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<Mime>,
    pub data: Bytes,
    /// Bytes the client sent. Can exceed `data.len()` when the body was cut off.
    pub size: usize,
}

impl ImageUpload {
    pub fn new(file_name: Option<String>, content_type: Option<Mime>, data: Bytes) -> Self {
        let size = data.len();
        Self {
            file_name,
            content_type,
            data,
            size,
        }
    }

    /// Declared content type, or a guess from the file name when the client
    /// sent none or a generic one.
    pub fn declared_mime(&self) -> Option<Mime> {
        match &self.content_type {
            Some(declared) if *declared != mime::APPLICATION_OCTET_STREAM => Some(declared.clone()),
            _ => self
                .file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first()),
        }
    }

    /// Storage extension when the content is one of the accepted image types.
    ///
    /// Raster formats are recognised from their magic bytes alone. SVG has
    /// none, so it is accepted only when declared as `image/svg+xml` and the
    /// body opens with an XML prolog or an `<svg` root.
    pub fn image_extension(&self) -> Option<&'static str> {
        if self.data.is_empty() {
            return None;
        }
        match infer::get(&self.data).map(|kind| kind.mime_type()) {
            Some("text/xml") | None => (self.declares_svg() && looks_like_svg(&self.data)).then_some("svg"),
            Some(detected) => RASTER_TYPES
                .iter()
                .find(|(accepted, _)| *accepted == detected)
                .map(|(_, ext)| *ext),
        }
    }

    fn declares_svg(&self) -> bool {
        self.declared_mime()
            .is_some_and(|m| m.essence_str().eq_ignore_ascii_case("image/svg+xml"))
    }

    pub fn exceeds_limit(&self) -> bool {
        self.size > MAX_IMAGE_BYTES
    }

    /// A fresh, collision-resistant file name derived from the content and a
    /// random salt, so equal uploads still get distinct names.
    pub fn hash_name(&self, extension: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Uuid::new_v4().as_bytes());
        hasher.update(&self.data);
        let digest = hex::encode(hasher.finalize());
        format!("{}.{}", &digest[..HASH_NAME_LEN], extension)
    }
}

fn looks_like_svg(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(SVG_SNIFF_BYTES)]).to_ascii_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();
    (head.starts_with("<?xml") || head.starts_with("<svg") || head.starts_with("<!--"))
        && head.contains("<svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const SVG: &[u8] = b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"1\" height=\"1\"/>";

    fn upload(name: &str, content_type: Option<&str>, data: &[u8]) -> ImageUpload {
        ImageUpload::new(
            Some(name.to_string()),
            content_type.map(|ct| ct.parse().unwrap()),
            Bytes::copy_from_slice(data),
        )
    }

    #[test]
    fn content_decides_the_raster_type() {
        assert_eq!(upload("photo.txt", Some("image/png"), PNG).image_extension(), Some("png"));
        assert_eq!(upload("photo.png", Some("image/png"), JPEG).image_extension(), Some("jpg"));
        assert_eq!(upload("a.gif", None, b"GIF89a\x01\0\x01\0").image_extension(), Some("gif"));
    }

    #[test]
    fn declared_image_type_does_not_vouch_for_the_body() {
        let script = b"<?php system($_GET['c']); ?><html><script>alert(1)</script>";
        assert_eq!(upload("evil.png", Some("image/png"), script).image_extension(), None);
        assert_eq!(upload("evil.svg", Some("image/png"), SVG).image_extension(), None);
    }

    #[test]
    fn empty_files_are_not_images() {
        assert_eq!(upload("x.jpg", Some("image/jpeg"), b"").image_extension(), None);
    }

    #[test]
    fn svg_needs_declared_type_and_svg_markup() {
        assert_eq!(upload("d.svg", Some("image/svg+xml"), SVG).image_extension(), Some("svg"));
        assert_eq!(
            upload("d.svg", Some("application/octet-stream"), b"<?xml version=\"1.0\"?>\n<svg/>")
                .image_extension(),
            Some("svg")
        );
        assert_eq!(upload("d.svg", Some("image/svg+xml"), b"<html><body/></html>").image_extension(), None);
    }

    #[test]
    fn non_image_content_is_rejected() {
        assert_eq!(upload("cv.pdf", Some("application/pdf"), b"%PDF-1.7\n").image_extension(), None);
        assert_eq!(
            upload("pic.webp", Some("image/webp"), b"RIFF\x24\0\0\0WEBPVP8 ").image_extension(),
            None
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        let mut img = upload("a.png", None, PNG);
        img.size = MAX_IMAGE_BYTES;
        assert!(!img.exceeds_limit());
        img.size = MAX_IMAGE_BYTES + 1;
        assert!(img.exceeds_limit());
    }

    #[test]
    fn hash_names_are_unique_for_equal_content() {
        let img = upload("a.png", Some("image/png"), PNG);
        let first = img.hash_name("png");
        let second = img.hash_name("png");

        assert_ne!(first, second);
        assert!(first.ends_with(".png"));
        assert_eq!(first.len(), HASH_NAME_LEN + ".png".len());
        assert!(first[..HASH_NAME_LEN].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
