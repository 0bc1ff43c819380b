// Form validation: required text, uploaded images, usernames and slugs
// Every check records into FieldErrors instead of failing fast

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::FieldErrors;
use crate::models::Image;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_VALUE: &str = "Enter a valid value.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

pub const USERNAME_MAX_LEN: usize = 150;
pub const TITLE_MAX_LEN: usize = 200;
pub const SLUG_MAX_LEN: usize = 50;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

/// Trimmed value of a required text field; whitespace-only counts as empty.
pub fn required_text(value: &str, field: &str, errors: &mut FieldErrors) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    }
    trimmed.to_string()
}

/// Decodes an optional base64 upload (a `data:` URL prefix is accepted) and
/// checks that it is a supported raster format.
pub fn decode_image(raw: Option<&str>, field: &str, errors: &mut FieldErrors) -> Option<Image> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let payload = match raw.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(""),
        None => raw,
    };

    let bytes = match base64::engine::general_purpose::STANDARD.decode(payload.trim()) {
        Ok(bytes) => bytes,
        Err(_) => {
            errors.add(field, INVALID_IMAGE);
            return None;
        }
    };

    match sniff_image_type(&bytes) {
        Some(content_type) => Some(Image {
            content_type: content_type.to_string(),
            bytes,
        }),
        None => {
            errors.add(field, INVALID_IMAGE);
            None
        }
    }
}

/// Content type of a supported raster image, judged by its magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") && bytes.len() >= 14 {
        Some("image/bmp")
    } else {
        None
    }
}

pub fn validate_username(username: &str, errors: &mut FieldErrors) -> String {
    let username = required_text(username, "username", errors);
    if username.is_empty() {
        return username;
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        errors.add(
            "username",
            format!("Ensure this value has at most {} characters.", USERNAME_MAX_LEN),
        );
    }
    if !USERNAME_RE.is_match(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    username
}

pub fn validate_slug(slug: &str, errors: &mut FieldErrors) -> String {
    let slug = required_text(slug, "slug", errors);
    if slug.is_empty() {
        return slug;
    }
    if slug.chars().count() > SLUG_MAX_LEN {
        errors.add(
            "slug",
            format!("Ensure this value has at most {} characters.", SLUG_MAX_LEN),
        );
    }
    if !SLUG_RE.is_match(&slug) {
        errors.add(
            "slug",
            "Enter a valid \u{201c}slug\u{201d} consisting of letters, numbers, underscores or hyphens.",
        );
    }
    slug
}

pub fn validate_title(title: &str, errors: &mut FieldErrors) -> String {
    let title = required_text(title, "title", errors);
    if title.chars().count() > TITLE_MAX_LEN {
        errors.add(
            "title",
            format!("Ensure this value has at most {} characters.", TITLE_MAX_LEN),
        );
    }
    title
}
