//! Submission validators.
//!
//! Raw form payloads are validated field by field; failures are collected in
//! [`FormErrors`] so the page can be re-rendered with inline messages instead
//! of surfacing an error response.

use bytes::Bytes;
use imagesize::ImageType;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Field name used for errors that do not belong to a single input.
pub const NON_FIELD: &str = "__all__";

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    entries: Vec<(&'static str, String)>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.entries.push((field, message.into()));
    }

    pub fn add_domain(&mut self, error: DomainError) {
        match error {
            DomainError::Validation { field, message } => self.add(field, message),
            other => self.add(NON_FIELD, other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn for_field(&self, field: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    pub fn non_field(&self) -> Vec<&str> {
        self.for_field(NON_FIELD)
    }
}

/// A file field read from a multipart submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Image formats accepted for post uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bmp,
    Gif,
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Identify the format from the payload's magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match imagesize::image_type(bytes).ok()? {
            ImageType::Bmp => Some(Self::Bmp),
            ImageType::Gif => Some(Self::Gif),
            ImageType::Jpeg => Some(Self::Jpeg),
            ImageType::Png => Some(Self::Png),
            ImageType::Webp => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Gif => "gif",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// An upload that decoded as a recognised image format.
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub filename: String,
    pub format: ImageFormat,
    pub bytes: Bytes,
    pub width: usize,
    pub height: usize,
}

/// Raw post submission, as read from the multipart body.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedFile>,
    pub clear_image: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentSubmission {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupSubmission {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginSubmission {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// Require non-blank text, returning it with surrounding whitespace removed.
pub fn required_text(field: &'static str, raw: &str, errors: &mut FormErrors) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse the optional group choice. Blank means "no group".
pub fn optional_choice(field: &'static str, raw: &str, errors: &mut FormErrors) -> Option<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Uuid::parse_str(trimmed) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, INVALID_CHOICE);
            None
        }
    }
}

/// Accept an upload only if its bytes decode as a supported image format.
/// The client's filename and content type play no part in the decision.
pub fn optional_image(
    field: &'static str,
    upload: Option<&UploadedFile>,
    errors: &mut FormErrors,
) -> Option<ValidImage> {
    let upload = upload.filter(|file| !file.filename.trim().is_empty())?;

    if upload.bytes.is_empty() {
        errors.add(field, EMPTY_FILE);
        return None;
    }

    let format = ImageFormat::sniff(&upload.bytes);
    match (format, imagesize::blob_size(&upload.bytes)) {
        (Some(format), Ok(size)) if size.width > 0 && size.height > 0 => Some(ValidImage {
            filename: upload.filename.clone(),
            format,
            bytes: upload.bytes.clone(),
            width: size.width,
            height: size.height,
        }),
        _ => {
            errors.add(field, INVALID_IMAGE);
            None
        }
    }
}

/// Only local absolute paths are honoured as post-login destinations.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let candidate = next?.trim();
    let local = candidate.starts_with('/')
        && !candidate.starts_with("//")
        && !candidate.starts_with("/\\")
        && !candidate.contains(['\r', '\n']);
    local.then(|| candidate.to_string())
}
