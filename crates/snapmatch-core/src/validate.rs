//! Client-side upload validation. Runs before any storage call.

use bytes::Bytes;
use thiserror::Error;

const MIB: usize = 1024 * 1024;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * MIB;
pub const DEFAULT_MAX_SELFIE_BYTES: usize = 5 * MIB;

const SELFIE_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select at least one image to upload.")]
    EmptyBatch,
    #[error("{0} is not a valid image file")]
    NotAnImage(String),
    #[error("{name} exceeds the {limit_mb}MB size limit")]
    TooLarge { name: String, limit_mb: usize },
    #[error("Please select a selfie to upload.")]
    MissingSelfie,
    #[error("Only JPEG and PNG images are supported")]
    UnsupportedSelfieFormat,
    #[error("Image size must be less than {limit_mb}MB")]
    SelfieTooLarge { limit_mb: usize },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// A file received from a client, not yet uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Size ceilings for the two upload flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_image_bytes: usize,
    pub max_selfie_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_selfie_bytes: DEFAULT_MAX_SELFIE_BYTES,
        }
    }
}

impl UploadLimits {
    /// Validate one file for the event/gallery image flow.
    pub fn check_image(&self, file: &UploadFile) -> Result<(), ValidationError> {
        if !file.content_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage(file.name.clone()));
        }
        if file.len() > self.max_image_bytes {
            return Err(ValidationError::TooLarge {
                name: file.name.clone(),
                limit_mb: self.max_image_bytes / MIB,
            });
        }
        Ok(())
    }

    /// Validate a whole batch; the first invalid file rejects all of them.
    pub fn check_batch(&self, files: &[UploadFile]) -> Result<(), ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        files.iter().try_for_each(|f| self.check_image(f))
    }

    /// Stricter check for selfies: JPEG or PNG only.
    pub fn check_selfie(&self, file: &UploadFile) -> Result<(), ValidationError> {
        if !SELFIE_CONTENT_TYPES.contains(&file.content_type.as_str()) {
            return Err(ValidationError::UnsupportedSelfieFormat);
        }
        if file.len() > self.max_selfie_bytes {
            return Err(ValidationError::SelfieTooLarge {
                limit_mb: self.max_selfie_bytes / MIB,
            });
        }
        Ok(())
    }
}
