//! Object key layout and public URL mapping.
//!
//! Keys follow `{role}/{folder}/[{event_id}/][selfies/]{timestamp}-{file_name}`.

use crate::identity::Identity;

const SUPPORTED_RASTER_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Where inside a user's namespace an upload lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadScope {
    /// Directly under the user's root prefix.
    UserRoot,
    /// Inside an event folder.
    Event(String),
    /// Inside the user's `selfies/` folder.
    Selfie,
}

impl UploadScope {
    pub fn prefix(&self, identity: &Identity) -> String {
        match self {
            UploadScope::UserRoot => identity.root_prefix(),
            UploadScope::Event(event_id) => identity.event_prefix(event_id),
            UploadScope::Selfie => identity.selfie_prefix(),
        }
    }
}

/// `{timestamp}-{file_name}`, with any directory components dropped from the name.
pub fn stamped_file_name(timestamp_ms: i64, original: &str) -> String {
    format!("{timestamp_ms}-{}", base_name(original))
}

/// Full object key for an upload.
pub fn object_key(identity: &Identity, scope: &UploadScope, stamped_name: &str) -> String {
    format!("{}{stamped_name}", scope.prefix(identity))
}

/// Final `/`-separated segment of a key or path.
pub fn base_name(key: &str) -> &str {
    key.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(key)
}

/// Whether the key names a raster image the vision service accepts.
pub fn is_supported_raster(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SUPPORTED_RASTER_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Maps object keys to publicly addressable URLs and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrls {
    base: String,
}

impl PublicUrls {
    /// Use an explicit base such as `https://cdn.example.com/photos`.
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    /// Virtual-hosted S3 base for a bucket.
    pub fn for_bucket(bucket: &str) -> Self {
        Self::new(format!("https://{bucket}.s3.amazonaws.com"))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.base)
    }

    /// Recover the key from a URL produced by [`url_for`](Self::url_for).
    pub fn key_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base.as_str())?
            .strip_prefix('/')
            .filter(|key| !key.is_empty())
    }
}
