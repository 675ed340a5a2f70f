use anyhow::{Context, Result};
use snapmatch_core::grouping::DEFAULT_GROUP_THRESHOLD;
use snapmatch_core::matching::DEFAULT_SELFIE_THRESHOLD;
use snapmatch_core::validate::{DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_SELFIE_BYTES};
use snapmatch_core::{PublicUrls, UploadLimits};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::service::Settings;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_PUBLIC_ORIGIN: &str = "http://localhost:8080";
const DEFAULT_PART_SIZE: usize = 5 * 1024 * 1024;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind: SocketAddr,
    /// Path to the SQLite event database.
    pub db_path: PathBuf,
    /// Bucket holding every uploaded object.
    pub bucket: String,
    /// AWS region override; the provider chain decides when unset.
    pub region: Option<String>,
    /// Base under which object keys are publicly reachable (default: the bucket's S3 URL).
    pub public_base_url: Option<String>,
    /// Origin of the web front end; QR codes point here.
    pub public_origin: String,
    pub group_threshold: f32,
    pub selfie_threshold: f32,
    /// Multipart upload part size in bytes.
    pub part_size: usize,
    pub max_image_bytes: usize,
    pub max_selfie_bytes: usize,
}

impl Config {
    /// Load configuration from `SNAPMATCH_*` environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bucket = var("SNAPMATCH_BUCKET")
            .filter(|b| !b.trim().is_empty())
            .context("SNAPMATCH_BUCKET must be set")?;

        let bind_raw = var("SNAPMATCH_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .with_context(|| format!("invalid SNAPMATCH_BIND address: {bind_raw}"))?;

        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("snapmatch");

        let db_path = var("SNAPMATCH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("events.db"));

        Ok(Self {
            bind,
            db_path,
            bucket,
            region: var("SNAPMATCH_REGION"),
            public_base_url: var("SNAPMATCH_PUBLIC_BASE_URL"),
            public_origin: var("SNAPMATCH_PUBLIC_ORIGIN")
                .unwrap_or_else(|| DEFAULT_PUBLIC_ORIGIN.to_string()),
            group_threshold: parsed(&var, "SNAPMATCH_GROUP_THRESHOLD", DEFAULT_GROUP_THRESHOLD),
            selfie_threshold: parsed(&var, "SNAPMATCH_SELFIE_THRESHOLD", DEFAULT_SELFIE_THRESHOLD),
            part_size: parsed(&var, "SNAPMATCH_PART_SIZE", DEFAULT_PART_SIZE),
            max_image_bytes: parsed(&var, "SNAPMATCH_MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES),
            max_selfie_bytes: parsed(&var, "SNAPMATCH_MAX_SELFIE_BYTES", DEFAULT_MAX_SELFIE_BYTES),
        })
    }

    pub fn public_urls(&self) -> PublicUrls {
        match &self.public_base_url {
            Some(base) => PublicUrls::new(base.as_str()),
            None => PublicUrls::for_bucket(&self.bucket),
        }
    }

    /// Settings handed to the event service.
    pub fn settings(&self) -> Settings {
        Settings {
            urls: self.public_urls(),
            public_origin: self.public_origin.clone(),
            group_threshold: self.group_threshold,
            selfie_threshold: self.selfie_threshold,
            limits: UploadLimits {
                max_image_bytes: self.max_image_bytes,
                max_selfie_bytes: self.max_selfie_bytes,
            },
        }
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("SNAPMATCH_BUCKET", "photos"), ("HOME", "/home/ann")]).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.db_path,
            PathBuf::from("/home/ann/.local/share/snapmatch/events.db")
        );
        assert_eq!(config.group_threshold, 90.0);
        assert_eq!(config.selfie_threshold, 95.0);
        assert_eq!(config.max_image_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_selfie_bytes, 5 * 1024 * 1024);
        assert_eq!(config.public_origin, "http://localhost:8080");
        assert_eq!(
            config.public_urls().base(),
            "https://photos.s3.amazonaws.com"
        );
    }

    #[test]
    fn test_bucket_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("SNAPMATCH_BUCKET", "  ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SNAPMATCH_BUCKET", "photos"),
            ("SNAPMATCH_BIND", "127.0.0.1:9000"),
            ("XDG_DATA_HOME", "/data"),
            ("SNAPMATCH_SELFIE_THRESHOLD", "80.5"),
            ("SNAPMATCH_GROUP_THRESHOLD", "not-a-number"),
            ("SNAPMATCH_PUBLIC_BASE_URL", "https://cdn.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/data/snapmatch/events.db"));
        assert_eq!(config.selfie_threshold, 80.5);
        assert_eq!(config.group_threshold, 90.0);
        assert_eq!(config.public_urls().url_for("k.jpg"), "https://cdn.example.com/k.jpg");
    }

    #[test]
    fn test_invalid_bind_rejected() {
        assert!(load(&[("SNAPMATCH_BUCKET", "b"), ("SNAPMATCH_BIND", "nowhere")]).is_err());
    }
}
