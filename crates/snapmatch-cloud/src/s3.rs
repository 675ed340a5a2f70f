//! Amazon S3 object storage.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use snapmatch_core::{ObjectStore, StorageError};
use std::ops::Range;

/// S3 rejects non-final parts smaller than 5 MiB.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// `ObjectStore` over one S3 bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    part_size: usize,
}

impl S3ObjectStore {
    /// `part_size` below [`MIN_PART_SIZE`] is raised to it.
    pub fn new(client: Client, bucket: impl Into<String>, part_size: usize) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            part_size: part_size.max(MIN_PART_SIZE),
        }
    }

    pub fn from_conf(conf: &aws_config::SdkConfig, bucket: impl Into<String>, part_size: usize) -> Self {
        Self::new(Client::new(conf), bucket, part_size)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_single(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| upload_error(key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn put_multipart(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| upload_error(key, DisplayErrorContext(&e)))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| upload_error(key, "no upload id returned"))?
            .to_string();

        let result = match self.upload_parts(key, &upload_id, &data).await {
            Ok(parts) => self
                .client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
                .send()
                .await
                .map(|_| ())
                .map_err(|e| upload_error(key, DisplayErrorContext(&e))),
            Err(err) => Err(err),
        };

        if result.is_err() {
            // Do not leave orphaned parts behind.
            if let Err(e) = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(key, error = %DisplayErrorContext(&e), "abort multipart upload failed");
            }
        }
        result
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: &Bytes,
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let ranges = part_ranges(data.len(), self.part_size);
        let mut parts = Vec::with_capacity(ranges.len());
        for (i, range) in ranges.into_iter().enumerate() {
            let part_number = i as i32 + 1;
            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data.slice(range)))
                .send()
                .await
                .map_err(|e| upload_error(key, DisplayErrorContext(&e)))?;
            tracing::debug!(key, part_number, "part uploaded");
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(resp.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }
        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| StorageError::List {
                    prefix: prefix.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                })?;
            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_string)),
            );
            match resp.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        tracing::debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        if data.len() <= self.part_size {
            self.put_single(key, data, content_type).await
        } else {
            self.put_multipart(key, data, content_type).await
        }
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source(&self.bucket, from))
            .key(to)
            .send()
            .await
            .map_err(|e| StorageError::Copy {
                from: from.to_string(),
                to: to.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

fn upload_error(key: &str, message: impl std::fmt::Display) -> StorageError {
    StorageError::Upload {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Byte ranges of consecutive parts; the last part holds the remainder.
fn part_ranges(len: usize, part_size: usize) -> Vec<Range<usize>> {
    (0..len)
        .step_by(part_size.max(1))
        .map(|start| start..(start + part_size).min(len))
        .collect()
}

/// Everything but unreserved characters and the path separator.
const COPY_SOURCE_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// `{bucket}/{key}` with the key percent-encoded, as `CopySource` expects.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_ranges_exact_multiple() {
        assert_eq!(part_ranges(10, 5), vec![0..5, 5..10]);
    }

    #[test]
    fn test_part_ranges_remainder() {
        assert_eq!(part_ranges(12, 5), vec![0..5, 5..10, 10..12]);
    }

    #[test]
    fn test_part_ranges_empty() {
        assert!(part_ranges(0, 5).is_empty());
    }

    #[test]
    fn test_copy_source_encoding() {
        assert_eq!(
            copy_source("bkt", "user/ann/1-my photo+1.jpg"),
            "bkt/user/ann/1-my%20photo%2B1.jpg"
        );
        assert_eq!(copy_source("bkt", "user/a_b/1-x.png"), "bkt/user/a_b/1-x.png");
        assert_eq!(copy_source("bkt", "user/a/1-café.jpg"), "bkt/user/a/1-caf%C3%A9.jpg");
    }
}
