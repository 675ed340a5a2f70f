//! Upload orchestration shared by the gallery, event and selfie flows.

use crate::identity::Identity;
use crate::keys::{object_key, stamped_file_name, PublicUrls, UploadScope};
use crate::storage::{ObjectStore, StorageError};
use crate::validate::{UploadFile, UploadLimits, ValidationError};
use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A file that landed in storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedImage {
    pub key: String,
    pub url: String,
}

/// Upload a batch of images, all or nothing.
///
/// Every file is validated before the first storage call. Uploads then run
/// concurrently without a cap; the first failure fails the batch. Files that
/// already finished are not rolled back.
///
/// Each file is stamped one millisecond after the previous one, so files
/// sharing a name within a batch still get distinct keys.
pub async fn upload_batch<S>(
    store: &S,
    urls: &PublicUrls,
    identity: &Identity,
    scope: &UploadScope,
    files: Vec<UploadFile>,
    limits: &UploadLimits,
) -> Result<Vec<UploadedImage>, UploadError>
where
    S: ObjectStore + ?Sized,
{
    limits.check_batch(&files)?;

    let timestamp = Utc::now().timestamp_millis();
    let uploads = files.into_iter().enumerate().map(|(i, file)| {
        let stamp = timestamp + i as i64;
        let key = object_key(identity, scope, &stamped_file_name(stamp, &file.name));
        async move {
            tracing::debug!(key = %key, bytes = file.len(), "uploading image");
            store.put(&key, file.data, &file.content_type).await?;
            Ok::<_, StorageError>(UploadedImage {
                url: urls.url_for(&key),
                key,
            })
        }
    });

    let uploaded = try_join_all(uploads).await.map_err(|err| {
        tracing::warn!(error = %err, "upload batch failed");
        err
    })?;
    tracing::info!(count = uploaded.len(), scope = ?scope, "upload batch complete");
    Ok(uploaded)
}

/// Upload a selfie under the user's `selfies/` folder.
///
/// Returns only the generated file name; the comparison source key is
/// rebuilt from it by the matcher.
pub async fn upload_selfie<S>(
    store: &S,
    identity: &Identity,
    file: Option<UploadFile>,
    limits: &UploadLimits,
) -> Result<String, UploadError>
where
    S: ObjectStore + ?Sized,
{
    let file = file.ok_or(ValidationError::MissingSelfie)?;
    limits.check_selfie(&file)?;

    let file_name = stamped_file_name(Utc::now().timestamp_millis(), &file.name);
    let key = object_key(identity, &UploadScope::Selfie, &file_name);
    store.put(&key, file.data, &file.content_type).await?;
    tracing::info!(key = %key, "selfie uploaded");
    Ok(file_name)
}
