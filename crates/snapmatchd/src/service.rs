//! Event service: the operations the HTTP layer exposes, wired over the
//! storage, vision and repository seams.

use chrono::{Duration, Utc};
use serde::Serialize;
use snapmatch_core::detection::detect_all;
use snapmatch_core::event::event_id_at;
use snapmatch_core::grouping::{group_faces, Grouping};
use snapmatch_core::keys::base_name;
use snapmatch_core::matching::{self, MatchReport};
use snapmatch_core::qr::{self, QrError};
use snapmatch_core::storage::{move_object, object_keys};
use snapmatch_core::upload::{upload_batch, upload_selfie, UploadError, UploadedImage};
use snapmatch_core::{
    Event, FaceGroup, FaceVision, Identity, NewEvent, ObjectStore, PassStats, PublicUrls,
    StorageError, StoredImage, UploadFile, UploadLimits, UploadScope, ValidationError,
};
use snapmatch_store::{EventRepository, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// Ids are epoch milliseconds; on collision the next millisecond is tried.
const MAX_ID_ATTEMPTS: i64 = 16;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("event {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repository(#[from] StoreError),
    #[error(transparent)]
    Qr(#[from] QrError),
}

impl From<UploadError> for ServiceError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(e) => ServiceError::Validation(e),
            UploadError::Storage(e) => ServiceError::Storage(e),
        }
    }
}

/// Tunables shared by every request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub urls: PublicUrls,
    pub public_origin: String,
    pub group_threshold: f32,
    pub selfie_threshold: f32,
    pub limits: UploadLimits,
}

/// Result of a gallery upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryUpload {
    pub images: Vec<UploadedImage>,
    /// PNG data URL of a QR code pointing at the selfie upload page.
    pub selfie_qr: String,
}

/// Detected faces and groups for one event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFaces {
    pub event_id: String,
    /// Images with at least one detected face, in listing order.
    pub images: Vec<StoredImage>,
    pub groups: Vec<FaceGroup>,
    pub stats: PassStats,
}

pub struct EventService {
    store: Arc<dyn ObjectStore>,
    vision: Arc<dyn FaceVision>,
    events: Arc<dyn EventRepository>,
    settings: Settings,
}

impl EventService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        vision: Arc<dyn FaceVision>,
        events: Arc<dyn EventRepository>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            vision,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn create_event(&self, input: NewEvent) -> Result<Event, ServiceError> {
        let details = input.validate()?;
        let now = Utc::now();

        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = event_id_at(now + Duration::milliseconds(attempt));
            let event = Event::new(id, details.clone(), now);
            match self.events.insert(&event).await {
                Ok(()) => {
                    tracing::info!(id = %event.id, name = %event.name, "event created");
                    return Ok(event);
                }
                Err(StoreError::Duplicate(id)) => {
                    tracing::debug!(id = %id, "event id taken; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Duplicate(event_id_at(now)).into())
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, ServiceError> {
        Ok(self.events.list().await?)
    }

    pub async fn get_event(&self, id: &str) -> Result<Event, ServiceError> {
        self.events
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Upload into the user's root folder and hand back the selfie page QR.
    pub async fn upload_images(
        &self,
        identity: &Identity,
        files: Vec<UploadFile>,
    ) -> Result<GalleryUpload, ServiceError> {
        let images = upload_batch(
            &*self.store,
            &self.settings.urls,
            identity,
            &UploadScope::UserRoot,
            files,
            &self.settings.limits,
        )
        .await?;
        let selfie_qr = qr::data_url(&self.selfie_qr()?);
        Ok(GalleryUpload { images, selfie_qr })
    }

    /// Upload into the event's folder, record the URLs and save the event.
    pub async fn upload_event_images(
        &self,
        identity: &Identity,
        event_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<Event, ServiceError> {
        let mut event = self.get_event(event_id).await?;
        let uploaded = upload_batch(
            &*self.store,
            &self.settings.urls,
            identity,
            &UploadScope::Event(event.id.clone()),
            files,
            &self.settings.limits,
        )
        .await?;
        event.add_images(uploaded.into_iter().map(|u| u.url));
        self.save(identity, event).await
    }

    pub async fn save_event(&self, identity: &Identity, event_id: &str) -> Result<Event, ServiceError> {
        let event = self.get_event(event_id).await?;
        self.save(identity, event).await
    }

    /// Move stray images into the event folder, pick up anything already
    /// stored there, and rewrite the record.
    ///
    /// The record is rewritten after every move, so a failure part way
    /// through never leaves it pointing at a deleted source.
    async fn save(&self, identity: &Identity, mut event: Event) -> Result<Event, ServiceError> {
        let urls = &self.settings.urls;
        let prefix = identity.event_prefix(&event.id);

        for i in 0..event.images.len() {
            let Some(key) = urls.key_for(&event.images[i]).map(str::to_string) else {
                continue;
            };
            if key.starts_with(&prefix) {
                continue;
            }
            let dest = format!("{prefix}{}", base_name(&key));
            move_object(&*self.store, &key, &dest).await?;
            event.images[i] = urls.url_for(&dest);
            self.events.update(&event).await?;
        }

        let images = std::mem::take(&mut event.images);
        event.add_images(images);

        let listed = object_keys(&prefix, self.store.list(&prefix).await?);
        event.add_images(listed.iter().map(|key| urls.url_for(key)));

        event.touch(Utc::now());
        self.events.update(&event).await?;
        tracing::info!(id = %event.id, photos = event.photo_count(), "event saved");
        Ok(event)
    }

    /// Detect faces in every image stored for the event, then group them.
    pub async fn event_faces(&self, identity: &Identity, event_id: &str) -> Result<EventFaces, ServiceError> {
        let event = self.get_event(event_id).await?;
        let prefix = identity.event_prefix(&event.id);
        let keys = object_keys(&prefix, self.store.list(&prefix).await?);

        let mut images = detect_all(&*self.vision, &self.settings.urls, &keys).await;
        let Grouping { groups, stats } =
            group_faces(&*self.vision, &images, self.settings.group_threshold).await;
        images.retain(StoredImage::has_faces);

        tracing::info!(id = %event.id, images = images.len(), groups = groups.len(), "event faces grouped");
        Ok(EventFaces {
            event_id: event.id,
            images,
            groups,
            stats,
        })
    }

    /// Upload a selfie and compare it against everything the user stored.
    pub async fn match_selfie(
        &self,
        identity: &Identity,
        file: Option<UploadFile>,
    ) -> Result<MatchReport, ServiceError> {
        let file_name = upload_selfie(&*self.store, identity, file, &self.settings.limits).await?;
        let report = matching::match_selfie(
            &*self.store,
            &*self.vision,
            &self.settings.urls,
            identity,
            &file_name,
            self.settings.selfie_threshold,
        )
        .await?;
        Ok(report)
    }

    /// PNG QR code linking to the event page.
    pub async fn event_qr(&self, event_id: &str) -> Result<Vec<u8>, ServiceError> {
        let event = self.get_event(event_id).await?;
        Ok(qr::render_png(&qr::event_link(
            &self.settings.public_origin,
            &event.id,
        ))?)
    }

    /// PNG QR code linking to the selfie upload page.
    pub fn selfie_qr(&self) -> Result<Vec<u8>, ServiceError> {
        Ok(qr::render_png(&qr::selfie_link(&self.settings.public_origin))?)
    }
}
