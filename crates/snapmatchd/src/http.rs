//! HTTP surface over [`EventService`].
//!
//! The caller's identity arrives in `x-user-*` headers set by the fronting
//! auth proxy; routes that touch storage reject requests without one.

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, State},
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use snapmatch_core::qr::event_qr_file_name;
use snapmatch_core::{Event, Identity, NewEvent, PassStats, SelfieMatch, UploadFile};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::ApiError;
use crate::service::EventService;

pub const EMAIL_HEADER: &str = "x-user-email";
pub const NAME_HEADER: &str = "x-user-name";
pub const ROLE_HEADER: &str = "x-user-role";

/// Whole-request ceiling; per-file limits are enforced by upload validation.
const MAX_REQUEST_BYTES: usize = 256 * 1024 * 1024;

type AppState = Arc<EventService>;

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/events", get(list_events).post(create_event))
        .route("/events/:event_id", get(get_event))
        .route("/events/:event_id/images", post(upload_event_images))
        .route("/events/:event_id/save", post(save_event))
        .route("/events/:event_id/faces", get(event_faces))
        .route("/events/:event_id/qr", get(event_qr))
        .route("/images", post(upload_images))
        .route("/selfies", post(match_selfie))
        .route("/selfie-qr", get(selfie_qr))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Identity taken from request headers.
pub struct RequestIdentity(pub Identity);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let identity = Identity::new(header(EMAIL_HEADER), header(NAME_HEADER), header(ROLE_HEADER))?;
        Ok(Self(identity))
    }
}

/// An event with its derived photo count.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody {
    #[serde(flatten)]
    event: Event,
    photo_count: usize,
}

impl From<Event> for EventBody {
    fn from(event: Event) -> Self {
        Self {
            photo_count: event.photo_count(),
            event,
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    version: &'static str,
    public_base_url: String,
    group_threshold: f32,
    selfie_threshold: f32,
    max_image_bytes: usize,
    max_selfie_bytes: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SelfieBody {
    message: String,
    /// Best first.
    matches: Vec<SelfieMatch>,
    processed: usize,
    stats: PassStats,
}

async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn status(State(service): State<AppState>) -> Json<StatusBody> {
    let settings = service.settings();
    Json(StatusBody {
        version: env!("CARGO_PKG_VERSION"),
        public_base_url: settings.urls.base().to_string(),
        group_threshold: settings.group_threshold,
        selfie_threshold: settings.selfie_threshold,
        max_image_bytes: settings.limits.max_image_bytes,
        max_selfie_bytes: settings.limits.max_selfie_bytes,
    })
}

async fn list_events(State(service): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let events: Vec<EventBody> = service
        .list_events()
        .await?
        .into_iter()
        .map(EventBody::from)
        .collect();
    Ok(Json(events))
}

async fn create_event(
    State(service): State<AppState>,
    Json(input): Json<NewEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let event = service.create_event(input).await?;
    Ok((StatusCode::CREATED, Json(EventBody::from(event))))
}

async fn get_event(
    State(service): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(EventBody::from(service.get_event(&event_id).await?)))
}

async fn upload_event_images(
    State(service): State<AppState>,
    Path(event_id): Path<String>,
    RequestIdentity(identity): RequestIdentity,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let files = read_files(multipart).await?;
    let event = service.upload_event_images(&identity, &event_id, files).await?;
    Ok(Json(EventBody::from(event)))
}

async fn save_event(
    State(service): State<AppState>,
    Path(event_id): Path<String>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let event = service.save_event(&identity, &event_id).await?;
    Ok(Json(EventBody::from(event)))
}

async fn event_faces(
    State(service): State<AppState>,
    Path(event_id): Path<String>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(service.event_faces(&identity, &event_id).await?))
}

async fn event_qr(
    State(service): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let png = service.event_qr(&event_id).await?;
    let disposition = format!("attachment; filename=\"{}\"", event_qr_file_name(&event_id));
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        png,
    ))
}

async fn upload_images(
    State(service): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let files = read_files(multipart).await?;
    Ok(Json(service.upload_images(&identity, files).await?))
}

async fn match_selfie(
    State(service): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let selfie = read_files(multipart).await?.into_iter().next();
    let report = service.match_selfie(&identity, selfie).await?;
    Ok(Json(SelfieBody {
        message: report.message(),
        matches: report.matches,
        processed: report.processed,
        stats: report.stats,
    }))
}

async fn selfie_qr(State(service): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let png = service.selfie_qr()?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Every file part of a multipart body. Parts without a file name are ignored.
async fn read_files(mut multipart: Multipart) -> Result<Vec<UploadFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Multipart(e.to_string()))?;
        files.push(UploadFile::new(name, content_type, data));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{harness, launch_party};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use snapmatch_core::memory::ScriptedVision;
    use tower::ServiceExt;

    const BOUNDARY: &str = "snapmatch-test-boundary";

    fn multipart_body(files: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, content_type, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, files: &[(&str, &str, &[u8])]) -> Request<Body> {
        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(EMAIL_HEADER, "ann@example.com")
            .body(Body::from(multipart_body(files)))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn app() -> Router {
        router(Arc::new(harness(ScriptedVision::new()).await.service))
    }

    #[tokio::test]
    async fn test_healthz() {
        let resp = app()
            .await
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_and_fetch_event() {
        let app = app().await;
        let body = serde_json::to_vec(&launch_party()).unwrap();
        let resp = app
            .clone()
            .oneshot(
                Request::post("/events")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = json_body(resp).await;
        assert_eq!(created["name"], "Launch Party");
        assert_eq!(created["photoCount"], 0);
        assert_eq!(created["date"], "2025-06-01");

        let id = created["id"].as_str().unwrap();
        let resp = app
            .oneshot(Request::get(format!("/events/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["id"], id);
    }

    #[tokio::test]
    async fn test_create_event_missing_field_is_bad_request() {
        let resp = app()
            .await
            .oneshot(
                Request::post("/events")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"Launch Party","date":"2025-06-01"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "location is required");
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let resp = app()
            .await
            .oneshot(Request::get("/events/404").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_requires_identity() {
        let resp = app()
            .await
            .oneshot(
                Request::post("/images")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(&[("a.jpg", "image/jpeg", b"x")])))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(resp).await["error"],
            "User authentication required. Please log in to continue."
        );
    }

    #[tokio::test]
    async fn test_upload_into_event() {
        let h = harness(ScriptedVision::new()).await;
        let event = h.service.create_event(launch_party()).await.unwrap();
        let app = router(Arc::new(h.service));

        let resp = app
            .oneshot(upload_request(
                &format!("/events/{}/images", event.id),
                &[("a.jpg", "image/jpeg", b"aaa"), ("b.png", "image/png", b"bbb")],
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["photoCount"], 2);
        assert!(body["lastModified"].is_string());
        assert_eq!(h.store.keys().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let resp = app()
            .await
            .oneshot(upload_request("/images", &[("notes.txt", "text/plain", b"hi")]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "notes.txt is not a valid image file");
    }

    #[tokio::test]
    async fn test_selfie_match_reports_message() {
        let resp = app()
            .await
            .oneshot(upload_request("/selfies", &[("me.jpg", "image/jpeg", b"me")]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(
            body["message"],
            "Found 0 high-confidence matches out of 0 images processed."
        );
        assert_eq!(body["matches"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn test_selfie_qr_is_png() {
        let resp = app()
            .await
            .oneshot(Request::get("/selfie-qr").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    }
}
