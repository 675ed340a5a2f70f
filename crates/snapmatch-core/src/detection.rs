use crate::keys::PublicUrls;
use crate::types::StoredImage;
use crate::vision::FaceVision;

/// Run face detection over each key in order, one call at a time.
///
/// A failed detection is logged and leaves that image with no faces.
pub async fn detect_all<V>(vision: &V, urls: &PublicUrls, keys: &[String]) -> Vec<StoredImage>
where
    V: FaceVision + ?Sized,
{
    let mut images = Vec::with_capacity(keys.len());
    for key in keys {
        let faces = match vision.detect_faces(key).await {
            Ok(faces) => faces,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "face detection failed; continuing with no faces");
                Vec::new()
            }
        };
        tracing::debug!(key = %key, faces = faces.len(), "faces detected");
        images.push(StoredImage {
            key: key.clone(),
            url: urls.url_for(key),
            faces,
        });
    }
    images
}
