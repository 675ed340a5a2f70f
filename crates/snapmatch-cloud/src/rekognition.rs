//! Amazon Rekognition face detection and comparison.
//!
//! Images are passed by S3 object reference; no bytes leave the bucket.

use async_trait::async_trait;
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::operation::compare_faces::CompareFacesError;
use aws_sdk_rekognition::operation::detect_faces::DetectFacesError;
use aws_sdk_rekognition::types::{self as rk, Attribute, Image, S3Object};
use aws_sdk_rekognition::Client;
use snapmatch_core::{BoundingBox, FaceDetail, FaceMatch, FaceVision, VisionError};

/// `FaceVision` over Rekognition, reading images from one bucket.
#[derive(Clone)]
pub struct RekognitionVision {
    client: Client,
    bucket: String,
}

impl RekognitionVision {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn from_conf(conf: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self::new(Client::new(conf), bucket)
    }

    fn image(&self, key: &str) -> Image {
        Image::builder()
            .s3_object(S3Object::builder().bucket(&self.bucket).name(key).build())
            .build()
    }
}

#[async_trait]
impl FaceVision for RekognitionVision {
    async fn detect_faces(&self, key: &str) -> Result<Vec<FaceDetail>, VisionError> {
        let resp = self
            .client
            .detect_faces()
            .image(self.image(key))
            .attributes(Attribute::Default)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                classify_detect_error(e.into_service_error(), message)
            })?;
        Ok(resp.face_details().iter().map(face_detail).collect())
    }

    async fn compare_faces(
        &self,
        source: &str,
        target: &str,
        threshold: f32,
    ) -> Result<Vec<FaceMatch>, VisionError> {
        let resp = self
            .client
            .compare_faces()
            .source_image(self.image(source))
            .target_image(self.image(target))
            .similarity_threshold(threshold)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                classify_compare_error(e.into_service_error(), message)
            })?;
        Ok(resp
            .face_matches()
            .iter()
            .map(|m| FaceMatch {
                similarity: m.similarity().unwrap_or_default(),
            })
            .collect())
    }
}

fn face_detail(detail: &rk::FaceDetail) -> FaceDetail {
    FaceDetail {
        bounding_box: detail.bounding_box().map(|b| BoundingBox {
            left: b.left().unwrap_or_default(),
            top: b.top().unwrap_or_default(),
            width: b.width().unwrap_or_default(),
            height: b.height().unwrap_or_default(),
        }),
        confidence: detail.confidence().unwrap_or_default(),
    }
}

fn classify_detect_error(err: DetectFacesError, message: String) -> VisionError {
    match err {
        DetectFacesError::InvalidImageFormatException(_) => VisionError::InvalidImageFormat(message),
        DetectFacesError::InvalidParameterException(_) => VisionError::InvalidParameter(message),
        _ => VisionError::Service(message),
    }
}

fn classify_compare_error(err: CompareFacesError, message: String) -> VisionError {
    match err {
        CompareFacesError::InvalidImageFormatException(_) => VisionError::InvalidImageFormat(message),
        CompareFacesError::InvalidParameterException(_) => VisionError::InvalidParameter(message),
        _ => VisionError::Service(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_rekognition::types::error::{
        InvalidImageFormatException, InvalidParameterException, ThrottlingException,
    };

    #[test]
    fn test_face_detail_conversion() {
        let detail = rk::FaceDetail::builder()
            .confidence(99.5)
            .bounding_box(
                rk::BoundingBox::builder()
                    .left(0.1)
                    .top(0.2)
                    .width(0.3)
                    .height(0.4)
                    .build(),
            )
            .build();

        let face = face_detail(&detail);
        assert_eq!(face.confidence, 99.5);
        assert_eq!(
            face.bounding_box,
            Some(BoundingBox {
                left: 0.1,
                top: 0.2,
                width: 0.3,
                height: 0.4
            })
        );
    }

    #[test]
    fn test_face_detail_without_box() {
        let face = face_detail(&rk::FaceDetail::builder().build());
        assert_eq!(face.confidence, 0.0);
        assert!(face.bounding_box.is_none());
    }

    #[test]
    fn test_compare_error_classification() {
        let err = CompareFacesError::InvalidImageFormatException(
            InvalidImageFormatException::builder().message("bad").build(),
        );
        assert!(matches!(
            classify_compare_error(err, "x".into()),
            VisionError::InvalidImageFormat(_)
        ));

        let err = CompareFacesError::InvalidParameterException(
            InvalidParameterException::builder().message("no face").build(),
        );
        assert!(matches!(
            classify_compare_error(err, "x".into()),
            VisionError::InvalidParameter(_)
        ));

        let err = CompareFacesError::ThrottlingException(
            ThrottlingException::builder().message("slow down").build(),
        );
        assert_eq!(
            classify_compare_error(err, "throttled".into()),
            VisionError::Service("throttled".into())
        );
    }

    #[test]
    fn test_detect_error_classification() {
        let err = DetectFacesError::InvalidImageFormatException(
            InvalidImageFormatException::builder().build(),
        );
        assert!(matches!(
            classify_detect_error(err, "x".into()),
            VisionError::InvalidImageFormat(_)
        ));
    }
}
