//! snapmatch-cloud — AWS adapters for the storage and vision seams.
//!
//! [`S3ObjectStore`] implements `ObjectStore` over Amazon S3 with multipart
//! uploads; [`RekognitionVision`] implements `FaceVision` over Amazon
//! Rekognition, addressing images by S3 object reference.

pub mod rekognition;
pub mod s3;

pub use rekognition::RekognitionVision;
pub use s3::S3ObjectStore;

use aws_sdk_s3::config::Region;

/// Load AWS configuration from the standard provider chain, optionally
/// overriding the region.
pub async fn load_sdk_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}
