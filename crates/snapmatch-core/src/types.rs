use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, as ratios of the image width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// A face reported by the vision service's detection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetail {
    pub bounding_box: Option<BoundingBox>,
    /// Detection confidence in [0, 100].
    pub confidence: f32,
}

/// One face pair returned by a comparison call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// Similarity in [0, 100].
    pub similarity: f32,
}

/// An object in storage, annotated with the faces found in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImage {
    pub key: String,
    pub url: String,
    pub faces: Vec<FaceDetail>,
}

impl StoredImage {
    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }
}

/// Images believed to share a depicted face.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceGroup {
    pub face_id: String,
    pub images: Vec<StoredImage>,
}

impl FaceGroup {
    /// First member, used as the group thumbnail.
    pub fn cover(&self) -> Option<&StoredImage> {
        self.images.first()
    }
}

/// A stored image judged to contain the selfie's face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfieMatch {
    pub url: String,
    pub similarity: f32,
}
