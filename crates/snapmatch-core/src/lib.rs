//! snapmatch-core — Event photo orchestration over remote storage and vision.
//!
//! Face detection and comparison are delegated to a hosted service behind
//! the [`FaceVision`] seam; objects live behind [`ObjectStore`]. This crate
//! owns everything around them: identity-scoped key layout, upload
//! validation and batching, face grouping and selfie matching.

pub mod detection;
pub mod event;
pub mod grouping;
pub mod identity;
pub mod keys;
pub mod matching;
pub mod qr;
pub mod storage;
pub mod types;
pub mod upload;
pub mod validate;
pub mod vision;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use event::{Event, NewEvent};
pub use identity::{Identity, IdentityError};
pub use keys::{PublicUrls, UploadScope};
pub use storage::{ObjectStore, StorageError};
pub use types::{BoundingBox, FaceDetail, FaceGroup, FaceMatch, SelfieMatch, StoredImage};
pub use validate::{UploadFile, UploadLimits, ValidationError};
pub use vision::{CompareOutcome, FaceVision, PassStats, VisionError};
