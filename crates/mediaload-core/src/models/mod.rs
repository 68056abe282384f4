pub mod media;
pub mod upload;

pub use media::{MediaArtifact, MediaCategory, ThumbnailArtifact};
pub use upload::{PartUpload, SessionState, UploadSession};
