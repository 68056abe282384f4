//! In-process image operations

pub mod engine;
pub mod orientation;
pub mod resize;

pub use engine::{DerivativeSize, GeneratedImage, ImageTransformEngine, ImageTransformError};
pub use orientation::ImageOrientation;
pub use resize::ImageResize;
