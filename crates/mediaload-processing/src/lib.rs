//! Mediaload Processing Library
//!
//! Classification and category-specific processing of finished uploads.
//!
//! - [`tool`]: timeout-bounded external process invocation
//! - [`image`]: in-process rotation, resizing, thumbnails and derivatives
//! - [`video`] / [`audio`]: ffmpeg/ffprobe argument templates
//! - [`classifier`]: content type and extension to [`mediaload_core::MediaCategory`]
//! - [`pipeline`]: dispatch to the transform registered for a category

pub mod audio;
pub mod classifier;
pub mod duration;
pub mod image;
pub mod pipeline;
pub mod tool;
pub mod video;

pub use audio::AudioTransformer;
pub use classifier::{classify, Classification, ContentSniffer, MagicSniffer, MediaClassifier};
pub use duration::{parse_duration, probe_duration, MediaDuration};
pub use image::{DerivativeSize, GeneratedImage, ImageTransformEngine, ImageTransformError};
pub use pipeline::{
    MediaPipeline, MediaTransform, PipelineConfig, ProcessingJob, StagedArtifact,
    TransformOutcome,
};
pub use tool::{CommandInvoker, ToolError, ToolInvoker};
pub use video::VideoTransformer;
