pub mod backends;
pub mod catalog;
pub mod config;
pub mod core;
pub mod sequence;

pub use catalog::{FrameCatalog, FrameManifest, MANIFEST_FILENAME};
pub use config::{Backend, Configuration, MockSettings};
pub use core::{
    DynFrameExtractor, ExtractError, ExtractResult, ExtractionRequest, FrameExtractor,
    VideoMetadata,
};
pub use sequence::FrameSequence;
