//! Frame descriptors and the similarity math shared by every store backend.

pub mod descriptors;
pub mod error;
pub mod pipeline;
pub mod similarity;

pub use descriptors::{ColorHistogramDescriptor, FrameDescriptor, compute_batch};
pub use error::{DescriptorError, DescriptorResult, SimilarityError};
pub use pipeline::{CANONICAL_SIZE, canonicalize, open_frame};
pub use similarity::{cosine_similarity, is_degenerate, rank_top_k};
