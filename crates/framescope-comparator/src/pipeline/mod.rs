pub mod ops;
pub mod preprocess;

pub use preprocess::{CANONICAL_SIZE, canonicalize, open_frame};
