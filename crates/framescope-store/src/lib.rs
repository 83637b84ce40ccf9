//! Dual-backend vector store: a remote similarity index with an in-process
//! fallback.

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod remote;
pub mod store;

pub use backend::{DynVectorBackend, VectorBackend};
pub use config::{
    DEFAULT_COLLECTION, DEFAULT_REMOTE_TIMEOUT, DEFAULT_SCORE_THRESHOLD, RemoteConfig,
    StoreConfig,
};
pub use error::{StoreError, StoreResult};
pub use local::LocalBackend;
pub use remote::{FramePayload, RemoteBackend, point_id};
pub use store::{Placement, VectorStore};
