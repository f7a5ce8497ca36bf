mod handle;
mod types;

#[cfg(feature = "tch-backend")]
pub mod tch_backend;

pub use handle::{ModelHandle, TextBackend};
pub use types::{GenerationRequest, GenerationResponse};
