pub mod config;
pub mod error;
pub mod model;
pub mod prompt;
pub mod server;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{GenerationRequest, GenerationResponse, ModelHandle, TextBackend};
pub use server::build_router;
