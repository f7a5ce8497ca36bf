use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::{config::AppConfig, error::ServiceError};

/// Opaque text-in/text-out inference backend. `infer` blocks the calling
/// thread for the full duration of generation; callers on the async runtime
/// must go through `spawn_blocking`.
pub trait TextBackend: Send + Sync {
    fn infer(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Owner of the loaded backend, created once at startup and read-only
/// thereafter. A failed load leaves the handle in an explicit unavailable
/// state; the process keeps serving and every invocation reports the failure.
pub struct ModelHandle {
    inner: Option<Inner>,
}

struct Inner {
    backend: Arc<dyn TextBackend>,
    // Single-slot lock: the backend is not assumed safe for concurrent
    // generation calls, so invocations are serialized here.
    slot: Mutex<()>,
}

impl ModelHandle {
    /// Loads the configured backend. Load failure is logged and swallowed:
    /// startup must not abort, so the handle comes back unavailable instead.
    pub fn initialize(config: &AppConfig) -> Self {
        #[cfg(feature = "tch-backend")]
        {
            match super::tch_backend::TchBackend::load(config) {
                Ok(backend) => {
                    info!(
                        model_type = %config.model_type,
                        path = %config.model_path.display(),
                        "model loaded successfully"
                    );
                    return Self::from_backend(Arc::new(backend));
                }
                Err(err) => {
                    error!(%err, "error loading model, continuing without one");
                    return Self::unavailable();
                }
            }
        }

        #[cfg(not(feature = "tch-backend"))]
        {
            error!(
                model_type = %config.model_type,
                "no inference backend compiled in, continuing without a model"
            );
            Self::unavailable()
        }
    }

    /// Wraps an already-constructed backend. Tests inject stubs here.
    pub fn from_backend(backend: Arc<dyn TextBackend>) -> Self {
        Self {
            inner: Some(Inner {
                backend,
                slot: Mutex::new(()),
            }),
        }
    }

    pub fn unavailable() -> Self {
        Self { inner: None }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_some()
    }

    /// Runs one generation call. Fails when the handle never initialized,
    /// when the backend errors, or when the backend output trims to empty.
    /// Empty output is a failure, not an empty success.
    pub fn invoke(&self, prompt: &str) -> Result<String, ServiceError> {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| ServiceError::Inference("model was not initialized".into()))?;

        let output = {
            let _guard = inner.slot.lock();
            inner.backend.infer(prompt)?
        };

        let trimmed = output.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::Inference(
                "model returned an empty response".into(),
            ));
        }

        Ok(trimmed.to_string())
    }
}
