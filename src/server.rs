use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use tokio::task;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{GenerationRequest, GenerationResponse, ModelHandle},
    prompt::render_prompt,
};

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    model_ready: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub model: Arc<ModelHandle>,
}

pub fn build_router(config: Arc<AppConfig>, model: Arc<ModelHandle>) -> Router {
    let state = AppState { config, model };

    // All origins are permitted on all routes.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.config.model_type.clone(),
        model_ready: state.model.is_ready(),
    })
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ServiceError> {
    info!("POST request received at /generate");

    // A body that fails to parse still gets the JSON error contract.
    let Json(request) = body
        .map_err(|rejection| ServiceError::Other(format!("malformed request body: {rejection}")))?;

    let (input_text, time_complexity, language) = validate(request)?;
    debug!(%input_text, %time_complexity, %language, "request fields");

    let prompt = render_prompt(&input_text, &time_complexity, &language);
    debug!(%prompt, "formatted prompt");

    // Generation blocks for its full duration; keep it off the async runtime.
    let model = state.model.clone();
    let response = task::spawn_blocking(move || model.invoke(&prompt))
        .await
        .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))??;

    info!("successfully generated code");
    Ok(Json(GenerationResponse { response }))
}

fn validate(request: GenerationRequest) -> Result<(String, String, String), ServiceError> {
    let present = |field: Option<String>| field.filter(|value| !value.is_empty());

    match (
        present(request.input_text),
        present(request.time_complexity),
        present(request.language),
    ) {
        (Some(input_text), Some(time_complexity), Some(language)) => {
            Ok((input_text, time_complexity, language))
        }
        _ => Err(ServiceError::Validation(
            "Missing required fields in request: input_text, timeComplexity, language".into(),
        )),
    }
}
