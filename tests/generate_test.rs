use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tower::util::ServiceExt;

use codegen_llm_service::{AppConfig, ModelHandle, ServiceError, TextBackend, build_router};

/// Backend stub that records every prompt it sees and replies with a fixed
/// string.
struct StubBackend {
    reply: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubBackend {
    fn new(reply: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                reply: reply.to_string(),
                prompts: prompts.clone(),
            },
            prompts,
        )
    }
}

impl TextBackend for StubBackend {
    fn infer(&self, prompt: &str) -> Result<String, ServiceError> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Backend stub that echoes the prompt back, for checking template placement.
struct EchoBackend;

impl TextBackend for EchoBackend {
    fn infer(&self, prompt: &str) -> Result<String, ServiceError> {
        Ok(prompt.to_string())
    }
}

fn app_with(handle: ModelHandle) -> Router {
    let config = Arc::new(AppConfig::from_env().unwrap());
    build_router(config, Arc::new(handle))
}

fn post_generate(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn valid_request_returns_generated_code() {
    let (stub, _) = StubBackend::new("def reverse(s): return s[::-1]");
    let app = app_with(ModelHandle::from_backend(Arc::new(stub)));

    let response = app
        .oneshot(post_generate(
            r#"{"input_text": "reverse a string", "timeComplexity": "O(n)", "language": "Python"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["response"], "def reverse(s): return s[::-1]");
}

#[tokio::test]
async fn prompt_embeds_all_three_fields() {
    let app = app_with(ModelHandle::from_backend(Arc::new(EchoBackend)));

    let response = app
        .oneshot(post_generate(
            r#"{"input_text": "merge two sorted lists", "timeComplexity": "O(n log n)", "language": "Rust"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let prompt = body["response"].as_str().unwrap();
    assert!(prompt.starts_with("Generate code for description:"));
    assert!(prompt.contains("Description: 'merge two sorted lists'"));
    assert!(prompt.contains("Time Complexity: O(n log n)"));
    assert!(prompt.contains("in Programming Language: Rust"));
}

#[tokio::test]
async fn missing_field_is_rejected_without_invoking_the_model() {
    let (stub, prompts) = StubBackend::new("unused");
    let app = app_with(ModelHandle::from_backend(Arc::new(stub)));

    let response = app
        .oneshot(post_generate(
            r#"{"input_text": "sort an array", "language": "Go"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert!(prompts.lock().is_empty(), "model must not be invoked");
}

#[tokio::test]
async fn empty_and_null_fields_are_rejected() {
    for body in [
        r#"{"input_text": "", "timeComplexity": "O(1)", "language": "Python"}"#,
        r#"{"input_text": "x", "timeComplexity": null, "language": "Python"}"#,
        r#"{"input_text": "x", "timeComplexity": "O(1)", "language": ""}"#,
    ] {
        let (stub, prompts) = StubBackend::new("unused");
        let app = app_with(ModelHandle::from_backend(Arc::new(stub)));

        let response = app.oneshot(post_generate(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert!(prompts.lock().is_empty());
    }
}

#[tokio::test]
async fn generated_text_is_trimmed() {
    let (stub, _) = StubBackend::new("  def foo(): pass  ");
    let app = app_with(ModelHandle::from_backend(Arc::new(stub)));

    let response = app
        .oneshot(post_generate(
            r#"{"input_text": "a no-op", "timeComplexity": "O(1)", "language": "Python"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["response"], "def foo(): pass");
}

#[tokio::test]
async fn whitespace_only_output_is_a_server_error() {
    let (stub, _) = StubBackend::new("   \n\t  ");
    let app = app_with(ModelHandle::from_backend(Arc::new(stub)));

    let response = app
        .oneshot(post_generate(
            r#"{"input_text": "x", "timeComplexity": "O(1)", "language": "Python"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Internal server error:")
    );
}

#[tokio::test]
async fn unavailable_model_fails_every_request_without_crashing() {
    let config = Arc::new(AppConfig::from_env().unwrap());
    let app = build_router(config, Arc::new(ModelHandle::unavailable()));

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_generate(
                r#"{"input_text": "x", "timeComplexity": "O(1)", "language": "Python"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

#[tokio::test]
async fn malformed_json_body_gets_a_json_error_object() {
    let (stub, prompts) = StubBackend::new("unused");
    let app = app_with(ModelHandle::from_backend(Arc::new(stub)));

    let response = app
        .oneshot(post_generate("{not valid json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Internal server error:")
    );
    assert!(prompts.lock().is_empty());
}

#[tokio::test]
async fn missing_body_gets_a_json_error_object() {
    let (stub, _) = StubBackend::new("unused");
    let app = app_with(ModelHandle::from_backend(Arc::new(stub)));

    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn health_endpoint_works() {
    let app = app_with(ModelHandle::unavailable());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_ready"], false);
}
