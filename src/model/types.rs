use serde::{Deserialize, Serialize};

/// Body of `POST /generate`. All three fields are required on the wire; they
/// deserialize as options so missing fields surface as a 400 with a message
/// instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    pub input_text: Option<String>,
    #[serde(rename = "timeComplexity")]
    pub time_complexity: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub response: String,
}
