use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::encoding::InlineData;
use crate::error::AnalysisError;

/// Bengali for "what is written here". Part of the contract with the model, not user input.
pub const PROMPT: &str = "eikhane ki lekha ache";

/// One image plus the instruction to run against it.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: InlineData,
    pub prompt: String,
}

impl AnalysisRequest {
    pub fn new(image: InlineData) -> Self {
        Self {
            image,
            prompt: PROMPT.to_string(),
        }
    }
}

/// Anything that can turn an image and a prompt into text.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<String, AnalysisError>;
}

// --- Gemini API request structs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

// --- Gemini API response structs ---

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// `generateContent` client. The credential is captured once, at construction.
pub struct GeminiClient {
    http: reqwest::Client,
    key: String,
    url: String,
    max_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &ApiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            key: config.key.clone(),
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<String, AnalysisError> {
        if self.key.is_empty() {
            return Err(AnalysisError::MissingApiKey);
        }

        let body = GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: request.prompt,
                    },
                    Part::InlineData {
                        inline_data: request.image,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
            },
        };

        debug!(url = %self.url, "Sending generateContent request");
        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %detail, "Gemini returned an error status");
            return Err(AnalysisError::Status {
                status: status.as_u16(),
            });
        }

        let body: GeminiResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Could not decode Gemini response");
            AnalysisError::Malformed
        })?;

        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            Err(AnalysisError::Empty)
        } else {
            Ok(text)
        }
    }
}
