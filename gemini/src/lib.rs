//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for the `generateContent` endpoint with:
//! - Text completions, optionally constrained to JSON output
//! - Image generation via response modalities
//! - Inline image inputs (base64) for visual reference material

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Gemini {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a Gemini client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a generation request and return the full response.
    pub async fn generate(&self, request: Request) -> Result<Response, Error> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let api_request = build_api_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/models/{model}:generateContent"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parse_response(api_response))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A generation request to send to Gemini.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub system: Option<String>,
    pub parts: Vec<Part>,
    pub temperature: Option<f32>,
    /// Constrain output to the given MIME type (e.g. "application/json").
    pub response_mime_type: Option<String>,
    /// Response modalities to request; required for image output.
    pub response_modalities: Option<Vec<String>>,
}

impl Request {
    /// Create an empty request.
    pub fn new() -> Self {
        Self {
            model: None,
            system: None,
            parts: Vec::new(),
            temperature: None,
            response_mime_type: None,
            response_modalities: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Append a text part to the user turn.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text { text: text.into() });
        self
    }

    /// Append an inline image part (base64 data) to the user turn.
    pub fn with_inline_image(
        mut self,
        media_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        self.parts.push(Part::InlineImage {
            media_type: media_type.into(),
            data: data.into(),
        });
        self
    }

    /// Append an inline image part from raw bytes.
    pub fn with_image_bytes(self, media_type: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::Engine as _;
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.with_inline_image(media_type, data)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Ask the model to respond with JSON only.
    pub fn expect_json(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self
    }

    /// Ask the model for text and image output.
    pub fn expect_image(mut self) -> Self {
        self.response_modalities = Some(vec!["TEXT".to_string(), "IMAGE".to_string()]);
        self
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

/// A part of a request or response turn.
#[derive(Debug, Clone)]
pub enum Part {
    Text {
        text: String,
    },
    InlineImage {
        media_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },
}

/// A generation response from Gemini.
#[derive(Debug, Clone)]
pub struct Response {
    pub parts: Vec<Part>,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

impl Response {
    /// Get all text content concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Get the first inline image, if any.
    pub fn first_image(&self) -> Option<InlineImage> {
        self.parts.iter().find_map(|part| match part {
            Part::InlineImage { media_type, data } => Some(InlineImage {
                media_type: media_type.clone(),
                data: data.clone(),
            }),
            _ => None,
        })
    }
}

/// An inline image returned by the model.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub media_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl InlineImage {
    /// Decode the base64 payload into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, Error> {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| Error::Parse(format!("Invalid base64 image data: {e}")))
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: String,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

/// One content part on the wire. Parts carry exactly one payload field, but
/// responses may attach extra metadata, so this is a struct of options rather
/// than an externally tagged enum.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
}

impl ApiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(ApiInlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

fn build_api_request(request: &Request) -> ApiRequest {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text { text } => ApiPart::text(text),
            Part::InlineImage { media_type, data } => ApiPart::inline_data(media_type, data),
        })
        .collect();

    let generation_config = if request.temperature.is_some()
        || request.response_mime_type.is_some()
        || request.response_modalities.is_some()
    {
        Some(ApiGenerationConfig {
            temperature: request.temperature,
            response_mime_type: request.response_mime_type.clone(),
            response_modalities: request.response_modalities.clone(),
        })
    } else {
        None
    };

    ApiRequest {
        contents: vec![ApiContent {
            role: "user".to_string(),
            parts,
        }],
        system_instruction: request.system.as_ref().map(|text| ApiSystemInstruction {
            parts: vec![ApiPart::text(text)],
        }),
        generation_config,
    }
}

fn parse_response(api_response: ApiResponse) -> Response {
    let (parts, finish_reason) = api_response
        .candidates
        .into_iter()
        .next()
        .map(|candidate| {
            let parts = candidate
                .content
                .map(|content| {
                    content
                        .parts
                        .into_iter()
                        .filter_map(|part| {
                            if let Some(data) = part.inline_data {
                                Some(Part::InlineImage {
                                    media_type: data.mime_type,
                                    data: data.data,
                                })
                            } else {
                                part.text.map(|text| Part::Text { text })
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            (parts, candidate.finish_reason)
        })
        .unwrap_or((Vec::new(), None));

    let usage = api_response
        .usage_metadata
        .map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    Response {
        parts,
        finish_reason,
        usage,
    }
}
