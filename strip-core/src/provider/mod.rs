//! Injected capability interfaces for the external collaborators.
//!
//! Each remote dependency (text generation, image generation, object storage,
//! email delivery) is a single-trait capability constructed once per process
//! and passed explicitly into the gate and the engine. No ambient singletons.

pub mod bucket;
pub mod gemini;
pub mod resend;

use async_trait::async_trait;

use crate::error::{DeliveryError, ProviderResult, StoreResult};

/// A request for generated text.
#[derive(Debug, Clone)]
pub struct TextRequest {
    /// The user-facing instruction.
    pub instruction: String,
    /// Optional system framing.
    pub system: Option<String>,
    /// Ask the provider to emit JSON only.
    pub json_output: bool,
}

impl TextRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            system: None,
            json_output: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn expect_json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Text-generation capability. Used for the content-policy judgment, title
/// generation, and per-cycle panel directions.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the request. An empty or missing completion is a
    /// provider error, never an empty success.
    async fn generate(&self, request: TextRequest) -> ProviderResult<String>;
}

/// The previous episode's artifact, passed to the image provider as a
/// visual-continuity reference.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// A request to render one episode image.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub instruction: String,
    pub reference: Option<ReferenceImage>,
}

/// A rendered episode image.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Image-generation capability.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render an image. Absence of image output in the provider response is
    /// an error; there is no fallback artifact.
    async fn render(&self, request: RenderRequest) -> ProviderResult<RenderedImage>;
}

/// Object-storage capability for episode artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under a key and return the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<String>;

    /// Fetch previously stored bytes by public URL.
    async fn get(&self, url: &str) -> StoreResult<(Vec<u8>, String)>;
}

/// A transactional email ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Email-delivery capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hand the message to the delivery service; returns its delivery id.
    async fn send(&self, email: OutgoingEmail) -> Result<String, DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_request_builder() {
        let request = TextRequest::new("write a plan")
            .with_system("you are terse")
            .expect_json();
        assert_eq!(request.instruction, "write a plan");
        assert_eq!(request.system.as_deref(), Some("you are terse"));
        assert!(request.json_output);
    }
}
