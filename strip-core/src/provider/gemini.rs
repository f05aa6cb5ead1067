//! Gemini-backed implementations of the generation capabilities.

use async_trait::async_trait;
use gemini::Gemini;

use super::{ImageGenerator, RenderRequest, RenderedImage, TextGenerator, TextRequest};
use crate::error::{ProviderError, ProviderResult};
use crate::prompt::REFERENCE_IMAGE_NOTE;

/// Text generation over a Gemini model.
pub struct GeminiText {
    client: Gemini,
}

impl GeminiText {
    pub fn new(client: Gemini) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextGenerator for GeminiText {
    async fn generate(&self, request: TextRequest) -> ProviderResult<String> {
        let mut api_request = gemini::Request::new().with_text(request.instruction);
        if let Some(system) = request.system {
            api_request = api_request.with_system(system);
        }
        if request.json_output {
            api_request = api_request.expect_json();
        }

        let response = self.client.generate(api_request).await?;
        let text = response.text().trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::Unusable(
                "model returned no text content".to_string(),
            ));
        }
        Ok(text)
    }
}

/// Image generation over a Gemini image model.
pub struct GeminiImage {
    client: Gemini,
}

impl GeminiImage {
    pub fn new(client: Gemini) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImage {
    async fn render(&self, request: RenderRequest) -> ProviderResult<RenderedImage> {
        let mut api_request = gemini::Request::new()
            .with_text(request.instruction)
            .expect_image();
        if let Some(reference) = &request.reference {
            api_request = api_request
                .with_text(REFERENCE_IMAGE_NOTE)
                .with_image_bytes(&reference.content_type, &reference.bytes);
        }

        let response = self.client.generate(api_request).await?;
        let image = response.first_image().ok_or_else(|| {
            ProviderError::Unusable("model did not return an image file".to_string())
        })?;
        let bytes = image.decode()?;
        if bytes.is_empty() {
            return Err(ProviderError::Unusable(
                "model image is missing data".to_string(),
            ));
        }
        Ok(RenderedImage {
            bytes,
            content_type: image.media_type,
        })
    }
}
