//! Provider trait for the three outbound calls.

use crate::credentials::ApiKey;
use crate::error::Result;
use crate::image::{GeneratedImage, ImagePayload};
use async_trait::async_trait;

/// One prompt sent to the provider: an optional reference image plus text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    /// Reference image, sent ahead of the text.
    pub image: Option<ImagePayload>,
    /// Instruction text.
    pub text: String,
}

impl ContentRequest {
    /// Creates a text-only request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            image: None,
            text: text.into(),
        }
    }

    /// Attaches a reference image.
    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }
}

/// A hosted generative model that can answer in text or in an image.
#[async_trait]
pub trait StudioProvider: Send + Sync {
    /// Sends the request to the text model and returns its reply.
    async fn generate_text(&self, key: &ApiKey, request: &ContentRequest) -> Result<String>;

    /// Sends the request to the image model and returns the first image found.
    async fn generate_image(&self, key: &ApiKey, request: &ContentRequest)
        -> Result<GeneratedImage>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}

/// Extension trait for providers with retry logic.
#[async_trait]
pub trait StudioProviderExt: StudioProvider {
    /// Generates an image, retrying transient failures.
    async fn generate_image_with_retries(
        &self,
        key: &ApiKey,
        request: &ContentRequest,
        max_retries: u32,
    ) -> Result<GeneratedImage> {
        let mut attempt = 0;
        loop {
            match self.generate_image(key, request).await {
                Ok(image) => return Ok(image),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T: StudioProvider + ?Sized> StudioProviderExt for T {}
