//! Gemini (Google) provider for text and image generation.

use crate::credentials::ApiKey;
use crate::error::{parse_retry_after, sanitize_error_message, ReimagineError, Result};
use crate::image::{GeneratedImage, GenerationMetadata, ImageFormat};
use crate::provider::{ContentRequest, StudioProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default model for suggestions and prompt refinement.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
/// Default model for image synthesis.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
/// Public Generative Language API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Builder for GeminiProvider.
#[derive(Debug, Clone)]
pub struct GeminiProviderBuilder {
    text_model: Option<String>,
    image_model: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl Default for GeminiProviderBuilder {
    fn default() -> Self {
        Self {
            text_model: None,
            image_model: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text model. Falls back to `REIMAGINE_TEXT_MODEL`, then
    /// [`DEFAULT_TEXT_MODEL`].
    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = Some(model.into());
        self
    }

    /// Sets the image model. Falls back to `REIMAGINE_IMAGE_MODEL`, then
    /// [`DEFAULT_IMAGE_MODEL`].
    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    /// Overrides the API root (for proxies and test servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider, resolving model names.
    pub fn build(self) -> Result<GeminiProvider> {
        let text_model = self
            .text_model
            .or_else(|| std::env::var("REIMAGINE_TEXT_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string());
        let image_model = self
            .image_model
            .or_else(|| std::env::var("REIMAGINE_IMAGE_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(GeminiProvider {
            client,
            text_model,
            image_model,
            base_url: self.base_url,
            timeout: self.timeout,
        })
    }
}

/// Gemini provider. Keys are supplied per call.
pub struct GeminiProvider {
    client: reqwest::Client,
    text_model: String,
    image_model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the text model identifier.
    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    /// Returns the image model identifier.
    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn post(&self, key: &ApiKey, model: &str, body: &GeminiRequest) -> Result<GeminiResponse> {
        tracing::debug!(model, "sending Gemini generateContent request");

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", key.expose())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        response.json().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> ReimagineError {
        if e.is_timeout() {
            ReimagineError::Timeout(self.timeout)
        } else {
            ReimagineError::Network(e)
        }
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> ReimagineError {
    let text = sanitize_error_message(text);
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return ReimagineError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return ReimagineError::Auth(text);
    }
    if status == 404 {
        // Keep the provider's wording; key re-selection keys off it.
        return ReimagineError::InvalidRequest(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
        return ReimagineError::Auth(text);
    }
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("prohibited")
    {
        return ReimagineError::ContentBlocked(text);
    }
    ReimagineError::Api {
        status,
        message: text,
    }
}

#[async_trait]
impl StudioProvider for GeminiProvider {
    async fn generate_text(&self, key: &ApiKey, request: &ContentRequest) -> Result<String> {
        let body = GeminiRequest::text(request);
        let response = self.post(key, &self.text_model, &body).await?;
        extract_text(response)
    }

    async fn generate_image(
        &self,
        key: &ApiKey,
        request: &ContentRequest,
    ) -> Result<GeneratedImage> {
        let start = Instant::now();
        let body = GeminiRequest::image(request);
        let response = self.post(key, &self.image_model, &body).await?;

        let metadata = GenerationMetadata {
            model: Some(self.image_model.clone()),
            duration_ms: Some(start.elapsed().as_millis() as u64),
        };
        extract_image(response, metadata)
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

fn check_prompt_feedback(response: &GeminiResponse) -> Result<()> {
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(ReimagineError::ContentBlocked(msg));
        }
    }
    Ok(())
}

fn is_blocking_finish_reason(reason: &str) -> bool {
    matches!(
        reason,
        "SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST"
    )
}

/// Concatenates the text parts of the first candidate that has any.
fn extract_text(response: GeminiResponse) -> Result<String> {
    check_prompt_feedback(&response)?;

    for candidate in response.candidates {
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if !text.trim().is_empty() {
            return Ok(text);
        }
        if let Some(reason) = candidate.finish_reason.as_deref() {
            if is_blocking_finish_reason(reason) {
                return Err(ReimagineError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    reason
                )));
            }
        }
    }

    Err(ReimagineError::UnexpectedResponse(
        "No text in Gemini response".into(),
    ))
}

/// Returns the first inline image found in any candidate.
fn extract_image(response: GeminiResponse, metadata: GenerationMetadata) -> Result<GeneratedImage> {
    check_prompt_feedback(&response)?;

    let mut blocked_reason = None;
    for candidate in response.candidates {
        if let Some(reason) = candidate.finish_reason {
            if is_blocking_finish_reason(&reason) && blocked_reason.is_none() {
                blocked_reason = Some(reason);
            }
        }
        let inline = candidate
            .content
            .and_then(|c| c.parts.into_iter().find_map(|p| p.inline_data));
        if let Some(inline) = inline {
            let format = ImageFormat::from_mime_type(&inline.mime_type).unwrap_or_default();
            return GeneratedImage::from_base64(&inline.data, format, metadata);
        }
    }

    match blocked_reason {
        Some(reason) => Err(ReimagineError::ContentBlocked(format!(
            "Content blocked by Gemini safety filter: {}",
            reason
        ))),
        None => Err(ReimagineError::NoImageData),
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn parts(req: &ContentRequest) -> Vec<GeminiRequestPart> {
        let mut parts = Vec::new();

        // Image goes first so the instruction reads as a caption for it
        if let Some(ref image) = req.image {
            parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        parts.push(GeminiRequestPart::Text {
            text: req.text.clone(),
        });
        parts
    }

    fn text(req: &ContentRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: Self::parts(req),
            }],
            generation_config: None,
        }
    }

    fn image(req: &ContentRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: Self::parts(req),
            }],
            generation_config: Some(GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}
