//! The studio controller.
//!
//! [`Studio`] owns one session and wires intake, suggestions, refinement and
//! synthesis together. All methods take `&self`; the session lock is never
//! held across an await, so a refinement and a synthesis can overlap.
//! Each of those two operations is single-flight.

use crate::credentials::{Credentials, KeySelector};
use crate::error::{ReimagineError, Result};
use crate::image::{intake, FileUpload, GeneratedImage, IntakeOutcome};
use crate::provider::{ContentRequest, StudioProvider, StudioProviderExt};
use crate::refine::{clean_refinement, refinement_instruction};
use crate::session::{SessionState, StudioView};
use crate::suggest::{parse_suggestions, Suggestion, SUGGESTION_INSTRUCTION};
use crate::synthesize::synthesis_instruction;
use crate::view::{messages, StatusKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Result of a refinement request.
#[derive(Debug)]
pub enum RefineOutcome {
    /// The prompt was replaced with this text.
    Refined(String),
    /// Input or credential check failed; the status says why.
    Rejected,
    /// A refinement is already running; nothing changed.
    Busy,
    /// The provider call failed.
    Failed(ReimagineError),
}

/// Result of a synthesis request.
#[derive(Debug)]
pub enum SynthesisOutcome {
    /// The output was replaced with this image.
    Completed(GeneratedImage),
    /// Input or credential check failed; the status says why.
    Rejected,
    /// A synthesis is already running; nothing changed.
    Busy,
    /// The provider call failed; the view is in the error state.
    Failed(ReimagineError),
}

/// Builder for [`Studio`].
pub struct StudioBuilder {
    provider: Arc<dyn StudioProvider>,
    credentials: Option<Credentials>,
    key_selector: Option<Arc<dyn KeySelector>>,
    retries: u32,
}

impl StudioBuilder {
    /// Sets the key store. Defaults to [`Credentials::from_env`].
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the host capability used to (re)select a key.
    pub fn key_selector(mut self, selector: Arc<dyn KeySelector>) -> Self {
        self.key_selector = Some(selector);
        self
    }

    /// Retries for transient synthesis failures. Defaults to none.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Builds the studio with an empty, idle session.
    pub fn build(self) -> Studio {
        Studio {
            provider: self.provider,
            credentials: self.credentials.unwrap_or_else(Credentials::from_env),
            key_selector: self.key_selector,
            session: Mutex::new(SessionState::new()),
            synthesis_slot: Semaphore::new(1),
            refine_slot: Semaphore::new(1),
            retries: self.retries,
        }
    }
}

/// One interactive session against a provider.
pub struct Studio {
    provider: Arc<dyn StudioProvider>,
    credentials: Credentials,
    key_selector: Option<Arc<dyn KeySelector>>,
    session: Mutex<SessionState>,
    synthesis_slot: Semaphore,
    refine_slot: Semaphore,
    retries: u32,
}

impl Studio {
    /// Starts building a studio around `provider`.
    pub fn builder(provider: Arc<dyn StudioProvider>) -> StudioBuilder {
        StudioBuilder {
            provider,
            credentials: None,
            key_selector: None,
            retries: 0,
        }
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        lock_session(&self.session)
    }

    /// The key store shared by all operations.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns what a front-end should render now.
    pub async fn view(&self) -> StudioView {
        self.session().snapshot()
    }

    /// Replaces the prompt text, as typing into the field would.
    pub async fn set_prompt(&self, prompt: impl Into<String>) {
        self.session().set_prompt(prompt);
    }

    /// Hands a file to intake. Accepted images replace the active image and
    /// trigger suggestion generation before this returns.
    pub async fn upload(&self, file: FileUpload) -> IntakeOutcome {
        let outcome = intake(&file);
        match &outcome {
            IntakeOutcome::Rejected => {
                tracing::debug!(name = %file.name, content_type = %file.content_type, "rejected upload");
                self.session().view_mut().error(messages::INVALID_FILE_TYPE);
            }
            IntakeOutcome::Malformed => {
                tracing::debug!(name = %file.name, "upload did not decode to a data URL");
            }
            IntakeOutcome::Accepted(payload) => {
                tracing::debug!(name = %file.name, mime_type = %payload.mime_type, "image accepted");
                self.session().set_image(payload.clone());
                self.generate_suggestions().await;
            }
        }
        outcome
    }

    /// Asks the text model for transformation ideas about the active image.
    ///
    /// Silently returns nothing when there is no key or no image. Provider
    /// failures are logged and leave the panel hidden.
    pub async fn generate_suggestions(&self) -> Vec<Suggestion> {
        let Some(key) = self.credentials.resolve().await else {
            tracing::debug!("skipping suggestions: no API key");
            return Vec::new();
        };

        let (image, generation) = {
            let mut session = self.session();
            let Some(image) = session.image().cloned() else {
                return Vec::new();
            };
            session.clear_suggestions();
            (image, session.image_generation())
        };

        let request = ContentRequest::new(SUGGESTION_INSTRUCTION).with_image(image);
        let reply = match self.provider.generate_text(&key, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "suggestion request failed");
                return Vec::new();
            }
        };

        let suggestions = parse_suggestions(&reply);
        let mut session = self.session();
        if session.image_generation() != generation {
            tracing::debug!("discarding suggestions for a replaced image");
            return Vec::new();
        }
        session.set_suggestions(suggestions.clone());
        suggestions
    }

    /// Puts the chip at `index` into the prompt and refines it.
    ///
    /// Returns `None` if there is no such chip.
    pub async fn select_suggestion(&self, index: usize) -> Option<RefineOutcome> {
        {
            let mut session = self.session();
            let label = session.suggestions().get(index)?.label.clone();
            session.set_prompt(label);
        }
        Some(self.refine_prompt().await)
    }

    /// Rewrites the current prompt through the text model.
    pub async fn refine_prompt(&self) -> RefineOutcome {
        let input = self.session().prompt().to_string();
        if input.trim().is_empty() {
            self.session().view_mut().error(messages::DESCRIBE_VISION);
            return RefineOutcome::Rejected;
        }

        let key = match self.credentials.require().await {
            Ok(key) => key,
            Err(e) => {
                self.session().view_mut().error(e.to_string());
                return RefineOutcome::Rejected;
            }
        };

        let Ok(_permit) = self.refine_slot.try_acquire() else {
            tracing::debug!("refinement already in flight");
            return RefineOutcome::Busy;
        };

        // Declared after the permit so the marker clears before the slot frees.
        let marker = OptimizingMarker::set(&self.session);

        let request = ContentRequest::new(refinement_instruction(&input));
        let result = self.provider.generate_text(&key, &request).await;

        drop(marker);
        let mut session = self.session();
        match result {
            Ok(reply) => {
                let refined = clean_refinement(&reply);
                session.set_prompt(refined.clone());
                session
                    .view_mut()
                    .set_status(StatusKind::Success, messages::PROMPT_OPTIMIZED);
                RefineOutcome::Refined(refined)
            }
            Err(e) => {
                tracing::warn!(error = %e, "prompt refinement failed");
                session.view_mut().error(messages::REFINEMENT_FAILED);
                RefineOutcome::Failed(e)
            }
        }
    }

    /// Sends the active image and prompt to the image model.
    pub async fn synthesize(&self) -> SynthesisOutcome {
        let Ok(_permit) = self.synthesis_slot.try_acquire() else {
            tracing::debug!("synthesis already in flight");
            return SynthesisOutcome::Busy;
        };

        // Snapshot: a later upload does not change this request.
        let (image, prompt) = {
            let mut session = self.session();
            let Some(image) = session.image().cloned() else {
                session.view_mut().error(messages::UPLOAD_FIRST);
                return SynthesisOutcome::Rejected;
            };
            let prompt = session.prompt().trim().to_string();
            if prompt.is_empty() {
                session.view_mut().error(messages::PROMPT_FIRST);
                return SynthesisOutcome::Rejected;
            }
            (image, prompt)
        };

        let key = match self.credentials.require().await {
            Ok(key) => key,
            Err(e) => {
                self.session().view_mut().error(e.to_string());
                return SynthesisOutcome::Rejected;
            }
        };

        self.session().view_mut().begin_synthesis();

        let request = ContentRequest::new(synthesis_instruction(&prompt)).with_image(image);
        let result = self
            .provider
            .generate_image_with_retries(&key, &request, self.retries)
            .await;

        match result {
            Ok(output) => {
                tracing::debug!(
                    size_bytes = output.size(),
                    duration_ms = ?output.metadata.duration_ms,
                    "synthesis complete"
                );
                let mut session = self.session();
                session.set_output(output.clone());
                session.view_mut().synthesis_succeeded();
                SynthesisOutcome::Completed(output)
            }
            Err(e) => {
                tracing::error!(error = %e, "synthesis failed");
                self.session().view_mut().synthesis_failed(&e.to_string());
                if e.is_invalid_entity() {
                    if let Err(select_err) = self.select_api_key().await {
                        tracing::warn!(error = %select_err, "key selection failed");
                    }
                }
                SynthesisOutcome::Failed(e)
            }
        }
    }

    /// Runs the host's key-selection flow.
    ///
    /// Returns whether a new key was stored; `false` when no selector is
    /// configured or the user cancelled.
    pub async fn select_api_key(&self) -> Result<bool> {
        let Some(selector) = self.key_selector.as_ref() else {
            tracing::debug!("no key selector configured");
            return Ok(false);
        };
        self.credentials.select_with(selector.as_ref()).await
    }
}

// Poisoning is ignored: the session stays usable after a panicked holder.
fn lock_session(session: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the prompt field's optimizing marker for the life of a refinement,
/// including one whose future is dropped mid-call.
struct OptimizingMarker<'a> {
    session: &'a Mutex<SessionState>,
}

impl<'a> OptimizingMarker<'a> {
    fn set(session: &'a Mutex<SessionState>) -> Self {
        lock_session(session).view_mut().begin_refine();
        Self { session }
    }
}

impl Drop for OptimizingMarker<'_> {
    fn drop(&mut self) {
        lock_session(self.session).view_mut().end_refine();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ApiKey;
    use crate::image::{GenerationMetadata, ImageFormat, ImagePayload};
    use crate::view::UiState;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    const JPEG_BYTES: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];

    #[derive(Default)]
    struct FakeProvider {
        text_replies: StdMutex<VecDeque<Result<String>>>,
        image_replies: StdMutex<VecDeque<Result<GeneratedImage>>>,
        text_calls: AtomicUsize,
        image_calls: AtomicUsize,
        requests: StdMutex<Vec<ContentRequest>>,
        image_gate: Option<(Arc<Notify>, Arc<Notify>)>,
        text_gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeProvider {
        fn with_text(self, reply: Result<String>) -> Self {
            self.text_replies.lock().unwrap().push_back(reply);
            self
        }

        fn with_image(self, reply: Result<GeneratedImage>) -> Self {
            self.image_replies.lock().unwrap().push_back(reply);
            self
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.text_calls.load(Ordering::SeqCst),
                self.image_calls.load(Ordering::SeqCst),
            )
        }

        fn last_request(&self) -> ContentRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl StudioProvider for FakeProvider {
        async fn generate_text(&self, _key: &ApiKey, request: &ContentRequest) -> Result<String> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if let Some((started, release)) = &self.text_gate {
                started.notify_one();
                release.notified().await;
            }
            let reply = self.text_replies.lock().unwrap().pop_front();
            reply.unwrap_or_else(|| Ok("default reply".into()))
        }

        async fn generate_image(
            &self,
            _key: &ApiKey,
            request: &ContentRequest,
        ) -> Result<GeneratedImage> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if let Some((started, release)) = &self.image_gate {
                started.notify_one();
                release.notified().await;
            }
            let reply = self.image_replies.lock().unwrap().pop_front();
            reply.unwrap_or_else(|| Ok(png()))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct CountingSelector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeySelector for CountingSelector {
        async fn select_key(&self) -> Result<Option<ApiKey>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ApiKey::new("fresh-key"))
        }
    }

    fn png() -> GeneratedImage {
        GeneratedImage::new(
            vec![0x89, b'P', b'N', b'G'],
            ImageFormat::Png,
            GenerationMetadata::default(),
        )
    }

    fn keyed() -> Credentials {
        Credentials::with_env_lookup(|name| (name == "GEMINI_API_KEY").then(|| "test-key".into()))
    }

    fn studio(provider: Arc<FakeProvider>) -> Studio {
        Studio::builder(provider).credentials(keyed()).build()
    }

    fn jpeg() -> FileUpload {
        FileUpload::new("person.jpg", "image/jpeg", JPEG_BYTES)
    }

    #[tokio::test]
    async fn test_non_image_upload_is_rejected() {
        let provider = Arc::new(FakeProvider::default());
        let studio = studio(provider.clone());

        let outcome = studio
            .upload(FileUpload::new("notes.txt", "text/plain", b"hi".to_vec()))
            .await;

        assert_eq!(outcome, IntakeOutcome::Rejected);
        let view = studio.view().await;
        assert!(view.preview.is_none());
        assert_eq!(view.status.unwrap().text, messages::INVALID_FILE_TYPE);
        assert_eq!(provider.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_upload_produces_three_chips() {
        let provider = Arc::new(
            FakeProvider::default().with_text(Ok("smiling, waving, wearing a hat".into())),
        );
        let studio = studio(provider.clone());

        let IntakeOutcome::Accepted(payload) = studio.upload(jpeg()).await else {
            panic!("expected accepted upload");
        };
        assert_eq!(payload.mime_type, "image/jpeg");

        let view = studio.view().await;
        assert!(view.suggestions_visible);
        let labels: Vec<_> = view.suggestions.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["smiling", "waving", "wearing a hat"]);
        assert_eq!(view.preview, Some(payload.to_data_url()));

        let request = provider.last_request();
        assert_eq!(request.text, SUGGESTION_INSTRUCTION);
        assert_eq!(request.image, Some(payload));
    }

    #[tokio::test]
    async fn test_suggestion_failure_is_silent() {
        let provider = Arc::new(
            FakeProvider::default().with_text(Err(ReimagineError::Api {
                status: 500,
                message: "boom".into(),
            })),
        );
        let studio = studio(provider.clone());

        assert!(matches!(studio.upload(jpeg()).await, IntakeOutcome::Accepted(_)));

        let view = studio.view().await;
        assert!(!view.suggestions_visible);
        assert!(view.suggestions.is_empty());
        assert!(view.status.is_none());
        assert_eq!(provider.calls(), (1, 0));
    }

    #[tokio::test]
    async fn test_suggestions_skip_without_key() {
        let provider = Arc::new(FakeProvider::default());
        let studio = Studio::builder(provider.clone())
            .credentials(Credentials::isolated())
            .build();

        assert!(matches!(studio.upload(jpeg()).await, IntakeOutcome::Accepted(_)));
        assert_eq!(provider.calls(), (0, 0));
        assert!(studio.generate_suggestions().await.is_empty());
    }

    #[tokio::test]
    async fn test_refine_rejects_blank_prompt_without_network() {
        let provider = Arc::new(FakeProvider::default());
        let studio = studio(provider.clone());

        for prompt in ["", "   \n\t"] {
            studio.set_prompt(prompt).await;
            assert!(matches!(studio.refine_prompt().await, RefineOutcome::Rejected));
            let view = studio.view().await;
            assert_eq!(view.status.unwrap().text, messages::DESCRIBE_VISION);
            assert!(view.refine_enabled);
        }
        assert_eq!(provider.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_refine_requires_key() {
        let provider = Arc::new(FakeProvider::default());
        let studio = Studio::builder(provider.clone())
            .credentials(Credentials::isolated())
            .build();

        studio.set_prompt("make him wave").await;
        assert!(matches!(studio.refine_prompt().await, RefineOutcome::Rejected));
        assert_eq!(studio.view().await.status.unwrap().text, "API Key missing.");
        assert_eq!(provider.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_refine_replaces_prompt_and_can_repeat() {
        let provider = Arc::new(
            FakeProvider::default()
                .with_text(Ok("  A joyful wave, open palm, transparent background.  ".into()))
                .with_text(Ok("An even better wave.".into())),
        );
        let studio = studio(provider.clone());

        studio.set_prompt("make him wave").await;
        let RefineOutcome::Refined(first) = studio.refine_prompt().await else {
            panic!("expected refinement");
        };
        assert_eq!(first, "A joyful wave, open palm, transparent background.");
        assert!(provider.last_request().text.ends_with("Request: make him wave"));
        assert!(provider.last_request().image.is_none());

        let view = studio.view().await;
        assert_eq!(view.prompt, first);
        assert!(!view.optimizing);
        assert!(view.refine_enabled);
        assert_eq!(view.status.unwrap().text, messages::PROMPT_OPTIMIZED);

        // Refining the model's own output goes through the same validation.
        assert!(matches!(
            studio.refine_prompt().await,
            RefineOutcome::Refined(_)
        ));
        studio.set_prompt(" ").await;
        assert!(matches!(studio.refine_prompt().await, RefineOutcome::Rejected));
        assert_eq!(provider.calls(), (2, 0));
    }

    #[tokio::test]
    async fn test_refine_failure_cleans_up() {
        let provider = Arc::new(
            FakeProvider::default().with_text(Err(ReimagineError::Auth("bad".into()))),
        );
        let studio = studio(provider);

        studio.set_prompt("make him wave").await;
        assert!(matches!(
            studio.refine_prompt().await,
            RefineOutcome::Failed(ReimagineError::Auth(_))
        ));

        let view = studio.view().await;
        assert_eq!(view.prompt, "make him wave");
        assert!(!view.optimizing);
        assert!(view.refine_enabled);
        assert_eq!(view.status.unwrap().text, messages::REFINEMENT_FAILED);
    }

    #[tokio::test]
    async fn test_cancelled_refine_clears_marker() {
        let started = Arc::new(Notify::new());
        let provider = Arc::new(FakeProvider {
            text_gate: Some((started.clone(), Arc::new(Notify::new()))),
            ..Default::default()
        });
        let studio = studio(provider.clone());
        studio.set_prompt("make him wave").await;

        tokio::select! {
            _ = studio.refine_prompt() => panic!("refinement finished without a reply"),
            _ = started.notified() => {}
        }

        let view = studio.view().await;
        assert!(!view.optimizing);
        assert!(view.refine_enabled);
        assert_eq!(view.prompt, "make him wave");
        assert_eq!(studio.refine_slot.available_permits(), 1);
        assert_eq!(provider.calls(), (1, 0));
    }

    #[tokio::test]
    async fn test_suggestions_for_replaced_image_are_dropped() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = Arc::new(
            FakeProvider {
                text_gate: Some((started.clone(), release.clone())),
                ..Default::default()
            }
            .with_text(Ok("smiling, waving, wearing a hat".into())),
        );
        let studio = studio(provider.clone());

        let replace = async {
            started.notified().await;
            studio
                .session()
                .set_image(ImagePayload::new("BBBB", "image/png"));
            release.notify_one();
        };
        let (outcome, ()) = tokio::join!(studio.upload(jpeg()), replace);

        assert!(matches!(outcome, IntakeOutcome::Accepted(_)));
        let view = studio.view().await;
        assert!(view.suggestions.is_empty());
        assert!(!view.suggestions_visible);
        assert_eq!(view.preview.as_deref(), Some("data:image/png;base64,BBBB"));
    }

    #[tokio::test]
    async fn test_select_suggestion_sets_prompt_and_refines() {
        let provider = Arc::new(
            FakeProvider::default()
                .with_text(Ok("smiling, waving".into()))
                .with_text(Ok("A broad, warm smile.".into())),
        );
        let studio = studio(provider.clone());
        studio.upload(jpeg()).await;

        assert!(studio.select_suggestion(5).await.is_none());

        let outcome = studio.select_suggestion(0).await.unwrap();
        assert!(matches!(outcome, RefineOutcome::Refined(ref p) if p == "A broad, warm smile."));
        assert!(provider.last_request().text.ends_with("Request: smiling"));
        assert_eq!(studio.view().await.prompt, "A broad, warm smile.");
    }

    #[tokio::test]
    async fn test_generate_without_upload() {
        let provider = Arc::new(FakeProvider::default());
        let studio = studio(provider.clone());
        studio.set_prompt("wearing a hat").await;

        assert!(matches!(studio.synthesize().await, SynthesisOutcome::Rejected));

        let view = studio.view().await;
        assert_eq!(view.status.unwrap().text, messages::UPLOAD_FIRST);
        assert_eq!(view.state, UiState::Idle);
        assert_eq!(provider.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_generate_without_prompt() {
        let provider = Arc::new(FakeProvider::default().with_text(Ok("a, b".into())));
        let studio = studio(provider.clone());
        studio.upload(jpeg()).await;

        assert!(matches!(studio.synthesize().await, SynthesisOutcome::Rejected));
        assert_eq!(
            studio.view().await.status.unwrap().text,
            messages::PROMPT_FIRST
        );
        assert_eq!(provider.calls(), (1, 0));
    }

    #[tokio::test]
    async fn test_synthesis_success() {
        let provider = Arc::new(FakeProvider::default().with_text(Ok("a".into())));
        let studio = studio(provider.clone());
        studio.upload(jpeg()).await;
        studio.set_prompt("  wearing a hat ").await;

        let SynthesisOutcome::Completed(image) = studio.synthesize().await else {
            panic!("expected an image");
        };

        let request = provider.last_request();
        assert!(request.text.ends_with("3. Apply this modification: wearing a hat"));
        assert_eq!(request.image.unwrap().mime_type, "image/jpeg");

        let view = studio.view().await;
        assert_eq!(view.state, UiState::Success);
        assert!(!view.spinner_visible);
        assert!(view.output_visible);
        assert!(view.generate_enabled);
        assert_eq!(view.output, Some(image.to_data_url()));
        assert!(view.output.unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(view.status.unwrap().text, messages::SYNTHESIS_COMPLETE);
    }

    #[tokio::test]
    async fn test_synthesis_failures_end_in_error_state() {
        let errors = vec![
            ReimagineError::NoImageData,
            ReimagineError::ContentBlocked("nope".into()),
            ReimagineError::Api {
                status: 500,
                message: "boom".into(),
            },
        ];
        for err in errors {
            let expected = err.to_string();
            let provider = Arc::new(
                FakeProvider::default()
                    .with_text(Ok("a".into()))
                    .with_image(Err(err)),
            );
            let studio = studio(provider);
            studio.upload(jpeg()).await;
            studio.set_prompt("wearing a hat").await;

            assert!(matches!(
                studio.synthesize().await,
                SynthesisOutcome::Failed(_)
            ));
            let view = studio.view().await;
            assert_eq!(view.state, UiState::Error);
            assert!(!view.spinner_visible);
            assert!(view.generate_enabled);
            assert!(view.refine_enabled);
            assert_eq!(view.status.unwrap().text, expected);
        }
    }

    #[tokio::test]
    async fn test_no_image_data_message() {
        let provider = Arc::new(
            FakeProvider::default()
                .with_text(Ok("a".into()))
                .with_image(Err(ReimagineError::NoImageData)),
        );
        let studio = studio(provider);
        studio.upload(jpeg()).await;
        studio.set_prompt("wearing a hat").await;
        studio.synthesize().await;

        let status = studio.view().await.status.unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.text, "No image data returned from the model.");
    }

    #[tokio::test]
    async fn test_invalid_entity_triggers_key_selection() {
        let provider = Arc::new(
            FakeProvider::default()
                .with_text(Ok("a".into()))
                .with_image(Err(ReimagineError::InvalidRequest(
                    "Requested entity was not found.".into(),
                ))),
        );
        let selector = Arc::new(CountingSelector {
            calls: AtomicUsize::new(0),
        });
        let studio = Studio::builder(provider)
            .credentials(keyed())
            .key_selector(selector.clone())
            .build();
        studio.upload(jpeg()).await;
        studio.set_prompt("wearing a hat").await;

        studio.synthesize().await;

        assert_eq!(selector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            studio.credentials().resolve().await.unwrap().expose(),
            "fresh-key"
        );
        assert_eq!(studio.view().await.state, UiState::Error);
    }

    #[tokio::test]
    async fn test_other_errors_do_not_trigger_key_selection() {
        let provider = Arc::new(
            FakeProvider::default()
                .with_text(Ok("a".into()))
                .with_image(Err(ReimagineError::Auth("bad".into()))),
        );
        let selector = Arc::new(CountingSelector {
            calls: AtomicUsize::new(0),
        });
        let studio = Studio::builder(provider)
            .credentials(keyed())
            .key_selector(selector.clone())
            .build();
        studio.upload(jpeg()).await;
        studio.set_prompt("wearing a hat").await;
        studio.synthesize().await;

        assert_eq!(selector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_select_api_key_without_selector() {
        let studio = studio(Arc::new(FakeProvider::default()));
        assert!(!studio.select_api_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_single_synthesis_in_flight() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = Arc::new(FakeProvider {
            image_gate: Some((started.clone(), release.clone())),
            ..FakeProvider::default().with_text(Ok("a".into()))
        });
        let studio = Arc::new(studio(provider.clone()));
        studio.upload(jpeg()).await;
        studio.set_prompt("wearing a hat").await;

        let first = tokio::spawn({
            let studio = studio.clone();
            async move { studio.synthesize().await }
        });
        started.notified().await;

        let view = studio.view().await;
        assert_eq!(view.state, UiState::Loading);
        assert!(view.spinner_visible);
        assert!(!view.generate_enabled);
        assert!(!view.refine_enabled);

        assert!(matches!(studio.synthesize().await, SynthesisOutcome::Busy));
        assert_eq!(studio.view().await.state, UiState::Loading);

        release.notify_one();
        assert!(matches!(
            first.await.unwrap(),
            SynthesisOutcome::Completed(_)
        ));
        assert_eq!(provider.calls().1, 1);

        // Guard released on completion.
        release.notify_one();
        assert!(matches!(
            studio.synthesize().await,
            SynthesisOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_upload_during_synthesis_keeps_request_image() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = Arc::new(FakeProvider {
            image_gate: Some((started.clone(), release.clone())),
            ..FakeProvider::default()
        });
        let studio = Arc::new(studio(provider.clone()));
        studio.upload(jpeg()).await;
        studio.set_prompt("wearing a hat").await;

        let pending = tokio::spawn({
            let studio = studio.clone();
            async move { studio.synthesize().await }
        });
        started.notified().await;
        let synth_request = provider.last_request();

        let png_bytes = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        studio
            .upload(FileUpload::new("other.png", "image/png", png_bytes))
            .await;

        release.notify_one();
        assert!(matches!(pending.await.unwrap(), SynthesisOutcome::Completed(_)));
        assert_eq!(synth_request.image.unwrap().mime_type, "image/jpeg");
        assert!(studio
            .view()
            .await
            .preview
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }
}
