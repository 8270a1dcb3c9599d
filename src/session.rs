//! Per-session state owned by the studio.

use crate::image::{GeneratedImage, ImagePayload};
use crate::suggest::Suggestion;
use crate::view::{StatusMessage, UiState, ViewState};
use serde::Serialize;

/// Everything a session holds: the active image, the prompt, the current
/// suggestions, the last synthesized output and the view.
#[derive(Debug, Default)]
pub struct SessionState {
    image: Option<ImagePayload>,
    prompt: String,
    suggestions: Vec<Suggestion>,
    output: Option<GeneratedImage>,
    view: ViewState,
    // Bumped with every image change; stale suggestion replies are dropped.
    image_generation: u64,
}

impl SessionState {
    /// Creates an empty, idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active reference image.
    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    /// Replaces the active reference image.
    pub fn set_image(&mut self, image: ImagePayload) {
        self.image = Some(image);
        self.image_generation += 1;
    }

    /// Counts image replacements, so a reply can tell whether the image it
    /// was asked about is still active.
    pub fn image_generation(&self) -> u64 {
        self.image_generation
    }

    /// Current prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Replaces the prompt text.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Current suggestions.
    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Drops the current suggestions and hides the panel.
    pub fn clear_suggestions(&mut self) {
        self.suggestions.clear();
        self.view.set_suggestions_visible(false);
    }

    /// Installs new suggestions; the panel shows only when there are some.
    pub fn set_suggestions(&mut self, suggestions: Vec<Suggestion>) {
        self.view.set_suggestions_visible(!suggestions.is_empty());
        self.suggestions = suggestions;
    }

    /// The last synthesized image.
    pub fn output(&self) -> Option<&GeneratedImage> {
        self.output.as_ref()
    }

    pub(crate) fn set_output(&mut self, image: GeneratedImage) {
        self.output = Some(image);
    }

    /// The view state.
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Mutable access to the view state.
    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    /// Captures what a front-end should render right now.
    pub fn snapshot(&self) -> StudioView {
        StudioView {
            state: self.view.state(),
            status: self.view.status().cloned(),
            generate_enabled: self.view.generate_enabled(),
            refine_enabled: self.view.refine_enabled(),
            spinner_visible: self.view.spinner_visible(),
            output_visible: self.view.output_visible(),
            placeholder_visible: self.view.placeholder_visible(),
            optimizing: self.view.optimizing(),
            suggestions_visible: self.view.suggestions_visible(),
            suggestions: self.suggestions.clone(),
            prompt: self.prompt.clone(),
            preview: self.image.as_ref().map(ImagePayload::to_data_url),
            output: self.output.as_ref().map(GeneratedImage::to_data_url),
        }
    }
}

/// A rendered snapshot of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudioView {
    /// Synthesis state.
    pub state: UiState,
    /// Status line.
    pub status: Option<StatusMessage>,
    /// Generate trigger enabled.
    pub generate_enabled: bool,
    /// Refine trigger enabled.
    pub refine_enabled: bool,
    /// Spinner shown.
    pub spinner_visible: bool,
    /// Output image shown.
    pub output_visible: bool,
    /// Placeholder shown.
    pub placeholder_visible: bool,
    /// Prompt field carries the optimizing marker.
    pub optimizing: bool,
    /// Suggestion panel shown.
    pub suggestions_visible: bool,
    /// Suggestion chips.
    pub suggestions: Vec<Suggestion>,
    /// Prompt field contents.
    pub prompt: String,
    /// Preview of the uploaded image as a data URL.
    pub preview: Option<String>,
    /// Synthesized image as a data URL.
    pub output: Option<String>,
}
