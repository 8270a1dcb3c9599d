//! UI state controller.
//!
//! Holds the synthesis state machine and everything derived from it:
//! control enablement, spinner/output/placeholder visibility and the status
//! line. Front-ends render a [`ViewState`]; they never toggle flags directly.

use serde::{Deserialize, Serialize};

/// Status texts shown to the user.
pub mod messages {
    /// Upload with a non-image content type.
    pub const INVALID_FILE_TYPE: &str = "Invalid file type. Please upload an image.";
    /// Refinement requested with a blank prompt.
    pub const DESCRIBE_VISION: &str = "Describe your vision first.";
    /// Refinement finished.
    pub const PROMPT_OPTIMIZED: &str = "Prompt optimized.";
    /// Refinement call failed.
    pub const REFINEMENT_FAILED: &str = "Refinement failed.";
    /// Synthesis requested without an image.
    pub const UPLOAD_FIRST: &str = "Upload an image first.";
    /// Synthesis requested with a blank prompt.
    pub const PROMPT_FIRST: &str = "Enter a transformation prompt first.";
    /// Shown while loading.
    pub const SYNTHESIZING: &str = "Synthesizing transformation...";
    /// Shown on success.
    pub const SYNTHESIS_COMPLETE: &str = "Transformation complete.";
    /// Fallback when a failure has no message.
    pub const SYNTHESIS_FAILED: &str = "Synthesis failed";
}

/// Synthesis lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiState {
    /// Nothing synthesized yet.
    #[default]
    Idle,
    /// A synthesis request is in flight.
    Loading,
    /// The last synthesis produced an image.
    Success,
    /// The last synthesis failed.
    Error,
}

/// Tone of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Neutral progress information.
    Info,
    /// Completed action.
    Success,
    /// Failure or rejected input.
    Error,
}

/// The status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Tone.
    pub kind: StatusKind,
    /// Text shown to the user.
    pub text: String,
}

impl StatusMessage {
    /// Creates a status message.
    pub fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Visual state of the studio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    state: UiState,
    status: Option<StatusMessage>,
    output_visible: bool,
    placeholder_visible: bool,
    optimizing: bool,
    suggestions_visible: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            state: UiState::Idle,
            status: None,
            output_visible: false,
            placeholder_visible: true,
            optimizing: false,
            suggestions_visible: false,
        }
    }
}

impl ViewState {
    /// Creates the idle view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current synthesis state.
    pub fn state(&self) -> UiState {
        self.state
    }

    /// Current status line, if any.
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// Both triggers are disabled while synthesizing.
    pub fn generate_enabled(&self) -> bool {
        self.state != UiState::Loading
    }

    /// The refine trigger is also disabled while a refinement runs.
    pub fn refine_enabled(&self) -> bool {
        self.state != UiState::Loading && !self.optimizing
    }

    /// The spinner shows only while loading.
    pub fn spinner_visible(&self) -> bool {
        self.state == UiState::Loading
    }

    /// Whether the synthesized image is shown.
    pub fn output_visible(&self) -> bool {
        self.output_visible
    }

    /// Whether the empty-output placeholder is shown.
    pub fn placeholder_visible(&self) -> bool {
        self.placeholder_visible
    }

    /// Whether the prompt field carries the "optimizing" marker.
    pub fn optimizing(&self) -> bool {
        self.optimizing
    }

    /// Whether the suggestion panel is shown.
    pub fn suggestions_visible(&self) -> bool {
        self.suggestions_visible
    }

    /// Replaces the status line.
    pub fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage::new(kind, text));
    }

    /// Sets an error status.
    pub fn error(&mut self, text: impl Into<String>) {
        self.set_status(StatusKind::Error, text);
    }

    /// Shows or hides the suggestion panel.
    pub fn set_suggestions_visible(&mut self, visible: bool) {
        self.suggestions_visible = visible;
    }

    pub(crate) fn begin_refine(&mut self) {
        self.optimizing = true;
    }

    pub(crate) fn end_refine(&mut self) {
        self.optimizing = false;
    }

    /// Any state → Loading.
    pub(crate) fn begin_synthesis(&mut self) {
        self.state = UiState::Loading;
        self.output_visible = false;
        self.placeholder_visible = false;
        self.set_status(StatusKind::Info, messages::SYNTHESIZING);
    }

    /// Loading → Success.
    pub(crate) fn synthesis_succeeded(&mut self) {
        self.state = UiState::Success;
        self.output_visible = true;
        self.set_status(StatusKind::Success, messages::SYNTHESIS_COMPLETE);
    }

    /// Loading → Error. Output and placeholder visibility stay as they were.
    pub(crate) fn synthesis_failed(&mut self, message: &str) {
        self.state = UiState::Error;
        let text = if message.trim().is_empty() {
            messages::SYNTHESIS_FAILED
        } else {
            message
        };
        self.set_status(StatusKind::Error, text);
    }
}
