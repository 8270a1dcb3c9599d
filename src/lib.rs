#![warn(missing_docs)]
//! Reimagine - reference-image transformation studio.
//!
//! Upload a character image, get transformation ideas, refine a casual
//! prompt into a detailed one, and synthesize the edited image with a hosted
//! Gemini model.
//!
//! # Quick Start
//!
//! ```no_run
//! use reimagine::{FileUpload, GeminiProvider, Studio, SynthesisOutcome};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> reimagine::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let studio = Studio::builder(Arc::new(provider)).build();
//!
//!     studio.upload(FileUpload::from_path("character.png")?).await;
//!     studio.set_prompt("make her wink").await;
//!     studio.refine_prompt().await;
//!
//!     if let SynthesisOutcome::Completed(image) = studio.synthesize().await {
//!         image.save("winking.png")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini`: Gemini provider (default)
//! - `cli`: Command-line interface (default)

pub mod banner;
pub mod credentials;
mod error;
pub mod image;
pub mod provider;
pub mod providers;
pub mod refine;
pub mod session;
pub mod studio;
pub mod suggest;
pub mod synthesize;
pub mod view;

// Re-export error types at crate root
pub use error::{ReimagineError, Result, INVALID_ENTITY_MARKER};

pub use banner::{Banner, BannerFrame, BannerHandle};
pub use credentials::{ApiKey, Credentials, KeySelector};
pub use image::{FileUpload, GeneratedImage, ImageFormat, ImagePayload, IntakeOutcome};
pub use provider::{ContentRequest, StudioProvider, StudioProviderExt};
pub use session::{SessionState, StudioView};
pub use studio::{RefineOutcome, Studio, StudioBuilder, SynthesisOutcome};
pub use suggest::Suggestion;
pub use view::{StatusKind, StatusMessage, UiState, ViewState};

#[cfg(feature = "gemini")]
pub use providers::{GeminiProvider, GeminiProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ReimagineError, Result};
    pub use crate::image::{FileUpload, GeneratedImage, ImagePayload};
    pub use crate::provider::{StudioProvider, StudioProviderExt};
    pub use crate::studio::{RefineOutcome, Studio, SynthesisOutcome};

    #[cfg(feature = "gemini")]
    pub use crate::providers::GeminiProvider;
}
