//! Generative provider implementations.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{
    GeminiProvider, GeminiProviderBuilder, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL,
    DEFAULT_TEXT_MODEL,
};
