//! Reference image intake and image types.

mod intake;
mod types;

pub use intake::{intake, parse_data_url, FileUpload, IntakeOutcome};
pub use types::{GeneratedImage, GenerationMetadata, ImageFormat, ImagePayload};
