//! File intake: turns a dropped or picked file into an [`ImagePayload`].

use crate::error::Result;
use crate::image::types::{ImageFormat, ImagePayload};
use base64::Engine;
use std::path::Path;

/// Content type declared for files we cannot identify.
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// A file handed to the studio, with the content type its source declared.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// File name, for display and logging.
    pub name: String,
    /// Declared MIME type (e.g. `image/jpeg`).
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl FileUpload {
    /// Creates an upload with an explicit content type.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, declaring its type from the extension and
    /// falling back to the leading bytes.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .or_else(|| ImageFormat::from_magic_bytes(&bytes))
            .map(|f| f.mime_type())
            .unwrap_or(UNKNOWN_CONTENT_TYPE);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(name, content_type, bytes))
    }

    /// Returns true if the declared type is an image type.
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Encodes the file as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Result of handing a file to intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// The file was decoded into a payload.
    Accepted(ImagePayload),
    /// The declared type is not an image.
    Rejected,
    /// The data URL did not match the expected shape.
    Malformed,
}

/// Validates and decodes an upload.
pub fn intake(file: &FileUpload) -> IntakeOutcome {
    if !file.is_image() {
        return IntakeOutcome::Rejected;
    }
    match parse_data_url(&file.to_data_url()) {
        Some(payload) => IntakeOutcome::Accepted(payload),
        None => IntakeOutcome::Malformed,
    }
}

/// Splits `data:<mime>;base64,<payload>` into its parts.
///
/// Both parts must be non-empty and single-line. The last `;base64,` marker
/// wins, so mime parameters containing `;` stay attached to the mime type.
pub fn parse_data_url(url: &str) -> Option<ImagePayload> {
    let rest = url.strip_prefix("data:")?;
    let marker = rest.rfind(";base64,")?;
    let mime_type = &rest[..marker];
    let data = &rest[marker + ";base64,".len()..];

    if mime_type.is_empty() || data.is_empty() {
        return None;
    }
    if mime_type.contains('\n') || data.contains('\n') {
        return None;
    }

    Some(ImagePayload::new(data, mime_type))
}
