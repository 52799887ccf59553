use serde::{Deserialize, Serialize};
use validator::Validate;

/// Media categories accepted by the upload endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Document,
    Audio,
}

impl MediaKind {
    /// Multipart field name carrying the upload for this kind.
    pub fn field_name(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Document => "documents",
            MediaKind::Audio => "audio",
        }
    }

    /// Instruction sent to the provider when the caller supplies no prompt.
    pub fn default_instruction(self) -> &'static str {
        match self {
            MediaKind::Image => "Describe the image",
            MediaKind::Document => "Analyze these documents",
            MediaKind::Audio => "Transcribe or analyze the following audio",
        }
    }
}

/// A file the upload layer has written to transient storage.
///
/// Owned by exactly one request: the pipeline reads it once and deletes it
/// before the response is produced.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub key: String,
    pub original_name: String,
    pub declared_media_type: Option<String>,
}

/// Inbound generation request, one variant per endpoint.
#[derive(Debug)]
pub enum GenerationRequest {
    Text {
        prompt: String,
    },
    Image {
        prompt: Option<String>,
        file: UploadedFile,
    },
    Document {
        prompt: Option<String>,
        file: UploadedFile,
    },
    Audio {
        prompt: Option<String>,
        file: UploadedFile,
    },
}

/// Body of `POST /generate-text`.
#[derive(Debug, Deserialize, Validate)]
pub struct TextGenerateRequest {
    #[validate(length(min = 1, message = "Prompt cannot be empty"))]
    pub prompt: String,
}

/// Body returned by every generation endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub output: String,
}
