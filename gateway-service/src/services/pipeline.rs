//! The ingest-dispatch pipeline.
//!
//! Every endpoint funnels into [`Pipeline::handle`]: resolve the ordered
//! parts list, encode any upload as an inline content part, invoke the
//! provider, and delete the temporary file no matter how the request ended.

use crate::models::{
    ContentPart, GenerationRequest, GenerationResult, MediaKind, Part, UploadedFile,
};
use crate::services::providers::{GenerationProvider, ProviderError};
use crate::services::temp_store::{StorageError, TempStore};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use service_core::error::AppError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fallback media type when the upload layer reports none.
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported image type: {0}")]
    UnsupportedMediaType(String),

    #[error("Missing file field '{0}'")]
    UploadMissing(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Generation call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::UnsupportedMediaType(_) | PipelineError::UploadMissing(_) => {
                AppError::BadRequest(anyhow::anyhow!(err))
            }
            PipelineError::Provider(_) | PipelineError::Timeout(_) => {
                AppError::BadGateway(err.to_string())
            }
            PipelineError::Storage(_) => AppError::InternalError(anyhow::anyhow!(err)),
        }
    }
}

/// Uniform handling for all four entry modes: text prompts go straight to
/// the provider; uploads are read, base64-encoded, tagged with a media type,
/// and appended after the instruction text.
#[derive(Clone)]
pub struct Pipeline {
    provider: Arc<dyn GenerationProvider>,
    store: Arc<dyn TempStore>,
    call_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        store: Arc<dyn TempStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            call_timeout,
        }
    }

    /// Handle one generation request to completion. No retries; the first
    /// failure is the request's outcome.
    pub async fn handle(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, PipelineError> {
        match request {
            GenerationRequest::Text { prompt } => self.dispatch(vec![Part::Text(prompt)]).await,
            GenerationRequest::Image { prompt, file } => {
                self.handle_media(MediaKind::Image, prompt, file).await
            }
            GenerationRequest::Document { prompt, file } => {
                self.handle_media(MediaKind::Document, prompt, file).await
            }
            GenerationRequest::Audio { prompt, file } => {
                self.handle_media(MediaKind::Audio, prompt, file).await
            }
        }
    }

    /// Media path. The upload is deleted on every exit, exactly once; a
    /// delete failure is logged and never overrides the outcome.
    async fn handle_media(
        &self,
        kind: MediaKind,
        prompt: Option<String>,
        file: UploadedFile,
    ) -> Result<GenerationResult, PipelineError> {
        let outcome = self.encode_and_dispatch(kind, prompt, &file).await;

        if let Err(e) = self.store.delete(&file.key).await {
            tracing::warn!(key = %file.key, error = %e, "Failed to delete temporary upload");
        }

        outcome
    }

    async fn encode_and_dispatch(
        &self,
        kind: MediaKind,
        prompt: Option<String>,
        file: &UploadedFile,
    ) -> Result<GenerationResult, PipelineError> {
        let media_type = resolve_media_type(kind, file)?;
        let bytes = self.store.read(&file.key).await?;

        let instruction = prompt.unwrap_or_else(|| kind.default_instruction().to_string());
        let parts = vec![
            Part::Text(instruction),
            Part::Content(ContentPart {
                data: BASE64.encode(bytes),
                media_type,
            }),
        ];

        self.dispatch(parts).await
    }

    async fn dispatch(&self, parts: Vec<Part>) -> Result<GenerationResult, PipelineError> {
        let text = tokio::time::timeout(self.call_timeout, self.provider.generate(&parts))
            .await
            .map_err(|_| PipelineError::Timeout(self.call_timeout))??;

        Ok(GenerationResult { text })
    }
}

/// Media type for an upload: images by extension, everything else by the
/// type the upload layer declared.
fn resolve_media_type(kind: MediaKind, file: &UploadedFile) -> Result<String, PipelineError> {
    match kind {
        MediaKind::Image => image_media_type(&file.original_name).map(str::to_string),
        MediaKind::Document | MediaKind::Audio => Ok(file
            .declared_media_type
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| OCTET_STREAM.to_string())),
    }
}

/// Fixed extension table for image uploads; anything else is rejected
/// before the provider is called.
fn image_media_type(filename: &str) -> Result<&'static str, PipelineError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        Some("gif") => Ok("image/gif"),
        Some("webp") => Ok("image/webp"),
        _ => Err(PipelineError::UnsupportedMediaType(
            ext.map(|e| format!(".{}", e)).unwrap_or_default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockProvider;
    use crate::services::temp_store::MemoryTempStore;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn pipeline(provider: &MockProvider, store: &Arc<MemoryTempStore>) -> Pipeline {
        Pipeline::new(
            Arc::new(provider.clone()),
            Arc::clone(store) as Arc<dyn TempStore>,
            TIMEOUT,
        )
    }

    async fn stored_file(
        store: &Arc<MemoryTempStore>,
        data: &[u8],
        name: &str,
        media_type: Option<&str>,
    ) -> UploadedFile {
        let key = store.write(data.to_vec()).await.unwrap();
        UploadedFile {
            key,
            original_name: name.to_string(),
            declared_media_type: media_type.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn text_request_passes_prompt_through() {
        let provider = MockProvider::new("the answer");
        let store = Arc::new(MemoryTempStore::new());

        let result = pipeline(&provider, &store)
            .handle(GenerationRequest::Text {
                prompt: "What is Rust?".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.text, "the answer");
        assert_eq!(
            provider.calls(),
            vec![vec![Part::Text("What is Rust?".to_string())]]
        );
    }

    #[tokio::test]
    async fn image_upload_is_encoded_and_deleted() {
        let provider = MockProvider::new("a sunset");
        let store = Arc::new(MemoryTempStore::new());
        let file = stored_file(&store, &[7u8; 10], "photo.png", None).await;

        let result = pipeline(&provider, &store)
            .handle(GenerationRequest::Image { prompt: None, file })
            .await
            .unwrap();

        assert_eq!(result.text, "a sunset");
        assert_eq!(
            provider.calls(),
            vec![vec![
                Part::Text("Describe the image".to_string()),
                Part::Content(ContentPart {
                    data: BASE64.encode([7u8; 10]),
                    media_type: "image/png".to_string(),
                }),
            ]]
        );
        assert_eq!(store.delete_count(), 1);
        assert_eq!(store.stored_count(), 0);
    }

    #[tokio::test]
    async fn caller_prompt_replaces_default_instruction() {
        let provider = MockProvider::new("ok");
        let store = Arc::new(MemoryTempStore::new());
        let file = stored_file(&store, b"img", "photo.jpg", None).await;

        pipeline(&provider, &store)
            .handle(GenerationRequest::Image {
                prompt: Some("What breed is this dog?".to_string()),
                file,
            })
            .await
            .unwrap();

        assert_eq!(
            provider.calls()[0][0],
            Part::Text("What breed is this dog?".to_string())
        );
    }

    #[tokio::test]
    async fn unsupported_extension_skips_provider_and_still_deletes() {
        let provider = MockProvider::new("never");
        let store = Arc::new(MemoryTempStore::new());
        let file = stored_file(&store, b"bitmap", "photo.bmp", None).await;

        let err = pipeline(&provider, &store)
            .handle(GenerationRequest::Image { prompt: None, file })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unsupported image type: .bmp");
        assert_eq!(provider.call_count(), 0);
        assert_eq!(store.read_count(), 0);
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn provider_failure_still_deletes_upload() {
        let provider = MockProvider::failing("quota exhausted");
        let store = Arc::new(MemoryTempStore::new());
        let file = stored_file(&store, b"doc", "notes.pdf", Some("application/pdf")).await;

        let err = pipeline(&provider, &store)
            .handle(GenerationRequest::Document { prompt: None, file })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Provider(_)));
        assert_eq!(store.delete_count(), 1);
        assert_eq!(store.stored_count(), 0);
    }

    #[tokio::test]
    async fn read_failure_still_deletes_upload() {
        let provider = MockProvider::new("never");
        let store = Arc::new(MemoryTempStore::new());
        let file = stored_file(&store, b"clip", "clip.mp3", Some("audio/mpeg")).await;
        store.fail_reads();

        let err = pipeline(&provider, &store)
            .handle(GenerationRequest::Audio { prompt: None, file })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Storage(_)));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn delete_failure_does_not_mask_success() {
        let provider = MockProvider::new("transcript");
        let store = Arc::new(MemoryTempStore::new());
        let file = stored_file(&store, b"clip", "clip.wav", Some("audio/wav")).await;
        store.fail_deletes();

        let result = pipeline(&provider, &store)
            .handle(GenerationRequest::Audio { prompt: None, file })
            .await
            .unwrap();

        assert_eq!(result.text, "transcript");
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn document_and_audio_use_declared_media_type() {
        let provider = MockProvider::new("summary");
        let store = Arc::new(MemoryTempStore::new());
        let file = stored_file(&store, b"pdf", "report.pdf", Some("application/pdf")).await;

        pipeline(&provider, &store)
            .handle(GenerationRequest::Document { prompt: None, file })
            .await
            .unwrap();

        let no_type = stored_file(&store, b"mp3", "clip.mp3", None).await;
        pipeline(&provider, &store)
            .handle(GenerationRequest::Audio {
                prompt: None,
                file: no_type,
            })
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(
            calls[0][0],
            Part::Text("Analyze these documents".to_string())
        );
        match &calls[0][1] {
            Part::Content(part) => assert_eq!(part.media_type, "application/pdf"),
            other => panic!("expected content part, got {:?}", other),
        }
        assert_eq!(
            calls[1][0],
            Part::Text("Transcribe or analyze the following audio".to_string())
        );
        match &calls[1][1] {
            Part::Content(part) => assert_eq!(part.media_type, OCTET_STREAM),
            other => panic!("expected content part, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = MockProvider::with_delay("late", Duration::from_millis(200));
        let store = Arc::new(MemoryTempStore::new());

        let slow = Pipeline::new(
            Arc::new(provider),
            Arc::clone(&store) as Arc<dyn TempStore>,
            Duration::from_millis(20),
        );

        let err = slow
            .handle(GenerationRequest::Text {
                prompt: "hello".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Timeout(_)));
    }

    #[test]
    fn image_extension_table_is_exact() {
        assert_eq!(image_media_type("a.jpg").unwrap(), "image/jpeg");
        assert_eq!(image_media_type("a.jpeg").unwrap(), "image/jpeg");
        assert_eq!(image_media_type("a.png").unwrap(), "image/png");
        assert_eq!(image_media_type("a.gif").unwrap(), "image/gif");
        assert_eq!(image_media_type("a.webp").unwrap(), "image/webp");
        assert_eq!(image_media_type("PHOTO.PNG").unwrap(), "image/png");

        let err = image_media_type("scan.tiff").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported image type: .tiff");
        assert!(image_media_type("noextension").is_err());
    }
}
