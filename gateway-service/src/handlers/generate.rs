use crate::models::{
    GenerateResponse, GenerationRequest, MediaKind, TextGenerateRequest, UploadedFile,
};
use crate::services::pipeline::PipelineError;
use crate::startup::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use service_core::error::AppError;
use validator::Validate;

pub async fn generate_text(
    State(state): State<AppState>,
    Json(payload): Json<TextGenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    payload.validate()?;
    if payload.prompt.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Prompt cannot be empty"
        )));
    }

    let result = state
        .pipeline
        .handle(GenerationRequest::Text {
            prompt: payload.prompt,
        })
        .await?;

    Ok(Json(GenerateResponse {
        output: result.text,
    }))
}

pub async fn generate_from_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, AppError> {
    let (file, prompt) = receive_upload(&state, multipart, MediaKind::Image).await?;

    let result = state
        .pipeline
        .handle(GenerationRequest::Image { prompt, file })
        .await?;

    Ok(Json(GenerateResponse {
        output: result.text,
    }))
}

pub async fn generate_from_documents(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, AppError> {
    let (file, prompt) = receive_upload(&state, multipart, MediaKind::Document).await?;

    let result = state
        .pipeline
        .handle(GenerationRequest::Document { prompt, file })
        .await?;

    Ok(Json(GenerateResponse {
        output: result.text,
    }))
}

pub async fn generate_from_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, AppError> {
    let (file, prompt) = receive_upload(&state, multipart, MediaKind::Audio).await?;

    let result = state
        .pipeline
        .handle(GenerationRequest::Audio { prompt, file })
        .await?;

    Ok(Json(GenerateResponse {
        output: result.text,
    }))
}

/// Collect the expected file field and optional prompt from a multipart
/// form, then persist the upload to transient storage. Nothing is written
/// until the whole form has been read.
async fn receive_upload(
    state: &AppState,
    mut multipart: Multipart,
    kind: MediaKind,
) -> Result<(UploadedFile, Option<String>), AppError> {
    let mut prompt = None;
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        match field.name() {
            Some(name) if name == kind.field_name() => {
                let original_name = field.file_name().unwrap_or("unnamed").to_string();
                let declared_media_type = field.content_type().map(str::to_string);

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                    })?
                    .to_vec();

                if data.len() > state.config.uploads.max_bytes {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "File too large (max {} bytes)",
                        state.config.uploads.max_bytes
                    )));
                }

                upload = Some((original_name, declared_media_type, data));
            }
            Some("prompt") => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read prompt field: {}", e))
                })?;
                // A blank prompt counts as absent; the kind's default
                // instruction applies.
                if !text.trim().is_empty() {
                    prompt = Some(text);
                }
            }
            _ => {}
        }
    }

    let (original_name, declared_media_type, data) =
        upload.ok_or(PipelineError::UploadMissing(kind.field_name()))?;

    let key = state.store.write(data).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to persist upload");
        PipelineError::Storage(e)
    })?;

    tracing::debug!(
        key = %key,
        filename = %original_name,
        "Upload persisted to transient storage"
    );

    Ok((
        UploadedFile {
            key,
            original_name,
            declared_media_type,
        },
        prompt,
    ))
}
