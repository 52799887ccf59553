//! Gemini provider implementation.
//!
//! Sends content through Google's generateContent endpoint. Binary parts
//! travel as inline base64 data tagged with their media type.

use super::{GenerationProvider, ProviderError};
use crate::models::Part;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Build the API URL for the given method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            GEMINI_API_BASE, self.config.model, method, self.config.api_key
        )
    }

    /// Convert domain parts to Gemini wire parts, preserving order.
    fn to_wire_parts(parts: &[Part]) -> Vec<WirePart> {
        parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart::Text { text: text.clone() },
                Part::Content(content) => WirePart::InlineData {
                    inline_data: InlineData {
                        mime_type: content.media_type.clone(),
                        data: content.data.clone(),
                    },
                },
            })
            .collect()
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate(&self, parts: &[Part]) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: Self::to_wire_parts(parts),
            }],
        };

        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            part_count = parts.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let candidate = api_response.candidates.first();

        if let Some(c) = candidate {
            if c.finish_reason.as_deref() == Some("SAFETY") {
                return Err(ProviderError::ContentFiltered);
            }
        }

        candidate
            .and_then(|c| {
                c.content.parts.iter().find_map(|p| match p {
                    WirePart::Text { text } => Some(text.clone()),
                    _ => None,
                })
            })
            .ok_or_else(|| ProviderError::ApiError("Gemini returned no text content".to_string()))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        // Listing models verifies both connectivity and the API key.
        let url = format!("{}/models?key={}", GEMINI_API_BASE, self.config.api_key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WirePart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}
