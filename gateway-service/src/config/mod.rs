use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

/// Default cap on a single uploaded file (20 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Default upper bound on one provider call, in seconds.
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model used for every generation call (e.g. gemini-2.0-flash).
    pub text_model: String,
    /// Timeout applied to each provider call, in seconds.
    pub provider_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory holding transient uploads.
    pub dir: String,
    /// Per-file size cap in bytes.
    pub max_bytes: usize,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(GatewayConfig {
            common,
            google: GoogleConfig {
                api_key: get_env("GOOGLE_API_KEY", None, is_prod)?,
            },
            models: ModelConfig {
                text_model: get_env("GATEWAY_TEXT_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                provider_timeout_secs: get_env(
                    "GATEWAY_PROVIDER_TIMEOUT_SECS",
                    Some(&DEFAULT_PROVIDER_TIMEOUT_SECS.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            },
            uploads: UploadConfig {
                dir: get_env("GATEWAY_UPLOAD_DIR", Some("uploads"), is_prod)?,
                max_bytes: get_env(
                    "GATEWAY_MAX_UPLOAD_BYTES",
                    Some(&DEFAULT_MAX_UPLOAD_BYTES.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            },
        })
    }

    /// Timeout applied to each provider call.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.models.provider_timeout_secs)
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
