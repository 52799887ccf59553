use gateway_service::config::GatewayConfig;
use gateway_service::services::providers::mock::MockProvider;
use gateway_service::services::providers::GenerationProvider;
use gateway_service::services::temp_store::{MemoryTempStore, TempStore};
use gateway_service::startup::Application;
use std::sync::Arc;
use std::time::Duration;

pub struct TestApp {
    pub address: String,
    pub provider: MockProvider,
    pub store: Arc<MemoryTempStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockProvider::new("mock output")).await
    }

    pub async fn spawn_with(provider: MockProvider) -> Self {
        std::env::set_var("APP__PORT", "0");
        std::env::set_var("GOOGLE_API_KEY", "test-api-key");

        let config = GatewayConfig::load().expect("Failed to load configuration");
        let store = Arc::new(MemoryTempStore::new());

        let app = Application::with_components(
            config,
            Arc::new(provider.clone()) as Arc<dyn GenerationProvider>,
            Arc::clone(&store) as Arc<dyn TempStore>,
        )
        .await
        .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept requests.
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            provider,
            store,
        }
    }
}

/// Build a multipart file part with the given filename and media type.
pub fn file_part(bytes: Vec<u8>, filename: &str, media_type: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(media_type)
        .expect("Invalid media type in test")
}
