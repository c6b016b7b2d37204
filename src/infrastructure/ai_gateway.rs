use super::blob_store::{BlobStore, BlobStoreError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AiGatewayError {
    #[error("AI request failed: {0}")]
    RequestFailed(String),
    #[error("AI provider returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("AI provider error: {0}")]
    Provider(String),
    #[error("Storage error: {0}")]
    Storage(#[from] BlobStoreError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Logical model names accepted from callers and the provider model each runs on.
pub const TEXT_MODELS: &[(&str, &str)] = &[
    ("mistral-7b", "@cf/mistralai/mistral-7b-instruct-v0.1"),
    ("llama2-7b", "@cf/meta/llama-2-7b-chat-fp16"),
];

/// Unknown logical names run on this model instead of being rejected.
pub const DEFAULT_TEXT_MODEL: &str = "llama2-7b";

pub const IMAGE_MODEL: &str = "flux-1-schnell";
const IMAGE_PROVIDER_MODEL: &str = "@cf/black-forest-labs/flux-1-schnell";

const SYSTEM_PERSONA: &str = "You are a marketing and sales professional who is looking to \
increase your sales and the best in the industry for growing local brands.";

const IMAGE_PROMPT_PREFIX: &str = "You are a senior in digital marketing and your task is to \
Generate a professional digital illustration of the following prompt: ";

/// Provider model id for a logical model name, falling back to [`DEFAULT_TEXT_MODEL`].
pub fn resolve_text_model(model: &str) -> &'static str {
    let lookup = |name: &str| {
        TEXT_MODELS
            .iter()
            .find(|(logical, _)| *logical == name)
            .map(|(_, provider)| *provider)
    };

    lookup(model)
        .or_else(|| lookup(DEFAULT_TEXT_MODEL))
        .unwrap_or(TEXT_MODELS[0].1)
}

pub fn is_known_text_model(model: &str) -> bool {
    TEXT_MODELS.iter().any(|(logical, _)| *logical == model)
}

#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, AiGatewayError>;
    /// Generates an image, stores it under `key` and returns its public URL.
    async fn generate_image(&self, key: &str, prompt: &str) -> Result<String, AiGatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ProviderEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ProviderMessage>,
}

#[derive(Debug, Deserialize)]
struct ProviderMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TextResult {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    image: String,
}

impl<T> ProviderEnvelope<T> {
    fn into_result(self) -> Result<T, AiGatewayError> {
        if !self.success {
            let message = self
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AiGatewayError::Provider(if message.is_empty() {
                "request was not successful".to_string()
            } else {
                message
            }));
        }

        self.result
            .ok_or_else(|| AiGatewayError::InvalidResponse("Missing result field".to_string()))
    }
}

/// Cloudflare Workers AI client. One attempt per call, no retries.
pub struct CloudflareAiClient {
    client: Client,
    base_url: String,
    account_id: String,
    blob_store: Arc<dyn BlobStore>,
}

impl CloudflareAiClient {
    pub fn new(
        base_url: String,
        account_id: String,
        api_token: String,
        timeout: Duration,
        blob_store: Arc<dyn BlobStore>,
    ) -> Result<Self, AiGatewayError> {
        let mut headers = header::HeaderMap::new();
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_token))
            .map_err(|e| {
                AiGatewayError::InvalidConfig(format!("Invalid API token format: {}", e))
            })?;
        headers.insert(header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AiGatewayError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id,
            blob_store,
        })
    }

    fn run_url(&self, provider_model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url, self.account_id, provider_model
        )
    }

    async fn run<B, T>(&self, provider_model: &str, body: &B) -> Result<T, AiGatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let resp = self
            .client
            .post(self.run_url(provider_model))
            .json(body)
            .send()
            .await
            .map_err(|e| AiGatewayError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AiGatewayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ProviderEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| AiGatewayError::InvalidResponse(e.to_string()))?;

        envelope.into_result()
    }
}

#[async_trait]
impl AiGateway for CloudflareAiClient {
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, AiGatewayError> {
        let provider_model = resolve_text_model(model);
        if !is_known_text_model(model) {
            warn!(model, fallback = DEFAULT_TEXT_MODEL, "Unknown model, using default");
        }

        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PERSONA,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
        };

        let result: TextResult = self.run(provider_model, &body).await?;
        info!(model = provider_model, chars = result.response.len(), "Text generated");
        Ok(result.response)
    }

    async fn generate_image(&self, key: &str, prompt: &str) -> Result<String, AiGatewayError> {
        let body = ImageRequest {
            prompt: format!("{}{}", IMAGE_PROMPT_PREFIX, prompt),
        };

        let result: ImageResult = self.run(IMAGE_PROVIDER_MODEL, &body).await?;
        let bytes = BASE64
            .decode(result.image.trim())
            .map_err(|e| AiGatewayError::InvalidResponse(format!("Image is not base64: {}", e)))?;

        self.blob_store.upload(bytes, key).await?;

        let url = self.blob_store.public_url(key);
        info!(key, %url, "Image generated");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct MemoryBlobStore {
        uploads: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn upload(&self, bytes: Vec<u8>, key: &str) -> Result<(), BlobStoreError> {
            if self.fail {
                return Err(BlobStoreError::UploadFailed {
                    key: key.to_string(),
                    reason: "access denied".to_string(),
                });
            }
            self.uploads.lock().unwrap().push((key.to_string(), bytes));
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://blobs.test/{}", key)
        }
    }

    fn client_for(server: &MockServer, store: Arc<MemoryBlobStore>) -> CloudflareAiClient {
        CloudflareAiClient::new(
            server.uri(),
            "acct".to_string(),
            "cf-token".to_string(),
            Duration::from_secs(5),
            store,
        )
        .unwrap()
    }

    #[test]
    fn known_models_map_to_provider_ids() {
        assert_eq!(
            resolve_text_model("mistral-7b"),
            "@cf/mistralai/mistral-7b-instruct-v0.1"
        );
        assert_eq!(resolve_text_model("llama2-7b"), "@cf/meta/llama-2-7b-chat-fp16");
    }

    #[test]
    fn unknown_models_fall_back_to_default() {
        assert!(!is_known_text_model("gpt-17"));
        assert_eq!(
            resolve_text_model("gpt-17"),
            resolve_text_model(DEFAULT_TEXT_MODEL)
        );
        assert_eq!(resolve_text_model(""), "@cf/meta/llama-2-7b-chat-fp16");
    }

    #[tokio::test]
    async fn generate_text_sends_persona_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acct/ai/run/@cf/mistralai/mistral-7b-instruct-v0.1"))
            .and(header_eq("authorization", "Bearer cf-token"))
            .and(body_partial_json(serde_json::json!({
                "stream": false,
                "messages": [
                    {"role": "system", "content": SYSTEM_PERSONA},
                    {"role": "user", "content": "write a tagline"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"response": "Shine Bright"},
                "success": true,
                "errors": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryBlobStore::default()));
        let output = client
            .generate_text("mistral-7b", "write a tagline")
            .await
            .unwrap();
        assert_eq!(output, "Shine Bright");
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryBlobStore::default()));
        let err = client.generate_text("llama2-7b", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            AiGatewayError::UpstreamStatus { status: 503, ref body } if body == "overloaded"
        ));
    }

    #[tokio::test]
    async fn provider_reported_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": null,
                "success": false,
                "errors": [{"message": "model overloaded"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryBlobStore::default()));
        let err = client.generate_text("llama2-7b", "hi").await.unwrap_err();
        assert!(matches!(err, AiGatewayError::Provider(ref m) if m == "model overloaded"));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryBlobStore::default()));
        let err = client.generate_text("llama2-7b", "hi").await.unwrap_err();
        assert!(matches!(err, AiGatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_is_request_failure() {
        let client = CloudflareAiClient::new(
            "http://127.0.0.1:1".to_string(),
            "acct".to_string(),
            "cf-token".to_string(),
            Duration::from_secs(2),
            Arc::new(MemoryBlobStore::default()),
        )
        .unwrap();
        let err = client.generate_text("llama2-7b", "hi").await.unwrap_err();
        assert!(matches!(err, AiGatewayError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn generate_image_uploads_decoded_bytes_under_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/acct/ai/run/@cf/black-forest-labs/flux-1-schnell"))
            .and(body_partial_json(serde_json::json!({
                "prompt": format!("{}a red bicycle", IMAGE_PROMPT_PREFIX)
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"image": BASE64.encode(b"jpeg-bytes")},
                "success": true,
                "errors": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryBlobStore::default());
        let client = client_for(&server, store.clone());
        let url = client.generate_image("req-1", "a red bicycle").await.unwrap();

        assert_eq!(url, "https://blobs.test/req-1");
        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "req-1");
        assert_eq!(uploads[0].1, b"jpeg-bytes".to_vec());
    }

    #[tokio::test]
    async fn failed_upload_fails_the_image_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"image": BASE64.encode(b"jpeg-bytes")},
                "success": true,
                "errors": []
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryBlobStore {
            fail: true,
            ..Default::default()
        });
        let client = client_for(&server, store);
        let err = client.generate_image("req-1", "a red bicycle").await.unwrap_err();
        assert!(matches!(err, AiGatewayError::Storage(_)));
    }
}
