//! Chat backends and the router that picks between them.
//!
//! Two API shapes are supported: the Ollama `/api/chat` shape for the known
//! local models, and the OpenAI `/v1/chat/completions` shape for everything
//! else. Callers only ever see `Option<String>`; transport and decoding
//! failures are logged and swallowed so a single stage failure never takes the
//! whole session down.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ForgeConfig;

/// Model ids served by the local Ollama backend. Anything else goes to the cloud backend.
pub const LOCAL_MODELS: &[&str] = &[
    "llama3:latest",
    "mistral:latest",
    "phi3:medium",
    "qwen:7b",
    "gemma:7b",
    "zephyr:7b",
];

/// Model ids offered for the OpenAI-compatible backend.
pub const CLOUD_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-4-turbo",
    "gpt-4o",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "claude-3-haiku-20240307",
    "claude-3-sonnet-20240229",
    "claude-3-opus-20240229",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Cloud,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Cloud => write!(f, "cloud"),
        }
    }
}

/// Pure function of the model id: membership in [`LOCAL_MODELS`] means local.
pub fn resolve_backend(model: &str) -> BackendKind {
    if LOCAL_MODELS.contains(&model) {
        BackendKind::Local
    } else {
        BackendKind::Cloud
    }
}

/// One selectable model, as presented to callers (cloud models first).
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub kind: BackendKind,
}

pub fn available_models() -> Vec<ModelEntry> {
    CLOUD_MODELS
        .iter()
        .chain(LOCAL_MODELS.iter())
        .map(|id| ModelEntry {
            id: id.to_string(),
            kind: resolve_backend(id),
        })
        .collect()
}

#[derive(Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub endpoint: String,
    pub credential: Option<String>,
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A chat endpoint with one concrete request/response shape.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn descriptor(&self) -> BackendDescriptor;

    async fn chat(&self, model: &str, messages: &[Message]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    repeat_penalty: f32,
    top_k: u32,
    top_p: f32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Ollama `/api/chat`.
pub struct OllamaBackend {
    api_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(api_url: String, client: reqwest::Client) -> Self {
        Self { api_url, client }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: BackendKind::Local,
            endpoint: self.api_url.clone(),
            credential: None,
        }
    }

    async fn chat(&self, model: &str, messages: &[Message]) -> Result<String> {
        let url = format!("{}/api/chat", self.api_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model,
            messages,
            options: OllamaOptions {
                repeat_penalty: 1.1,
                top_k: 40,
                top_p: 0.95,
                temperature: 0.8,
            },
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send Ollama chat request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("Ollama API returned error {}: {}", status, body);
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama chat response")?;

        Ok(chat.message.content)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    options: CompletionOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct CompletionOptions {
    frequency_penalty: f32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// OpenAI-compatible `/v1/chat/completions` with bearer auth.
pub struct OpenAiBackend {
    api_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(api_url: String, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            api_url,
            api_key,
            client,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: BackendKind::Cloud,
            endpoint: self.api_url.clone(),
            credential: self.api_key.clone(),
        }
    }

    async fn chat(&self, model: &str, messages: &[Message]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.api_url.trim_end_matches('/'));

        let request = CompletionRequest {
            model,
            messages,
            options: CompletionOptions {
                frequency_penalty: 1.1,
                temperature: 0.8,
            },
            stream: false,
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .send()
            .await
            .context("Failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("Chat completion API returned error {}: {}", status, body);
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completion response had no choices"))
    }
}

/// Routes each call to the local or cloud backend based on the model id alone.
#[derive(Clone)]
pub struct BackendRouter {
    local: Arc<dyn ChatBackend>,
    cloud: Arc<dyn ChatBackend>,
}

impl BackendRouter {
    pub fn new(local: Arc<dyn ChatBackend>, cloud: Arc<dyn ChatBackend>) -> Self {
        Self { local, cloud }
    }

    /// Build both backends from config, sharing one HTTP client.
    pub fn from_config(config: &ForgeConfig, client: reqwest::Client) -> Self {
        Self::new(
            Arc::new(OllamaBackend::new(
                config.ollama_api_url.clone(),
                client.clone(),
            )),
            Arc::new(OpenAiBackend::new(
                config.openai_api_url.clone(),
                config.openai_api_key.clone(),
                client,
            )),
        )
    }

    fn backend(&self, kind: BackendKind) -> &Arc<dyn ChatBackend> {
        match kind {
            BackendKind::Local => &self.local,
            BackendKind::Cloud => &self.cloud,
        }
    }

    pub fn describe(&self, model: &str) -> BackendDescriptor {
        self.backend(resolve_backend(model)).descriptor()
    }

    /// Run one chat call. Never fails: any error is logged and reported as `None`.
    pub async fn generate(&self, model: &str, messages: &[Message]) -> Option<String> {
        let kind = resolve_backend(model);
        let backend = self.backend(kind);
        tracing::info!(
            "Requesting {} via {} backend at {} ({} messages)",
            model,
            kind,
            backend.descriptor().endpoint,
            messages.len()
        );

        match backend.chat(model, messages).await {
            Ok(content) => {
                tracing::debug!("{} returned {} chars", model, content.len());
                Some(content)
            }
            Err(e) => {
                tracing::warn!("{} backend call for {} failed: {:#}", kind, model, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::build_http_client_with_timeout;
    use crate::test_support::{spawn_stub, Captured};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{extract::State, Json, Router};
    use serde_json::{json, Value};

    struct FixedBackend {
        kind: BackendKind,
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl ChatBackend for FixedBackend {
        fn descriptor(&self) -> BackendDescriptor {
            BackendDescriptor {
                kind: self.kind,
                endpoint: "stub".to_string(),
                credential: None,
            }
        }

        async fn chat(&self, _model: &str, _messages: &[Message]) -> Result<String> {
            match self.reply {
                Some(reply) => Ok(reply.to_string()),
                None => anyhow::bail!("stub failure"),
            }
        }
    }

    fn stub_router(local: Option<&'static str>, cloud: Option<&'static str>) -> BackendRouter {
        BackendRouter::new(
            Arc::new(FixedBackend {
                kind: BackendKind::Local,
                reply: local,
            }),
            Arc::new(FixedBackend {
                kind: BackendKind::Cloud,
                reply: cloud,
            }),
        )
    }

    fn router_for(local_url: &str, cloud_url: &str) -> BackendRouter {
        let config = ForgeConfig {
            ollama_api_url: local_url.to_string(),
            openai_api_url: cloud_url.to_string(),
            openai_api_key: Some("sk-test".to_string()),
            request_timeout_secs: 5,
            ..ForgeConfig::default()
        };
        let client = build_http_client_with_timeout(config.request_timeout()).unwrap();
        BackendRouter::from_config(&config, client)
    }

    #[test]
    fn every_local_model_resolves_local() {
        for model in LOCAL_MODELS {
            assert_eq!(resolve_backend(model), BackendKind::Local, "{model}");
        }
    }

    #[test]
    fn every_cloud_model_resolves_cloud() {
        for model in CLOUD_MODELS {
            assert_eq!(resolve_backend(model), BackendKind::Cloud, "{model}");
        }
        assert_eq!(resolve_backend("llama3"), BackendKind::Cloud);
        assert_eq!(resolve_backend(""), BackendKind::Cloud);
    }

    #[test]
    fn catalog_lists_cloud_models_first() {
        let models = available_models();
        assert_eq!(models.len(), LOCAL_MODELS.len() + CLOUD_MODELS.len());
        assert_eq!(models[0].id, "gpt-3.5-turbo");
        assert_eq!(models[0].kind, BackendKind::Cloud);
        assert_eq!(models.last().unwrap().id, "zephyr:7b");
        assert_eq!(models.last().unwrap().kind, BackendKind::Local);
    }

    #[test]
    fn descriptor_debug_redacts_credential() {
        let descriptor = BackendDescriptor {
            kind: BackendKind::Cloud,
            endpoint: "https://api.openai.com".to_string(),
            credential: Some("sk-secret".to_string()),
        };
        let rendered = format!("{:?}", descriptor);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn router_dispatches_by_model_id() {
        let router = stub_router(Some("from local"), Some("from cloud"));
        let messages = vec![Message::user("hi")];
        assert_eq!(
            router.generate("llama3:latest", &messages).await.as_deref(),
            Some("from local")
        );
        assert_eq!(
            router.generate("gpt-4o", &messages).await.as_deref(),
            Some("from cloud")
        );
        assert_eq!(router.describe("qwen:7b").kind, BackendKind::Local);
        assert_eq!(router.describe("gpt-4o").kind, BackendKind::Cloud);
    }

    #[tokio::test]
    async fn router_turns_backend_errors_into_none() {
        let router = stub_router(None, None);
        assert!(router
            .generate("mistral:latest", &[Message::user("hi")])
            .await
            .is_none());
        assert!(router.generate("gpt-4o", &[Message::user("hi")]).await.is_none());
    }

    #[tokio::test]
    async fn local_backend_sends_ollama_shape() {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/api/chat",
                post(|State(seen): State<Captured>, Json(body): Json<Value>| async move {
                    seen.store(body);
                    Json(json!({"message": {"role": "assistant", "content": "Eldric"}}))
                }),
            )
            .with_state(captured.clone());
        let url = spawn_stub(app).await;

        let router = router_for(&url, "http://127.0.0.1:9");
        let messages = vec![Message::system("sys"), Message::user("name please")];
        let output = router.generate("llama3:latest", &messages).await;
        assert_eq!(output.as_deref(), Some("Eldric"));

        let body = captured.take().unwrap();
        assert_eq!(body["model"], "llama3:latest");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["repeat_penalty"], json!(1.1));
        assert_eq!(body["options"]["top_k"], json!(40));
        assert_eq!(body["options"]["top_p"], json!(0.95));
        assert_eq!(body["options"]["temperature"], json!(0.8));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "name please");
    }

    #[tokio::test]
    async fn cloud_backend_sends_bearer_and_reads_first_choice() {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(
                    |State(seen): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        seen.store(json!({"auth": auth, "body": body}));
                        Json(json!({
                            "choices": [
                                {"message": {"role": "assistant", "content": "first"}},
                                {"message": {"role": "assistant", "content": "second"}}
                            ]
                        }))
                    },
                ),
            )
            .with_state(captured.clone());
        let url = spawn_stub(app).await;

        let router = router_for("http://127.0.0.1:9", &url);
        let output = router.generate("gpt-4o", &[Message::user("hi")]).await;
        assert_eq!(output.as_deref(), Some("first"));

        let seen = captured.take().unwrap();
        assert_eq!(seen["auth"], "Bearer sk-test");
        assert_eq!(seen["body"]["options"]["frequency_penalty"], json!(1.1));
        assert_eq!(seen["body"]["options"]["temperature"], json!(0.8));
        assert_eq!(seen["body"]["stream"], false);
    }

    #[tokio::test]
    async fn malformed_bodies_become_none() {
        let app = Router::new()
            .route("/api/chat", post(|| async { Json(json!({"msg": "nope"})) }))
            .route(
                "/v1/chat/completions",
                post(|| async { Json(json!({"choices": []})) }),
            );
        let url = spawn_stub(app).await;

        let router = router_for(&url, &url);
        assert!(router
            .generate("llama3:latest", &[Message::user("hi")])
            .await
            .is_none());
        assert!(router.generate("gpt-4o", &[Message::user("hi")]).await.is_none());
    }

    #[tokio::test]
    async fn non_success_status_becomes_none() {
        let app = Router::new()
            .route(
                "/api/chat",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/v1/chat/completions",
                post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
            );
        let url = spawn_stub(app).await;

        let router = router_for(&url, &url);
        assert!(router
            .generate("phi3:medium", &[Message::user("hi")])
            .await
            .is_none());
        assert!(router
            .generate("claude-3-opus-20240229", &[Message::user("hi")])
            .await
            .is_none());
    }
}
