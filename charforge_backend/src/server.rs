use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::character_card::NeutralCharacter;
use crate::error::ExportError;
use crate::llm_client::{available_models, ModelEntry};
use crate::persona::{empty_as_none, PersonaProfile};
use crate::runtime::ForgeRuntime;
use crate::stages::{Stage, StageContext};

#[derive(Clone)]
pub struct ServerState {
    pub runtime: Arc<ForgeRuntime>,
    pub auth: BackendAuthConfig,
}

#[derive(Debug, Clone)]
pub struct BackendAuthConfig {
    mode: AuthMode,
    token: Option<String>,
}

impl BackendAuthConfig {
    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::Disabled,
            token: None,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::Required,
            token: Some(token.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    Required,
    Disabled,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    default_model: String,
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct StageRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    model: Option<String>,
    topic: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    gender: Option<String>,
    #[serde(default)]
    profile: PersonaProfile,
}

#[derive(Debug, Serialize)]
struct StageResponse {
    stage: String,
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvatarRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    model: Option<String>,
    topic: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    gender: Option<String>,
    profile: PersonaProfile,
    #[serde(default, deserialize_with = "empty_as_none")]
    negative_prompt: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    avatar_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct AvatarResponse {
    prompt: Option<String>,
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    profile: PersonaProfile,
}

#[derive(Debug, Serialize)]
struct JsonExportResponse {
    document: NeutralCharacter,
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct CardExportResponse {
    path: PathBuf,
    width: u32,
    height: u32,
}

pub async fn serve_backend(runtime: ForgeRuntime) -> Result<()> {
    let bind_addr = std::env::var("CHARFORGE_BACKEND_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
        .parse::<SocketAddr>()
        .context("Invalid CHARFORGE_BACKEND_BIND (expected host:port)")?;

    let auth = load_auth_config()?;
    let state = Arc::new(ServerState {
        runtime: Arc::new(runtime),
        auth,
    });
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind backend server to {}", bind_addr))?;
    tracing::info!("Charforge backend listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .await
        .context("Backend server failed")?;
    Ok(())
}

pub fn build_app(state: Arc<ServerState>) -> Router {
    let protected = Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/stages/:stage", post(run_stage))
        .route("/avatar", post(generate_avatar))
        .route("/export/json", post(export_json))
        .route("/export/card", post(export_card))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new().nest("/v1", protected)
}

fn load_auth_config() -> Result<BackendAuthConfig> {
    let mode = parse_auth_mode(std::env::var("CHARFORGE_BACKEND_AUTH_MODE").ok())?;
    let token = std::env::var("CHARFORGE_BACKEND_TOKEN")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    if mode == AuthMode::Required && token.is_none() {
        return Err(anyhow!(
            "CHARFORGE_BACKEND_TOKEN is required when auth mode is 'required'"
        ));
    }
    if mode == AuthMode::Disabled {
        tracing::warn!("Backend auth mode is disabled; all API routes are unauthenticated");
    }

    Ok(BackendAuthConfig { mode, token })
}

fn parse_auth_mode(raw: Option<String>) -> Result<AuthMode> {
    let normalized = raw
        .unwrap_or_else(|| "required".to_string())
        .trim()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "" | "required" | "on" | "enabled" | "true" => Ok(AuthMode::Required),
        "disabled" | "off" | "false" => Ok(AuthMode::Disabled),
        other => Err(anyhow!(
            "Invalid CHARFORGE_BACKEND_AUTH_MODE '{}'. Expected 'required' or 'disabled'",
            other
        )),
    }
}

async fn auth_middleware(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Result<Response, StatusCode> {
    authorize(&headers, &state.auth)?;
    Ok(next.run(request).await)
}

fn authorize(headers: &HeaderMap, auth: &BackendAuthConfig) -> Result<(), StatusCode> {
    if auth.mode == AuthMode::Disabled {
        return Ok(());
    }
    let Some(token) = auth.token.as_deref() else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(raw_header) = headers.get(header::AUTHORIZATION) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let Ok(auth_value) = raw_header.to_str() else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let expected = format!("Bearer {}", token);
    if auth_value.trim() != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_models(State(state): State<Arc<ServerState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        default_model: state.runtime.config.default_model.clone(),
        models: available_models(),
    })
}

async fn run_stage(
    State(state): State<Arc<ServerState>>,
    Path(stage): Path<String>,
    Json(body): Json<StageRequest>,
) -> Result<Json<StageResponse>, (StatusCode, String)> {
    let stage: Stage = stage.parse().map_err(not_found)?;
    let model = state.runtime.model_or_default(body.model.as_deref());
    let context = StageContext::new(body.topic, body.gender.as_deref());

    let output = state
        .runtime
        .pipeline
        .run_stage(stage, model, &body.profile, &context)
        .await;

    Ok(Json(StageResponse {
        stage: stage.key().to_string(),
        output,
    }))
}

async fn generate_avatar(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<AvatarRequest>,
) -> Result<(StatusCode, Json<AvatarResponse>), (StatusCode, String)> {
    let model = state.runtime.model_or_default(body.model.as_deref());
    let context = StageContext::new(body.topic, body.gender.as_deref());

    let generated = state
        .runtime
        .synthesizer
        .synthesize(
            model,
            &body.profile,
            &context,
            body.negative_prompt.as_deref(),
            body.avatar_prompt.as_deref(),
        )
        .await
        .map_err(export_error)?;

    Ok(match generated {
        Some(avatar) => (
            StatusCode::OK,
            Json(AvatarResponse {
                prompt: Some(avatar.prompt),
                path: Some(avatar.path),
            }),
        ),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(AvatarResponse {
                prompt: None,
                path: None,
            }),
        ),
    })
}

async fn export_json(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<ExportRequest>,
) -> Result<Json<JsonExportResponse>, (StatusCode, String)> {
    let exporter = state.runtime.exporter.clone();
    let (document, path) = tokio::task::spawn_blocking(move || exporter.export_json(&body.profile))
        .await
        .map_err(ExportError::from)
        .and_then(|written| written)
        .map_err(export_error)?;
    Ok(Json(JsonExportResponse { document, path }))
}

async fn export_card(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<ExportRequest>,
) -> Result<Json<CardExportResponse>, (StatusCode, String)> {
    let exporter = state.runtime.exporter.clone();
    let (card, path) = tokio::task::spawn_blocking(move || exporter.export_card(&body.profile))
        .await
        .map_err(ExportError::from)
        .and_then(|written| written)
        .map_err(export_error)?;
    Ok(Json(CardExportResponse {
        path,
        width: card.width(),
        height: card.height(),
    }))
}

fn not_found(message: String) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, message)
}

fn export_error(error: ExportError) -> (StatusCode, String) {
    if !error.is_precondition() {
        tracing::error!("Export failed: {}", error);
        return (StatusCode::INTERNAL_SERVER_ERROR, error.to_string());
    }
    let status = match &error {
        ExportError::MissingField(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, error.to_string())
}
