use anyhow::{Context, Result};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverrideSettings {
    pub sd_model_checkpoint: String,
}

/// Body of `POST /sdapi/v1/txt2img`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Txt2ImgRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub cfg_scale: f32,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub n_iter: u32,
    pub seed: i64,
    pub override_settings: OverrideSettings,
    pub save_images: bool,
    pub sampler_name: String,
    pub scheduler: String,
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    images: Vec<String>,
    #[serde(default)]
    info: Option<String>,
}

/// Client for the stable-diffusion-webui API
pub struct StableDiffusionClient {
    api_url: String,
    client: Client,
}

impl StableDiffusionClient {
    pub fn new(api_url: String, client: Client) -> Self {
        Self { api_url, client }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Run txt2img and return the raw bytes of the first generated image
    pub async fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Vec<u8>> {
        let url = format!("{}/sdapi/v1/txt2img", self.api_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to send txt2img request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("stable-diffusion-webui API error {}: {}", status, body);
        }

        let result: Txt2ImgResponse = response
            .json()
            .await
            .context("Failed to parse txt2img response")?;

        if let Some(info) = &result.info {
            tracing::info!("txt2img info: {}", info);
        }

        let encoded = result
            .images
            .first()
            .ok_or_else(|| anyhow::anyhow!("txt2img returned no images"))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .context("Failed to decode base64 image from txt2img")
    }
}
