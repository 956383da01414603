use std::sync::Arc;

use anyhow::{Context, Result};

use crate::avatar::AvatarSynthesizer;
use crate::character_card::Exporter;
use crate::config::ForgeConfig;
use crate::http_client::build_http_client_with_timeout;
use crate::llm_client::BackendRouter;
use crate::pipeline::PersonaPipeline;
use crate::sd_client::StableDiffusionClient;

/// Everything one process needs to generate and export characters, built
/// once from an immutable config.
pub struct ForgeRuntime {
    pub config: ForgeConfig,
    pub pipeline: PersonaPipeline,
    pub synthesizer: Arc<AvatarSynthesizer>,
    pub exporter: Arc<Exporter>,
}

impl ForgeRuntime {
    pub fn bootstrap(config: ForgeConfig) -> Result<Self> {
        let client = build_http_client_with_timeout(config.request_timeout())
            .context("Failed to build shared HTTP client")?;

        let router = BackendRouter::from_config(&config, client.clone());
        let sd = StableDiffusionClient::new(config.sd_api_url.clone(), client);

        if config.openai_api_key.is_none() {
            tracing::warn!("No cloud API key configured; cloud models will fail until one is set");
        }
        tracing::info!(
            "Backends: local={} cloud={} image={} output={:?}",
            config.ollama_api_url,
            config.openai_api_url,
            config.sd_api_url,
            config.output_path()
        );

        Ok(Self::from_parts(config, router, sd))
    }

    /// Assemble a runtime around an existing router and image client.
    pub fn from_parts(config: ForgeConfig, router: BackendRouter, sd: StableDiffusionClient) -> Self {
        let exporter = Arc::new(Exporter::new(config.output_path()));
        let pipeline = PersonaPipeline::new(router);
        let synthesizer = Arc::new(AvatarSynthesizer::new(
            pipeline.clone(),
            sd,
            config.image.clone(),
            exporter.clone(),
        ));

        Self {
            config,
            pipeline,
            synthesizer,
            exporter,
        }
    }

    /// Use the requested model, or the configured default when none was given.
    pub fn model_or_default<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(&self.config.default_model)
    }
}
