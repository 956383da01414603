use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed txt2img parameters sent with every avatar request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_checkpoint")]
    pub checkpoint: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,
    #[serde(default = "default_sampler")]
    pub sampler: String,
    #[serde(default = "default_scheduler")]
    pub scheduler: String,
}

fn default_checkpoint() -> String {
    "dreamshaperXL_v21TurboDPMSDE.safetensors [4496b36d48]".to_string()
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    1024
}

fn default_steps() -> u32 {
    6
}

fn default_cfg_scale() -> f32 {
    2.0
}

fn default_sampler() -> String {
    "DPM++ SDE".to_string()
}

fn default_scheduler() -> String {
    "Karras".to_string()
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            checkpoint: default_checkpoint(),
            width: default_width(),
            height: default_height(),
            steps: default_steps(),
            cfg_scale: default_cfg_scale(),
            sampler: default_sampler(),
            scheduler: default_scheduler(),
        }
    }
}

/// Immutable settings handed to the router, synthesizer and exporter at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    // Local chat backend (Ollama API shape)
    #[serde(default = "default_ollama_url")]
    pub ollama_api_url: String,

    // Cloud chat backend (OpenAI-compatible)
    #[serde(default = "default_openai_url")]
    pub openai_api_url: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,

    // stable-diffusion-webui
    #[serde(default = "default_sd_url")]
    pub sd_api_url: String,
    #[serde(default)]
    pub image: ImageSettings,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_sd_url() -> String {
    "http://localhost:7860".to_string()
}

fn default_model() -> String {
    crate::llm_client::CLOUD_MODELS[0].to_string()
}

fn default_output_dir() -> String {
    "characters".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            ollama_api_url: default_ollama_url(),
            openai_api_url: default_openai_url(),
            openai_api_key: None,
            sd_api_url: default_sd_url(),
            image: ImageSettings::default(),
            default_model: default_model(),
            output_dir: default_output_dir(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ForgeConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("charforge_config.toml")
    }

    /// Load config from charforge_config.toml (next to executable), falling back to env vars
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults + env vars when the
    /// file is missing or does not parse.
    pub fn load_from(path: &Path) -> Self {
        if let Ok(contents) = fs::read_to_string(path) {
            match toml::from_str::<ForgeConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                }
            }
        }

        tracing::warn!("No config file found, using defaults + env vars");
        Self::from_env()
    }

    /// Save config to file (next to executable)
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("CHARFORGE_OLLAMA_URL") {
            config.ollama_api_url = url;
        }

        if let Ok(url) = env::var("CHARFORGE_OPENAI_URL") {
            config.openai_api_url = url;
        }

        if let Ok(key) = env::var("CHARFORGE_OPENAI_KEY") {
            if !key.trim().is_empty() {
                config.openai_api_key = Some(key);
            }
        }

        if let Ok(url) = env::var("CHARFORGE_SD_URL") {
            config.sd_api_url = url;
        }

        if let Ok(model) = env::var("CHARFORGE_DEFAULT_MODEL") {
            if !model.trim().is_empty() {
                config.default_model = model;
            }
        }

        if let Ok(dir) = env::var("CHARFORGE_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                config.output_dir = dir;
            }
        }

        if let Ok(timeout) = env::var("CHARFORGE_REQUEST_TIMEOUT_SECS") {
            if let Ok(seconds) = timeout.parse() {
                config.request_timeout_secs = seconds;
            }
        }

        config
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_endpoints() {
        let config = ForgeConfig::default();
        assert_eq!(config.ollama_api_url, "http://localhost:11434");
        assert_eq!(config.openai_api_url, "https://api.openai.com");
        assert_eq!(config.sd_api_url, "http://localhost:7860");
        assert_eq!(config.default_model, "gpt-3.5-turbo");
        assert_eq!(config.output_dir, "characters");
        assert_eq!(config.image.steps, 6);
        assert_eq!(config.image.sampler, "DPM++ SDE");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ForgeConfig = toml::from_str(
            r#"
            openai_api_key = "sk-test"

            [image]
            width = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.image.width, 512);
        assert_eq!(config.image.height, 1024);
        assert_eq!(config.ollama_api_url, "http://localhost:11434");
    }

    #[test]
    fn zero_timeout_disables_request_timeout() {
        let mut config = ForgeConfig::default();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(300)));
        config.request_timeout_secs = 0;
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charforge_config.toml");
        let mut config = ForgeConfig::default();
        config.sd_api_url = "http://gpu-box:7860".to_string();
        config.image.steps = 20;

        config.save_to(&path).unwrap();
        let loaded = ForgeConfig::load_from(&path);
        assert_eq!(loaded.sd_api_url, "http://gpu-box:7860");
        assert_eq!(loaded.image.steps, 20);
        assert_eq!(loaded.default_model, config.default_model);
    }

    #[test]
    fn save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/charforge_config.toml");
        assert!(ForgeConfig::default().save_to(&path).is_err());
    }
}
