use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;

use crate::character_card::Exporter;
use crate::config::ImageSettings;
use crate::error::ExportError;
use crate::persona::PersonaProfile;
use crate::pipeline::PersonaPipeline;
use crate::sd_client::{OverrideSettings, StableDiffusionClient, Txt2ImgRequest};
use crate::stages::{Stage, StageContext};

const QUALITY_PREFIX: &str = "absurdres, full hd, 8k, high quality, ";

const DEFAULT_NEGATIVE_PROMPT: &str = concat!(
    "worst quality, normal quality, low quality, low res, blurry, ",
    "text, watermark, logo, banner, extra digits, cropped, ",
    "jpeg artifacts, signature, username, error, sketch, ",
    "duplicate, ugly, monochrome, horror, geometry, ",
    "mutation, disgusting, ",
    "bad anatomy, bad hands, three hands, three legs, ",
    "bad arms, missing legs, missing arms, poorly drawn face, ",
    " bad face, fused face, cloned face, worst face, ",
    "three crus, extra crus, fused crus, worst feet, ",
    "three feet, fused feet, fused thigh, three thigh, ",
    "fused thigh, extra thigh, worst thigh, missing fingers, ",
    "extra fingers, ugly fingers, long fingers, horn, ",
    "extra eyes, huge eyes, 2girl, amputation, disconnected limbs",
);

/// An avatar that was generated and written to disk.
#[derive(Debug, Clone)]
pub struct GeneratedAvatar {
    /// Appearance prompt before the quality prefix was added
    pub prompt: String,
    pub path: PathBuf,
    pub image: DynamicImage,
}

/// Turns a profile into an avatar image: appearance prompt, txt2img, then disk.
pub struct AvatarSynthesizer {
    pipeline: PersonaPipeline,
    sd: StableDiffusionClient,
    settings: ImageSettings,
    exporter: Arc<Exporter>,
}

impl AvatarSynthesizer {
    pub fn new(
        pipeline: PersonaPipeline,
        sd: StableDiffusionClient,
        settings: ImageSettings,
        exporter: Arc<Exporter>,
    ) -> Self {
        Self {
            pipeline,
            sd,
            settings,
            exporter,
        }
    }

    /// Use the explicit prompt verbatim if one was given, otherwise ask the
    /// model for an appearance description from the summary and topic.
    pub async fn derive_prompt(
        &self,
        model: &str,
        profile: &PersonaProfile,
        context: &StageContext,
        explicit: Option<&str>,
    ) -> Option<String> {
        if let Some(prompt) = explicit.filter(|p| !p.is_empty()) {
            return Some(prompt.to_string());
        }
        self.pipeline
            .run_stage(Stage::AvatarPrompt, model, profile, context)
            .await
    }

    pub fn build_request(&self, prompt: &str, negative: Option<&str>) -> Txt2ImgRequest {
        Txt2ImgRequest {
            prompt: format!("{}{}", QUALITY_PREFIX, prompt),
            negative_prompt: format!("{}{}", DEFAULT_NEGATIVE_PROMPT, negative.unwrap_or_default()),
            steps: self.settings.steps,
            cfg_scale: self.settings.cfg_scale,
            width: self.settings.width,
            height: self.settings.height,
            batch_size: 1,
            n_iter: 1,
            seed: -1,
            override_settings: OverrideSettings {
                sd_model_checkpoint: self.settings.checkpoint.clone(),
            },
            save_images: false,
            sampler_name: self.settings.sampler.clone(),
            scheduler: self.settings.scheduler.clone(),
        }
    }

    /// Generate and persist the avatar.
    ///
    /// `Ok(None)` means a backend step failed (prompt derivation, txt2img, or
    /// decoding) and nothing was written. `Err` is reserved for a missing name
    /// and for failures writing the image.
    pub async fn synthesize(
        &self,
        model: &str,
        profile: &PersonaProfile,
        context: &StageContext,
        negative_prompt: Option<&str>,
        avatar_prompt: Option<&str>,
    ) -> Result<Option<GeneratedAvatar>, ExportError> {
        if profile.file_stem().is_none() {
            return Err(ExportError::MissingField("name"));
        }

        let Some(prompt) = self
            .derive_prompt(model, profile, context, avatar_prompt)
            .await
        else {
            tracing::warn!("No appearance prompt available; skipping avatar generation");
            return Ok(None);
        };
        tracing::info!("character_avatar sd_prompt: {}", prompt);

        let request = self.build_request(&prompt, negative_prompt.filter(|n| !n.is_empty()));
        let bytes = match self.sd.txt2img(&request).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("txt2img at {} failed: {:#}", self.sd.api_url(), e);
                return Ok(None);
            }
        };

        let exporter = self.exporter.clone();
        let profile = profile.clone();
        let saved = tokio::task::spawn_blocking(move || persist_avatar(&exporter, &profile, &bytes))
            .await??;

        Ok(saved.map(|(path, image)| GeneratedAvatar {
            prompt,
            path,
            image,
        }))
    }
}

/// Decode and write the image. An undecodable image is `Ok(None)`.
fn persist_avatar(
    exporter: &Exporter,
    profile: &PersonaProfile,
    bytes: &[u8],
) -> Result<Option<(PathBuf, DynamicImage)>, ExportError> {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("txt2img returned an undecodable image: {}", e);
            return Ok(None);
        }
    };

    let path = exporter.save_avatar(profile, &image)?;
    Ok(Some((path, image)))
}
