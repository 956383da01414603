use crate::llm_client::BackendRouter;
use crate::persona::PersonaProfile;
use crate::stages::{Stage, StageContext};

/// Stages that fill text fields of the profile, in dependency order. The
/// avatar prompt is driven by [`crate::avatar::AvatarSynthesizer`].
pub const PROFILE_STAGES: [Stage; 6] = [
    Stage::Name,
    Stage::Summary,
    Stage::Personality,
    Stage::Scenario,
    Stage::Greeting,
    Stage::ExampleDialogue,
];

#[derive(Clone)]
pub struct PersonaPipeline {
    router: BackendRouter,
}

impl PersonaPipeline {
    pub fn new(router: BackendRouter) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &BackendRouter {
        &self.router
    }

    /// Run one stage against the current profile. Returns the generated text
    /// with leading and trailing whitespace trimmed, so it is not always the
    /// raw model output. `None` if the backend failed or answered with nothing
    /// but whitespace. The profile is not touched.
    pub async fn run_stage(
        &self,
        stage: Stage,
        model: &str,
        profile: &PersonaProfile,
        context: &StageContext,
    ) -> Option<String> {
        let unset = profile.unset_inputs(stage);
        if !unset.is_empty() {
            tracing::debug!("{} stage runs with unset inputs: {:?}", stage, unset);
        }
        let messages = stage.spec().compose(profile, context);
        tracing::debug!(
            "{} stage prompt: {}",
            stage,
            messages.last().map(|m| m.content.as_str()).unwrap_or_default()
        );

        let output = self
            .router
            .generate(model, &messages)
            .await
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        match &output {
            Some(text) => tracing::info!("character_{}: {}", stage, text),
            None => tracing::warn!("{} stage produced no output; field left for manual entry", stage),
        }
        output
    }

    /// Run a stage and write its output into the profile. On failure the field
    /// keeps whatever it held before. Returns whether the field was written.
    pub async fn run_and_store(
        &self,
        stage: Stage,
        model: &str,
        profile: &mut PersonaProfile,
        context: &StageContext,
    ) -> bool {
        match self.run_stage(stage, model, profile, context).await {
            Some(text) => {
                profile.set(stage, Some(text));
                true
            }
            None => false,
        }
    }

    /// Fill every profile stage in order, skipping fields that are already
    /// set. Returns the stages that are still unset afterwards.
    pub async fn fill_missing(
        &self,
        model: &str,
        profile: &mut PersonaProfile,
        context: &StageContext,
    ) -> Vec<Stage> {
        let mut gaps = Vec::new();
        for stage in PROFILE_STAGES {
            if profile.get(stage).is_some() {
                continue;
            }
            if !self.run_and_store(stage, model, profile, context).await {
                gaps.push(stage);
            }
        }
        gaps
    }
}
