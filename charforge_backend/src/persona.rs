use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::stages::Stage;

/// The character being assembled. Every field may be unset at any time; the
/// caller owns the profile and decides which stage outputs to keep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaProfile {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub personality: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub scenario: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub greeting: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub example_dialogue: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub avatar_prompt: Option<String>,
    #[serde(default)]
    pub avatar_path: Option<PathBuf>,
}

impl PersonaProfile {
    pub fn get(&self, stage: Stage) -> Option<&str> {
        let field = match stage {
            Stage::Name => &self.name,
            Stage::Summary => &self.summary,
            Stage::Personality => &self.personality,
            Stage::Scenario => &self.scenario,
            Stage::Greeting => &self.greeting,
            Stage::ExampleDialogue => &self.example_dialogue,
            Stage::AvatarPrompt => &self.avatar_prompt,
        };
        field.as_deref()
    }

    /// Field text for prompt interpolation; unset fields render as empty text.
    pub fn text(&self, stage: Stage) -> &str {
        self.get(stage).unwrap_or_default()
    }

    pub fn set(&mut self, stage: Stage, value: Option<String>) {
        let field = match stage {
            Stage::Name => &mut self.name,
            Stage::Summary => &mut self.summary,
            Stage::Personality => &mut self.personality,
            Stage::Scenario => &mut self.scenario,
            Stage::Greeting => &mut self.greeting,
            Stage::ExampleDialogue => &mut self.example_dialogue,
            Stage::AvatarPrompt => &mut self.avatar_prompt,
        };
        *field = value;
    }

    /// Upstream fields `stage` reads that are still unset.
    pub fn unset_inputs(&self, stage: Stage) -> Vec<Stage> {
        stage
            .inputs()
            .iter()
            .copied()
            .filter(|input| self.get(*input).is_none())
            .collect()
    }

    /// Directory/file stem for this character's artifacts, if a name is set.
    pub fn file_stem(&self) -> Option<String> {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(sanitize_name)
    }
}

/// Spaces (and path separators) become underscores. Idempotent.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();

    // "." and ".." would escape the output directory
    if !replaced.is_empty() && replaced.chars().all(|c| c == '.') {
        "_".repeat(replaced.len())
    } else {
        replaced
    }
}

/// Boundary conversion for optional text inputs: `""` means "not provided".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(Option::<String>::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_spaces() {
        assert_eq!(sanitize_name("Tatsukaga Yamari"), "Tatsukaga_Yamari");
        assert_eq!(sanitize_name("mr. Fluffy"), "mr._Fluffy");
        assert_eq!(sanitize_name("Eldric"), "Eldric");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for name in [
            "",
            "Eldric",
            "Jamie Hale",
            "  padded  name ",
            "already_clean",
            "../escape attempt",
            "..",
            ".",
            "a\\b/c",
            "多 字节 名字",
        ] {
            let once = sanitize_name(name);
            assert_eq!(sanitize_name(&once), once, "{name:?}");
        }
    }

    #[test]
    fn sanitize_keeps_names_inside_output_dir() {
        assert_eq!(sanitize_name(".."), "__");
        assert_eq!(sanitize_name("../x"), ".._x");
        assert!(!sanitize_name("a/b").contains('/'));
    }

    #[test]
    fn set_and_get_round_trip_every_stage() {
        let mut profile = PersonaProfile::default();
        for stage in Stage::ALL {
            assert_eq!(profile.get(stage), None);
            assert_eq!(profile.text(stage), "");
            profile.set(stage, Some(stage.key().to_string()));
        }
        for stage in Stage::ALL {
            assert_eq!(profile.get(stage), Some(stage.key()));
        }
        profile.set(Stage::Summary, None);
        assert_eq!(profile.summary, None);
    }

    #[test]
    fn blank_json_fields_deserialize_as_unset() {
        let profile: PersonaProfile = serde_json::from_str(
            r#"{"name": "Eldric", "summary": "", "personality": null}"#,
        )
        .unwrap();
        assert_eq!(profile.name.as_deref(), Some("Eldric"));
        assert_eq!(profile.summary, None);
        assert_eq!(profile.personality, None);
        assert_eq!(profile.scenario, None);
    }

    #[test]
    fn file_stem_requires_a_name() {
        let mut profile = PersonaProfile::default();
        assert_eq!(profile.file_stem(), None);
        profile.name = Some("   ".to_string());
        assert_eq!(profile.file_stem(), None);
        profile.name = Some("Jamie Hale".to_string());
        assert_eq!(profile.file_stem().as_deref(), Some("Jamie_Hale"));
    }

    #[test]
    fn unset_inputs_lists_missing_upstream_fields() {
        let mut profile = PersonaProfile::default();
        assert!(profile.unset_inputs(Stage::Name).is_empty());
        assert_eq!(
            profile.unset_inputs(Stage::Greeting),
            vec![Stage::Name, Stage::Summary, Stage::Personality]
        );

        profile.name = Some("Eldric".to_string());
        profile.personality = Some("Stoic".to_string());
        assert_eq!(profile.unset_inputs(Stage::Greeting), vec![Stage::Summary]);
        assert_eq!(profile.unset_inputs(Stage::Personality), vec![Stage::Summary]);
    }
}
