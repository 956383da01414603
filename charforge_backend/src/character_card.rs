//! Character artifacts: the neutral JSON document, the PNG character card, and
//! reading a card back.
//!
//! Everything for one character lives under `<base>/<stem>/` where `stem` is
//! the sanitized character name:
//!
//! - `<stem>.png` raw avatar
//! - `<stem>.json` neutral persona document
//! - `<stem>.card.png` avatar with the persona embedded in a `chara` tEXt chunk

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::persona::PersonaProfile;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
pub const CARD_KEYWORD: &str = "chara";

/// Neutral persona document, independent of any chat client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutralCharacter {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub greeting_message: String,
    #[serde(default)]
    pub example_messages: String,
    #[serde(default)]
    pub image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
}

impl NeutralCharacter {
    fn from_profile(profile: &PersonaProfile, name: &str, image_path: String) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        Self {
            name: name.to_string(),
            summary: text(&profile.summary),
            personality: text(&profile.personality),
            scenario: text(&profile.scenario),
            greeting_message: text(&profile.greeting),
            example_messages: text(&profile.example_dialogue),
            image_path,
            created_time: Some(Utc::now()),
        }
    }
}

/// TavernAI Character Card V2 format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavernAICardV2 {
    pub spec: String,
    pub spec_version: String,
    pub data: TavernAIData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavernAIData {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub first_mes: String,
    #[serde(default)]
    pub mes_example: String,
    #[serde(default)]
    pub creator_notes: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub post_history_instructions: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub character_version: String,
}

impl From<&NeutralCharacter> for TavernAICardV2 {
    fn from(character: &NeutralCharacter) -> Self {
        Self {
            spec: "chara_card_v2".to_string(),
            spec_version: "2.0".to_string(),
            data: TavernAIData {
                name: character.name.clone(),
                description: character.summary.clone(),
                personality: character.personality.clone(),
                scenario: character.scenario.clone(),
                first_mes: character.greeting_message.clone(),
                mes_example: character.example_messages.clone(),
                creator_notes: String::new(),
                system_prompt: String::new(),
                post_history_instructions: String::new(),
                tags: Vec::new(),
                creator: String::new(),
                character_version: String::new(),
            },
        }
    }
}

impl From<TavernAICardV2> for NeutralCharacter {
    fn from(card: TavernAICardV2) -> Self {
        Self {
            name: card.data.name,
            summary: card.data.description,
            personality: card.data.personality,
            scenario: card.data.scenario,
            greeting_message: card.data.first_mes,
            example_messages: card.data.mes_example,
            image_path: String::new(),
            created_time: None,
        }
    }
}

/// Writes character artifacts under one base directory. Each character
/// directory is held exclusively for the duration of a write.
pub struct Exporter {
    base_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Exporter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn character_dir(&self, stem: &str) -> PathBuf {
        self.base_dir.join(stem)
    }

    /// Where the raw avatar for this profile lives (whether or not it exists yet).
    pub fn avatar_path(&self, profile: &PersonaProfile) -> Result<PathBuf, ExportError> {
        let stem = require_stem(profile)?;
        Ok(self.character_dir(&stem).join(format!("{}.png", stem)))
    }

    /// Persist a generated avatar as `<stem>/<stem>.png`.
    pub fn save_avatar(
        &self,
        profile: &PersonaProfile,
        image: &DynamicImage,
    ) -> Result<PathBuf, ExportError> {
        let stem = require_stem(profile)?;
        let path = self.avatar_path(profile)?;
        self.with_lock(&stem, || -> Result<PathBuf, ExportError> {
            write_atomic(&path, &encode_png(image)?)?;
            tracing::info!("Generated character avatar at {:?}", path);
            Ok(path)
        })
    }

    /// Write `<stem>/<stem>.json` and return the document that was written.
    /// `image_path` carries the profile's avatar path when one is set.
    pub fn export_json(
        &self,
        profile: &PersonaProfile,
    ) -> Result<(NeutralCharacter, PathBuf), ExportError> {
        let name = require_name(profile)?;
        let stem = require_stem(profile)?;
        self.with_lock(&stem, || -> Result<(NeutralCharacter, PathBuf), ExportError> {
            let image_path = profile
                .avatar_path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default();
            let document = NeutralCharacter::from_profile(profile, name, image_path);
            let path = self.character_dir(&stem).join(format!("{}.json", stem));
            let json = serde_json::to_vec_pretty(&document)?;
            write_atomic(&path, &json)?;

            tracing::info!("Exported {} as JSON to {:?}", name, path);
            Ok((document, path))
        })
    }

    /// Write `<stem>/<stem>.card.png`: the avatar with the persona embedded as
    /// a TavernAI V2 card. The avatar must already exist.
    pub fn export_card(
        &self,
        profile: &PersonaProfile,
    ) -> Result<(DynamicImage, PathBuf), ExportError> {
        let name = require_name(profile)?;
        let stem = require_stem(profile)?;
        let avatar_path = self.avatar_path(profile)?;
        self.with_lock(&stem, || -> Result<(DynamicImage, PathBuf), ExportError> {
            if !avatar_path.is_file() {
                return Err(ExportError::MissingAvatar(avatar_path.clone()));
            }

            let avatar = image::open(&avatar_path)?;
            let document = NeutralCharacter::from_profile(
                profile,
                name,
                avatar_path.to_string_lossy().into_owned(),
            );
            let card_json = serde_json::to_string(&TavernAICardV2::from(&document))?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(card_json);
            let card_bytes = encode_png_with_text(&avatar, &[(CARD_KEYWORD, encoded.as_str())])?;

            let path = self.character_dir(&stem).join(format!("{}.card.png", stem));
            write_atomic(&path, &card_bytes)?;
            tracing::info!("Exported {} as character card to {:?}", name, path);

            let card = image::load_from_memory(&card_bytes)?;
            Ok((card, path))
        })
    }

    /// Run `write` while holding the character's lock. The lock entry is
    /// dropped again once no other writer holds or waits on it.
    fn with_lock<T>(&self, stem: &str, write: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(stem.to_string()).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            write()
        };

        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // map entry + ours
        if Arc::strong_count(&lock) == 2 {
            locks.remove(stem);
        }
        result
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn require_name(profile: &PersonaProfile) -> Result<&str, ExportError> {
    profile
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or(ExportError::MissingField("name"))
}

fn require_stem(profile: &PersonaProfile) -> Result<String, ExportError> {
    profile.file_stem().ok_or(ExportError::MissingField("name"))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Encode as 8-bit RGBA PNG with the given `tEXt` chunks.
fn encode_png_with_text(
    image: &DynamicImage,
    text_chunks: &[(&str, &str)],
) -> Result<Vec<u8>, ExportError> {
    let rgba = image.to_rgba8();
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, rgba.width(), rgba.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        for (keyword, text) in text_chunks {
            encoder.add_text_chunk(keyword.to_string(), text.to_string())?;
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgba.as_raw())?;
        writer.finish()?;
    }
    Ok(bytes)
}

/// Write through a temp file in the same directory, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let dir = path.parent().ok_or_else(|| {
        ExportError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent directory"),
        )
    })?;
    fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp_path, bytes) {
        let _ = fs::remove_file(&tmp_path);
        return Err(ExportError::io(&tmp_path, e));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(ExportError::io(path, e));
    }
    Ok(())
}

fn chunk_length(png_bytes: &[u8], pos: usize) -> usize {
    u32::from_be_bytes([
        png_bytes[pos],
        png_bytes[pos + 1],
        png_bytes[pos + 2],
        png_bytes[pos + 3],
    ]) as usize
}

/// Read a character back from a card PNG or a JSON file (neutral or TavernAI V2).
pub fn parse_character_card<P: AsRef<Path>>(path: P) -> Result<NeutralCharacter> {
    let path_ref = path.as_ref();

    if let Some(ext) = path_ref.extension() {
        if ext.eq_ignore_ascii_case("png") {
            return parse_png_character_card(path_ref);
        }
    }

    let content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read character from {:?}", path_ref))?;
    parse_character_json(&content)
}

/// Extract character card from PNG tEXt chunk (TavernAI format)
pub fn parse_png_character_card<P: AsRef<Path>>(path: P) -> Result<NeutralCharacter> {
    let bytes = fs::read(&path)
        .with_context(|| format!("Failed to read PNG file from {:?}", path.as_ref()))?;

    let json_data = extract_png_text_chunk(&bytes, CARD_KEYWORD)
        .context("Failed to find 'chara' tEXt chunk in PNG")?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(json_data.trim())
        .context("Failed to decode base64 character data")?;

    let json_str = String::from_utf8(decoded).context("Character data is not valid UTF-8")?;

    parse_character_json(&json_str)
}

fn parse_character_json(content: &str) -> Result<NeutralCharacter> {
    if let Ok(card) = serde_json::from_str::<TavernAICardV2>(content) {
        return Ok(card.into());
    }
    serde_json::from_str::<NeutralCharacter>(content)
        .context("Unable to parse character - expected TavernAI V2 or neutral JSON")
}

/// Extract text chunk from PNG file by keyword
fn extract_png_text_chunk(png_bytes: &[u8], keyword: &str) -> Result<String> {
    if png_bytes.len() < 8 || &png_bytes[0..8] != PNG_SIGNATURE {
        anyhow::bail!("Not a valid PNG file");
    }

    let mut pos = 8;

    while pos + 12 <= png_bytes.len() {
        let length = chunk_length(png_bytes, pos);
        let chunk_type = &png_bytes[pos + 4..pos + 8];

        if chunk_type == b"tEXt" {
            let Some(chunk_data) = png_bytes.get(pos + 8..pos + 8 + length) else {
                anyhow::bail!("Truncated tEXt chunk");
            };

            // keyword\0text
            if let Some(null_pos) = chunk_data.iter().position(|&b| b == 0) {
                let chunk_keyword = std::str::from_utf8(&chunk_data[0..null_pos]).unwrap_or("");

                if chunk_keyword == keyword {
                    let text_data = &chunk_data[null_pos + 1..];
                    return String::from_utf8(text_data.to_vec())
                        .context("tEXt chunk data is not valid UTF-8");
                }
            }
        }

        pos += 12 + length;
    }

    anyhow::bail!("PNG tEXt chunk with keyword '{}' not found", keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eldric() -> PersonaProfile {
        PersonaProfile {
            name: Some("Eldric".to_string()),
            summary: Some("Eldric is a strikingly elegant elf archer.".to_string()),
            personality: Some("serene, contemplative, wise".to_string()),
            scenario: Some("{{user}} wanders into {{char}}'s forest.".to_string()),
            greeting: Some("*Eldric bows* Greetings, {{user}}.".to_string()),
            example_dialogue: Some("{{user}}: Who are you?\n{{char}}: A guardian.".to_string()),
            avatar_prompt: Some("male, elf, bow".to_string()),
            avatar_path: None,
        }
    }

    fn tiny_avatar() -> DynamicImage {
        DynamicImage::new_rgba8(4, 4)
    }

    #[test]
    fn json_export_round_trips_all_text_fields() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path().join("characters"));
        let profile = eldric();

        let (document, path) = exporter.export_json(&profile).unwrap();
        assert_eq!(path, dir.path().join("characters/Eldric/Eldric.json"));

        let written: NeutralCharacter =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, document);
        assert_eq!(Some(written.name), profile.name);
        assert_eq!(Some(written.summary), profile.summary);
        assert_eq!(Some(written.personality), profile.personality);
        assert_eq!(Some(written.scenario), profile.scenario);
        assert_eq!(Some(written.greeting_message), profile.greeting);
        assert_eq!(Some(written.example_messages), profile.example_dialogue);
    }

    #[test]
    fn export_is_a_pure_read_of_the_profile() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let profile = eldric();
        let before = profile.clone();

        exporter.export_json(&profile).unwrap();
        exporter.save_avatar(&profile, &tiny_avatar()).unwrap();
        exporter.export_card(&profile).unwrap();
        exporter.export_json(&profile).unwrap();
        assert_eq!(profile, before);
    }

    #[test]
    fn names_with_spaces_use_sanitized_paths() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let profile = PersonaProfile {
            name: Some("Tatsukaga Yamari".to_string()),
            ..Default::default()
        };
        let (document, path) = exporter.export_json(&profile).unwrap();
        assert_eq!(document.name, "Tatsukaga Yamari");
        assert_eq!(path, dir.path().join("Tatsukaga_Yamari/Tatsukaga_Yamari.json"));
        assert_eq!(document.summary, "");
    }

    #[test]
    fn export_without_name_is_a_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let err = exporter.export_json(&PersonaProfile::default()).unwrap_err();
        assert!(matches!(err, ExportError::MissingField("name")));
        assert!(err.is_precondition());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn card_export_without_avatar_is_a_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let err = exporter.export_card(&eldric()).unwrap_err();
        match &err {
            ExportError::MissingAvatar(path) => {
                assert_eq!(path, &dir.path().join("Eldric/Eldric.png"));
            }
            other => panic!("expected MissingAvatar, got {:?}", other),
        }
        assert!(err.is_precondition());
        assert!(!dir.path().join("Eldric/Eldric.card.png").exists());
    }

    #[test]
    fn card_embeds_persona_that_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let profile = eldric();

        let avatar_path = exporter.save_avatar(&profile, &tiny_avatar()).unwrap();
        assert_eq!(avatar_path, exporter.avatar_path(&profile).unwrap());

        let (card, path) = exporter.export_card(&profile).unwrap();
        assert_eq!(path, dir.path().join("Eldric/Eldric.card.png"));
        assert_eq!((card.width(), card.height()), (4, 4));

        let parsed = parse_character_card(&path).unwrap();
        assert_eq!(parsed.name, "Eldric");
        assert_eq!(Some(parsed.summary), profile.summary);
        assert_eq!(Some(parsed.greeting_message), profile.greeting);
        assert_eq!(Some(parsed.example_messages), profile.example_dialogue);
    }

    #[test]
    fn exported_json_reads_back_through_parser() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let (document, path) = exporter.export_json(&eldric()).unwrap();
        assert_eq!(parse_character_card(&path).unwrap(), document);
    }

    #[test]
    fn extract_skips_other_text_chunks() {
        let png = encode_png_with_text(
            &tiny_avatar(),
            &[("Software", "charforge"), (CARD_KEYWORD, "payload")],
        )
        .unwrap();
        assert_eq!(extract_png_text_chunk(&png, CARD_KEYWORD).unwrap(), "payload");
        assert_eq!(extract_png_text_chunk(&png, "Software").unwrap(), "charforge");
        assert!(extract_png_text_chunk(&png, "missing").is_err());
        assert!(image::load_from_memory(&png).is_ok());
    }

    #[test]
    fn extract_rejects_non_png() {
        assert!(extract_png_text_chunk(b"GIF89a....", CARD_KEYWORD).is_err());
    }

    #[test]
    fn json_image_path_follows_profile_avatar() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let mut profile = eldric();

        let (document, _) = exporter.export_json(&profile).unwrap();
        assert_eq!(document.image_path, "");

        let avatar = exporter.save_avatar(&profile, &tiny_avatar()).unwrap();
        profile.avatar_path = Some(avatar.clone());
        let (document, _) = exporter.export_json(&profile).unwrap();
        assert_eq!(document.image_path, avatar.to_string_lossy());
    }

    #[test]
    fn unwritable_base_dir_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        fs::write(&base, b"not a directory").unwrap();
        let exporter = Exporter::new(&base);
        let profile = eldric();
        let before = profile.clone();

        let err = exporter.export_json(&profile).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }), "{:?}", err);
        assert!(!err.is_precondition());

        let err = exporter.save_avatar(&profile, &tiny_avatar()).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }), "{:?}", err);
        assert!(!err.is_precondition());

        assert_eq!(profile, before);
        assert_eq!(fs::read(&base).unwrap(), b"not a directory");
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let character_dir = dir.path().join("Eldric");
        // a non-empty directory where the file should go
        fs::create_dir_all(character_dir.join("Eldric.json")).unwrap();
        fs::write(character_dir.join("Eldric.json/keep"), b"x").unwrap();
        fs::create_dir_all(character_dir.join("Eldric.png")).unwrap();
        fs::write(character_dir.join("Eldric.png/keep"), b"x").unwrap();

        let err = exporter.export_json(&eldric()).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }), "{:?}", err);
        let err = exporter.save_avatar(&eldric(), &tiny_avatar()).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }), "{:?}", err);

        let leftovers: Vec<_> = fs::read_dir(&character_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn character_locks_are_released_after_writes() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());

        for name in ["Eldric", "Jamie Hale", "Tatsukaga Yamari"] {
            let profile = PersonaProfile {
                name: Some(name.to_string()),
                ..Default::default()
            };
            exporter.export_json(&profile).unwrap();
        }
        assert_eq!(exporter.tracked_locks(), 0);

        let _ = exporter.export_card(&eldric());
        assert_eq!(exporter.tracked_locks(), 0);
    }

    #[test]
    fn concurrent_writes_to_one_character_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let profile = eldric();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    exporter.export_json(&profile).unwrap();
                    exporter.save_avatar(&profile, &tiny_avatar()).unwrap();
                });
            }
        });

        assert_eq!(exporter.tracked_locks(), 0);
        assert!(parse_character_card(dir.path().join("Eldric/Eldric.json")).is_ok());
        assert!(image::open(dir.path().join("Eldric/Eldric.png")).is_ok());
    }
}
