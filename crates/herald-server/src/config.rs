//! Configuration loading.
//!
//! The snapshot is assembled once at start-up from four files and the
//! process environment, then never mutated:
//!
//! - a dotenv file (`~/.env`) of `KEY=VALUE` lines,
//! - the structured settings file (`~/.claude/settings.json`),
//! - the voice-personalities document (`~/.claude/voices.md`),
//! - the pronunciation map (`~/.claude/pronunciations.json`).
//!
//! Missing files are logged and replaced by defaults; the back-ends they
//! would have configured simply probe as unavailable.

use herald_types::{Identity, LocalEngine, VoiceConfig, VoiceSettings};
use herald_voice::SpeakerConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_QWEN_PORT: u16 = 8889;
const DEFAULT_PIPER_MODEL: &str = "en_US-lessac-medium.onnx";
/// Upstream default voice used when neither dotenv nor settings name one.
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Locations of the configuration files. Overridable for tests.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub dotenv: PathBuf,
    pub settings: PathBuf,
    pub voices: PathBuf,
    pub pronunciations: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            dotenv: home.join(".env"),
            settings: home.join(".claude/settings.json"),
            voices: home.join(".claude/voices.md"),
            pronunciations: home.join(".claude/pronunciations.json"),
        }
    }
}

/// Immutable configuration snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub elevenlabs_api_key: Option<String>,
    pub default_voice_id: String,
    pub preferred_engine: Option<LocalEngine>,
    pub piper_binary: String,
    pub piper_model: PathBuf,
    pub qwen_port: u16,
    pub owner_name: String,
    pub reduced_voice_feedback: bool,
    pub default_settings: VoiceSettings,
    pub voices: HashMap<String, VoiceConfig>,
    pub pronunciations: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    daidentity: Identity,
    #[serde(rename = "reducedVoiceFeedback")]
    reduced_voice_feedback: bool,
}

#[derive(Debug, Deserialize)]
struct VoicesFile {
    voices: HashMap<String, VoiceConfig>,
}

impl Config {
    /// Loads the snapshot. Process environment variables override dotenv
    /// values for the recognised keys. Missing or unreadable files degrade
    /// to defaults; the daemon starts regardless and the affected back-ends
    /// simply probe as unavailable.
    pub fn load(paths: &ConfigPaths) -> Self {
        let env_file = match read_optional(&paths.dotenv) {
            Some(contents) => parse_dotenv(&contents),
            None => {
                tracing::info!(path = %paths.dotenv.display(), "dotenv not found, using defaults");
                HashMap::new()
            }
        };
        let lookup = |key: &str| -> Option<String> {
            std::env::var(key).ok().or_else(|| env_file.get(key).cloned())
        };

        let settings = load_settings(&paths.settings);
        let voices = load_voices(&paths.voices);
        let pronunciations = load_pronunciations(&paths.pronunciations);

        let port = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let qwen_port = lookup("QWEN3_INTERNAL_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_QWEN_PORT);

        let preferred_engine = lookup("PAI_TTS_ENGINE").and_then(|v| {
            let parsed = LocalEngine::parse(&v);
            if parsed.is_none() {
                tracing::warn!(value = %v, "unrecognised PAI_TTS_ENGINE, ignoring");
            }
            parsed
        });

        let default_voice_id = lookup("ELEVENLABS_VOICE_ID")
            .filter(|v| !v.trim().is_empty())
            .or_else(|| settings.daidentity.voice_id.clone())
            .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());

        let mut default_settings = VoiceSettings::default();
        if let Some(voice) = &settings.daidentity.voice {
            default_settings.apply(voice);
        }

        Self {
            port,
            elevenlabs_api_key: lookup("ELEVENLABS_API_KEY"),
            default_voice_id,
            preferred_engine,
            piper_binary: "piper".to_string(),
            piper_model: resolve_piper_model(
                lookup("PIPER_MODEL").as_deref(),
                lookup("PIPER_MODEL_DIR").as_deref(),
            ),
            qwen_port,
            owner_name: settings
                .daidentity
                .name
                .unwrap_or_else(|| "PAI".to_string()),
            reduced_voice_feedback: settings.reduced_voice_feedback,
            default_settings,
            voices,
            pronunciations,
        }
    }

    /// The slice of configuration the voice layer consumes.
    pub fn speaker_config(&self) -> SpeakerConfig {
        SpeakerConfig {
            elevenlabs_api_key: self.elevenlabs_api_key.clone(),
            preferred_engine: self.preferred_engine,
            piper_binary: self.piper_binary.clone(),
            piper_model: self.piper_model.clone(),
            qwen_port: self.qwen_port,
            default_voice_id: self.default_voice_id.clone(),
            default_settings: self.default_settings.clone(),
            voices: self.voices.clone(),
            pronunciations: self.pronunciations.clone(),
        }
    }
}

fn read_optional(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable config file, using defaults");
            None
        }
    }
}

/// Parses `KEY=VALUE` lines. `#` starts a comment line; one pair of
/// surrounding single or double quotes around the value is stripped.
fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        map.insert(key.trim().to_string(), unquote(value.trim()).to_string());
    }
    map
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn load_settings(path: &Path) -> SettingsFile {
    let Some(contents) = read_optional(path) else {
        tracing::info!(path = %path.display(), "settings file not found, using defaults");
        return SettingsFile::default();
    };
    match serde_json::from_str(&contents) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unparseable settings file, using defaults");
            SettingsFile::default()
        }
    }
}

fn load_voices(path: &Path) -> HashMap<String, VoiceConfig> {
    let Some(contents) = read_optional(path) else {
        tracing::info!(path = %path.display(), "voice personalities not found");
        return HashMap::new();
    };
    let Some(block) = extract_fenced_block(&contents) else {
        tracing::warn!(path = %path.display(), "no fenced JSON block in voice personalities");
        return HashMap::new();
    };
    match serde_json::from_str::<VoicesFile>(block) {
        Ok(file) => file.voices,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unparseable voice personalities");
            HashMap::new()
        }
    }
}

fn load_pronunciations(path: &Path) -> HashMap<String, String> {
    let Some(contents) = read_optional(path) else {
        tracing::info!(path = %path.display(), "pronunciation map not found");
        return HashMap::new();
    };
    match serde_json::from_str(&contents) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unparseable pronunciation map");
            HashMap::new()
        }
    }
}

/// Extracts the body of the first fenced code block, skipping any language
/// tag on the opening fence.
fn extract_fenced_block(document: &str) -> Option<&str> {
    let start = document.find("```")?;
    let after_fence = &document[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn resolve_piper_model(model: Option<&str>, model_dir: Option<&str>) -> PathBuf {
    let model = model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_PIPER_MODEL);
    let model_path = Path::new(model);
    if model_path.is_absolute() {
        return model_path.to_path_buf();
    }
    let dir = match model_dir.filter(|d| !d.trim().is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local/share/piper"),
    };
    dir.join(model)
}
