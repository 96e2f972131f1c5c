//! Engine selection and per-request dispatch.
//!
//! Selection happens exactly once after the probes complete and is never
//! revised mid-run. At request time the selected engine handles the text;
//! any failure triggers exactly one pass over the local fallback chain
//! (piper, then the Qwen sidecar, then the system speech tool), with
//! per-engine `Result` handling.

use crate::elevenlabs::ElevenLabs;
use crate::error::VoiceError;
use crate::piper::Piper;
use crate::pipeline;
use crate::player::AudioPlayer;
use crate::probe::{self, Probes};
use crate::qwen::QwenSidecar;
use crate::system::SystemTts;
use crate::text::{self, Pronunciations};
use herald_types::{AudioFormat, LocalEngine, TtsEngine, VoiceConfig, VoiceOverrides, VoiceSettings};
use std::collections::HashMap;
use std::path::PathBuf;

/// Fallback order when the primary path fails.
const FALLBACK_CHAIN: [TtsEngine; 3] = [TtsEngine::Piper, TtsEngine::Qwen, TtsEngine::System];

/// Everything the voice layer needs from configuration.
#[derive(Debug, Clone)]
pub struct SpeakerConfig {
    pub elevenlabs_api_key: Option<String>,
    pub preferred_engine: Option<LocalEngine>,
    pub piper_binary: String,
    pub piper_model: PathBuf,
    pub qwen_port: u16,
    pub default_voice_id: String,
    pub default_settings: VoiceSettings,
    pub voices: HashMap<String, VoiceConfig>,
    pub pronunciations: HashMap<String, String>,
}

/// One queued utterance, as produced by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct SpeakRequest {
    pub message: String,
    pub voice_id: Option<String>,
    pub voice_name: Option<String>,
    pub overrides: VoiceOverrides,
    pub volume: Option<f32>,
}

/// Prosody, upstream voice id and volume after the lookup/override merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVoice {
    pub id: String,
    pub settings: VoiceSettings,
    pub volume: f32,
    pub style_directive: Option<String>,
}

/// Which engines probed as usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineAvailability {
    pub elevenlabs: bool,
    pub piper: bool,
    pub qwen: bool,
    pub system: bool,
}

/// Initialisation-time engine ranking. The cloud engine outranks everything
/// when its credential is configured; an explicitly requested local engine
/// comes next (warn-and-continue when its probe failed); then auto-detection
/// in fixed order.
pub fn select_engine(
    available: EngineAvailability,
    preferred: Option<LocalEngine>,
) -> Option<TtsEngine> {
    if available.elevenlabs {
        return Some(TtsEngine::ElevenLabs);
    }
    match preferred {
        Some(LocalEngine::Piper) if available.piper => return Some(TtsEngine::Piper),
        Some(LocalEngine::Qwen) if available.qwen => return Some(TtsEngine::Qwen),
        Some(engine) => {
            tracing::warn!(
                engine = engine.name(),
                "requested engine unavailable, falling back to auto-detection"
            );
        }
        None => {}
    }
    if available.piper {
        Some(TtsEngine::Piper)
    } else if available.qwen {
        Some(TtsEngine::Qwen)
    } else if available.system {
        Some(TtsEngine::System)
    } else {
        None
    }
}

/// The TTS dispatch engine: cached selection plus the constructed back-ends.
/// Read-only after initialisation.
pub struct Speaker {
    selection: Option<TtsEngine>,
    elevenlabs: Option<ElevenLabs>,
    piper: Option<Piper>,
    qwen: Option<QwenSidecar>,
    system: Option<SystemTts>,
    player: AudioPlayer,
    default_voice_id: String,
    default_settings: VoiceSettings,
    voices: HashMap<String, VoiceConfig>,
    pronunciations: Pronunciations,
    wav_player_binary: Option<&'static str>,
    pactl_present: bool,
}

impl Speaker {
    /// Runs all probes, picks the engine and builds the back-ends.
    pub async fn initialize(config: SpeakerConfig) -> Self {
        let probes = Probes::detect(&config.piper_binary, &config.piper_model);

        let elevenlabs_ok = probe::elevenlabs_configured(config.elevenlabs_api_key.as_deref());
        let qwen = QwenSidecar::new(config.qwen_port);
        let qwen_ok = qwen.healthy().await;

        let available = EngineAvailability {
            elevenlabs: elevenlabs_ok,
            piper: probes.piper,
            qwen: qwen_ok,
            system: probes.speech_tool.is_some(),
        };
        let selection = select_engine(available, config.preferred_engine);

        match selection {
            Some(engine) => tracing::info!(
                engine = engine.name(),
                description = engine.description(),
                "selected TTS engine"
            ),
            None => tracing::warn!("no TTS engine available; notifications will be silent"),
        }

        Self {
            selection,
            elevenlabs: elevenlabs_ok
                .then(|| ElevenLabs::new(config.elevenlabs_api_key.unwrap_or_default())),
            piper: probes
                .piper
                .then(|| Piper::new(config.piper_binary.clone(), config.piper_model.clone())),
            qwen: qwen_ok.then_some(qwen),
            system: probes.speech_tool.map(SystemTts::new),
            player: AudioPlayer::from_probes(&probes),
            default_voice_id: config.default_voice_id,
            default_settings: config.default_settings,
            voices: config.voices,
            pronunciations: Pronunciations::compile(&config.pronunciations),
            wav_player_binary: probes.wav_player.map(|c| c.binary),
            pactl_present: probes.pactl,
        }
    }

    /// The cached selection; `None` when nothing probed as usable.
    pub fn engine(&self) -> Option<TtsEngine> {
        self.selection
    }

    /// Binary name of the probed uncompressed-audio player, used by
    /// external-audio stream classification.
    pub fn wav_player_binary(&self) -> Option<&'static str> {
        self.wav_player_binary
    }

    pub fn pactl_present(&self) -> bool {
        self.pactl_present
    }

    /// Resolves prosody: voice-config lookup, then per-request overrides on
    /// top, with defaults filling everything else. `voice_id` outranks
    /// `voice_name` when a request carries both.
    pub fn resolve_voice(&self, request: &SpeakRequest) -> ResolvedVoice {
        let name = request
            .voice_id
            .as_deref()
            .or(request.voice_name.as_deref())
            .unwrap_or(&self.default_voice_id);

        let mut settings = self.default_settings.clone();
        let mut id = name.to_string();
        let mut volume = None;
        let mut style_directive = None;

        if let Some(config) = self.voices.get(name) {
            settings.apply(&config.settings);
            volume = config.volume;
            style_directive = config.description.clone();
            if let Some(upstream) = &config.voice_id {
                id = upstream.clone();
            }
        }

        settings.apply(&request.overrides);
        ResolvedVoice {
            id,
            settings,
            volume: request.volume.or(volume).unwrap_or(1.0),
            style_directive,
        }
    }

    /// Speaks one request: primary engine first, then one pass over the
    /// fallback chain. Returns `Err` only when every path failed.
    pub async fn speak(&self, request: &SpeakRequest) -> Result<(), VoiceError> {
        let Some(primary) = self.selection else {
            tracing::debug!("no engine selected, dropping utterance");
            return Ok(());
        };

        let speech = text::prepare_for_speech(&request.message, &self.pronunciations);
        if speech.is_empty() {
            return Ok(());
        }
        let voice = self.resolve_voice(request);

        let mut last_error = match self.speak_with(primary, &speech, &voice).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(engine = primary.name(), error = %e, "primary engine failed");
                e
            }
        };

        for engine in FALLBACK_CHAIN {
            if engine == primary || !self.is_available(engine) {
                continue;
            }
            match self.speak_with(engine, &speech, &voice).await {
                Ok(()) => {
                    tracing::info!(engine = engine.name(), "fallback engine succeeded");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(engine = engine.name(), error = %e, "fallback engine failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn is_available(&self, engine: TtsEngine) -> bool {
        match engine {
            TtsEngine::ElevenLabs => self.elevenlabs.is_some(),
            TtsEngine::Piper => self.piper.is_some(),
            TtsEngine::Qwen => self.qwen.is_some(),
            TtsEngine::System => self.system.is_some(),
        }
    }

    async fn speak_with(
        &self,
        engine: TtsEngine,
        speech: &str,
        voice: &ResolvedVoice,
    ) -> Result<(), VoiceError> {
        match engine {
            TtsEngine::ElevenLabs => {
                let client = self.require(self.elevenlabs.as_ref(), engine)?;
                let bytes = client.synthesize(speech, &voice.id, &voice.settings).await?;
                self.player.play(&bytes, AudioFormat::Mp3, voice.volume).await
            }
            TtsEngine::Piper => {
                let piper = self.require(self.piper.as_ref(), engine)?;
                let bytes = piper.synthesize(speech).await?;
                self.player.play(&bytes, AudioFormat::Wav, voice.volume).await
            }
            TtsEngine::Qwen => self.speak_progressive(speech, voice).await,
            TtsEngine::System => {
                let system = self.require(self.system.as_ref(), engine)?;
                system.speak(speech).await
            }
        }
    }

    /// Qwen path: sentence-split and pipeline generation against playback.
    /// A single sentence takes the plain synthesize-then-play path.
    async fn speak_progressive(
        &self,
        speech: &str,
        voice: &ResolvedVoice,
    ) -> Result<(), VoiceError> {
        let qwen = self.require(self.qwen.as_ref(), TtsEngine::Qwen)?;
        let instruct = voice.style_directive.as_deref();

        let sentences = text::split_sentences(speech);
        if sentences.len() <= 1 {
            let bytes = qwen.generate(speech, None, instruct).await?;
            return self.player.play(&bytes, AudioFormat::Wav, voice.volume).await;
        }

        let volume = voice.volume;
        pipeline::run(
            sentences,
            |_index, sentence| async move { qwen.generate(&sentence, None, instruct).await },
            |_index, buffer| async move {
                self.player.play(&buffer, AudioFormat::Wav, volume).await
            },
        )
        .await
        .into_result()
    }

    fn require<'a, T>(&self, backend: Option<&'a T>, engine: TtsEngine) -> Result<&'a T, VoiceError> {
        backend.ok_or_else(|| VoiceError::Unavailable(format!("{} not initialised", engine.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> EngineAvailability {
        EngineAvailability {
            elevenlabs: true,
            piper: true,
            qwen: true,
            system: true,
        }
    }

    #[test]
    fn cloud_outranks_everything_when_configured() {
        assert_eq!(
            select_engine(all(), Some(LocalEngine::Piper)),
            Some(TtsEngine::ElevenLabs)
        );
    }

    #[test]
    fn requested_engine_wins_without_cloud() {
        let available = EngineAvailability {
            elevenlabs: false,
            ..all()
        };
        assert_eq!(
            select_engine(available, Some(LocalEngine::Qwen)),
            Some(TtsEngine::Qwen)
        );
    }

    #[test]
    fn requested_but_unavailable_falls_through_to_auto_detection() {
        let available = EngineAvailability {
            elevenlabs: false,
            qwen: false,
            ..all()
        };
        assert_eq!(
            select_engine(available, Some(LocalEngine::Qwen)),
            Some(TtsEngine::Piper)
        );
    }

    #[test]
    fn auto_detection_order_is_piper_qwen_system() {
        let mut available = EngineAvailability {
            elevenlabs: false,
            ..all()
        };
        assert_eq!(select_engine(available, None), Some(TtsEngine::Piper));
        available.piper = false;
        assert_eq!(select_engine(available, None), Some(TtsEngine::Qwen));
        available.qwen = false;
        assert_eq!(select_engine(available, None), Some(TtsEngine::System));
        available.system = false;
        assert_eq!(select_engine(available, None), None);
    }

    fn bare_speaker(voices: HashMap<String, VoiceConfig>) -> Speaker {
        Speaker {
            selection: None,
            elevenlabs: None,
            piper: None,
            qwen: None,
            system: None,
            player: AudioPlayer::from_probes(&Probes {
                wav_player: None,
                mp3_player: None,
                speech_tool: None,
                piper: false,
                pactl: false,
            }),
            default_voice_id: "default-voice".to_string(),
            default_settings: VoiceSettings::default(),
            voices,
            pronunciations: Pronunciations::default(),
            wav_player_binary: None,
            pactl_present: false,
        }
    }

    #[test]
    fn resolve_voice_layers_config_then_request_overrides() {
        let mut voices = HashMap::new();
        voices.insert(
            "ava".to_string(),
            VoiceConfig {
                voice_id: Some("upstream-ava".to_string()),
                settings: VoiceOverrides {
                    stability: Some(0.3),
                    style: Some(0.6),
                    ..VoiceOverrides::default()
                },
                volume: Some(0.7),
                description: Some("calm narrator".to_string()),
            },
        );
        let speaker = bare_speaker(voices);

        let resolved = speaker.resolve_voice(&SpeakRequest {
            message: "hi".to_string(),
            voice_name: Some("ava".to_string()),
            overrides: VoiceOverrides {
                style: Some(0.9),
                ..VoiceOverrides::default()
            },
            ..SpeakRequest::default()
        });

        assert_eq!(resolved.id, "upstream-ava");
        // Request override beats voice config.
        assert_eq!(resolved.settings.style, 0.9);
        // Voice config beats defaults.
        assert_eq!(resolved.settings.stability, 0.3);
        // Defaults fill the rest.
        assert_eq!(resolved.settings.similarity_boost, 0.75);
        assert_eq!(resolved.volume, 0.7);
        assert_eq!(resolved.style_directive.as_deref(), Some("calm narrator"));
    }

    #[test]
    fn voice_id_outranks_voice_name() {
        let speaker = bare_speaker(HashMap::new());
        let resolved = speaker.resolve_voice(&SpeakRequest {
            voice_id: Some("explicit-id".to_string()),
            voice_name: Some("ava".to_string()),
            ..SpeakRequest::default()
        });
        assert_eq!(resolved.id, "explicit-id");
    }

    #[test]
    fn unknown_voice_uses_defaults_and_request_volume() {
        let speaker = bare_speaker(HashMap::new());
        let resolved = speaker.resolve_voice(&SpeakRequest {
            volume: Some(0.4),
            ..SpeakRequest::default()
        });
        assert_eq!(resolved.id, "default-voice");
        assert_eq!(resolved.settings, VoiceSettings::default());
        assert_eq!(resolved.volume, 0.4);
    }

    #[tokio::test]
    async fn exhausted_fallback_chain_reports_the_last_error() {
        let mut speaker = bare_speaker(HashMap::new());
        // Selected at start-up, gone at request time: every chain entry is
        // unavailable, so the error surfaces to the queue worker's log.
        speaker.selection = Some(TtsEngine::Qwen);
        let result = speaker
            .speak(&SpeakRequest {
                message: "Hello there.".to_string(),
                ..SpeakRequest::default()
            })
            .await;
        assert!(matches!(result, Err(VoiceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn speak_without_engine_resolves_silently() {
        let speaker = bare_speaker(HashMap::new());
        let result = speaker
            .speak(&SpeakRequest {
                message: "Build complete.".to_string(),
                ..SpeakRequest::default()
            })
            .await;
        assert!(result.is_ok());
    }
}
