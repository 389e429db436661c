use serde::{Deserialize, Serialize};

/// Documented parameter ranges (§6). Concrete bounds for the provider in use.
pub const TTS_PITCH_MIN: i32 = -12;
pub const TTS_PITCH_MAX: i32 = 12;
pub const TTS_SPEED_MIN: f32 = 0.5;
pub const TTS_SPEED_MAX: f32 = 2.0;

pub const EMOTIONS: &[&str] = &[
    "neutral", "happy", "sad", "angry", "fearful", "disgusted", "surprised",
];

pub const LANGUAGE_BOOSTS: &[&str] = &[
    "auto", "english", "chinese", "japanese", "korean", "french", "german", "spanish",
];

/// Fully-resolved voice parameters attached to a work item at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice_id: String,
    pub pitch: i32,
    pub speed: f32,
    pub emotion: String,
    pub language_boost: String,
    pub english_normalization: bool,
    pub volume: f32,
    pub sample_rate: u32,
    pub bitrate: u32,
    pub channel: ChannelCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
}

impl ChannelCount {
    pub fn as_wire(self) -> &'static str {
        match self {
            ChannelCount::Mono => "1",
            ChannelCount::Stereo => "2",
        }
    }
}

impl VoiceParams {
    /// System defaults, lowest in the precedence chain (§4.1).
    pub fn system_default() -> Self {
        Self {
            voice_id: "Wise_Woman".to_string(),
            pitch: 0,
            speed: 1.0,
            emotion: "neutral".to_string(),
            language_boost: "auto".to_string(),
            english_normalization: false,
            volume: 1.0,
            sample_rate: 32_000,
            bitrate: 128_000,
            channel: ChannelCount::Mono,
        }
    }
}

/// Maps legacy values recorded in §6's parameter-range note.
pub fn normalize_language_boost(raw: &str) -> String {
    match raw {
        "None" | "Automatic" => "auto".to_string(),
        other => other.to_string(),
    }
}

/// "auto" is not a valid emotion tag; it collapses to "neutral".
pub fn normalize_emotion(raw: &str) -> String {
    if raw.eq_ignore_ascii_case("auto") {
        "neutral".to_string()
    } else {
        raw.to_string()
    }
}

/// A partial override of voice parameters, as supplied by per-call overrides,
/// viewer preferences, or channel defaults. Every field optional so precedence
/// resolution (§4.1) can fall through independently per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceOverride {
    pub voice_id: Option<String>,
    pub pitch: Option<i32>,
    pub speed: Option<f32>,
    pub emotion: Option<String>,
    pub language_boost: Option<String>,
    pub english_normalization: Option<bool>,
}

impl VoiceOverride {
    /// Apply `self` on top of `base`, taking `self`'s fields when present.
    pub fn layer_over(&self, base: VoiceParams) -> VoiceParams {
        VoiceParams {
            voice_id: self.voice_id.clone().unwrap_or(base.voice_id),
            pitch: self.pitch.unwrap_or(base.pitch),
            speed: self.speed.unwrap_or(base.speed),
            emotion: self.emotion.clone().unwrap_or(base.emotion),
            language_boost: self.language_boost.clone().unwrap_or(base.language_boost),
            english_normalization: self
                .english_normalization
                .unwrap_or(base.english_normalization),
            ..base
        }
    }

    pub fn is_empty(&self) -> bool {
        self.voice_id.is_none()
            && self.pitch.is_none()
            && self.speed.is_none()
            && self.emotion.is_none()
            && self.language_boost.is_none()
            && self.english_normalization.is_none()
    }
}

/// Resolve a fully layered [`VoiceParams`] from highest-to-lowest precedence
/// overrides, per the table in §4.1. Each layer is applied in order so a
/// missing field at a higher layer falls through to the next.
pub fn resolve_voice_params(layers: &[&VoiceOverride]) -> VoiceParams {
    let mut params = VoiceParams::system_default();
    for layer in layers.iter().rev() {
        params = layer.layer_over(params);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layering_falls_through_missing_fields() {
        let call_override = VoiceOverride {
            voice_id: Some("Custom".into()),
            ..Default::default()
        };
        let viewer_pref = VoiceOverride {
            pitch: Some(5),
            voice_id: Some("ViewerVoice".into()),
            ..Default::default()
        };
        let channel_default = VoiceOverride {
            speed: Some(1.5),
            ..Default::default()
        };

        let resolved = resolve_voice_params(&[&call_override, &viewer_pref, &channel_default]);
        assert_eq!(resolved.voice_id, "Custom");
        assert_eq!(resolved.pitch, 5);
        assert_eq!(resolved.speed, 1.5);
        assert_eq!(resolved.emotion, "neutral");
    }

    #[test]
    fn no_overrides_yields_system_default() {
        let resolved = resolve_voice_params(&[]);
        assert_eq!(resolved, VoiceParams::system_default());
    }

    #[test]
    fn normalize_language_boost_maps_legacy_values() {
        assert_eq!(normalize_language_boost("None"), "auto");
        assert_eq!(normalize_language_boost("Automatic"), "auto");
        assert_eq!(normalize_language_boost("french"), "french");
    }

    #[test]
    fn normalize_emotion_maps_auto_to_neutral() {
        assert_eq!(normalize_emotion("auto"), "neutral");
        assert_eq!(normalize_emotion("happy"), "happy");
    }
}
