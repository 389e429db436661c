use serde::{Deserialize, Serialize};

/// Frames sent from the gateway to overlay WebSocket clients (§4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OverlayFrame {
    #[serde(rename = "registered")]
    Registered {
        channel: String,
        message: String,
    },
    #[serde(rename = "playAudio")]
    PlayAudio { url: String },
    #[serde(rename = "stopAudio")]
    StopAudio,
}

impl OverlayFrame {
    pub fn registered(channel: impl Into<String>) -> Self {
        Self::Registered {
            channel: channel.into(),
            message: "connected".to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_audio_serializes_with_tag() {
        let frame = OverlayFrame::PlayAudio { url: "https://x/y.mp3".into() };
        let json = frame.to_json();
        assert!(json.contains("\"type\":\"playAudio\""));
        assert!(json.contains("https://x/y.mp3"));
    }

    #[test]
    fn stop_audio_serializes_without_payload() {
        let json = OverlayFrame::StopAudio.to_json();
        assert_eq!(json, "{\"type\":\"stopAudio\"}");
    }
}
