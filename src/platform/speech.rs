//! Speech synthesizers that need no speech engine.

use super::{PlatformError, SpeechSynthesizer, Utterance, Voice};

/// Writes each utterance to the tracing sink.
#[derive(Clone, Debug)]
pub struct LogSpeech {
    voices: Vec<Voice>,
}

impl LogSpeech {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }
}

impl Default for LogSpeech {
    fn default() -> Self {
        Self::new(vec![Voice::new("Temple Female", "en-US")])
    }
}

impl SpeechSynthesizer for LogSpeech {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<(), PlatformError> {
        let voice = utterance.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default");
        tracing::info!(
            voice,
            volume = utterance.volume,
            rate = utterance.rate,
            pitch = utterance.pitch,
            "whisper: {}",
            utterance.text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_voice_is_english_female() {
        let speech = LogSpeech::default();
        let picked = crate::platform::pick_whisper_voice(&speech.voices()).unwrap();
        assert!(picked.name.contains("Female"));
        assert!(picked.lang.starts_with("en"));
    }

    #[test]
    fn speaking_always_succeeds() {
        let speech = LogSpeech::new(Vec::new());
        let utterance = Utterance {
            text: "The Oracle awakens...".into(),
            volume: 0.3,
            rate: 0.6,
            pitch: 0.8,
            voice: None,
        };
        assert_eq!(speech.speak(utterance), Ok(()));
    }
}
