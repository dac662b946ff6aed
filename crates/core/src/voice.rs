use crate::state::Mode;
use serde::Serialize;

/// Synthesis parameters sent to the text-to-speech provider.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    pub voice: &'static str,
    pub style: &'static str,
}

/// Fixed mapping from tutoring mode to synthesis voice.
pub fn voice_for(mode: Mode) -> VoiceProfile {
    match mode {
        Mode::Learn => VoiceProfile {
            voice: "en-US-matthew",
            style: "Promo",
        },
        Mode::Quiz => VoiceProfile {
            voice: "en-US-alicia",
            style: "Conversation",
        },
        Mode::TeachBack => VoiceProfile {
            voice: "en-US-ken",
            style: "Conversational",
        },
    }
}

impl Default for VoiceProfile {
    fn default() -> Self {
        voice_for(Mode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_map() {
        assert_eq!(voice_for(Mode::Learn).voice, "en-US-matthew");
        assert_eq!(voice_for(Mode::Learn).style, "Promo");
        assert_eq!(voice_for(Mode::Quiz).voice, "en-US-alicia");
        assert_eq!(voice_for(Mode::Quiz).style, "Conversation");
        assert_eq!(voice_for(Mode::TeachBack).voice, "en-US-ken");
        assert_eq!(voice_for(Mode::TeachBack).style, "Conversational");
    }

    #[test]
    fn test_default_profile_is_learn_voice() {
        assert_eq!(VoiceProfile::default(), voice_for(Mode::Learn));
    }
}
