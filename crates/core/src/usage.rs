//! Usage Metrics
//!
//! Voice substrates report what a session consumed (model tokens, synthesized
//! characters, transcribed audio) as `SessionMetrics` events. The
//! orchestrator folds them into a `UsageSummary` that is logged when the
//! session shuts down.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A single "metrics collected" event emitted by the voice substrate.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMetrics {
    /// One language-model request.
    Llm {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// One text-to-speech request.
    Tts {
        characters: u32,
        audio_duration: Duration,
    },
    /// One speech-to-text segment.
    Stt { audio_duration: Duration },
}

/// Totals over every event collected during a session.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct UsageSummary {
    pub llm_requests: u64,
    pub llm_prompt_tokens: u64,
    pub llm_completion_tokens: u64,
    pub tts_characters: u64,
    pub tts_audio_duration_secs: f64,
    pub stt_audio_duration_secs: f64,
}

impl fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "llm_requests={} llm_prompt_tokens={} llm_completion_tokens={} tts_characters={} tts_audio_duration={:.2}s stt_audio_duration={:.2}s",
            self.llm_requests,
            self.llm_prompt_tokens,
            self.llm_completion_tokens,
            self.tts_characters,
            self.tts_audio_duration_secs,
            self.stt_audio_duration_secs,
        )
    }
}

#[derive(Debug, Default)]
pub struct UsageCollector {
    summary: UsageSummary,
}

impl UsageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&mut self, metrics: &SessionMetrics) {
        let s = &mut self.summary;
        match metrics {
            SessionMetrics::Llm {
                prompt_tokens,
                completion_tokens,
            } => {
                s.llm_requests += 1;
                s.llm_prompt_tokens += u64::from(*prompt_tokens);
                s.llm_completion_tokens += u64::from(*completion_tokens);
            }
            SessionMetrics::Tts {
                characters,
                audio_duration,
            } => {
                s.tts_characters += u64::from(*characters);
                s.tts_audio_duration_secs += audio_duration.as_secs_f64();
            }
            SessionMetrics::Stt { audio_duration } => {
                s.stt_audio_duration_secs += audio_duration.as_secs_f64();
            }
        }
    }

    pub fn summary(&self) -> UsageSummary {
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_aggregates_all_kinds() {
        let mut collector = UsageCollector::new();
        collector.collect(&SessionMetrics::Llm {
            prompt_tokens: 100,
            completion_tokens: 20,
        });
        collector.collect(&SessionMetrics::Llm {
            prompt_tokens: 50,
            completion_tokens: 5,
        });
        collector.collect(&SessionMetrics::Tts {
            characters: 42,
            audio_duration: Duration::from_millis(1500),
        });
        collector.collect(&SessionMetrics::Stt {
            audio_duration: Duration::from_secs(2),
        });

        let summary = collector.summary();
        assert_eq!(summary.llm_requests, 2);
        assert_eq!(summary.llm_prompt_tokens, 150);
        assert_eq!(summary.llm_completion_tokens, 25);
        assert_eq!(summary.tts_characters, 42);
        assert!((summary.tts_audio_duration_secs - 1.5).abs() < f64::EPSILON);
        assert!((summary.stt_audio_duration_secs - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary_display() {
        let summary = UsageCollector::new().summary();
        assert_eq!(summary, UsageSummary::default());
        assert!(summary.to_string().starts_with("llm_requests=0"));
    }
}
