//! Teach-back scoring.
//!
//! A deliberately crude keyword-overlap heuristic: the reference text of a
//! topic yields up to twelve keywords, and the answer is scored by how many of
//! them it contains. There is no semantic matching and no synonym handling.

use std::collections::HashSet;
use std::fmt;

/// Keywords are distinct tokens strictly longer than this many characters.
const MIN_KEYWORD_CHARS: usize = 3;
/// At most this many keywords are taken from the reference text.
const MAX_KEYWORDS: usize = 12;

/// Feedback tier derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackBand {
    Strong,
    Partial,
    Weak,
}

impl FeedbackBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            8.. => FeedbackBand::Strong,
            5..=7 => FeedbackBand::Partial,
            _ => FeedbackBand::Weak,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FeedbackBand::Strong => "Great, clear and covers main points.",
            FeedbackBand::Partial => {
                "Good, covers some points; try adding a short example or definition."
            }
            FeedbackBand::Weak => "Needs improvement, try a short definition and an example.",
        }
    }
}

/// Outcome of scoring one teach-back answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeachBackScore {
    /// Always within `1..=10`.
    pub score: u8,
    pub band: FeedbackBand,
    pub matched: usize,
    pub keyword_count: usize,
}

impl fmt::Display for TeachBackScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (score: {}/10)", self.band.message(), self.score)
    }
}

/// Extracts the keyword list from `reference`.
///
/// Tokens are lower-cased and split on whitespace; punctuation stays attached.
/// Ties for the twelve slots are broken by order of first appearance.
pub fn extract_keywords(reference: &str) -> Vec<String> {
    let lowered = reference.to_lowercase();
    let mut seen = HashSet::new();
    lowered
        .split_whitespace()
        .filter(|token| token.chars().count() > MIN_KEYWORD_CHARS)
        .filter(|token| seen.insert(*token))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// `numerator / denominator` rounded to the nearest integer, ties to even.
fn round_half_even(numerator: usize, denominator: usize) -> usize {
    let quotient = numerator / denominator;
    let twice_remainder = (numerator % denominator) * 2;
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}

/// Scores `answer` against `reference`.
pub fn score_teachback(reference: &str, answer: &str) -> TeachBackScore {
    let keywords = extract_keywords(reference);
    let answer = answer.to_lowercase();
    let matched = keywords
        .iter()
        .filter(|kw| answer.contains(kw.as_str()))
        .count();
    let total = keywords.len().max(1);

    let score = round_half_even(matched * 10, total).clamp(1, 10) as u8;

    TeachBackScore {
        score,
        band: FeedbackBand::for_score(score),
        matched,
        keyword_count: keywords.len(),
    }
}
