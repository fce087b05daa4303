//! Turning recognized score text into numbers, and settling on a value when
//! recognition is noisy across frames.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Score;

/// More observations than this start a fresh window.
pub const STABILIZER_WINDOW: usize = 10;

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,.]").expect("invalid separator regex"));

fn strip_separators(text: &str) -> String {
    SEPARATORS.replace_all(text.trim(), "").into_owned()
}

/// Numeric value of a score as printed by the cabinet (`"1,234,560"`).
/// Unparseable text counts as zero.
pub fn normalize_score_text(text: &str) -> i64 {
    strip_separators(text).parse().unwrap_or(0)
}

/// Parse a candidate from recognized text: thousands separators and spaces
/// are dropped and leading zeros are ignored. Only positive values count as
/// a score.
pub fn parse_recognized_score(text: &str) -> Option<i64> {
    let digits = strip_separators(text);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok().filter(|value: &i64| *value > 0)
}

/// Tracks candidate values across frames and suggests the one seen most often.
#[derive(Debug, Default, Clone)]
pub struct ScoreStabilizer {
    counts: HashMap<i64, usize>,
    observed: usize,
    suggestion: Option<i64>,
}

impl ScoreStabilizer {
    /// Empty stabilizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate and return the current suggestion.
    ///
    /// A value becomes the suggestion once it has been seen more than once and
    /// more often than any other. The counts start over after
    /// [`STABILIZER_WINDOW`] observations but the last suggestion is kept.
    pub fn observe(&mut self, candidate: i64) -> Option<i64> {
        *self.counts.entry(candidate).or_default() += 1;
        self.observed += 1;

        if let Some(best) = self.most_frequent() {
            self.suggestion = Some(best);
        }
        if self.observed > STABILIZER_WINDOW {
            self.counts.clear();
            self.observed = 0;
        }
        self.suggestion
    }

    /// Parse recognized text and observe it when it is a number.
    pub fn observe_text(&mut self, text: &str) -> Option<i64> {
        match parse_recognized_score(text) {
            Some(candidate) => self.observe(candidate),
            None => self.suggestion,
        }
    }

    /// Current suggestion.
    pub fn suggestion(&self) -> Option<i64> {
        self.suggestion
    }

    /// Forget everything, including the suggestion.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.observed = 0;
        self.suggestion = None;
    }

    fn most_frequent(&self) -> Option<i64> {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then(a.cmp(b)))
            .map(|(value, _)| *value)
    }
}

/// A score entered by hand (or accepted from capture) for the owner.
pub fn manual_score(owner: &str, value: i64) -> Score {
    Score::new(owner, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_text() {
        assert_eq!(parse_recognized_score("1,234,560"), Some(1_234_560));
        assert_eq!(parse_recognized_score(" 00 12 500 "), Some(12_500));
        assert_eq!(parse_recognized_score("1.000.000"), Some(1_000_000));
        assert_eq!(parse_recognized_score("0000"), None);
        assert_eq!(parse_recognized_score("GAME OVER"), None);
        assert_eq!(parse_recognized_score(""), None);
    }

    #[test]
    fn rejects_signed_readings() {
        assert_eq!(parse_recognized_score("-1,000"), None);
        assert_eq!(parse_recognized_score("-0"), None);
        assert_eq!(parse_recognized_score("+500"), Some(500));

        let mut stabilizer = ScoreStabilizer::new();
        stabilizer.observe_text("-1,000");
        assert_eq!(stabilizer.observe_text("-1 000"), None);
    }

    #[test]
    fn normalizes_cabinet_text() {
        assert_eq!(normalize_score_text("12,345,670"), 12_345_670);
        assert_eq!(normalize_score_text("0"), 0);
        assert_eq!(normalize_score_text("??"), 0);
    }

    #[test]
    fn single_observation_is_not_a_suggestion() {
        let mut stabilizer = ScoreStabilizer::new();
        assert_eq!(stabilizer.observe(100), None);
        assert_eq!(stabilizer.observe(200), None);
        assert_eq!(stabilizer.observe(100), Some(100));
        assert_eq!(stabilizer.observe(200), Some(200));
        assert_eq!(stabilizer.observe(200), Some(200));
    }

    #[test]
    fn window_resets_counts_but_keeps_suggestion() {
        let mut stabilizer = ScoreStabilizer::new();
        for _ in 0..=STABILIZER_WINDOW {
            stabilizer.observe(42);
        }
        assert_eq!(stabilizer.suggestion(), Some(42));

        // fresh window: one sighting of 7 is not enough to replace 42
        assert_eq!(stabilizer.observe(7), Some(42));
        assert_eq!(stabilizer.observe(7), Some(7));

        stabilizer.reset();
        assert_eq!(stabilizer.suggestion(), None);
    }

    #[test]
    fn observe_text_ignores_noise() {
        let mut stabilizer = ScoreStabilizer::new();
        stabilizer.observe_text("1,000");
        stabilizer.observe_text("l,OOO");
        assert_eq!(stabilizer.observe_text("1 000"), Some(1000));
        assert_eq!(manual_score("AAA", 1000).initials, "AAA");
    }
}
