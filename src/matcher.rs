//! Fuzzy matching of a chapter's search phrase against a window transcription.
//!
//! Transcriptions of effects-laden audio reliably get some words wrong, so we never look for
//! an exact match. Instead both strings are normalized and the phrase is aligned against the
//! transcription at every word start, scoring each alignment with a normalized Levenshtein
//! similarity.
//!
//! Alignments that run off either edge of the transcription are still scored, against the
//! matching prefix/suffix of the phrase and scaled by how much of the phrase they cover. They
//! tell the search which way to move when the window only clips the phrase.

use serde::Serialize;
use strsim::normalized_levenshtein;

/// Where the strongest partial evidence for the phrase sits relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Lean {
    /// The transcription opens with the tail of the phrase: it began before the window.
    Before,
    /// The best alignment starts at this fraction of the window.
    At(f64),
}

/// Result of matching one search phrase against one transcription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    /// Similarity in `[0, 1]`; `1.0` means the phrase appears verbatim (after normalization).
    pub score: f64,
    /// Fraction of the window at which the phrase begins. Only set when `score` clears the
    /// acceptance threshold.
    pub estimated_offset: Option<f64>,
    pub lean: Lean,
}

impl MatchResult {
    fn nothing() -> Self {
        Self {
            score: 0.0,
            estimated_offset: None,
            lean: Lean::At(0.0),
        }
    }
}

/// Scores a search phrase against window transcriptions.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    acceptance_threshold: f64,
}

impl FuzzyMatcher {
    pub fn new(acceptance_threshold: f64) -> Self {
        Self {
            acceptance_threshold,
        }
    }

    pub fn acceptance_threshold(&self) -> f64 {
        self.acceptance_threshold
    }

    /// Match `search_phrase` against `transcription`.
    pub fn match_phrase(&self, search_phrase: &str, transcription: &str) -> MatchResult {
        let phrase: Vec<char> = normalize(search_phrase).chars().collect();
        let text: Vec<char> = normalize(transcription).chars().collect();
        if phrase.is_empty() || text.is_empty() {
            return MatchResult::nothing();
        }

        let (score, start) = best_alignment(&phrase, &text);
        let before = best_head_alignment(&phrase, &text);

        // Each word owns the separator after it, so evenly paced speech maps evenly onto
        // the window.
        let offset = start as f64 / (text.len() + 1) as f64;
        let lean = if before > score {
            Lean::Before
        } else {
            Lean::At(offset)
        };

        MatchResult {
            score,
            estimated_offset: (score >= self.acceptance_threshold).then_some(offset),
            lean,
        }
    }
}

/// Case-fold, drop punctuation, and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else if c.is_whitespace() || !is_intra_word(c) {
            pending_space = true;
        }
    }

    out
}

// Apostrophes inside words ("don't") are dropped rather than split on, so transcripts that
// omit them still line up with the book text.
fn is_intra_word(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}')
}

/// Best alignment of `phrase` starting at any word start of `text`.
///
/// Returns `(score, char_index)`. Alignments that run past the end of `text` compare the
/// available text with the phrase prefix and are scaled by coverage.
fn best_alignment(phrase: &[char], text: &[char]) -> (f64, usize) {
    let mut best = (0.0, 0);

    for start in word_starts(text) {
        let available = text.len() - start;
        let score = if available >= phrase.len() {
            similarity(phrase, &text[start..start + phrase.len()])
        } else {
            let coverage = available as f64 / phrase.len() as f64;
            similarity(&phrase[..available], &text[start..]) * coverage
        };

        if score > best.0 {
            best = (score, start);
        }
    }

    best
}

/// Best evidence that `text` opens partway through `phrase`.
///
/// Compares each word-aligned prefix of `text` shorter than the phrase with the phrase
/// suffix of the same length, scaled by coverage.
fn best_head_alignment(phrase: &[char], text: &[char]) -> f64 {
    let mut best = 0.0f64;

    for end in word_ends(text) {
        if end >= phrase.len() {
            break;
        }
        let coverage = end as f64 / phrase.len() as f64;
        let score = similarity(&phrase[phrase.len() - end..], &text[..end]) * coverage;
        best = best.max(score);
    }

    best
}

fn similarity(a: &[char], b: &[char]) -> f64 {
    let a: String = a.iter().collect();
    let b: String = b.iter().collect();
    normalized_levenshtein(&a, &b)
}

fn word_starts(text: &[char]) -> impl Iterator<Item = usize> + '_ {
    (0..text.len()).filter(move |&i| text[i] != ' ' && (i == 0 || text[i - 1] == ' '))
}

fn word_ends(text: &[char]) -> impl Iterator<Item = usize> + '_ {
    (1..=text.len()).filter(move |&i| text[i - 1] != ' ' && (i == text.len() || text[i] == ' '))
}
