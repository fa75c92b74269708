//! Chapter candidates: the ordered list of chapters to locate in the audio.
//!
//! Chapter text itself comes from an external extractor as [`ChapterText`] records. This
//! module turns those into [`ChapterCandidate`]s:
//! - a search phrase built from the chapter's opening paragraphs
//! - a text position (cumulative narrated words before the chapter) for velocity prediction
//! - the exclusion flag from the review step

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::opts::PhraseOpts;
use crate::{Error, Result};

/// One chapter as produced by the external text extractor, in narrative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterText {
    pub id: usize,
    pub title: String,
    /// Chapter paragraphs in reading order (headings may be included; they are skipped
    /// when building the search phrase).
    pub paragraphs: Vec<String>,
}

/// A chapter whose narration start we want to locate.
///
/// Immutable once built; `excluded` comes from the review step before search begins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterCandidate {
    pub id: usize,
    pub title: String,
    pub search_phrase: String,
    /// Narrated words preceding this chapter (excluded chapters do not count).
    pub text_position: f64,
    pub word_count: usize,
    pub excluded: bool,
}

/// Build the ordered candidate list from extracted chapter text.
///
/// Chapters without a usable opening paragraph are dropped (image pages, empty sections).
/// Chapters listed in `excluded_ids` keep their slot but do not advance the text position,
/// since maps, indexes and credits are not narrated.
///
/// Fails with [`Error::NoChapters`] if nothing searchable remains.
pub fn build_candidates(
    texts: &[ChapterText],
    excluded_ids: &HashSet<usize>,
    opts: &PhraseOpts,
) -> Result<Vec<ChapterCandidate>> {
    let mut candidates = Vec::with_capacity(texts.len());
    let mut position = 0usize;

    for text in texts {
        let excluded = excluded_ids.contains(&text.id);
        let word_count = text
            .paragraphs
            .iter()
            .map(|p| p.split_whitespace().count())
            .sum::<usize>();

        let Some(search_phrase) = build_search_phrase(&text.paragraphs, opts) else {
            warn!(chapter_id = text.id, title = %text.title, "no usable opening paragraph; skipping");
            continue;
        };

        let here = position;
        if !excluded {
            position += word_count;
        }

        debug!(chapter_id = text.id, words = word_count, position = here, excluded, "candidate");
        candidates.push(ChapterCandidate {
            id: text.id,
            title: text.title.clone(),
            search_phrase,
            text_position: here as f64,
            word_count,
            excluded,
        });
    }

    if candidates.iter().all(|c| c.excluded) {
        return Err(Error::NoChapters);
    }

    Ok(candidates)
}

/// Total narrated words across the non-excluded candidates.
pub fn narrated_words(candidates: &[ChapterCandidate]) -> f64 {
    candidates
        .iter()
        .filter(|c| !c.excluded)
        .map(|c| c.word_count as f64)
        .sum()
}

/// Build a search phrase from a chapter's opening paragraphs.
///
/// Short paragraphs are combined so the phrase is unlikely to recur elsewhere in the book.
pub fn build_search_phrase(paragraphs: &[String], opts: &PhraseOpts) -> Option<String> {
    let mut valid = paragraphs
        .iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| p.chars().count() > opts.min_paragraph_chars);

    let mut phrase = valid.next()?;
    while phrase.chars().count() < opts.min_phrase_chars {
        let Some(next) = valid.next() else {
            break;
        };
        phrase.push(' ');
        phrase.push_str(&next);
    }

    Some(truncate_at_word(&phrase, opts.max_phrase_chars))
}

/// Truncate to `limit` characters, extended to the next whitespace so no word is cut.
fn truncate_at_word(text: &str, limit: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return text.to_owned();
    }

    let mut end = limit;
    while end < chars.len() && !chars[end].is_whitespace() {
        end += 1;
    }
    chars[..end].iter().collect()
}
