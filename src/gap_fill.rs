//! Re-searching chapters that a previous run left without a timestamp.
//!
//! Each gap is bounded by its nearest confirmed neighbours, so a retry can only land
//! between them, and the prediction comes from the reading rate observed across the gap.

use tracing::{info, info_span, warn};

use crate::Result;
use crate::chapter::{ChapterCandidate, narrated_words};
use crate::controller::BoundarySearch;
use crate::report::{ChapterRecord, ChapterStatus};
use crate::sampler::WindowSampler;
use crate::transcriber::Transcriber;
use crate::velocity::VelocityModel;
use crate::window::SearchBounds;

/// Searching starts this far after the previous confirmed chapter.
pub const GAP_LEAD_SECONDS: f64 = 5.0;

/// Gaps narrower than this are not searched.
pub const MIN_GAP_SECONDS: f64 = 10.0;

impl<S: WindowSampler, T: Transcriber> BoundarySearch<S, T> {
    /// Fill in `records` that have no timestamp, in place.
    ///
    /// Records are matched to candidates by `chapter_id`, or by title when the record has
    /// none (rows read back from markdown). Returns the number of records filled.
    pub fn fill_missing(
        &mut self,
        records: &mut [ChapterRecord],
        candidates: &[ChapterCandidate],
    ) -> Result<usize> {
        let duration = self.sampler().duration_seconds();
        let total_text = narrated_words(candidates);
        let mut filled = 0;

        for i in 0..records.len() {
            let record = &records[i];
            if record.seconds.is_some() || record.status == ChapterStatus::Excluded {
                continue;
            }
            if self.cancel_token().is_cancelled() {
                warn!("cancelled; leaving remaining gaps unfilled");
                break;
            }

            let Some(chapter) = find_candidate(record, candidates).filter(|c| !c.excluded) else {
                warn!(title = %record.title, "no searchable chapter matches record; skipping");
                continue;
            };

            let prev = records[..i]
                .iter()
                .rev()
                .find_map(|r| r.seconds.map(|s| (anchor_position(r, candidates), s)));
            let next = records[i + 1..]
                .iter()
                .find_map(|r| r.seconds.map(|s| (anchor_position(r, candidates), s)));

            let start = prev.map_or(0.0, |(_, s)| s + GAP_LEAD_SECONDS);
            let end = next.map_or(duration, |(_, s)| s.min(duration));
            if end - start < MIN_GAP_SECONDS {
                warn!(title = %chapter.title, start, end, "gap too narrow; skipping");
                continue;
            }
            let bounds = SearchBounds::new(start, end)?;

            let velocity = match (prev, next) {
                (Some((Some(from), t0)), Some((Some(to), t1))) => {
                    VelocityModel::between((from, t0), (to, t1), duration, self.opts().velocity_smoothing)?
                }
                _ => {
                    let mut model = VelocityModel::seeded(
                        duration,
                        total_text,
                        self.opts().first_chapter_offset_seconds,
                        self.opts().velocity_smoothing,
                    )?;
                    if let Some((Some(from), t0)) = prev {
                        model.update_at(from, t0)?;
                    }
                    model
                }
            };
            let anchor = velocity.predict(chapter).clamp(start, end);

            let span = info_span!("fill", chapter_id = chapter.id, title = %chapter.title);
            let _enter = span.enter();

            let outcome = self.search_chapter(chapter, anchor, bounds);
            match outcome.result {
                Ok(timestamp) => {
                    info!(timestamp, probes = outcome.probes, "gap filled");
                    records[i].chapter_id.get_or_insert(chapter.id);
                    records[i].set_confirmed(timestamp);
                    filled += 1;
                }
                Err(reason) => {
                    warn!(?reason, probes = outcome.probes, "gap still missing");
                }
            }
        }

        Ok(filled)
    }
}

fn find_candidate<'a>(
    record: &ChapterRecord,
    candidates: &'a [ChapterCandidate],
) -> Option<&'a ChapterCandidate> {
    if let Some(id) = record.chapter_id {
        return candidates.iter().find(|c| c.id == id);
    }
    let title = record.title.trim();
    candidates
        .iter()
        .find(|c| c.title == title)
        .or_else(|| candidates.iter().find(|c| c.title.trim().eq_ignore_ascii_case(title)))
}

/// Text position of a confirmed record, when it corresponds to a candidate.
fn anchor_position(record: &ChapterRecord, candidates: &[ChapterCandidate]) -> Option<f64> {
    if record.is_intro() {
        return None;
    }
    find_candidate(record, candidates).map(|c| c.text_position)
}
