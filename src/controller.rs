//! Adaptive chapter-boundary search.
//!
//! For each chapter, in narrative order, we:
//! - predict where it starts from the velocity model
//! - sample and transcribe a small window there
//! - fuzzy-match the chapter's opening phrase against the transcription
//! - confirm, or narrow / expand / shift the window and probe again
//!
//! Every confirmed boundary feeds the velocity model before the next chapter is predicted, so
//! chapters are inherently processed one at a time. The per-chapter loop is an explicit state
//! machine ([`SearchState`]) so the window policy can be exercised on its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::chapter::{ChapterCandidate, narrated_words};
use crate::matcher::{FuzzyMatcher, Lean, MatchResult};
use crate::opts::SearchOpts;
use crate::report::{ChapterReport, FailureReason};
use crate::sampler::WindowSampler;
use crate::transcriber::Transcriber;
use crate::velocity::VelocityModel;
use crate::window::{SearchBounds, SearchWindow};
use crate::{Error, Result};

/// Cooperative cancellation for a run.
///
/// Checked before every probe: the probe in flight always completes, then the current and all
/// remaining chapters are reported as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a probe led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Confirmed,
    Narrowing,
    Expanding,
    Shifting,
    Failed,
}

/// One sample → transcribe → match round for a chapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRecord {
    pub window: SearchWindow,
    /// `None` when sampling or transcription failed.
    pub score: Option<f64>,
    pub transition: Transition,
}

/// States of the per-chapter search.
///
/// `Narrowing`, `Expanding` and `Shifting` carry the next window to probe.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    Predicting,
    Sampling(SearchWindow),
    Matching {
        window: SearchWindow,
        transcription: String,
    },
    Narrowing(SearchWindow),
    Expanding(SearchWindow),
    Shifting(SearchWindow),
    Confirmed(f64),
    Failed(FailureReason),
}

/// Drives the boundary search over a whole book.
///
/// Owns the audio sampler and transcriber for the duration of a run. The velocity model is
/// created per run and never leaves it.
pub struct BoundarySearch<S: WindowSampler, T: Transcriber> {
    sampler: S,
    transcriber: T,
    opts: SearchOpts,
    matcher: FuzzyMatcher,
    cancel: CancelToken,
}

impl<S: WindowSampler, T: Transcriber> BoundarySearch<S, T> {
    pub fn new(sampler: S, transcriber: T, opts: SearchOpts) -> Result<Self> {
        opts.validate()?;
        let matcher = FuzzyMatcher::new(opts.acceptance_threshold);
        Ok(Self {
            sampler,
            transcriber,
            opts,
            matcher,
            cancel: CancelToken::new(),
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn opts(&self) -> &SearchOpts {
        &self.opts
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn transcriber(&self) -> &T {
        &self.transcriber
    }

    pub fn into_parts(self) -> (S, T) {
        (self.sampler, self.transcriber)
    }

    /// Locate every non-excluded chapter, in order.
    ///
    /// Always returns one report per candidate, in candidate order. Chapter-level problems
    /// (exhausted retries, ordering violations, cancellation) are reported per chapter; only
    /// an empty chapter list fails the run.
    pub fn run(&mut self, candidates: &[ChapterCandidate]) -> Result<Vec<ChapterReport>> {
        if candidates.iter().all(|c| c.excluded) {
            return Err(Error::NoChapters);
        }

        let duration = self.sampler.duration_seconds();
        let bounds = SearchBounds::whole(duration)?;
        let mut velocity = VelocityModel::seeded(
            duration,
            narrated_words(candidates),
            self.opts.first_chapter_offset_seconds,
            self.opts.velocity_smoothing,
        )?;

        info!(
            chapters = candidates.len(),
            duration_seconds = duration,
            rate = velocity.state().rate,
            "starting boundary search"
        );

        let mut reports = Vec::with_capacity(candidates.len());
        for chapter in candidates {
            if chapter.excluded {
                reports.push(ChapterReport::excluded(chapter));
                continue;
            }

            let span = info_span!("chapter", chapter_id = chapter.id, title = %chapter.title);
            let _enter = span.enter();

            let anchor = velocity.predict(chapter);
            let outcome = self.search_chapter(chapter, anchor, bounds);

            let report = match outcome.result {
                Ok(timestamp) => match velocity.update(chapter, timestamp) {
                    Ok(()) => {
                        info!(timestamp, probes = outcome.probes, "chapter confirmed");
                        ChapterReport::confirmed(chapter, timestamp, outcome.probes, outcome.steps)
                    }
                    Err(err) => {
                        warn!(error = %err, "rejecting out-of-order boundary");
                        ChapterReport::failed(
                            chapter,
                            FailureReason::OrderingViolation,
                            outcome.probes,
                            outcome.steps,
                        )
                    }
                },
                Err(reason) => {
                    warn!(?reason, probes = outcome.probes, "chapter not found");
                    ChapterReport::failed(chapter, reason, outcome.probes, outcome.steps)
                }
            };
            reports.push(report);
        }

        Ok(reports)
    }

    /// Search for one chapter inside `bounds`, starting from a window anchored on `anchor`.
    pub(crate) fn search_chapter(
        &mut self,
        chapter: &ChapterCandidate,
        anchor: f64,
        bounds: SearchBounds,
    ) -> ChapterOutcome {
        let mut search = ChapterSearch {
            chapter,
            anchor,
            bounds,
            opts: &self.opts,
            cap: self
                .opts
                .max_window_seconds
                .min(self.sampler.max_window_seconds()),
            sweep: None,
            probes: 0,
            steps: Vec::new(),
        };

        let mut state = SearchState::Predicting;
        loop {
            state = match state {
                SearchState::Confirmed(timestamp) => {
                    return search.finish(Ok(timestamp));
                }
                SearchState::Failed(reason) => {
                    return search.finish(Err(reason));
                }
                SearchState::Sampling(window) => {
                    if search.probes >= self.opts.max_probes_per_chapter {
                        SearchState::Failed(FailureReason::SearchExhausted)
                    } else if self.cancel.is_cancelled() {
                        SearchState::Failed(FailureReason::Cancelled)
                    } else {
                        search.probes += 1;
                        match probe(&mut self.sampler, &mut self.transcriber, &window) {
                            Ok(transcription) => SearchState::Matching {
                                window,
                                transcription,
                            },
                            Err(err) => {
                                warn!(
                                    error = %format!("{err:#}"),
                                    start = window.start(),
                                    end = window.end(),
                                    "probe failed"
                                );
                                search.after_miss(window, None)
                            }
                        }
                    }
                }
                SearchState::Matching {
                    window,
                    transcription,
                } => {
                    let result = self
                        .matcher
                        .match_phrase(&chapter.search_phrase, &transcription);
                    search.after_match(window, result)
                }
                other => search.step(other),
            };
        }
    }
}

fn probe<S: WindowSampler, T: Transcriber>(
    sampler: &mut S,
    transcriber: &mut T,
    window: &SearchWindow,
) -> anyhow::Result<String> {
    let audio = sampler.sample(window)?;
    transcriber.transcribe(&audio)
}

/// Result of searching a single chapter.
#[derive(Debug)]
pub(crate) struct ChapterOutcome {
    pub result: std::result::Result<f64, FailureReason>,
    pub probes: u32,
    pub steps: Vec<ProbeRecord>,
}

/// Per-chapter search state shared by the transition functions.
struct ChapterSearch<'a> {
    chapter: &'a ChapterCandidate,
    anchor: f64,
    bounds: SearchBounds,
    opts: &'a SearchOpts,
    cap: f64,
    // Extent of audio covered so far, `(lo, hi)`; drives the monotonic sweep.
    sweep: Option<(f64, f64)>,
    probes: u32,
    steps: Vec<ProbeRecord>,
}

impl ChapterSearch<'_> {
    /// Transitions that need no collaborator.
    fn step(&mut self, state: SearchState) -> SearchState {
        match state {
            SearchState::Predicting => {
                let width = self.opts.default_window_seconds.min(self.cap);
                let window = self.bounds.anchored(self.anchor, width, self.opts.lead_fraction);
                debug!(
                    chapter_id = self.chapter.id,
                    anchor = self.anchor,
                    start = window.start(),
                    end = window.end(),
                    "predicted"
                );
                self.cover(&window);
                SearchState::Sampling(window)
            }
            SearchState::Narrowing(window)
            | SearchState::Expanding(window)
            | SearchState::Shifting(window) => SearchState::Sampling(window),
            other => other,
        }
    }

    /// Decide what to do after a successfully matched probe.
    fn after_match(&mut self, window: SearchWindow, result: MatchResult) -> SearchState {
        debug!(
            start = window.start(),
            end = window.end(),
            score = result.score,
            "probe matched"
        );

        if let Some(offset) = result.estimated_offset {
            let timestamp = window.at_fraction(offset);
            self.record(window, Some(result.score), Transition::Confirmed);
            return SearchState::Confirmed(timestamp);
        }

        if result.score >= self.opts.plausible_threshold {
            let next = self.narrow(&window, result.lean);
            self.record(window, Some(result.score), Transition::Narrowing);
            return SearchState::Narrowing(next);
        }

        self.after_miss(window, Some(result.score))
    }

    /// No usable evidence in `window`: grow it, or sweep once it is at the cap.
    fn after_miss(&mut self, window: SearchWindow, score: Option<f64>) -> SearchState {
        let next = self.expand_or_shift(&window);
        let transition = match next {
            SearchState::Expanding(_) => Transition::Expanding,
            SearchState::Shifting(_) => Transition::Shifting,
            _ => Transition::Failed,
        };
        self.record(window, score, transition);
        next
    }

    fn narrow(&mut self, window: &SearchWindow, lean: Lean) -> SearchWindow {
        let width = (window.duration() * self.opts.narrow_factor)
            .max(self.opts.min_window_seconds)
            .min(window.duration());

        let anchor = match lean {
            Lean::Before => window.start(),
            Lean::At(fraction) => window.at_fraction(fraction),
        };

        let next = self.bounds.anchored(anchor, width, self.opts.lead_fraction);
        self.cover(&next);
        next
    }

    fn expand_or_shift(&mut self, window: &SearchWindow) -> SearchState {
        let limit = self.cap.min(self.bounds.duration());

        if window.duration() < limit {
            let width = (window.duration() * 2.0).min(limit);
            let anchor = window.start() + window.duration() * self.opts.lead_fraction;
            let next = self.bounds.anchored(anchor, width, self.opts.lead_fraction);
            self.cover(&next);
            return SearchState::Expanding(next);
        }

        let overlap = self.opts.sweep_overlap_seconds.min(self.cap / 2.0);
        let (lo, hi) = self.sweep.unwrap_or((window.start(), window.end()));

        // Sweep forward to the end of the bounds first, then back from the earliest probe.
        let next = if hi < self.bounds.end() {
            self.bounds.fit(hi - overlap, self.cap)
        } else if lo > self.bounds.start() {
            self.bounds.fit(lo + overlap - self.cap, self.cap)
        } else {
            return SearchState::Failed(FailureReason::SearchExhausted);
        };

        self.cover(&next);
        SearchState::Shifting(next)
    }

    fn cover(&mut self, window: &SearchWindow) {
        self.sweep = Some(match self.sweep {
            Some((lo, hi)) => (lo.min(window.start()), hi.max(window.end())),
            None => (window.start(), window.end()),
        });
    }

    fn record(&mut self, window: SearchWindow, score: Option<f64>, transition: Transition) {
        self.steps.push(ProbeRecord {
            window,
            score,
            transition,
        });
    }

    fn finish(self, result: std::result::Result<f64, FailureReason>) -> ChapterOutcome {
        ChapterOutcome {
            result,
            probes: self.probes,
            steps: self.steps,
        }
    }
}
