//! Per-chapter search results and the records persisted from them.

use serde::{Deserialize, Serialize};

use crate::chapter::ChapterCandidate;
use crate::controller::ProbeRecord;

/// Title of the synthetic row added for narration that precedes the first chapter.
pub const INTRO_TITLE: &str = "Intro / Prologue";

/// The first chapter must start later than this for an intro row to be added.
pub const INTRO_MIN_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterStatus {
    Confirmed,
    Failed,
    Excluded,
}

/// Why a chapter has no timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The probe budget ran out, or every reachable window was probed without a match.
    SearchExhausted,
    /// A match was found earlier than an already confirmed chapter.
    OrderingViolation,
    Cancelled,
}

/// Outcome of searching one chapter.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterReport {
    pub chapter_id: usize,
    pub title: String,
    /// Seconds from the start of the audio; only set when confirmed.
    pub timestamp: Option<f64>,
    pub status: ChapterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Number of sample+transcribe probes spent.
    pub probes: u32,
    /// Every probe in order, with the transition it caused.
    #[serde(skip)]
    pub steps: Vec<ProbeRecord>,
}

impl ChapterReport {
    pub(crate) fn confirmed(
        chapter: &ChapterCandidate,
        timestamp: f64,
        probes: u32,
        steps: Vec<ProbeRecord>,
    ) -> Self {
        Self {
            chapter_id: chapter.id,
            title: chapter.title.clone(),
            timestamp: Some(timestamp),
            status: ChapterStatus::Confirmed,
            failure: None,
            probes,
            steps,
        }
    }

    pub(crate) fn failed(
        chapter: &ChapterCandidate,
        reason: FailureReason,
        probes: u32,
        steps: Vec<ProbeRecord>,
    ) -> Self {
        Self {
            chapter_id: chapter.id,
            title: chapter.title.clone(),
            timestamp: None,
            status: ChapterStatus::Failed,
            failure: Some(reason),
            probes,
            steps,
        }
    }

    pub(crate) fn excluded(chapter: &ChapterCandidate) -> Self {
        Self {
            chapter_id: chapter.id,
            title: chapter.title.clone(),
            timestamp: None,
            status: ChapterStatus::Excluded,
            failure: None,
            probes: 0,
            steps: Vec::new(),
        }
    }
}

/// A persisted chapter row, as written to JSON or a markdown table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<usize>,
    pub title: String,
    /// `HH:MM:SS`, empty when the chapter was not found.
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub seconds: Option<f64>,
    #[serde(default = "default_status")]
    pub status: ChapterStatus,
}

fn default_status() -> ChapterStatus {
    ChapterStatus::Failed
}

impl ChapterRecord {
    /// A row for a chapter located at `seconds`.
    pub fn confirmed(chapter_id: Option<usize>, title: impl Into<String>, seconds: f64) -> Self {
        Self {
            chapter_id,
            title: title.into(),
            start_time: format_hms(seconds),
            seconds: Some(seconds),
            status: ChapterStatus::Confirmed,
        }
    }

    /// Record a newly found start time.
    pub fn set_confirmed(&mut self, seconds: f64) {
        self.start_time = format_hms(seconds);
        self.seconds = Some(seconds);
        self.status = ChapterStatus::Confirmed;
    }

    pub fn is_intro(&self) -> bool {
        self.chapter_id.is_none() && self.title == INTRO_TITLE
    }
}

impl From<&ChapterReport> for ChapterRecord {
    fn from(report: &ChapterReport) -> Self {
        match report.timestamp {
            Some(t) => Self::confirmed(Some(report.chapter_id), report.title.clone(), t),
            None => Self {
                chapter_id: Some(report.chapter_id),
                title: report.title.clone(),
                start_time: String::new(),
                seconds: None,
                status: report.status,
            },
        }
    }
}

/// Turn run reports into persisted rows.
///
/// When the first searched chapter was confirmed more than [`INTRO_MIN_SECONDS`] into the
/// audio, an [`INTRO_TITLE`] row at zero is prepended to cover the opening narration.
pub fn records_from_reports(reports: &[ChapterReport]) -> Vec<ChapterRecord> {
    let mut records = Vec::with_capacity(reports.len() + 1);

    let first_searched = reports
        .iter()
        .find(|r| r.status != ChapterStatus::Excluded);
    if let Some(t) = first_searched.and_then(|r| r.timestamp) {
        if t > INTRO_MIN_SECONDS {
            records.push(ChapterRecord::confirmed(None, INTRO_TITLE, 0.0));
        }
    }

    records.extend(reports.iter().map(ChapterRecord::from));
    records
}

/// Format seconds as `HH:MM:SS`, truncating fractional seconds.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    format!("{h:02}:{m:02}:{s:02}")
}
