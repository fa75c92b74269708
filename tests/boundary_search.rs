mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chapterseek::chapter::{ChapterCandidate, build_candidates};
use chapterseek::controller::{BoundarySearch, CancelToken, Transition};
use chapterseek::opts::{PhraseOpts, SearchOpts};
use chapterseek::report::{ChapterReport, ChapterStatus, FailureReason};
use chapterseek::Error;

use common::{Distortion, ScriptedSampler, ScriptedTranscriber, Section, SyntheticBook};

fn opts() -> SearchOpts {
    SearchOpts {
        // The synthetic narration has no front matter.
        first_chapter_offset_seconds: 0.0,
        ..SearchOpts::default()
    }
}

fn candidates(book: &SyntheticBook, excluded: &[usize]) -> anyhow::Result<Vec<ChapterCandidate>> {
    let excluded: HashSet<usize> = excluded.iter().copied().collect();
    Ok(build_candidates(
        &book.chapter_texts(),
        &excluded,
        &PhraseOpts::default(),
    )?)
}

fn report(reports: &[ChapterReport], id: usize) -> &ChapterReport {
    reports
        .iter()
        .find(|r| r.chapter_id == id)
        .expect("report for every chapter")
}

fn assert_near(actual: Option<f64>, expected: f64, tolerance: f64) {
    let actual = actual.expect("chapter confirmed");
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

#[test]
fn exact_transcripts_confirm_every_chapter_in_one_probe() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(3, 400));
    let sampler = ScriptedSampler::new(&book);
    let transcriber = ScriptedTranscriber::new(book.clone());
    let mut search = BoundarySearch::new(sampler, transcriber, opts())?;

    let reports = search.run(&candidates(&book, &[])?)?;

    assert_eq!(reports.len(), 3);
    for (i, r) in reports.iter().enumerate() {
        assert_eq!(r.chapter_id, i + 1);
        assert_eq!(r.status, ChapterStatus::Confirmed);
        assert_eq!(r.probes, 1, "chapter {}", r.chapter_id);
        assert_eq!(r.timestamp, Some(book.truth(r.chapter_id)));
    }
    assert!(reports[0].timestamp < reports[1].timestamp);
    assert!(reports[1].timestamp < reports[2].timestamp);
    Ok(())
}

#[test]
fn noisy_opening_still_confirms() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(3, 400));
    let chapter_two = book.word_range(2);

    let mut transcriber = ScriptedTranscriber::new(book.clone());
    transcriber
        .distortions
        .push(Distortion::Noise(chapter_two.start..chapter_two.start + 40));

    let mut search = BoundarySearch::new(ScriptedSampler::new(&book), transcriber, opts())?;
    let reports = search.run(&candidates(&book, &[])?)?;

    let two = report(&reports, 2);
    assert_eq!(two.status, ChapterStatus::Confirmed);
    let score = two.steps.last().and_then(|s| s.score).unwrap_or(0.0);
    assert!(score >= 0.7 && score < 1.0, "score = {score}");
    assert_eq!(two.timestamp, Some(book.truth(2)));
    Ok(())
}

#[test]
fn far_off_prediction_recovers_by_expanding_and_shifting() -> anyhow::Result<()> {
    // 400 s of narration the text knows nothing about sits before chapter 2.
    let book = Arc::new(SyntheticBook::new(&[
        Section::Chapter { id: 1, words: 400 },
        Section::Untracked { words: 800 },
        Section::Chapter { id: 2, words: 400 },
        Section::Chapter { id: 3, words: 400 },
    ]));

    let mut search = BoundarySearch::new(
        ScriptedSampler::new(&book),
        ScriptedTranscriber::new(book.clone()),
        opts(),
    )?;
    let reports = search.run(&candidates(&book, &[])?)?;

    let two = report(&reports, 2);
    assert_eq!(two.status, ChapterStatus::Confirmed);
    assert!(two.probes <= opts().max_probes_per_chapter);
    assert!(
        two.steps
            .iter()
            .any(|s| matches!(s.transition, Transition::Expanding | Transition::Shifting)),
        "steps: {:?}",
        two.steps
    );
    assert_near(two.timestamp, book.truth(2), 1.0);

    let three = report(&reports, 3);
    assert_eq!(three.status, ChapterStatus::Confirmed);
    assert_near(three.timestamp, book.truth(3), 1.0);
    Ok(())
}

#[test]
fn unrecognizable_chapter_fails_without_derailing_the_rest() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(3, 400));
    let chapter_two = book.word_range(2);

    let mut transcriber = ScriptedTranscriber::new(book.clone());
    transcriber
        .distortions
        .push(Distortion::Replace(chapter_two.start..chapter_two.start + 40));

    let mut search = BoundarySearch::new(ScriptedSampler::new(&book), transcriber, opts())?;
    let reports = search.run(&candidates(&book, &[])?)?;

    let two = report(&reports, 2);
    assert_eq!(two.status, ChapterStatus::Failed);
    assert_eq!(two.failure, Some(FailureReason::SearchExhausted));
    assert_eq!(two.timestamp, None);

    // Chapter 3 is predicted from chapter 1 alone and lands exactly.
    let three = report(&reports, 3);
    assert_eq!(three.status, ChapterStatus::Confirmed);
    assert_eq!(three.probes, 1);
    assert_eq!(three.timestamp, Some(book.truth(3)));
    Ok(())
}

#[test]
fn probes_never_exceed_budget_or_leave_bounds() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::new(&[
        Section::Chapter { id: 1, words: 300 },
        Section::Untracked { words: 1500 },
        Section::Chapter { id: 2, words: 300 },
        Section::Chapter { id: 3, words: 300 },
    ]));
    let chapter_two = book.word_range(2);

    let mut transcriber = ScriptedTranscriber::new(book.clone());
    transcriber
        .distortions
        .push(Distortion::Replace(chapter_two.start..chapter_two.start + 40));

    let opts = SearchOpts {
        max_probes_per_chapter: 6,
        max_window_seconds: 200.0,
        ..opts()
    };
    let sampler = ScriptedSampler::new(&book).with_max_window_seconds(150.0);
    let mut search = BoundarySearch::new(sampler, transcriber, opts.clone())?;
    let reports = search.run(&candidates(&book, &[])?)?;

    for r in &reports {
        assert!(r.probes <= opts.max_probes_per_chapter, "chapter {}", r.chapter_id);
        assert_eq!(r.probes as usize, r.steps.len());
    }

    let duration = book.duration();
    let requests = &search.sampler().requests;
    assert!(!requests.is_empty());
    for w in requests {
        assert!(w.start() >= 0.0 && w.end() <= duration, "{w:?}");
        // The sampler's own cap is tighter than the configured one.
        assert!(w.duration() <= 150.0, "{w:?}");
    }
    Ok(())
}

#[test]
fn out_of_order_match_fails_only_that_chapter() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(4, 400));
    let chapter_two = book.word_range(2);
    let chapter_three = book.word_range(3);

    // Chapter 2's real opening is unintelligible, but its words recur inside chapter 3,
    // 50 s after chapter 3 starts. Chapter 2 therefore lands after chapter 3's true start.
    let echo = chapter_three.start + 100;
    let mut transcriber = ScriptedTranscriber::new(book.clone());
    transcriber.distortions.push(Distortion::Replace(
        chapter_two.start..chapter_two.start + 40,
    ));
    transcriber.distortions.push(Distortion::Echo {
        at: echo..echo + 40,
        from: chapter_two.start,
    });

    let mut search = BoundarySearch::new(ScriptedSampler::new(&book), transcriber, opts())?;
    let reports = search.run(&candidates(&book, &[])?)?;

    let two = report(&reports, 2);
    assert_eq!(two.status, ChapterStatus::Confirmed);
    assert_near(two.timestamp, book.truth(3) + 50.0, 0.5);

    let three = report(&reports, 3);
    assert_eq!(three.status, ChapterStatus::Failed);
    assert_eq!(three.failure, Some(FailureReason::OrderingViolation));
    assert_eq!(three.timestamp, None);
    assert!(three.probes > 0);

    // The refused boundary did not move the velocity model; chapter 4 is still found.
    let four = report(&reports, 4);
    assert_eq!(four.status, ChapterStatus::Confirmed);
    assert_near(four.timestamp, book.truth(4), 0.5);
    Ok(())
}

#[test]
fn transcriber_failures_count_against_the_budget() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(2, 4000));
    let mut transcriber = ScriptedTranscriber::new(book.clone());
    transcriber.broken = true;

    let opts = SearchOpts {
        max_probes_per_chapter: 3,
        ..opts()
    };
    let mut search = BoundarySearch::new(ScriptedSampler::new(&book), transcriber, opts)?;
    let reports = search.run(&candidates(&book, &[])?)?;

    for r in &reports {
        assert_eq!(r.status, ChapterStatus::Failed);
        assert_eq!(r.failure, Some(FailureReason::SearchExhausted));
        assert_eq!(r.probes, 3);
        assert!(r.steps.iter().all(|s| s.score.is_none()));
    }
    Ok(())
}

#[test]
fn sampler_failure_moves_on_to_the_next_window() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(3, 400));
    let mut sampler = ScriptedSampler::new(&book);
    // Chapter 1 takes probe 1; chapter 2's first probe fails.
    sampler.fail_on.insert(2);

    let mut search =
        BoundarySearch::new(sampler, ScriptedTranscriber::new(book.clone()), opts())?;
    let reports = search.run(&candidates(&book, &[])?)?;

    let two = report(&reports, 2);
    assert_eq!(two.status, ChapterStatus::Confirmed);
    assert_eq!(two.probes, 2);
    assert_eq!(two.steps[0].score, None);
    assert_eq!(two.steps[0].transition, Transition::Expanding);
    assert_near(two.timestamp, book.truth(2), 0.5);
    Ok(())
}

#[test]
fn excluded_chapters_are_reported_but_not_searched() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(3, 400));
    let mut search = BoundarySearch::new(
        ScriptedSampler::new(&book),
        ScriptedTranscriber::new(book.clone()),
        opts(),
    )?;

    let reports = search.run(&candidates(&book, &[2])?)?;

    assert_eq!(reports.len(), 3);
    let two = report(&reports, 2);
    assert_eq!(two.status, ChapterStatus::Excluded);
    assert_eq!(two.probes, 0);
    assert_eq!(two.timestamp, None);
    assert_eq!(report(&reports, 3).status, ChapterStatus::Confirmed);

    let total_probes: u32 = reports.iter().map(|r| r.probes).sum();
    assert_eq!(search.sampler().requests.len(), total_probes as usize);
    Ok(())
}

#[test]
fn cancellation_keeps_confirmed_chapters() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(4, 400));
    let token = CancelToken::new();

    let mut transcriber = ScriptedTranscriber::new(book.clone());
    transcriber.cancel_after = Some((2, token.clone()));

    let mut search = BoundarySearch::new(ScriptedSampler::new(&book), transcriber, opts())?
        .with_cancel_token(token);
    let reports = search.run(&candidates(&book, &[])?)?;

    assert_eq!(reports.len(), 4);
    // The probe in flight when cancellation arrived still completes.
    assert_eq!(reports[0].status, ChapterStatus::Confirmed);
    assert_eq!(reports[1].status, ChapterStatus::Confirmed);
    for r in &reports[2..] {
        assert_eq!(r.status, ChapterStatus::Failed);
        assert_eq!(r.failure, Some(FailureReason::Cancelled));
        assert_eq!(r.probes, 0);
    }
    Ok(())
}

#[test]
fn empty_or_fully_excluded_input_is_fatal() -> anyhow::Result<()> {
    let book = Arc::new(SyntheticBook::uniform(2, 400));
    let mut search = BoundarySearch::new(
        ScriptedSampler::new(&book),
        ScriptedTranscriber::new(book.clone()),
        opts(),
    )?;

    assert!(matches!(search.run(&[]), Err(Error::NoChapters)));

    let mut all_excluded = candidates(&book, &[])?;
    for c in &mut all_excluded {
        c.excluded = true;
    }
    assert!(matches!(search.run(&all_excluded), Err(Error::NoChapters)));
    Ok(())
}

#[test]
fn invalid_options_are_rejected_up_front() {
    let book = Arc::new(SyntheticBook::uniform(1, 400));
    let opts = SearchOpts {
        narrow_factor: 1.5,
        ..opts()
    };
    let result = BoundarySearch::new(
        ScriptedSampler::new(&book),
        ScriptedTranscriber::new(book.clone()),
        opts,
    );
    assert!(matches!(result, Err(Error::InvalidOpts(_))));
}
