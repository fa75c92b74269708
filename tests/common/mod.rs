//! A synthetic narrated book plus scripted sampler/transcriber fakes.
//!
//! Narration is perfectly even: word `i` of the audio starts at `i * WORD_SECONDS`. Words
//! are pseudo-random five-letter strings, so phrases never recur and unrelated stretches of
//! text score low against each other.

#![allow(dead_code)]

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use anyhow::bail;
use chapterseek::chapter::ChapterText;
use chapterseek::controller::CancelToken;
use chapterseek::sampler::{AudioWindow, WindowSampler};
use chapterseek::transcriber::Transcriber;
use chapterseek::window::SearchWindow;

pub const WORD_SECONDS: f64 = 0.5;

/// A stretch of narration: a chapter present in the e-book text, or untracked audio
/// (credits, an interlude) that the text does not contain.
#[derive(Debug, Clone, Copy)]
pub enum Section {
    Chapter { id: usize, words: usize },
    Untracked { words: usize },
}

#[derive(Debug)]
pub struct SyntheticBook {
    words: Vec<String>,
    chapters: Vec<(usize, Range<usize>)>,
}

impl SyntheticBook {
    pub fn new(layout: &[Section]) -> Self {
        let mut words = Vec::new();
        let mut chapters = Vec::new();

        for section in layout {
            let start = words.len();
            let count = match *section {
                Section::Chapter { words, .. } | Section::Untracked { words } => words,
            };
            words.extend((start..start + count).map(|i| word(i as u64, 0x5eed)));
            if let Section::Chapter { id, .. } = *section {
                chapters.push((id, start..start + count));
            }
        }

        Self { words, chapters }
    }

    /// Chapters of equal length with nothing untracked.
    pub fn uniform(chapters: usize, words_per_chapter: usize) -> Self {
        let layout: Vec<Section> = (1..=chapters)
            .map(|id| Section::Chapter {
                id,
                words: words_per_chapter,
            })
            .collect();
        Self::new(&layout)
    }

    pub fn duration(&self) -> f64 {
        self.words.len() as f64 * WORD_SECONDS
    }

    /// The chapter text as an extractor would deliver it.
    pub fn chapter_texts(&self) -> Vec<ChapterText> {
        self.chapters
            .iter()
            .map(|(id, range)| ChapterText {
                id: *id,
                title: format!("Chapter {id}"),
                paragraphs: vec![self.words[range.clone()].join(" ")],
            })
            .collect()
    }

    /// Ground-truth narration start of chapter `id`.
    pub fn truth(&self, id: usize) -> f64 {
        self.word_range(id).start as f64 * WORD_SECONDS
    }

    /// Audio word indices of chapter `id`.
    pub fn word_range(&self, id: usize) -> Range<usize> {
        self.chapters
            .iter()
            .find(|(c, _)| *c == id)
            .map(|(_, r)| r.clone())
            .unwrap_or(0..0)
    }

    /// Words starting inside `window`.
    fn words_in(&self, window: &SearchWindow) -> Range<usize> {
        let first = (window.start() / WORD_SECONDS).ceil() as usize;
        let end = ((window.end() / WORD_SECONDS).ceil() as usize).min(self.words.len());
        first.min(end)..end
    }
}

/// Deterministic five-letter word for index `i`.
fn word(i: u64, salt: u64) -> String {
    let mut x = splitmix64(i ^ salt.rotate_left(32));
    (0..5)
        .map(|_| {
            let c = (b'a' + (x % 26) as u8) as char;
            x /= 26;
            c
        })
        .collect()
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Sampler that hands the window straight to the transcriber and records every request.
pub struct ScriptedSampler {
    duration: f64,
    max_window_seconds: f64,
    pub requests: Vec<SearchWindow>,
    /// 1-based probe numbers that fail.
    pub fail_on: HashSet<usize>,
}

impl ScriptedSampler {
    pub fn new(book: &SyntheticBook) -> Self {
        Self {
            duration: book.duration(),
            max_window_seconds: f64::INFINITY,
            requests: Vec::new(),
            fail_on: HashSet::new(),
        }
    }

    pub fn with_max_window_seconds(mut self, seconds: f64) -> Self {
        self.max_window_seconds = seconds;
        self
    }
}

impl WindowSampler for ScriptedSampler {
    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    fn max_window_seconds(&self) -> f64 {
        self.max_window_seconds
    }

    fn sample(&mut self, window: &SearchWindow) -> anyhow::Result<AudioWindow> {
        self.requests.push(*window);
        if self.fail_on.contains(&self.requests.len()) {
            bail!("decoder hiccup at probe {}", self.requests.len());
        }
        Ok(AudioWindow {
            window: *window,
            sample_rate: 16_000,
            samples: Vec::new(),
        })
    }
}

/// How the transcriber mangles a range of audio words.
#[derive(Debug, Clone)]
pub enum Distortion {
    /// Substitute one letter in five.
    Noise(Range<usize>),
    /// Hear something else entirely.
    Replace(Range<usize>),
    /// Hear the book's words from `from` onward instead, as if a passage were repeated.
    Echo { at: Range<usize>, from: usize },
}

/// Transcriber that "hears" the synthetic book, with scripted distortions.
pub struct ScriptedTranscriber {
    book: Arc<SyntheticBook>,
    pub distortions: Vec<Distortion>,
    pub calls: usize,
    /// Cancel this token once `calls` reaches the given count.
    pub cancel_after: Option<(usize, CancelToken)>,
    /// Fail every call.
    pub broken: bool,
}

impl ScriptedTranscriber {
    pub fn new(book: Arc<SyntheticBook>) -> Self {
        Self {
            book,
            distortions: Vec::new(),
            calls: 0,
            cancel_after: None,
            broken: false,
        }
    }

    fn heard(&self, i: usize) -> String {
        for distortion in &self.distortions {
            match distortion {
                Distortion::Noise(r) if r.contains(&i) => {
                    return self.book.words[i]
                        .chars()
                        .enumerate()
                        .map(|(k, c)| if k == 2 { rot13(c) } else { c })
                        .collect();
                }
                Distortion::Replace(r) if r.contains(&i) => return word(i as u64, 0xbad),
                Distortion::Echo { at, from } if at.contains(&i) => {
                    return self.book.words[from + (i - at.start)].clone();
                }
                _ => {}
            }
        }
        self.book.words[i].clone()
    }
}

impl Transcriber for ScriptedTranscriber {
    fn transcribe(&mut self, audio: &AudioWindow) -> anyhow::Result<String> {
        self.calls += 1;
        if let Some((after, token)) = &self.cancel_after {
            if self.calls >= *after {
                token.cancel();
            }
        }
        if self.broken {
            bail!("model crashed");
        }

        let words: Vec<String> = self
            .book
            .words_in(&audio.window)
            .map(|i| self.heard(i))
            .collect();
        Ok(words.join(" "))
    }
}

fn rot13(c: char) -> char {
    (b'a' + (c as u8 - b'a' + 13) % 26) as char
}
