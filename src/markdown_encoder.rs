use std::io::Write;

use crate::Result;
use crate::record_encoder::RecordEncoder;
use crate::report::ChapterRecord;

/// A `RecordEncoder` that writes chapter records as a markdown document.
///
/// The document is a heading, an optional book metadata block, and a
/// `| Chapter | Start Time | Seconds |` table meant to be hand-edited and read back with
/// [`crate::markdown::parse_table`].
pub struct MarkdownEncoder<W: Write> {
    w: W,

    book_title: Option<String>,
    author: Option<String>,

    /// Replaces the generated heading block, e.g. text kept from a hand-edited file.
    preamble: Option<String>,

    /// Whether the heading and table header have been written.
    started: bool,

    closed: bool,
}

impl<W: Write> MarkdownEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            book_title: None,
            author: None,
            preamble: None,
            started: false,
            closed: false,
        }
    }

    /// Include book metadata above the table.
    pub fn with_book(mut self, title: Option<String>, author: Option<String>) -> Self {
        self.book_title = title;
        self.author = author;
        self
    }

    /// Write `preamble` verbatim above the table instead of the generated heading.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        if let Some(preamble) = &self.preamble {
            self.w.write_all(preamble.as_bytes())?;
        } else {
            writeln!(&mut self.w, "# Chapter Timestamps")?;
            writeln!(&mut self.w)?;
            if let Some(title) = &self.book_title {
                writeln!(&mut self.w, "**Title:** {title}  ")?;
            }
            if let Some(author) = &self.author {
                writeln!(&mut self.w, "**Author:** {author}  ")?;
            }
            if self.book_title.is_some() || self.author.is_some() {
                writeln!(&mut self.w)?;
            }
        }
        writeln!(&mut self.w, "| Chapter | Start Time | Seconds |")?;
        writeln!(&mut self.w, "|---------|------------|---------|")?;

        self.started = true;
        Ok(())
    }
}

impl<W: Write> RecordEncoder for MarkdownEncoder<W> {
    fn write_record(&mut self, record: &ChapterRecord) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write record: encoder is already closed",
            ));
        }

        self.start_if_needed()?;

        // Pipes would split the cell when the table is read back.
        let title = record.title.replace('|', "/");
        let seconds = record
            .seconds
            .map(|s| (s.max(0.0).floor() as u64).to_string())
            .unwrap_or_default();
        writeln!(
            &mut self.w,
            "| {title} | {} | {seconds} |",
            record.start_time
        )?;
        self.w.flush()?;

        Ok(())
    }

    /// Emit the table header if nothing was written, then flush. Idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}
