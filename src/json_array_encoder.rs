use std::io::Write;

use crate::Result;
use crate::record_encoder::RecordEncoder;
use crate::report::ChapterRecord;

/// A `RecordEncoder` that writes chapter records as a single JSON array.
///
/// Output is streamed to the writer; the array is opened lazily so an empty run still
/// produces `[]`.
///
/// Example output:
/// ```json
/// [
///   { "title": "Intro / Prologue", "start_time": "00:00:00", "seconds": 0.0, "status": "confirmed" },
///   { "chapter_id": 1, "title": "One", "start_time": "00:00:42", "seconds": 42.3, "status": "confirmed" }
/// ]
/// ```
pub struct JsonArrayEncoder<W: Write> {
    w: W,

    /// Whether we have written the opening `[`.
    started: bool,

    /// Whether the next element is the first one (no leading comma).
    first: bool,

    /// Once closed, no further writes are allowed.
    closed: bool,
}

impl<W: Write> JsonArrayEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            first: true,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            self.w.write_all(b"[")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> RecordEncoder for JsonArrayEncoder<W> {
    fn write_record(&mut self, record: &ChapterRecord) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write record: encoder is already closed",
            ));
        }

        self.start_if_needed()?;

        if !self.first {
            self.w.write_all(b",")?;
        }
        self.first = false;

        self.w.write_all(b"\n  ")?;
        serde_json::to_writer(&mut self.w, record)?;
        self.w.flush()?;

        Ok(())
    }

    /// Finalize the array. Idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        if !self.first {
            self.w.write_all(b"\n")?;
        }
        self.w.write_all(b"]\n")?;
        self.w.flush()?;

        self.closed = true;
        Ok(())
    }
}
