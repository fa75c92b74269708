use crate::Result;
use crate::report::ChapterRecord;

/// Streams chapter records into an output format.
pub trait RecordEncoder {
    fn write_record(&mut self, record: &ChapterRecord) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Write every record and close the encoder.
pub fn encode_all<E: RecordEncoder + ?Sized>(
    encoder: &mut E,
    records: &[ChapterRecord],
) -> Result<()> {
    for record in records {
        encoder.write_record(record)?;
    }
    encoder.close()
}
