#[cfg(feature = "cli")]
use clap::ValueEnum;

/// The supported output formats for chapter records.
///
/// Each variant maps to a concrete `RecordEncoder` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OutputType {
    /// A JSON array of records.
    #[default]
    Json,

    /// A markdown document with a chapter table.
    Markdown,
}
