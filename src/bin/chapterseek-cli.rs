use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use chapterseek::backends::whisper::WhisperTranscriber;
use chapterseek::chapter::{ChapterCandidate, ChapterText, build_candidates};
use chapterseek::controller::BoundarySearch;
use chapterseek::json_array_encoder::JsonArrayEncoder;
use chapterseek::markdown::{parse_table, preamble};
use chapterseek::markdown_encoder::MarkdownEncoder;
use chapterseek::media_sampler::MediaSampler;
use chapterseek::opts::{PhraseOpts, SearchOpts};
use chapterseek::output_type::OutputType;
use chapterseek::record_encoder::{RecordEncoder, encode_all};
use chapterseek::report::{ChapterRecord, ChapterStatus, records_from_reports};

fn main() -> Result<()> {
    chapterseek::logging::init();

    match Cli::parse().command {
        Command::Search(args) => search(args),
        Command::FillMissing(args) => fill_missing(args),
        Command::Sync(args) => sync(args),
    }
}

#[derive(Parser, Debug)]
#[command(name = "chapterseek")]
#[command(about = "Locate audiobook chapter boundaries from e-book text")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search every chapter and print the resulting records.
    Search(SearchArgs),

    /// Re-search chapters that an existing record file has no timestamp for.
    FillMissing(FillMissingArgs),

    /// Convert a hand-edited markdown table into JSON records.
    Sync(SyncArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// JSON array of `{ "id", "title", "paragraphs" }` chapter records.
    #[arg(short = 'c', long = "chapters")]
    chapters_path: PathBuf,

    #[arg(short = 'a', long = "audio")]
    audio_path: PathBuf,

    /// ggml Whisper model.
    #[arg(short = 'm', long = "model")]
    model_path: PathBuf,

    /// Chapter ids that are not narrated (maps, indexes, credits).
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    exclude: Vec<usize>,

    #[arg(short = 'l', long = "language")]
    language: Option<String>,

    /// JSON file with `search` and/or `phrase` option overrides.
    #[arg(long = "opts")]
    opts_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(
        short = 'o',
        long = "output-type",
        value_enum,
        default_value_t = OutputType::Json
    )]
    output_type: OutputType,

    /// Book title for the markdown header.
    #[arg(long = "title")]
    book_title: Option<String>,

    /// Book author for the markdown header.
    #[arg(long = "author")]
    author: Option<String>,
}

#[derive(Args, Debug)]
struct FillMissingArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Record file to update in place (`.json`, or `.md` for a markdown table).
    #[arg(short = 'r', long = "records")]
    records_path: PathBuf,
}

#[derive(Args, Debug)]
struct SyncArgs {
    #[arg(long = "markdown")]
    markdown_path: PathBuf,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct OptsFile {
    search: SearchOpts,
    phrase: PhraseOpts,
}

type WhisperSearch = BoundarySearch<MediaSampler, WhisperTranscriber>;

fn search(args: SearchArgs) -> Result<()> {
    let (candidates, mut engine) = prepare(&args.source)?;
    let reports = engine.run(&candidates)?;

    let confirmed = reports
        .iter()
        .filter(|r| r.status == ChapterStatus::Confirmed)
        .count();
    let searched = reports
        .iter()
        .filter(|r| r.status != ChapterStatus::Excluded)
        .count();
    eprintln!("confirmed {confirmed}/{searched} chapters");

    let records = records_from_reports(&reports);

    let stdout = io::stdout();
    let writer = BufWriter::new(stdout.lock());
    let mut encoder: Box<dyn RecordEncoder> = match args.output_type {
        OutputType::Json => Box::new(JsonArrayEncoder::new(writer)),
        OutputType::Markdown => {
            Box::new(MarkdownEncoder::new(writer).with_book(args.book_title, args.author))
        }
    };
    encode_all(&mut *encoder, &records)?;
    Ok(())
}

fn fill_missing(args: FillMissingArgs) -> Result<()> {
    let is_markdown = is_markdown_path(&args.records_path);
    let original = fs::read_to_string(&args.records_path)
        .with_context(|| format!("failed to read '{}'", args.records_path.display()))?;

    let mut records: Vec<ChapterRecord> = if is_markdown {
        parse_table(&original)?
    } else {
        serde_json::from_str(&original)
            .with_context(|| format!("invalid records in '{}'", args.records_path.display()))?
    };

    let missing = records.iter().filter(|r| r.seconds.is_none()).count();
    if missing == 0 {
        eprintln!("no missing chapters");
        return Ok(());
    }

    let (candidates, mut engine) = prepare(&args.source)?;
    let filled = engine.fill_missing(&mut records, &candidates)?;
    eprintln!("filled {filled}/{missing} missing chapters");

    let file = File::create(&args.records_path)
        .with_context(|| format!("failed to write '{}'", args.records_path.display()))?;
    let writer = BufWriter::new(file);
    let mut encoder: Box<dyn RecordEncoder> = if is_markdown {
        let mut enc = MarkdownEncoder::new(writer);
        if let Some(head) = preamble(&original) {
            enc = enc.with_preamble(head);
        }
        Box::new(enc)
    } else {
        Box::new(JsonArrayEncoder::new(writer))
    };
    encode_all(&mut *encoder, &records)?;
    Ok(())
}

fn sync(args: SyncArgs) -> Result<()> {
    let markdown = fs::read_to_string(&args.markdown_path)
        .with_context(|| format!("failed to read '{}'", args.markdown_path.display()))?;
    let records = parse_table(&markdown)?;

    let stdout = io::stdout();
    let mut encoder = JsonArrayEncoder::new(BufWriter::new(stdout.lock()));
    encode_all(&mut encoder, &records)?;
    Ok(())
}

fn prepare(source: &SourceArgs) -> Result<(Vec<ChapterCandidate>, WhisperSearch)> {
    let opts = load_opts(source.opts_path.as_deref())?;

    let file = File::open(&source.chapters_path)
        .with_context(|| format!("failed to open '{}'", source.chapters_path.display()))?;
    let texts: Vec<ChapterText> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid chapters in '{}'", source.chapters_path.display()))?;

    let excluded: HashSet<usize> = source.exclude.iter().copied().collect();
    let candidates = build_candidates(&texts, &excluded, &opts.phrase)?;

    let sampler = MediaSampler::open(&source.audio_path)?
        .with_max_window_seconds(opts.search.max_window_seconds);
    let transcriber =
        WhisperTranscriber::new(&source.model_path)?.with_language(source.language.clone());

    let engine = BoundarySearch::new(sampler, transcriber, opts.search)?;
    Ok((candidates, engine))
}

fn load_opts(path: Option<&Path>) -> Result<OptsFile> {
    let Some(path) = path else {
        return Ok(OptsFile::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid options in '{}'", path.display()))
}

fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}
