use anyhow::{Context, Result};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext};

fn build_full_params(language: Option<&str>) -> FullParams<'_, '_> {
    let mut params = FullParams::new(SamplingStrategy::BeamSearch {
        beam_size: 5,
        patience: 1.0,
    });

    params.set_n_threads(num_cpus::get() as i32);
    params.set_language(language);
    // Windows are unrelated snippets; text from one must not prime the next.
    params.set_no_context(true);
    params.set_single_segment(false);

    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params
}

/// Run one full Whisper pass over 16 kHz mono `samples` and join the segment texts.
pub(super) fn transcribe_samples(
    ctx: &WhisperContext,
    language: Option<&str>,
    samples: &[f32],
) -> Result<String> {
    let params = build_full_params(language);

    let mut state = ctx
        .create_state()
        .context("failed to create whisper state")?;
    state
        .full(params, samples)
        .context("failed to run whisper full()")?;

    let mut text = String::new();
    for segment in state.as_iter() {
        let piece = segment.to_str().context("failed to get segment text")?;
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(piece);
    }

    Ok(text)
}
