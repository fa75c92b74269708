//! Audio normalization for sampled windows.
//!
//! Converts Symphonia-decoded PCM into what the transcriber expects:
//! - interleaved `f32`, downmixed to mono
//! - resampled to [`TARGET_SAMPLE_RATE`] when the source differs
//!
//! Decoding to mono and resampling are separate steps so the caller can trim each packet to
//! the window boundaries at the source rate before anything is resampled.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Sample rate of every [`crate::sampler::AudioWindow`] produced from media (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// A stateful converter from decoded packets to mono 16 kHz `f32` chunks.
///
/// One pipeline serves one window; the resampler keeps filter state across packets.
#[derive(Default)]
pub struct AudioPipeline {
    // Scratch buffer used to copy decoded PCM into interleaved `f32`.
    sample_buf_f32: Option<SampleBuffer<f32>>,

    // Only initialized when the source rate differs from the target.
    resampler: Option<SincFixedIn<f32>>,

    // Mono source samples waiting for a full resampler input block.
    mono_src_acc: Vec<f32>,
}

impl AudioPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a decoded buffer to mono at its source rate.
    ///
    /// Returns `(mono, source_rate)`.
    pub fn decode_to_mono(&mut self, decoded: &AudioBufferRef<'_>) -> Result<(Vec<f32>, u32)> {
        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }

        // Packets can grow past the first one's capacity in some containers.
        let needed = decoded.capacity() as u64;
        if self
            .sample_buf_f32
            .as_ref()
            .is_none_or(|b| (b.capacity() as u64) < needed * channels as u64)
        {
            self.sample_buf_f32 = Some(SampleBuffer::<f32>::new(needed, spec));
        }

        let buf = self
            .sample_buf_f32
            .as_mut()
            .ok_or_else(|| anyhow!("sample buffer not initialized"))?;
        buf.copy_interleaved_ref(decoded.clone());

        Ok((downmix_to_mono(buf.samples(), channels), spec.rate))
    }

    /// Push mono samples at `src_rate` and emit them at the target rate.
    ///
    /// Returning `Ok(false)` from `emit` stops early.
    pub fn push_mono_and_emit(
        &mut self,
        mono_src: &[f32],
        src_rate: u32,
        target_chunk_frames: usize,
        mut emit: impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        if src_rate == TARGET_SAMPLE_RATE {
            return emit_mono_chunks(mono_src, target_chunk_frames, &mut emit);
        }

        self.ensure_resampler(src_rate)?;
        self.mono_src_acc.extend_from_slice(mono_src);

        let in_max = self.input_block_len()?;
        while self.mono_src_acc.len() >= in_max {
            let block: Vec<f32> = self.mono_src_acc.drain(..in_max).collect();
            let out = self.resample_block(block)?;
            for chunk in out.chunks(target_chunk_frames) {
                if !emit(chunk)? {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Flush samples still held by the resampler at the end of a window.
    ///
    /// A no-op if resampling was never needed.
    pub fn finalize(
        &mut self,
        target_chunk_frames: usize,
        mut emit: impl FnMut(&[f32]) -> Result<bool>,
    ) -> Result<()> {
        if self.resampler.is_none() || self.mono_src_acc.is_empty() {
            return Ok(());
        }

        // rubato expects exact block sizes; pad the remainder with silence.
        let in_max = self.input_block_len()?;
        let rem = self.mono_src_acc.len() % in_max;
        if rem != 0 {
            self.mono_src_acc
                .resize(self.mono_src_acc.len() + (in_max - rem), 0.0);
        }

        while !self.mono_src_acc.is_empty() {
            let block: Vec<f32> = self.mono_src_acc.drain(..in_max).collect();
            let out = self.resample_block(block)?;
            emit_mono_chunks(&out, target_chunk_frames, &mut emit)?;
        }

        Ok(())
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if self.resampler.is_some() {
            return Ok(());
        }

        let rs = SincFixedIn::<f32>::new(
            TARGET_SAMPLE_RATE as f64 / src_rate as f64,
            2.0,
            rubato::SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            2048,
            1,
        )
        .map_err(|e| anyhow!(e))
        .context("failed to init resampler")?;

        self.resampler = Some(rs);
        Ok(())
    }

    fn input_block_len(&self) -> Result<usize> {
        self.resampler
            .as_ref()
            .map(|rs| rs.input_frames_max())
            .ok_or_else(|| anyhow!("resampler not initialized"))
    }

    fn resample_block(&mut self, block: Vec<f32>) -> Result<Vec<f32>> {
        let rs = self
            .resampler
            .as_mut()
            .ok_or_else(|| anyhow!("resampler not initialized"))?;

        let mut out = rs
            .process(&[block], None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        if out.len() != 1 {
            bail!("expected mono output from resampler");
        }
        Ok(out.swap_remove(0))
    }
}

/// Equal-weight average across channels.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn emit_mono_chunks(
    mono_16k: &[f32],
    chunk_frames: usize,
    emit: &mut impl FnMut(&[f32]) -> Result<bool>,
) -> Result<()> {
    for chunk in mono_16k.chunks(chunk_frames) {
        if !emit(chunk)? {
            break;
        }
    }
    Ok(())
}
