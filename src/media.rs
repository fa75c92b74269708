//! Seekable access to the default audio track of a media file, via Symphonia.
//!
//! Error policy follows Symphonia's model:
//! - `DecodeError` on a packet skips that packet
//! - `IoError` while reading is end of stream
//! - anything else is surfaced with context

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

/// An opened media file positioned on its default audio track.
pub struct MediaStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    time_base: Option<TimeBase>,
    n_frames: Option<u64>,
}

impl MediaStream {
    /// Probe `path` and pick the first decodable track with a known sample rate.
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;

        // Symphonia expects a power-of-two buffer > 32KiB for good probing behavior.
        let mss = MediaSourceStream::new(
            Box::new(file),
            MediaSourceStreamOptions {
                buffer_len: 256 * 1024,
            },
        );

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("failed to probe '{}'", path.display()))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .cloned()
            .ok_or_else(|| anyhow!("no audio track found in '{}'", path.display()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| anyhow!(e))
            .context("failed to create decoder for audio track")?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("audio track has no sample rate"))?;

        Ok(Self {
            format,
            decoder,
            track_id: track.id,
            sample_rate,
            time_base: track.codec_params.time_base,
            n_frames: track.codec_params.n_frames,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Track duration from container metadata, if the container records it.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.n_frames.map(|n| self.ts_to_seconds(n))
    }

    /// Accurately seek to `seconds`; the next packet starts at or before that instant.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let time = Time::new(seconds.trunc() as u64, seconds.fract());
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("failed to seek to {seconds:.3}s"))?;

        // Decoder state is only valid for contiguous packets.
        self.decoder.reset();
        Ok(())
    }

    /// Next packet of the selected track with its start time in seconds, or `None` at end
    /// of stream.
    pub fn next_packet(&mut self) -> Result<Option<(Packet, f64)>> {
        loop {
            match self.format.next_packet() {
                Ok(packet) if packet.track_id() != self.track_id => continue,
                Ok(packet) => {
                    let start = self.ts_to_seconds(packet.ts());
                    return Ok(Some((packet, start)));
                }
                Err(SymphoniaError::IoError(_)) => return Ok(None),
                Err(e) => return Err(anyhow!(e)).context("failed reading packet"),
            }
        }
    }

    /// Decode `packet` and hand the buffer to `on_decoded`.
    ///
    /// Returns `Ok(false)` when the packet was skipped.
    pub fn decode_and_then(
        &mut self,
        packet: &Packet,
        mut on_decoded: impl FnMut(AudioBufferRef<'_>) -> Result<()>,
    ) -> Result<bool> {
        match self.decoder.decode(packet) {
            Ok(buf) => {
                on_decoded(buf)?;
                Ok(true)
            }
            Err(SymphoniaError::DecodeError(_)) | Err(SymphoniaError::IoError(_)) => Ok(false),
            Err(e) => Err(anyhow!(e)).context("decoder failure"),
        }
    }

    fn ts_to_seconds(&self, ts: u64) -> f64 {
        match self.time_base {
            Some(tb) => {
                let t = tb.calc_time(ts);
                t.seconds as f64 + t.frac
            }
            None => ts as f64 / self.sample_rate as f64,
        }
    }
}
