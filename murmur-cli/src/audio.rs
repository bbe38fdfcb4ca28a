//! WAV input for the `transcribe` command.
//!
//! Decoding and resampling are the caller's job: files must already be
//! 16 kHz. Multi-channel audio is averaged down to mono.

use std::path::Path;

use anyhow::{bail, Context, Result};
use murmur_core::{AudioBuffer, SAMPLE_RATE};

pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open WAV file {}", path.display()))?;
    decode(reader).with_context(|| format!("failed to decode {}", path.display()))
}

fn decode<R: std::io::Read>(mut reader: hound::WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE {
        bail!(
            "expected {SAMPLE_RATE} Hz audio, got {} Hz (resample before transcribing)",
            spec.sample_rate
        );
    }
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int if spec.bits_per_sample <= 16 => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer::new(mono))
}
