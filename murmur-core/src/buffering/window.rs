//! Window planner: cover a buffer with overlapping, model-sized windows.
//!
//! ```text
//! |<------ chunk ------>|
//!                 |<------ chunk ------>|
//!                 |<-->| stride         |<------ chunk --->|
//! 0              step                 2*step            total
//! ```
//!
//! `step = chunk - stride`. The last window is clamped to the buffer end and
//! may be shorter than a full chunk.

use serde::{Deserialize, Serialize};

use crate::error::{MurmurError, Result};

/// One bounded slice of the buffer submitted to the engine in a single call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// First sample (inclusive).
    pub start_sample: usize,
    /// Last sample (exclusive).
    pub end_sample: usize,
    /// Seconds to add to every timestamp the engine reports for this window.
    pub offset_seconds: f64,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end_sample - self.start_sample
    }

    pub fn is_empty(&self) -> bool {
        self.end_sample == self.start_sample
    }
}

/// Plan the windows covering `total_samples` samples.
///
/// # Errors
/// `MurmurError::InvalidOptions` when the geometry cannot make progress:
/// non-positive chunk, negative stride, or `stride >= chunk`.
pub fn plan(
    total_samples: usize,
    sample_rate: u32,
    chunk_seconds: f64,
    stride_seconds: f64,
) -> Result<Vec<Window>> {
    if sample_rate == 0 {
        return Err(MurmurError::InvalidOptions("sample rate must be non-zero".into()));
    }
    if !chunk_seconds.is_finite() || chunk_seconds <= 0.0 {
        return Err(MurmurError::InvalidOptions(format!(
            "chunk length must be positive, got {chunk_seconds}s"
        )));
    }
    if !stride_seconds.is_finite() || stride_seconds < 0.0 {
        return Err(MurmurError::InvalidOptions(format!(
            "stride must be non-negative, got {stride_seconds}s"
        )));
    }

    let rate = sample_rate as f64;
    let chunk_samples = (chunk_seconds * rate).round() as usize;
    let stride_samples = (stride_seconds * rate).round() as usize;
    if chunk_samples == 0 || stride_samples >= chunk_samples {
        return Err(MurmurError::InvalidOptions(format!(
            "stride ({stride_seconds}s) must be shorter than the chunk ({chunk_seconds}s)"
        )));
    }
    let step = chunk_samples - stride_samples;

    let mut windows = Vec::with_capacity(total_samples / step + 1);
    let mut start = 0usize;
    while start < total_samples {
        windows.push(Window {
            start_sample: start,
            end_sample: start.saturating_add(chunk_samples).min(total_samples),
            offset_seconds: start as f64 / rate,
        });
        start += step;
    }
    Ok(windows)
}
