//! Audio buffers handed to the worker, and the window planner that slices them.
//!
//! Everything in the core runs at a single canonical rate. Decoding and
//! resampling happen before a buffer is built; nothing here converts rates.

pub mod window;

pub use window::{plan, Window};

/// Canonical sample rate of every `AudioBuffer` (Hz).
pub const SAMPLE_RATE: u32 = 16_000;

/// A contiguous block of 16 kHz mono PCM samples.
///
/// Moved into the worker for the duration of one transcribe call and dropped
/// once the last window has been inferred.
#[derive(Clone, Default, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// A buffer of `seconds` of silence. Handy for tests and warm-up calls.
    pub fn silence(seconds: f64) -> Self {
        let len = (seconds.max(0.0) * SAMPLE_RATE as f64).round() as usize;
        Self::new(vec![0.0; len])
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the duration of this buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Borrow the samples covered by `window`.
    pub fn slice(&self, window: &Window) -> &[f32] {
        let end = window.end_sample.min(self.samples.len());
        let start = window.start_sample.min(end);
        &self.samples[start..end]
    }
}

impl From<Vec<f32>> for AudioBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self::new(samples)
    }
}

// Sample data is never useful in logs; print the shape instead.
impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("samples", &self.samples.len())
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}
