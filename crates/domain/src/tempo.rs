use serde::{Deserialize, Serialize};

use crate::TempoError;

/// Sample index of a local maximum above the peak threshold.
pub type Peak = usize;

/// Outcome of one estimation: a bpm or a typed failure.
pub type TempoResult = Result<u32, TempoError>;

/// One channel of decoded PCM audio.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    /// Samples per second.
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, TempoError> {
        if sample_rate == 0 {
            return Err(TempoError::invalid_input("sample rate must be positive"));
        }
        if let Some(index) = samples.iter().position(|sample| !sample.is_finite()) {
            return Err(TempoError::invalid_input(format!(
                "sample {index} is not a finite number"
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// A bucket of inter-peak intervals that normalized to roughly the same period.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntervalCandidate {
    /// Beat period in samples, already folded into the tempo band.
    pub interval: u64,
    /// Number of measured intervals that voted for this bucket.
    pub count: u32,
}

impl IntervalCandidate {
    pub fn new(interval: u64) -> Self {
        Self { interval, count: 1 }
    }

    pub fn bpm(&self, sample_rate: u32) -> u32 {
        (60.0 / (self.interval as f64 / sample_rate as f64)).round() as u32
    }
}
