use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use beatwise_domain::{
    DomainError, EstimatorConfig, IntervalCandidate, Peak, SampleBuffer, TempoError, TempoResult,
};

use crate::histogram::IntervalHistogram;
use crate::peaks::PeakExtractor;

/// Number of best-voted buckets considered when picking the winner.
pub const TOP_CANDIDATES: usize = 5;

/// Full trace of one estimation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TempoAnalysis {
    pub bpm: u32,
    pub sample_rate: u32,
    pub peaks: Vec<Peak>,
    /// Best candidates, most votes first.
    pub candidates: Vec<IntervalCandidate>,
}

impl TempoAnalysis {
    pub fn winner(&self) -> Option<&IntervalCandidate> {
        self.candidates.first()
    }
}

/// Stateless tempo engine. One instance can serve any number of buffers.
#[derive(Debug, Clone, Default)]
pub struct TempoEstimator {
    config: EstimatorConfig,
}

impl TempoEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn estimate(&self, buffer: &SampleBuffer) -> TempoResult {
        self.analyze(buffer).map(|analysis| analysis.bpm)
    }

    #[instrument(skip_all, fields(sample_rate = buffer.sample_rate(), samples = buffer.len()))]
    pub fn analyze(&self, buffer: &SampleBuffer) -> Result<TempoAnalysis, TempoError> {
        let peaks = PeakExtractor::from_config(&self.config).extract(buffer.samples());
        debug!(peaks = peaks.len(), "extracted peaks");

        let histogram = IntervalHistogram::from_peaks(&self.config, buffer.sample_rate(), &peaks);
        debug!(candidates = histogram.len(), "bucketed intervals");

        let candidates = histogram.top(TOP_CANDIDATES);
        let winner = select_winner(&candidates).ok_or(TempoError::NoBeatsDetected)?;
        let bpm = winner.bpm(buffer.sample_rate());
        debug!(bpm, interval = winner.interval, votes = winner.count, "tempo resolved");

        Ok(TempoAnalysis {
            bpm,
            sample_rate: buffer.sample_rate(),
            peaks,
            candidates,
        })
    }
}

/// Highest vote count wins; on a tie the earlier candidate is kept.
pub fn select_winner(candidates: &[IntervalCandidate]) -> Option<IntervalCandidate> {
    candidates
        .iter()
        .copied()
        .reduce(|best, current| if current.count > best.count { current } else { best })
}
