use tracing::trace;

use beatwise_domain::{BucketingMode, EstimatorConfig, IntervalCandidate, Peak};

/// Admissible beat periods in samples for a tempo range and sample rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoBand {
    lower: f64,
    upper: f64,
}

impl TempoBand {
    pub fn new(sample_rate: u32, min_bpm: f64, max_bpm: f64) -> Self {
        let seconds = 60.0 * sample_rate as f64;
        Self {
            lower: seconds / max_bpm,
            upper: seconds / min_bpm,
        }
    }

    pub fn from_config(config: &EstimatorConfig, sample_rate: u32) -> Self {
        Self::new(sample_rate, config.min_bpm, config.max_bpm)
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Doubles while below the band, then halves while above it. Values equal
    /// to a bound are left alone.
    pub fn fold(&self, interval: f64) -> f64 {
        if !interval.is_finite() || interval <= 0.0 {
            return interval;
        }
        let mut folded = interval;
        while folded < self.lower {
            folded *= 2.0;
        }
        while folded > self.upper {
            folded /= 2.0;
        }
        folded
    }

    pub fn normalize(&self, raw_interval: usize) -> u64 {
        self.fold(raw_interval as f64).round() as u64
    }
}

/// Greedy voting over octave-normalized peak-to-peak intervals.
///
/// Buckets are matched first-come: a new interval joins the earliest candidate
/// it is close enough to, so the result depends on insertion order.
#[derive(Clone, Debug)]
pub struct IntervalHistogram {
    band: TempoBand,
    max_lookahead: usize,
    tolerance_ratio: f64,
    bucketing: BucketingMode,
    candidates: Vec<IntervalCandidate>,
}

impl IntervalHistogram {
    pub fn new(config: &EstimatorConfig, sample_rate: u32) -> Self {
        Self {
            band: TempoBand::from_config(config, sample_rate),
            max_lookahead: config.max_lookahead,
            tolerance_ratio: config.bucket_tolerance_ratio,
            bucketing: config.bucketing,
            candidates: Vec::new(),
        }
    }

    pub fn from_peaks(config: &EstimatorConfig, sample_rate: u32, peaks: &[Peak]) -> Self {
        let mut histogram = Self::new(config, sample_rate);
        histogram.add_peaks(peaks);
        histogram
    }

    pub fn band(&self) -> TempoBand {
        self.band
    }

    /// Pairs every peak with up to `max_lookahead` following peaks.
    pub fn add_peaks(&mut self, peaks: &[Peak]) {
        for (index, &peak) in peaks.iter().enumerate() {
            for &next in peaks.iter().skip(index + 1).take(self.max_lookahead) {
                self.vote(next.saturating_sub(peak));
            }
        }
    }

    pub fn vote(&mut self, raw_interval: usize) {
        if raw_interval == 0 {
            return;
        }
        let interval = self.band.normalize(raw_interval);
        // A zero period has no tempo; happens only when the band sits below one sample.
        if interval == 0 {
            trace!(raw_interval, "dropping interval that folds to zero");
            return;
        }
        let tolerance = (interval as f64 * self.tolerance_ratio).round() as u64;
        let bucketing = self.bucketing;
        let found = self.candidates.iter_mut().find(|candidate| match bucketing {
            BucketingMode::Tolerance => candidate.interval.abs_diff(interval) < tolerance,
            BucketingMode::Exact => candidate.interval == interval,
        });
        match found {
            Some(candidate) => candidate.count += 1,
            None => {
                trace!(raw_interval, interval, "new interval bucket");
                self.candidates.push(IntervalCandidate::new(interval));
            }
        }
    }

    pub fn candidates(&self) -> &[IntervalCandidate] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<IntervalCandidate> {
        self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates by descending vote count, insertion order kept among equals.
    pub fn top(&self, limit: usize) -> Vec<IntervalCandidate> {
        top_candidates(&self.candidates, limit)
    }
}

pub(crate) fn top_candidates(candidates: &[IntervalCandidate], limit: usize) -> Vec<IntervalCandidate> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| b.count.cmp(&a.count));
    sorted.truncate(limit);
    sorted
}
