use beatwise_domain::{EstimatorConfig, Peak};

/// Finds local maxima above a noise floor, one fixed-size window at a time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakExtractor {
    window_size: usize,
    threshold: f32,
}

impl PeakExtractor {
    pub fn new(window_size: usize, threshold: f32) -> Self {
        Self {
            window_size,
            threshold,
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(config.window_size, config.peak_threshold)
    }

    /// Returns global sample indices in increasing order. A trailing partial
    /// window is not scanned.
    pub fn extract(&self, samples: &[f32]) -> Vec<Peak> {
        if self.window_size == 0 {
            return Vec::new();
        }
        samples
            .chunks_exact(self.window_size)
            .enumerate()
            .flat_map(|(window_index, window)| {
                let offset = window_index * self.window_size;
                self.window_peaks(window).map(move |peak| peak + offset)
            })
            .collect()
    }

    fn window_peaks<'a>(&self, window: &'a [f32]) -> impl Iterator<Item = Peak> + 'a {
        let threshold = self.threshold;
        // First and last sample of a window lack a neighbour and are never peaks.
        window
            .windows(3)
            .enumerate()
            .filter(move |(_, triple)| {
                triple[0] < triple[1] && triple[1] > triple[2] && triple[1] > threshold
            })
            .map(|(index, _)| index + 1)
    }
}

impl Default for PeakExtractor {
    fn default() -> Self {
        Self::from_config(&EstimatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_interior_maxima_per_window() {
        let extractor = PeakExtractor::new(5, 0.08);
        let samples = [
            0.0, 0.5, 0.0, 0.2, 0.1, // window 0
            0.3, 0.0, 0.4, 0.0, 0.6, // window 1, last sample excluded
            0.0, 0.9, 0.0, // trailing partial window
        ];
        assert_eq!(extractor.extract(&samples), vec![1, 3, 7]);
    }

    #[test]
    fn threshold_is_strict() {
        let extractor = PeakExtractor::new(3, 0.08);
        assert!(extractor.extract(&[0.0, 0.08, 0.0]).is_empty());
        assert_eq!(extractor.extract(&[0.0, 0.081, 0.0]), vec![1]);
    }

    #[test]
    fn plateaus_are_not_peaks() {
        let extractor = PeakExtractor::new(4, 0.08);
        assert!(extractor.extract(&[0.0, 0.5, 0.5, 0.0]).is_empty());
    }

    #[test]
    fn buffers_shorter_than_a_window_have_no_peaks() {
        let extractor = PeakExtractor::default();
        let mut samples = vec![0.0; 22_049];
        samples[100] = 1.0;
        assert!(extractor.extract(&samples).is_empty());
        assert!(extractor.extract(&[]).is_empty());
        assert!(extractor.extract(&[1.0]).is_empty());
    }

    #[test]
    fn peaks_are_increasing_and_in_bounds() {
        let extractor = PeakExtractor::new(64, 0.08);
        let samples: Vec<f32> = (0..1_000).map(|i| ((i as f32) * 0.7).sin()).collect();
        let peaks = extractor.extract(&samples);
        assert!(!peaks.is_empty());
        assert!(peaks.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(peaks.iter().all(|&peak| peak < samples.len()));
    }
}
