pub mod histogram;
pub mod peaks;
pub mod tempo;

pub use histogram::{IntervalHistogram, TempoBand};
pub use peaks::PeakExtractor;
pub use tempo::{select_winner, TempoAnalysis, TempoEstimator, TOP_CANDIDATES};
