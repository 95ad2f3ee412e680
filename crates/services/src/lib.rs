pub mod channel;
pub mod scheduler;
pub mod source;

pub use channel::ComputeChannel;
pub use scheduler::{load_with_retry, AnalysisScheduler, RetryPolicy, TrackReport};
pub use source::{DecoderSource, SampleSource};
