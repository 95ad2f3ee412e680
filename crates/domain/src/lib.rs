pub mod config;
pub mod error;
pub mod io;
pub mod tempo;

pub use crate::config::{BucketingMode, EstimatorConfig, SchedulerConfig, Settings};
pub use crate::error::{DomainError, TempoError};
pub use crate::io::{ErrorKind, TempoRequest, TempoResponse};
pub use crate::tempo::{IntervalCandidate, Peak, SampleBuffer, TempoResult};
