pub mod cancel;
pub mod config;
pub mod errors;
pub mod progress;
pub mod term;
pub mod visualizer;
pub mod orchestrator;

pub use cancel::CancelToken;
pub use config::{JobConfig, RequestSource, ValueType};
pub use errors::{JobError, JobReport};
pub use orchestrator::{execute_job, parse_job_input, spawn_job, Job, JobHandle};
pub use progress::{NullProgress, ProgressSink};
pub use term::JobTerm;
