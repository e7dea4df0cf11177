//! Consuming generation responses: chunked reading with cancellation, phase
//! and file tracking, live patch application, and single-flight scheduling.

mod consumer;
mod files;
mod phase;
mod run;
mod runtime;
mod session;

pub use crate::consumer::{Chunks, ConsumerConfig, Progress, ProgressCallback, StreamConsumer};
pub use crate::files::split_files;
pub use crate::phase::{Phase, ResponseMode, response_mode};
pub use crate::run::{GenerationRun, PRIMARY_FILE};
pub use crate::runtime::{GenerationCommand, GenerationEvent, start_generation_runtime};
pub use crate::session::{GenerationSession, Ticket};
pub use net::{CancelFlag, StreamError};
