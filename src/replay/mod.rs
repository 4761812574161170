pub mod scheduler;
pub mod source;
pub mod stream;

pub use scheduler::{Batch, PacingOptions, ReplayStats, Scheduler, SessionState};
pub use source::{PartitionedSource, SessionSource};
pub use stream::{EntityStream, StreamState};
