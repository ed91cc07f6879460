//! The training loop component (C6): repeatedly runs a crew, collects
//! feedback on its output, persists the session, and optionally stops
//! early on a plateau. See spec §4.6.

pub mod error;
pub mod feedback;
pub mod record;
pub mod trainer;

pub use error::{Result, TrainingError};
pub use feedback::{ClosureFeedbackProvider, FeedbackProvider, StaticFeedbackProvider};
pub use record::{Feedback, IterationMetrics, IterationRecord, TrainingDataFile};
pub use trainer::{ExecuteFn, Trainer, TrainingConfig, TrainingSession};
