pub mod forward_pass;
pub mod leveling;

pub use forward_pass::{FailureCause, ForwardPass, PassOutcome, ScheduledTask, TaskFailure};
