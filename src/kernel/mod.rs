//! Lock-step synchronization kernel
//!
//! Agents talk only through broadcast channels. The scheduler runs every live
//! agent once per round and resolves the channels behind a barrier, so no agent
//! ever sees a partially folded value.

pub mod behavior;
pub mod channel;
pub mod scheduler;
pub mod task;

pub use behavior::{Behavior, PublishCx, ResumeCx, Yield};
pub use channel::{combine, Broadcast, Bus, ChannelError, ChannelKey, Emission};
pub use scheduler::{RoundStats, Scheduler};
pub use task::{TaskArena, TaskId, TaskState};
