pub mod clock;
pub mod day;
pub mod dto;
pub mod hash;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use day::DayWindow;
pub use memory::MemoryTimerStore;
pub use repo::PgTimerStore;
pub use repo_types::{NewTimer, TaskAggregation, Timer};
pub use services::TimerEngine;
pub use store::TimerStore;
