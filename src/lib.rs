pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod state;
pub mod timers;

pub use error::{StoreError, TimerError, TimerResult};
