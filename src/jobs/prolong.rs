//! Splits timers that run across a user's local midnight.
//!
//! On every tick the job works out which UTC offset is at 00:00 right now,
//! closes that zone's timers started before midnight and reopens them at
//! midnight, so each day only carries its own minutes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::config::JobConfig;
use crate::error::{StoreError, TimerError};
use crate::timers::day::{last_local_midnight, local_midnight_offset};
use crate::timers::{TimerEngine, TimerStore};

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub tz_offset: i32,
    pub midnight: OffsetDateTime,
    pub due: usize,
    pub split: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Closed at midnight but the continuation could not be created.
    pub stranded: usize,
}

pub struct MidnightProlongationJob {
    engine: Arc<TimerEngine>,
    config: JobConfig,
}

impl MidnightProlongationJob {
    pub fn new(engine: Arc<TimerEngine>, config: JobConfig) -> Self {
        Self { engine, config }
    }

    /// One pass for the zone whose midnight is `now`.
    ///
    /// Timers already started at or after that midnight are left alone, so
    /// running twice for the same instant changes nothing. A failure on one
    /// timer is logged and counted; the rest are still processed.
    ///
    /// `stores` is called once for the listing and once per split, so each
    /// timer gets the full request deadline.
    #[instrument(skip(self, stores))]
    pub async fn run_once<S>(&self, stores: &S, now: OffsetDateTime) -> Result<JobReport, StoreError>
    where
        S: Fn() -> Box<dyn TimerStore> + ?Sized,
    {
        let now = now.to_offset(UtcOffset::UTC);
        let tz_offset = local_midnight_offset(now.hour(), now.minute());
        let midnight = last_local_midnight(now, tz_offset);

        let due = stores().find_active_by_tz_offset(tz_offset).await?;
        let mut report = JobReport {
            tz_offset,
            midnight,
            due: due.len(),
            split: 0,
            skipped: 0,
            failed: 0,
            stranded: 0,
        };

        for timer in due {
            if timer.created_at >= midnight {
                report.skipped += 1;
                continue;
            }
            let id = timer.id;
            let store = stores();
            match self.engine.split_at(store.as_ref(), timer, midnight).await {
                Ok(_) => report.split += 1,
                Err(TimerError::StartFailedAfterStop { stopped, source }) => {
                    error!(
                        timer_id = %id,
                        user_id = %stopped.team_user_id,
                        task_name = %stopped.task_name,
                        error = %source,
                        "timer closed at midnight but continuation not created"
                    );
                    report.stranded += 1;
                }
                Err(e) => {
                    error!(timer_id = %id, error = %e, "failed to split timer at midnight");
                    report.failed += 1;
                }
            }
        }

        info!(
            tz_offset,
            %midnight,
            due = report.due,
            split = report.split,
            skipped = report.skipped,
            failed = report.failed,
            stranded = report.stranded,
            "midnight prolongation pass done"
        );
        Ok(report)
    }

    /// Runs a pass on every interval boundary until `shutdown` resolves.
    ///
    /// `stores` hands out a fresh store handle on every call.
    pub async fn run<S, F>(&self, stores: S, shutdown: F)
    where
        S: Fn() -> Box<dyn TimerStore>,
        F: Future<Output = ()>,
    {
        if !self.config.enabled {
            info!("midnight prolongation disabled");
            return;
        }

        let period = self.config.interval();
        let first = Instant::now() + delay_to_boundary(self.engine.now(), period);
        let mut ticker = interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_secs = period.as_secs(), "midnight prolongation started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("midnight prolongation stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let now = self.engine.now();
                    if let Err(e) = self.run_once(&stores, now).await {
                        error!(error = %e, "midnight prolongation pass failed");
                    }
                }
            }
        }
    }
}

/// Time until the next multiple of `period` since the Unix epoch; zero when
/// `now` sits exactly on one.
fn delay_to_boundary(now: OffsetDateTime, period: Duration) -> Duration {
    let period_secs = period.as_secs().max(1) as i64;
    let rem = now.unix_timestamp().rem_euclid(period_secs);
    if rem == 0 && now.nanosecond() == 0 {
        return Duration::ZERO;
    }
    let delay = Duration::from_secs((period_secs - rem) as u64)
        .saturating_sub(Duration::from_nanos(u64::from(now.nanosecond())));
    debug!(delay_secs = delay.as_secs(), "aligning first pass");
    delay
}
