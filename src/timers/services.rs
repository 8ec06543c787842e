use std::sync::Arc;

use time::{Date, Duration, Month, OffsetDateTime};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::day::DayWindow;
use super::dto::{ActiveTimer, DailyTotal, StartResult, StartTimer, StatusResult, StopResult};
use super::hash::task_hash;
use super::repo_types::{NewTimer, TaskAggregation, Timer};
use super::store::TimerStore;
use crate::config::EngineConfig;
use crate::error::{StoreError, TimerError, TimerResult};

/// Whole minutes between two instants, floored. A negative span (clock
/// skew) counts as zero.
pub fn elapsed_minutes(from: OffsetDateTime, to: OffsetDateTime) -> i64 {
    let span = to - from;
    if span.is_negative() {
        warn!(%from, %to, "negative timer duration clamped to zero");
        return 0;
    }
    span.whole_minutes()
}

/// Start/stop state machine and reporting arithmetic.
///
/// Holds no timer state of its own: every call gets the request's store
/// handle and reads or writes through it.
pub struct TimerEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl TimerEngine {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Minutes an active timer has been running so far; the stored value for
    /// finished ones.
    pub fn live_minutes(&self, timer: &Timer) -> i64 {
        if timer.is_active() {
            elapsed_minutes(timer.created_at, self.clock.now())
        } else {
            i64::from(timer.minutes)
        }
    }

    #[instrument(skip(self, store))]
    pub async fn active_timer(
        &self,
        store: &dyn TimerStore,
        team_id: &str,
        user_id: &str,
    ) -> TimerResult<Option<ActiveTimer>> {
        let now = self.clock.now();
        Ok(store
            .find_active(team_id, user_id)
            .await?
            .map(|timer| live_view(timer, now)))
    }

    /// Opens a timer for the user, closing the one that was running.
    #[instrument(skip(self, store, req), fields(team_id = %req.team_id, user_id = %req.team_user_id))]
    pub async fn start(&self, store: &dyn TimerStore, req: StartTimer) -> TimerResult<StartResult> {
        let now = self.clock.now();

        let stopped = match store.find_active(&req.team_id, &req.team_user_id).await? {
            Some(previous) => Some(self.finalize(store, previous, now).await?),
            None => None,
        };

        let new = NewTimer {
            task_hash: task_hash(&req.team_id, &req.project_id, &req.task_name),
            team_id: req.team_id.clone(),
            project_id: req.project_id,
            project_ext_id: req.project_ext_id,
            project_ext_name: req.project_ext_name,
            team_user_id: req.team_user_id.clone(),
            tz_offset: req.tz_offset,
            task_name: req.task_name,
            created_at: now,
        };
        let started = match store.create(new).await {
            Ok(timer) => timer,
            Err(source) => {
                return Err(match stopped {
                    Some(stopped) => {
                        error!(error = %source, stopped_id = %stopped.id, "timer stopped but new timer not created");
                        TimerError::StartFailedAfterStop {
                            stopped: Box::new(stopped),
                            source,
                        }
                    }
                    None => source.into(),
                });
            }
        };
        info!(timer_id = %started.id, task_hash = %started.task_hash, "timer started");

        // Writes are committed from here on; totals are best effort.
        let today = DayWindow::utc_containing(now);
        let today_total_for_started_task = committed_total(
            "started_task",
            self.task_total_for_day(store, &started, today).await,
        );
        let today_total_for_stopped_task = match &stopped {
            Some(timer) => committed_total(
                "stopped_task",
                self.task_total_for_day(store, timer, today).await,
            ),
            None => None,
        };
        let user_day = DayWindow::local_containing(now, started.tz_offset);
        let user_total_for_today = committed_total(
            "user_day",
            self.user_total_for_day(store, &started.team_id, &started.team_user_id, user_day)
                .await,
        );

        Ok(StartResult {
            started_timer: started,
            stopped_timer: stopped,
            today_total_for_started_task,
            today_total_for_stopped_task,
            user_total_for_today,
        })
    }

    /// Closes the user's active timer. Having nothing to stop is not an error.
    #[instrument(skip(self, store))]
    pub async fn stop(
        &self,
        store: &dyn TimerStore,
        team_id: &str,
        user_id: &str,
    ) -> TimerResult<StopResult> {
        let now = self.clock.now();
        let Some(active) = store.find_active(team_id, user_id).await? else {
            debug!("no active timer to stop");
            return Ok(StopResult {
                stopped_timer: None,
                today_total_for_task: None,
            });
        };

        let stopped = self.finalize(store, active, now).await?;
        let today_total_for_task = committed_total(
            "stopped_task",
            self.task_total_for_day(store, &stopped, DayWindow::utc_containing(now))
                .await,
        );
        Ok(StopResult {
            stopped_timer: Some(stopped),
            today_total_for_task,
        })
    }

    /// Status for the current UTC day.
    pub async fn status(
        &self,
        store: &dyn TimerStore,
        team_id: &str,
        user_id: &str,
    ) -> TimerResult<StatusResult> {
        let today = DayWindow::utc_containing(self.clock.now());
        self.status_for_day(store, team_id, user_id, today).await
    }

    /// Completed tasks and total for `day`. The active timer is reported
    /// only when `day` contains the current instant.
    #[instrument(skip(self, store, day), fields(date = %day.date()))]
    pub async fn status_for_day(
        &self,
        store: &dyn TimerStore,
        team_id: &str,
        user_id: &str,
        day: DayWindow,
    ) -> TimerResult<StatusResult> {
        let now = self.clock.now();
        let tasks_for_day = self.completed_tasks_for_day(store, user_id, day).await?;
        let active = store.find_active(team_id, user_id).await?;

        let finished = store
            .sum_minutes_for_user(user_id, day.start(), day.end_exclusive())
            .await?;
        let user_total_for_day = finished + active.as_ref().map_or(0, |t| live_share_of_day(t, day, now));

        let is_current = day.start() <= now && now < day.end_exclusive();
        let (active_timer, active_task_total_for_day) = match active {
            Some(timer) if is_current => {
                let total = self.task_total_for_day(store, &timer, day).await?;
                (Some(live_view(timer, now)), Some(total))
            }
            _ => (None, None),
        };

        Ok(StatusResult {
            day,
            active_timer,
            active_task_total_for_day,
            tasks_for_day,
            user_total_for_day,
        })
    }

    /// Minutes the user spent on the timer's task in `[start, end)`, plus the
    /// live minutes of the timer itself when it is still running.
    pub async fn total_minutes_for_task(
        &self,
        store: &dyn TimerStore,
        timer: &Timer,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> TimerResult<i64> {
        let finished = store
            .sum_minutes_for_task_and_user(&timer.task_hash, &timer.team_user_id, start, end)
            .await?;
        let live = if timer.is_active() {
            elapsed_minutes(timer.created_at, self.clock.now())
        } else {
            0
        };
        Ok(finished + live)
    }

    pub async fn total_minutes_for_task_today(
        &self,
        store: &dyn TimerStore,
        timer: &Timer,
    ) -> TimerResult<i64> {
        let today = DayWindow::utc_containing(self.clock.now());
        self.task_total_for_day(store, timer, today).await
    }

    /// Finished minutes in `[day start, day end)` plus the part of a running
    /// timer that falls inside the day.
    #[instrument(skip(self, store, day), fields(date = %day.date()))]
    pub async fn user_total_for_day(
        &self,
        store: &dyn TimerStore,
        team_id: &str,
        user_id: &str,
        day: DayWindow,
    ) -> TimerResult<i64> {
        let now = self.clock.now();
        let finished = store
            .sum_minutes_for_user(user_id, day.start(), day.end_exclusive())
            .await?;
        let live = store
            .find_active(team_id, user_id)
            .await?
            .map_or(0, |t| live_share_of_day(&t, day, now));
        Ok(finished + live)
    }

    /// Finished tasks of `[day start, 23:59:59]`, grouped per task.
    pub async fn completed_tasks_for_day(
        &self,
        store: &dyn TimerStore,
        user_id: &str,
        day: DayWindow,
    ) -> TimerResult<Vec<TaskAggregation>> {
        Ok(store
            .completed_tasks_for_user(user_id, day.start(), day.end_inclusive())
            .await?)
    }

    pub async fn timer(&self, store: &dyn TimerStore, id: Uuid) -> TimerResult<Timer> {
        Ok(store.find_by_id(id).await?)
    }

    /// Timers of a user from `from` 00:00:00 through `to` 23:59:59 in the
    /// user's offset, oldest first.
    #[instrument(skip(self, store))]
    pub async fn user_timers_in_range(
        &self,
        store: &dyn TimerStore,
        user_id: &str,
        from: Date,
        to: Date,
        tz_offset: i32,
    ) -> TimerResult<Vec<Timer>> {
        if to < from {
            return Err(TimerError::InvalidRange(format!("{to} is before {from}")));
        }
        let start = DayWindow::for_date(from, tz_offset).start();
        let end = DayWindow::for_date(to, tz_offset).end_inclusive();
        if end - start > Duration::days(self.config.max_range_days) {
            warn!(%from, %to, max_days = self.config.max_range_days, "timer range rejected");
            return Err(TimerError::InvalidRange(format!(
                "{from}..{to} spans more than {} days",
                self.config.max_range_days
            )));
        }
        Ok(store.find_for_user_in_range(user_id, start, end).await?)
    }

    /// Finished minutes per day of a month, one entry per calendar day.
    #[instrument(skip(self, store))]
    pub async fn month_statistics(
        &self,
        store: &dyn TimerStore,
        user_id: &str,
        year: i32,
        month: Month,
        tz_offset: i32,
    ) -> TimerResult<Vec<DailyTotal>> {
        let first = Date::from_calendar_date(year, month, 1)
            .map_err(|e| TimerError::InvalidRange(format!("{year}-{month}: {e}")))?;
        let days = month.length(year);
        let last = first + Duration::days(i64::from(days) - 1);

        let mut totals: Vec<DailyTotal> = (0..i64::from(days))
            .map(|i| DailyTotal {
                date: first + Duration::days(i),
                minutes: 0,
            })
            .collect();

        let timers = store
            .find_for_user_in_range(
                user_id,
                DayWindow::for_date(first, tz_offset).start(),
                DayWindow::for_date(last, tz_offset).end_inclusive(),
            )
            .await?;
        for timer in timers.iter().filter(|t| t.finished_at.is_some()) {
            let date = DayWindow::local_containing(timer.created_at, tz_offset).date();
            let index = (date - first).whole_days();
            if let Some(slot) = usize::try_from(index).ok().and_then(|i| totals.get_mut(i)) {
                slot.minutes += i64::from(timer.minutes);
            }
        }
        Ok(totals)
    }

    /// Sets `finished_at` and the floored minutes, then persists.
    pub(crate) async fn finalize(
        &self,
        store: &dyn TimerStore,
        mut timer: Timer,
        finished_at: OffsetDateTime,
    ) -> Result<Timer, StoreError> {
        let minutes = elapsed_minutes(timer.created_at, finished_at);
        timer.finished_at = Some(finished_at.max(timer.created_at));
        timer.minutes = i32::try_from(minutes).unwrap_or(i32::MAX);
        store.update(&timer).await?;
        info!(timer_id = %timer.id, minutes = timer.minutes, "timer stopped");
        Ok(timer)
    }

    /// Closes `timer` at `at` and opens an identical timer starting there.
    ///
    /// A failed create after the close yields `StartFailedAfterStop` with the
    /// closed timer.
    pub(crate) async fn split_at(
        &self,
        store: &dyn TimerStore,
        timer: Timer,
        at: OffsetDateTime,
    ) -> TimerResult<(Timer, Timer)> {
        let continuation = NewTimer::continuing(&timer, at);
        let closed = self.finalize(store, timer, at).await?;
        let opened = match store.create(continuation).await {
            Ok(opened) => opened,
            Err(source) => {
                return Err(TimerError::StartFailedAfterStop {
                    stopped: Box::new(closed),
                    source,
                })
            }
        };
        info!(closed_id = %closed.id, opened_id = %opened.id, %at, "timer split");
        Ok((closed, opened))
    }

    async fn task_total_for_day(
        &self,
        store: &dyn TimerStore,
        timer: &Timer,
        day: DayWindow,
    ) -> TimerResult<i64> {
        self.total_minutes_for_task(store, timer, day.start(), day.end_exclusive())
            .await
    }
}

/// A total computed after the start or stop was persisted. Failing it must
/// not turn a committed change into an error.
fn committed_total(total: &'static str, res: TimerResult<i64>) -> Option<i64> {
    match res {
        Ok(minutes) => Some(minutes),
        Err(e) => {
            warn!(total, error = %e, "total unavailable after committed write");
            None
        }
    }
}

fn live_view(timer: Timer, now: OffsetDateTime) -> ActiveTimer {
    let live_minutes = elapsed_minutes(timer.created_at, now);
    ActiveTimer {
        timer,
        live_minutes,
    }
}

/// Live minutes of a running timer inside `day`, with the start clamped to
/// the day start and now clamped to the day end.
fn live_share_of_day(timer: &Timer, day: DayWindow, now: OffsetDateTime) -> i64 {
    let from = timer.created_at.max(day.start());
    let to = now.min(day.end_exclusive());
    if to <= from {
        return 0;
    }
    elapsed_minutes(from, to)
}
