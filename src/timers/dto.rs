use serde::Serialize;
use time::Date;

use super::day::DayWindow;
use super::repo_types::{TaskAggregation, Timer};

/// Input of a start command, after the directory has resolved identities.
#[derive(Debug, Clone)]
pub struct StartTimer {
    pub team_id: String,
    pub project_id: String,
    pub team_user_id: String,
    pub task_name: String,
    pub project_ext_id: String,
    pub project_ext_name: String,
    pub tz_offset: i32,
}

impl StartTimer {
    pub fn new(
        team_id: impl Into<String>,
        project_id: impl Into<String>,
        team_user_id: impl Into<String>,
        task_name: impl Into<String>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            project_id: project_id.into(),
            team_user_id: team_user_id.into(),
            task_name: task_name.into(),
            project_ext_id: String::new(),
            project_ext_name: String::new(),
            tz_offset: 0,
        }
    }

    pub fn with_project_ext(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.project_ext_id = id.into();
        self.project_ext_name = name.into();
        self
    }

    pub fn with_tz_offset(mut self, tz_offset: i32) -> Self {
        self.tz_offset = tz_offset;
        self
    }
}

/// An active timer with minutes computed at read time. `live_minutes` is
/// never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTimer {
    pub timer: Timer,
    pub live_minutes: i64,
}

/// Outcome of a start. The timers are committed; a total is `None` when it
/// could not be computed afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct StartResult {
    pub started_timer: Timer,
    pub stopped_timer: Option<Timer>,
    pub today_total_for_started_task: Option<i64>,
    pub today_total_for_stopped_task: Option<i64>,
    pub user_total_for_today: Option<i64>,
}

/// Outcome of a stop. `today_total_for_task` is `None` when nothing was
/// stopped or the total could not be computed after the write.
#[derive(Debug, Clone, Serialize)]
pub struct StopResult {
    pub stopped_timer: Option<Timer>,
    pub today_total_for_task: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub day: DayWindow,
    pub active_timer: Option<ActiveTimer>,
    pub active_task_total_for_day: Option<i64>,
    pub tasks_for_day: Vec<TaskAggregation>,
    pub user_total_for_day: i64,
}

/// Finished minutes of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: Date,
    pub minutes: i64,
}
