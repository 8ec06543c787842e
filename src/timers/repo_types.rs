use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Timer record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Timer {
    pub id: Uuid,
    pub team_id: String,
    pub project_id: String,
    pub project_ext_id: String,
    pub project_ext_name: String,
    pub team_user_id: String,
    pub tz_offset: i32, // seconds east of UTC, copied from the user at start
    pub task_name: String,
    pub task_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    pub minutes: i32, // only meaningful once finished_at is set
}

impl Timer {
    /// Not finished and not soft-deleted.
    pub fn is_active(&self) -> bool {
        self.finished_at.is_none() && self.deleted_at.is_none()
    }
}

/// Everything a store needs to insert a timer; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTimer {
    pub team_id: String,
    pub project_id: String,
    pub project_ext_id: String,
    pub project_ext_name: String,
    pub team_user_id: String,
    pub tz_offset: i32,
    pub task_name: String,
    pub task_hash: String,
    pub created_at: OffsetDateTime,
}

impl NewTimer {
    /// Same task, project and user as `timer`, starting at `at`.
    pub fn continuing(timer: &Timer, at: OffsetDateTime) -> Self {
        Self {
            team_id: timer.team_id.clone(),
            project_id: timer.project_id.clone(),
            project_ext_id: timer.project_ext_id.clone(),
            project_ext_name: timer.project_ext_name.clone(),
            team_user_id: timer.team_user_id.clone(),
            tz_offset: timer.tz_offset,
            task_name: timer.task_name.clone(),
            task_hash: timer.task_hash.clone(),
            created_at: at,
        }
    }

    pub(crate) fn into_timer(self, id: Uuid) -> Timer {
        Timer {
            id,
            team_id: self.team_id,
            project_id: self.project_id,
            project_ext_id: self.project_ext_id,
            project_ext_name: self.project_ext_name,
            team_user_id: self.team_user_id,
            tz_offset: self.tz_offset,
            task_name: self.task_name,
            task_hash: self.task_hash,
            created_at: self.created_at,
            finished_at: None,
            deleted_at: None,
            minutes: 0,
        }
    }
}

/// Finished minutes grouped per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TaskAggregation {
    pub task_hash: String,
    pub task_name: String,
    pub project_ext_id: String,
    pub project_ext_name: String,
    pub minutes: i64,
}
