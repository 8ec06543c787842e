use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewTimer, TaskAggregation, Timer};
use super::store::TimerStore;
use crate::error::StoreError;

/// In-process store with the same query semantics as `PgTimerStore`.
///
/// Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryTimerStore {
    timers: Arc<Mutex<Vec<Timer>>>,
}

impl MemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record as-is, bypassing the engine.
    pub fn insert(&self, timer: Timer) -> Result<(), StoreError> {
        self.lock()?.push(timer);
        Ok(())
    }

    /// Snapshot of every record, deleted ones included.
    pub fn all(&self) -> Result<Vec<Timer>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Timer>>, StoreError> {
        self.timers
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

fn finished_live(t: &Timer) -> bool {
    t.finished_at.is_some() && t.deleted_at.is_none()
}

#[async_trait]
impl TimerStore for MemoryTimerStore {
    async fn find_active(&self, team_id: &str, user_id: &str) -> Result<Option<Timer>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|t| t.team_id == team_id && t.team_user_id == user_id && t.is_active())
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Timer, StoreError> {
        self.lock()?
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, new: NewTimer) -> Result<Timer, StoreError> {
        let timer = new.into_timer(Uuid::new_v4());
        self.lock()?.push(timer.clone());
        Ok(timer)
    }

    async fn update(&self, timer: &Timer) -> Result<(), StoreError> {
        let mut timers = self.lock()?;
        let slot = timers
            .iter_mut()
            .find(|t| t.id == timer.id)
            .ok_or(StoreError::NotFound(timer.id))?;
        *slot = timer.clone();
        Ok(())
    }

    async fn sum_minutes_for_task_and_user(
        &self,
        task_hash: &str,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|t| t.task_hash == task_hash && t.team_user_id == user_id)
            .filter(|t| t.created_at >= start && t.created_at < end)
            .filter(|t| finished_live(t))
            .map(|t| i64::from(t.minutes))
            .sum())
    }

    async fn sum_minutes_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|t| t.team_user_id == user_id)
            .filter(|t| t.created_at >= start && t.created_at < end)
            .filter(|t| finished_live(t))
            .map(|t| i64::from(t.minutes))
            .sum())
    }

    async fn completed_tasks_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TaskAggregation>, StoreError> {
        let mut matching: Vec<Timer> = self
            .lock()?
            .iter()
            .filter(|t| t.team_user_id == user_id)
            .filter(|t| t.created_at >= start && t.created_at <= end)
            .filter(|t| finished_live(t))
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.created_at);

        let mut groups: Vec<TaskAggregation> = Vec::new();
        for t in matching {
            let existing = groups.iter_mut().find(|g| {
                g.task_hash == t.task_hash
                    && g.task_name == t.task_name
                    && g.project_ext_id == t.project_ext_id
                    && g.project_ext_name == t.project_ext_name
            });
            match existing {
                Some(group) => group.minutes += i64::from(t.minutes),
                None => groups.push(TaskAggregation {
                    task_hash: t.task_hash,
                    task_name: t.task_name,
                    project_ext_id: t.project_ext_id,
                    project_ext_name: t.project_ext_name,
                    minutes: i64::from(t.minutes),
                }),
            }
        }
        Ok(groups)
    }

    async fn find_active_by_tz_offset(&self, tz_offset: i32) -> Result<Vec<Timer>, StoreError> {
        let mut found: Vec<Timer> = self
            .lock()?
            .iter()
            .filter(|t| t.tz_offset == tz_offset && t.is_active())
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn find_for_user_in_range(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Timer>, StoreError> {
        let mut found: Vec<Timer> = self
            .lock()?
            .iter()
            .filter(|t| t.team_user_id == user_id && t.deleted_at.is_none())
            .filter(|t| t.created_at >= start && t.created_at <= end)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }
}
