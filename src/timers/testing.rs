use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::memory::MemoryTimerStore;
use super::repo_types::{NewTimer, TaskAggregation, Timer};
use super::store::TimerStore;
use crate::error::StoreError;

/// Memory store whose calls can be made to fail.
///
/// Clones share records and failure switches. The call budget belongs to
/// the handle it was set on, the way a request deadline does.
#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryTimerStore,
    pub fail_create: Arc<AtomicBool>,
    pub fail_all_updates: Arc<AtomicBool>,
    pub fail_sums: Arc<AtomicBool>,
    pub fail_updates_for: Arc<Mutex<HashSet<Uuid>>>,
    calls_left: Arc<Mutex<Option<usize>>>,
}

impl FlakyStore {
    pub fn fail_update_of(&self, id: Uuid) {
        self.fail_updates_for.lock().unwrap().insert(id);
    }

    /// A handle on the same records that times out after `calls` calls.
    pub fn with_call_budget(&self, calls: usize) -> Self {
        Self {
            calls_left: Arc::new(Mutex::new(Some(calls))),
            ..self.clone()
        }
    }

    fn spend(&self, op: &'static str) -> Result<(), StoreError> {
        match self.calls_left.lock().unwrap().as_mut() {
            Some(0) => Err(StoreError::Timeout {
                op,
                budget: Duration::ZERO,
            }),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn sums_available(&self) -> Result<(), StoreError> {
        if self.fail_sums.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("sums refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TimerStore for FlakyStore {
    async fn find_active(&self, team_id: &str, user_id: &str) -> Result<Option<Timer>, StoreError> {
        self.spend("find_active")?;
        self.inner.find_active(team_id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Timer, StoreError> {
        self.spend("find_by_id")?;
        self.inner.find_by_id(id).await
    }

    async fn create(&self, new: NewTimer) -> Result<Timer, StoreError> {
        self.spend("create")?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("create refused".into()));
        }
        self.inner.create(new).await
    }

    async fn update(&self, timer: &Timer) -> Result<(), StoreError> {
        self.spend("update")?;
        let targeted = self.fail_updates_for.lock().unwrap().contains(&timer.id);
        if targeted || self.fail_all_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("update refused".into()));
        }
        self.inner.update(timer).await
    }

    async fn sum_minutes_for_task_and_user(
        &self,
        task_hash: &str,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        self.spend("sum_minutes_for_task_and_user")?;
        self.sums_available()?;
        self.inner
            .sum_minutes_for_task_and_user(task_hash, user_id, start, end)
            .await
    }

    async fn sum_minutes_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        self.spend("sum_minutes_for_user")?;
        self.sums_available()?;
        self.inner.sum_minutes_for_user(user_id, start, end).await
    }

    async fn completed_tasks_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TaskAggregation>, StoreError> {
        self.spend("completed_tasks_for_user")?;
        self.inner.completed_tasks_for_user(user_id, start, end).await
    }

    async fn find_active_by_tz_offset(&self, tz_offset: i32) -> Result<Vec<Timer>, StoreError> {
        self.spend("find_active_by_tz_offset")?;
        self.inner.find_active_by_tz_offset(tz_offset).await
    }

    async fn find_for_user_in_range(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Timer>, StoreError> {
        self.spend("find_for_user_in_range")?;
        self.inner.find_for_user_in_range(user_id, start, end).await
    }
}
