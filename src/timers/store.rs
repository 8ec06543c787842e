use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewTimer, TaskAggregation, Timer};
use crate::error::StoreError;

/// Persistence contract the engine depends on.
///
/// Soft-deleted timers never count as active and never contribute to sums.
/// A handle is request-scoped: implementations bound every call by the
/// deadline of the request (or job run) that created them.
#[async_trait]
pub trait TimerStore: Send + Sync {
    /// The unfinished, non-deleted timer of a user, if any.
    async fn find_active(&self, team_id: &str, user_id: &str) -> Result<Option<Timer>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Timer, StoreError>;

    async fn create(&self, new: NewTimer) -> Result<Timer, StoreError>;

    /// Full-record update by id.
    async fn update(&self, timer: &Timer) -> Result<(), StoreError>;

    /// Finished minutes of one task for one user, `created_at` in `[start, end)`.
    async fn sum_minutes_for_task_and_user(
        &self,
        task_hash: &str,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError>;

    /// Finished minutes of one user, `created_at` in `[start, end)`.
    async fn sum_minutes_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError>;

    /// Finished timers grouped per task, `created_at` in `[start, end]`,
    /// ordered by the first timer of each group.
    async fn completed_tasks_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TaskAggregation>, StoreError>;

    /// Active timers started by users at the given UTC offset.
    async fn find_active_by_tz_offset(&self, tz_offset: i32) -> Result<Vec<Timer>, StoreError>;

    /// Non-deleted timers of a user, `created_at` in `[start, end]`, oldest first.
    async fn find_for_user_in_range(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Timer>, StoreError>;
}
