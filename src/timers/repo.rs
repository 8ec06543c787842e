use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use super::repo_types::{NewTimer, TaskAggregation, Timer};
use super::store::TimerStore;
use crate::error::StoreError;

const TIMER_COLUMNS: &str = "id, team_id, project_id, project_ext_id, project_ext_name, \
     team_user_id, tz_offset, task_name, task_hash, created_at, finished_at, deleted_at, minutes";

/// PostgreSQL-backed store handle.
///
/// Cheap to build: clone the pool and give it the deadline of the request or
/// job step it serves. Once the deadline has passed every call fails with
/// `Timeout` without touching the database.
#[derive(Clone)]
pub struct PgTimerStore {
    db: PgPool,
    deadline: Instant,
    budget: Duration,
}

impl PgTimerStore {
    pub fn new(db: PgPool, budget: Duration) -> Self {
        Self {
            db,
            deadline: Instant::now() + budget,
            budget,
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        // An expired handle never issues the query.
        if Instant::now() >= self.deadline {
            return Err(self.deadline_exceeded(op));
        }
        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(res) => res.map_err(StoreError::from),
            Err(_) => Err(self.deadline_exceeded(op)),
        }
    }

    fn deadline_exceeded(&self, op: &'static str) -> StoreError {
        warn!(op, budget_ms = self.budget.as_millis() as u64, "storage deadline exceeded");
        StoreError::Timeout {
            op,
            budget: self.budget,
        }
    }
}

#[async_trait]
impl TimerStore for PgTimerStore {
    async fn find_active(&self, team_id: &str, user_id: &str) -> Result<Option<Timer>, StoreError> {
        let sql = format!(
            r#"
            SELECT {TIMER_COLUMNS}
              FROM timers
             WHERE team_id = $1 AND team_user_id = $2
               AND finished_at IS NULL AND deleted_at IS NULL
             ORDER BY created_at DESC
             LIMIT 1
            "#
        );
        self.bounded(
            "find_active",
            sqlx::query_as::<_, Timer>(&sql)
                .bind(team_id)
                .bind(user_id)
                .fetch_optional(&self.db),
        )
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Timer, StoreError> {
        let sql = format!("SELECT {TIMER_COLUMNS} FROM timers WHERE id = $1");
        self.bounded(
            "find_by_id",
            sqlx::query_as::<_, Timer>(&sql).bind(id).fetch_optional(&self.db),
        )
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, new: NewTimer) -> Result<Timer, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO timers (id, team_id, project_id, project_ext_id, project_ext_name,
                                team_user_id, tz_offset, task_name, task_hash, created_at, minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0)
            RETURNING {TIMER_COLUMNS}
            "#
        );
        self.bounded(
            "create",
            sqlx::query_as::<_, Timer>(&sql)
                .bind(Uuid::new_v4())
                .bind(&new.team_id)
                .bind(&new.project_id)
                .bind(&new.project_ext_id)
                .bind(&new.project_ext_name)
                .bind(&new.team_user_id)
                .bind(new.tz_offset)
                .bind(&new.task_name)
                .bind(&new.task_hash)
                .bind(new.created_at)
                .fetch_one(&self.db),
        )
        .await
    }

    async fn update(&self, timer: &Timer) -> Result<(), StoreError> {
        let res = self
            .bounded(
                "update",
                sqlx::query(
                    r#"
                    UPDATE timers
                       SET team_id = $2, project_id = $3, project_ext_id = $4,
                           project_ext_name = $5, team_user_id = $6, tz_offset = $7,
                           task_name = $8, task_hash = $9, created_at = $10,
                           finished_at = $11, deleted_at = $12, minutes = $13
                     WHERE id = $1
                    "#,
                )
                .bind(timer.id)
                .bind(&timer.team_id)
                .bind(&timer.project_id)
                .bind(&timer.project_ext_id)
                .bind(&timer.project_ext_name)
                .bind(&timer.team_user_id)
                .bind(timer.tz_offset)
                .bind(&timer.task_name)
                .bind(&timer.task_hash)
                .bind(timer.created_at)
                .bind(timer.finished_at)
                .bind(timer.deleted_at)
                .bind(timer.minutes)
                .execute(&self.db),
            )
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(timer.id));
        }
        Ok(())
    }

    async fn sum_minutes_for_task_and_user(
        &self,
        task_hash: &str,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        self.bounded(
            "sum_minutes_for_task_and_user",
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COALESCE(SUM(minutes), 0)::BIGINT
                  FROM timers
                 WHERE task_hash = $1 AND team_user_id = $2
                   AND created_at >= $3 AND created_at < $4
                   AND finished_at IS NOT NULL AND deleted_at IS NULL
                "#,
            )
            .bind(task_hash)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn sum_minutes_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        self.bounded(
            "sum_minutes_for_user",
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COALESCE(SUM(minutes), 0)::BIGINT
                  FROM timers
                 WHERE team_user_id = $1
                   AND created_at >= $2 AND created_at < $3
                   AND finished_at IS NOT NULL AND deleted_at IS NULL
                "#,
            )
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn completed_tasks_for_user(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TaskAggregation>, StoreError> {
        self.bounded(
            "completed_tasks_for_user",
            sqlx::query_as::<_, TaskAggregation>(
                r#"
                SELECT task_hash, task_name, project_ext_id, project_ext_name,
                       SUM(minutes)::BIGINT AS minutes
                  FROM timers
                 WHERE team_user_id = $1
                   AND created_at >= $2 AND created_at <= $3
                   AND finished_at IS NOT NULL AND deleted_at IS NULL
                 GROUP BY task_hash, task_name, project_ext_id, project_ext_name
                 ORDER BY MIN(created_at) ASC
                "#,
            )
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.db),
        )
        .await
    }

    async fn find_active_by_tz_offset(&self, tz_offset: i32) -> Result<Vec<Timer>, StoreError> {
        let sql = format!(
            r#"
            SELECT {TIMER_COLUMNS}
              FROM timers
             WHERE tz_offset = $1 AND finished_at IS NULL AND deleted_at IS NULL
             ORDER BY created_at ASC
            "#
        );
        self.bounded(
            "find_active_by_tz_offset",
            sqlx::query_as::<_, Timer>(&sql).bind(tz_offset).fetch_all(&self.db),
        )
        .await
    }

    async fn find_for_user_in_range(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Timer>, StoreError> {
        let sql = format!(
            r#"
            SELECT {TIMER_COLUMNS}
              FROM timers
             WHERE team_user_id = $1
               AND created_at >= $2 AND created_at <= $3
               AND deleted_at IS NULL
             ORDER BY created_at ASC
            "#
        );
        self.bounded(
            "find_for_user_in_range",
            sqlx::query_as::<_, Timer>(&sql)
                .bind(user_id)
                .bind(start)
                .bind(end)
                .fetch_all(&self.db),
        )
        .await
    }
}
