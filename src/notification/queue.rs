// ==========================================
// 排课核心 - 通知任务队列
// ==========================================
// 职责: 持久化停课通知任务，按退避策略重试
// 存储: notification_jobs 表
// 投递语义: 至少一次（重试只针对失败的收件人）
// ==========================================

use crate::config::NotificationPolicy;
use crate::db::{format_datetime_millis, parse_datetime_column};
use crate::engine::clock::Clock;
use crate::engine::events::{CancellationNotice, CancellationNotifier};
use crate::notification::job::{backoff_delay, JobStatus, NotificationJob};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "job_id, kind, payload_json, status, attempts, max_attempts, \
     backoff_base_ms, next_attempt_at, last_error, created_at, completed_at";

/// 通知任务队列
pub struct NotificationQueue {
    conn: Arc<Mutex<Connection>>,
    policy: NotificationPolicy,
    clock: Arc<dyn Clock>,
}

impl NotificationQueue {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        policy: NotificationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            conn,
            policy,
            clock,
        }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn policy(&self) -> NotificationPolicy {
        self.policy
    }

    /// 提交通知任务
    pub fn enqueue(&self, notice: CancellationNotice) -> RepositoryResult<String> {
        let job = NotificationJob::new(
            notice,
            self.policy.max_attempts,
            self.policy.backoff_base_ms,
            self.clock.now(),
        );
        let payload_json = serde_json::to_string(&job.payload)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO notification_jobs (
                job_id, kind, payload_json, status, attempts, max_attempts,
                backoff_base_ms, next_attempt_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                job.job_id,
                job.kind,
                payload_json,
                job.status.as_str(),
                job.attempts,
                job.max_attempts,
                job.backoff_base_ms,
                format_datetime_millis(job.next_attempt_at),
                format_datetime_millis(job.created_at),
            ],
        )?;

        tracing::info!(
            job_id = %job.job_id,
            class_id = %job.payload.class_id,
            recipients = job.payload.recipients.len(),
            "通知任务已加入队列"
        );
        Ok(job.job_id)
    }

    /// 领取到期任务（PENDING 且 next_attempt_at <= now），并置为 RUNNING
    pub fn dequeue_due(&self, limit: i64) -> RepositoryResult<Vec<NotificationJob>> {
        let now = format_datetime_millis(self.clock.now());
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let jobs = {
            let sql = format!(
                r#"
                SELECT {} FROM notification_jobs
                WHERE status = 'PENDING' AND next_attempt_at <= ?1
                ORDER BY next_attempt_at, created_at
                LIMIT ?2
                "#,
                SELECT_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params![now, limit], map_job_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        for job in &jobs {
            tx.execute(
                "UPDATE notification_jobs SET status = 'RUNNING' WHERE job_id = ?1",
                params![job.job_id],
            )?;
        }
        tx.commit()?;

        Ok(jobs
            .into_iter()
            .map(|mut job| {
                job.status = JobStatus::Running;
                job
            })
            .collect())
    }

    pub fn mark_completed(&self, job_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE notification_jobs SET status = 'COMPLETED', completed_at = ?1 WHERE job_id = ?2",
            params![format_datetime_millis(self.clock.now()), job_id],
        )?;
        tracing::info!(job_id = job_id, "通知任务已完成");
        Ok(())
    }

    /// 记录一次失败
    ///
    /// # 参数
    /// - remaining: 仍需投递的通知（重试时只发给失败的收件人）
    ///
    /// # 返回
    /// - PENDING: 已按退避重新排队
    /// - FAILED: 重试耗尽
    pub fn mark_failed(
        &self,
        job: &NotificationJob,
        error: &str,
        remaining: &CancellationNotice,
    ) -> RepositoryResult<JobStatus> {
        let attempts = job.attempts + 1;
        let payload_json = serde_json::to_string(remaining)?;
        let conn = self.get_conn()?;

        if attempts < job.max_attempts {
            let now = self.clock.now();
            let next_attempt_at = now
                .checked_add_signed(backoff_delay(job.backoff_base_ms, attempts))
                .unwrap_or(now);
            conn.execute(
                r#"
                UPDATE notification_jobs
                SET status = 'PENDING', attempts = ?1, last_error = ?2,
                    next_attempt_at = ?3, payload_json = ?4
                WHERE job_id = ?5
                "#,
                params![
                    attempts,
                    error,
                    format_datetime_millis(next_attempt_at),
                    payload_json,
                    job.job_id
                ],
            )?;
            tracing::warn!(
                job_id = %job.job_id,
                attempts = attempts,
                next_attempt_at = %next_attempt_at,
                "通知任务失败，将退避重试: {}",
                error
            );
            Ok(JobStatus::Pending)
        } else {
            conn.execute(
                r#"
                UPDATE notification_jobs
                SET status = 'FAILED', attempts = ?1, last_error = ?2, payload_json = ?3
                WHERE job_id = ?4
                "#,
                params![attempts, error, payload_json, job.job_id],
            )?;
            tracing::error!(
                job_id = %job.job_id,
                attempts = attempts,
                "通知任务失败，达到最大重试次数: {}",
                error
            );
            Ok(JobStatus::Failed)
        }
    }

    /// 进程重启后把遗留的 RUNNING 任务放回队列
    pub fn recover_running(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE notification_jobs SET status = 'PENDING' WHERE status = 'RUNNING'",
            [],
        )?;
        if rows > 0 {
            tracing::warn!(count = rows, "恢复中断的通知任务");
        }
        Ok(rows)
    }

    pub fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<NotificationJob>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM notification_jobs WHERE job_id = ?1", SELECT_COLUMNS);
        let job = conn
            .query_row(&sql, params![job_id], map_job_row)
            .optional()?;
        Ok(job)
    }

    pub fn count_by_status(&self, status: JobStatus) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM notification_jobs WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ==========================================
// CancellationNotifier 实现
// ==========================================
impl CancellationNotifier for NotificationQueue {
    fn publish(&self, notice: CancellationNotice) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.enqueue(notice)
            .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
    }
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<NotificationJob> {
    let payload_raw: String = row.get(2)?;
    let payload = serde_json::from_str(&payload_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status_raw: String = row.get(3)?;
    let status = JobStatus::from_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("未知任务状态: {}", status_raw).into(),
        )
    })?;
    let completed_at = match row.get::<_, Option<String>>(10)? {
        Some(raw) => Some(parse_datetime_column(10, &raw)?),
        None => None,
    };

    Ok(NotificationJob {
        job_id: row.get(0)?,
        kind: row.get(1)?,
        payload,
        status,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        backoff_base_ms: row.get(6)?,
        next_attempt_at: parse_datetime_column(7, &row.get::<_, String>(7)?)?,
        last_error: row.get(8)?,
        created_at: parse_datetime_column(9, &row.get::<_, String>(9)?)?,
        completed_at,
    })
}
