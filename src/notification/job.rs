// ==========================================
// 排课核心 - 通知任务
// ==========================================
// 对齐: notification_jobs 表
// 状态流转: PENDING → RUNNING → COMPLETED
//                         ↘ PENDING（退避后重试）/ FAILED（重试耗尽）
// ==========================================

use crate::engine::events::CancellationNotice;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const KIND_CLASS_CANCELLED: &str = "CLASS_CANCELLED";

/// 退避指数上限（避免位移溢出）
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// 单次退避最长等待 24 小时
pub const MAX_BACKOFF_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// 通知任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub job_id: String,
    pub kind: String,
    pub payload: CancellationNotice,
    pub status: JobStatus,
    /// 已尝试次数
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
    pub next_attempt_at: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl NotificationJob {
    pub fn new(
        payload: CancellationNotice,
        max_attempts: i32,
        backoff_base_ms: i64,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            kind: KIND_CLASS_CANCELLED.to_string(),
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            backoff_base_ms,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            completed_at: None,
        }
    }
}

/// 第 attempts 次失败后的等待时长: base * 2^(attempts-1)
pub fn backoff_delay(backoff_base_ms: i64, attempts: i32) -> Duration {
    let exponent = (attempts.max(1) as u32 - 1).min(MAX_BACKOFF_EXPONENT);
    let delay_ms = backoff_base_ms
        .max(0)
        .saturating_mul(1i64 << exponent)
        .min(MAX_BACKOFF_MS);
    Duration::milliseconds(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_exponential() {
        assert_eq!(backoff_delay(1000, 1), Duration::milliseconds(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::milliseconds(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::milliseconds(4000));
        assert_eq!(backoff_delay(500, 0), Duration::milliseconds(500));
    }

    #[test]
    fn test_backoff_clamped_for_huge_base() {
        assert_eq!(
            backoff_delay(i64::MAX, 3),
            Duration::milliseconds(MAX_BACKOFF_MS)
        );
        let now = NaiveDateTime::MAX - Duration::days(1);
        assert!(now.checked_add_signed(backoff_delay(i64::MAX, 3)).is_some());
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("CANCELLED"), None);
    }
}
