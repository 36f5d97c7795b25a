// ==========================================
// 排课核心 - 停课领域模型
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ClassCancellation - 停课记录
// ==========================================
// 不变量:
// - (class_id, date) 唯一
// - date 的星期必须属于该班某个时间段的星期
// - date 必须位于学期 [start_date, end_date] 内
// 除 students_notified 外不再更新
// 对齐: class_cancellations 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCancellation {
    pub cancellation_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub reason: String,
    pub canceled_by: String,
    pub students_notified: bool,
    pub created_at: NaiveDateTime,
}

impl ClassCancellation {
    pub fn new(
        class_id: impl Into<String>,
        date: NaiveDate,
        reason: impl Into<String>,
        canceled_by: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            cancellation_id: uuid::Uuid::new_v4().to_string(),
            class_id: class_id.into(),
            date,
            reason: reason.into(),
            canceled_by: canceled_by.into(),
            students_notified: false,
            created_at,
        }
    }
}

/// 停课查询日期范围（首尾包含，任一端可缺省）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationDateFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl CancellationDateFilter {
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }
}

/// 上课实例状态（读时派生）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceStatus {
    /// 今天或以后存在停课
    pub is_cancelled: bool,
    /// 今天及以后的停课日期（升序）
    pub upcoming_cancelled_dates: Vec<NaiveDate>,
    /// 已过去的停课日期（升序）
    pub past_cancelled_dates: Vec<NaiveDate>,
}
