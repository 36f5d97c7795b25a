// ==========================================
// 排课核心 - 学期领域模型
// ==========================================
// 学期由目录服务维护，核心只读
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// 对齐: terms 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub term_id: String,
    pub year: i32,
    pub sequence_number: i32, // 学年内第几学期
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Term {
    /// 日期是否落在学期内（首尾均包含）
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn is_valid(&self) -> bool {
        self.start_date < self.end_date
    }
}
