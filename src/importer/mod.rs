// ==========================================
// 排课核心 - 导入层
// ==========================================
// 职责: 外部数据导入（标准时间段 CSV）
// 红线: 导入的每一行都经过时间段登记规则，不绕过重叠校验
// ==========================================

pub mod error;
pub mod time_interval_csv;

pub use error::{ImportError, ImportResult};
pub use time_interval_csv::{IntervalRow, ParsedLine, TimeIntervalCsvParser};
