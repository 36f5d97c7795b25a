// ==========================================
// 排课核心 - 核心库
// ==========================================
// 职责: 时间段登记、排课冲突检测、按日期停课、停课通知
// 技术栈: Rust + SQLite + tokio
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 时间段 CSV
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// 通知层 - 停课通知队列与投递
pub mod notification;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Actor, Role, Weekday};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Class, ClassCancellation, ClassDetail, ClassDraft, ClassPatch,
    ClassScheduleAssignment, OccurrenceStatus, ScheduleDraft, Term, TimeInterval,
};

// 引擎
pub use engine::{
    AvailabilityIndex, Clock, IntervalRules, OccurrenceStatusResolver, RecurrenceValidator,
};

// API
pub use api::{
    ApiError, ApiResult, AvailabilityApi, CancellationApi, ClassApi, ErrorKind, TimeIntervalApi,
};

// 应用
pub use app::{get_default_db_path, AppState};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "排课冲突检测与停课引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
