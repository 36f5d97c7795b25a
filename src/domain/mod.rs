// ==========================================
// 排课核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型与纯计算规则
// 红线: 不含数据访问逻辑
// ==========================================

pub mod action_log;
pub mod cancellation;
pub mod class;
pub mod directory;
pub mod term;
pub mod time_interval;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use cancellation::{CancellationDateFilter, ClassCancellation, OccurrenceStatus};
pub use class::{
    Class, ClassDetail, ClassDraft, ClassPatch, ClassScheduleAssignment, ScheduleDraft,
    ScheduledSlot,
};
pub use directory::{Building, DirectoryUser, Room, Subject};
pub use term::Term;
pub use time_interval::{
    intervals_overlap, parse_clock_time, TimeInterval, TimeIntervalPatch, TimeRange,
};
pub use types::{Actor, Role, Weekday};
