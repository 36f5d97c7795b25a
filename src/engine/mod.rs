// ==========================================
// 排课核心 - 引擎层
// ==========================================
// 职责: 实现排课与停课业务规则
// 红线: Engine 不拼 SQL（availability 通过仓储查询）
// ==========================================

pub mod access;
pub mod availability;
pub mod clock;
pub mod events;
pub mod interval_rules;
pub mod occurrence;
pub mod recurrence;

// 重导出核心引擎
pub use access::{resolve_effective_teacher, ClassCapability, TeacherAssignmentDenied, Visibility};
pub use availability::AvailabilityIndex;
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use events::{
    CancellationNotice, CancellationNotifier, NoOpNotifier, NoticeRecipient, OptionalNotifier,
};
pub use interval_rules::{IntervalRules, IntervalViolation};
pub use occurrence::OccurrenceStatusResolver;
pub use recurrence::{DateValidationReport, RecurrenceValidator};
