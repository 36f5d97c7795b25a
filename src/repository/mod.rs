// ==========================================
// 排课核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod cancellation_repo;
pub mod class_repo;
pub mod directory_repo;
pub mod error;
pub mod time_interval_repo;

pub use action_log_repo::ActionLogRepository;
pub use cancellation_repo::CancellationRepository;
pub use class_repo::ClassRepository;
pub use directory_repo::DirectoryRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use time_interval_repo::TimeIntervalRepository;
