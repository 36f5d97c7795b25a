// ==========================================
// 排课核心 - API 层
// ==========================================
// 职责: 提供业务 API 接口（权限、校验、写入、审计）
// ==========================================

pub mod availability_api;
pub mod cancellation_api;
pub mod class_api;
pub mod error;
pub mod time_interval_api;

// 重导出核心类型
pub use availability_api::AvailabilityApi;
pub use cancellation_api::CancellationApi;
pub use class_api::ClassApi;
pub use error::{ApiError, ApiResult, ErrorKind};
pub use time_interval_api::{ImportFailure, IntervalImportReport, TimeIntervalApi};
