// ==========================================
// 排课核心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 红线: 每个被拒绝的前置条件都要带足够的细节（冲突ID、违规日期列表）
// ==========================================

use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误大类（调用方据此映射状态码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    BadRequest,
    Conflict,
    InUse,
    Internal,
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 资源与权限
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无权操作: {0}")]
    Unauthorized(String),

    // ==========================================
    // 输入校验
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("无效时间范围: {start_time}-{end_time}，结束时间必须晚于开始时间")]
    InvalidRange { start_time: String, end_time: String },

    #[error(
        "停课日期无效: 已过去={past_dates:?}, 超出学期={outside_term_dates:?}, 星期不符={invalid_weekday_dates:?}"
    )]
    InvalidCancellationDates {
        past_dates: Vec<NaiveDate>,
        outside_term_dates: Vec<NaiveDate>,
        invalid_weekday_dates: Vec<NaiveDate>,
    },

    // ==========================================
    // 冲突
    // ==========================================
    #[error("时间段重复: 已存在相同时间段 {existing_id}")]
    DuplicateInterval { existing_id: String },

    #[error("时间段重叠: 与 {conflicting_id} ({label}) 冲突")]
    OverlapConflict { conflicting_id: String, label: String },

    #[error("教学班重复: 该教师本学期已开设此课程 (class_id={existing_class_id})，请在原教学班追加排课")]
    DuplicateClass { existing_class_id: String },

    #[error("教室冲突: room={room_id} 在 time_interval={time_interval_id} 已被 class={class_id} 占用")]
    RoomConflict {
        room_id: String,
        time_interval_id: String,
        class_id: String,
    },

    #[error("教师冲突: teacher={teacher_id} 在 time_interval={time_interval_id} 已有课程 {class_ids:?}")]
    TeacherConflict {
        teacher_id: String,
        time_interval_id: String,
        class_ids: Vec<String>,
    },

    #[error("教学班时间冲突: class={class_id} 在 time_interval={time_interval_id} 已排课或重复提交")]
    ClassTimeConflict {
        class_id: String,
        time_interval_id: String,
    },

    #[error("重复停课: class={class_id} 以下日期已停课 {dates:?}")]
    AlreadyCancelled {
        class_id: String,
        dates: Vec<NaiveDate>,
    },

    #[error("并发冲突: {0}")]
    Conflict(String),

    #[error("仍被引用: {entity}(id={id}) 被 {reference_count} 条排课引用")]
    InUse {
        entity: String,
        id: String,
        reference_count: i64,
    },

    // ==========================================
    // 数据访问 / 通用
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Unauthorized(_) => ErrorKind::Unauthorized,
            ApiError::InvalidInput(_)
            | ApiError::ValidationError(_)
            | ApiError::InvalidRange { .. }
            | ApiError::InvalidCancellationDates { .. } => ErrorKind::BadRequest,
            ApiError::DuplicateInterval { .. }
            | ApiError::OverlapConflict { .. }
            | ApiError::DuplicateClass { .. }
            | ApiError::RoomConflict { .. }
            | ApiError::TeacherConflict { .. }
            | ApiError::ClassTimeConflict { .. }
            | ApiError::AlreadyCancelled { .. }
            | ApiError::Conflict(_) => ErrorKind::Conflict,
            ApiError::InUse { .. } => ErrorKind::InUse,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::NotFound(format!("{}(id={})不存在", entity, id))
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
// 唯一约束违反 = 并发写入的败者，统一为 Conflict
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("引用的记录不存在或仍被引用: {}", msg))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) | RepositoryError::InternalError(msg) => {
                ApiError::InternalError(msg)
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "Class".to_string(),
            id: "C001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match &api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Class"));
                assert!(msg.contains("C001"));
            }
            _ => panic!("Expected NotFound"),
        }
        assert_eq!(api_err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let api_err: ApiError = RepositoryError::UniqueConstraintViolation(
            "UNIQUE constraint failed: class_cancellations.class_id".to_string(),
        )
        .into();
        assert!(matches!(api_err, ApiError::Conflict(_)));
        assert_eq!(api_err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_kind_taxonomy() {
        let err = ApiError::InvalidCancellationDates {
            past_dates: vec![],
            outside_term_dates: vec![NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()],
            invalid_weekday_dates: vec![],
        };
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.to_string().contains("2024-08-01"));

        let err = ApiError::InUse {
            entity: "TimeInterval".to_string(),
            id: "ti-1".to_string(),
            reference_count: 2,
        };
        assert_eq!(err.kind(), ErrorKind::InUse);
        assert_eq!(
            ApiError::Unauthorized("x".to_string()).kind(),
            ErrorKind::Unauthorized
        );
    }
}
