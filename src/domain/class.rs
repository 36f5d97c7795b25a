// ==========================================
// 排课核心 - 教学班与排课领域模型
// ==========================================
// Class: 教学班 (某教师某学期的某门课)
// ClassScheduleAssignment: 教学班 × 时间段 × 教室
// ==========================================

use crate::domain::cancellation::{ClassCancellation, OccurrenceStatus};
use crate::domain::time_interval::TimeInterval;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Class - 教学班
// ==========================================
// 不变量: (teacher_id, subject_id, term_id) 唯一
// 对齐: classes 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub class_id: String,
    pub subject_id: String,
    pub term_id: String,
    pub teacher_id: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

/// 创建教学班的请求体
///
/// teacher_id 仅管理员可指定；教师创建时为空，取当前操作者
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDraft {
    pub subject_id: String,
    pub term_id: String,
    pub teacher_id: Option<String>,
    pub name: String,
}

/// 排课请求项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDraft {
    pub time_interval_id: String,
    pub room_id: String,
    /// 为空时取教室所属楼栋
    pub building_id: Option<String>,
}

impl ScheduleDraft {
    pub fn new(time_interval_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            time_interval_id: time_interval_id.into(),
            room_id: room_id.into(),
            building_id: None,
        }
    }
}

/// 教学班局部更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassPatch {
    pub name: Option<String>,
    /// 更换任课教师（仅管理员）
    pub teacher_id: Option<String>,
}

impl ClassPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.teacher_id.is_none()
    }
}

// ==========================================
// ClassScheduleAssignment - 排课记录
// ==========================================
// 不变量:
// - (class_id, time_interval_id, room_id) 唯一
// - (time_interval_id, room_id) 唯一 - 教室互斥
// 对齐: class_schedule_assignments 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassScheduleAssignment {
    pub assignment_id: String,
    pub class_id: String,
    pub time_interval_id: String,
    pub room_id: String,
    pub building_id: String,
}

impl ClassScheduleAssignment {
    pub fn new(
        class_id: impl Into<String>,
        time_interval_id: impl Into<String>,
        room_id: impl Into<String>,
        building_id: impl Into<String>,
    ) -> Self {
        Self {
            assignment_id: uuid::Uuid::new_v4().to_string(),
            class_id: class_id.into(),
            time_interval_id: time_interval_id.into(),
            room_id: room_id.into(),
            building_id: building_id.into(),
        }
    }
}

/// 排课记录 + 对应时间段（读模型）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub assignment: ClassScheduleAssignment,
    pub interval: TimeInterval,
}

// ==========================================
// ClassDetail - 教学班完整视图
// ==========================================
// occurrence 为读时派生，不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDetail {
    pub class: Class,
    pub schedules: Vec<ScheduledSlot>,
    pub cancellations: Vec<ClassCancellation>,
    pub occurrence: OccurrenceStatus,
}
