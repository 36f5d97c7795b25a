// ==========================================
// 排课核心 - 操作日志领域模型
// ==========================================
// 红线: 核心的所有写操作必须留痕
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: ActionType,
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub class_id: Option<String>, // 时间段操作不关联教学班
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    pub fn new(action_type: ActionType, actor: impl Into<String>) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type,
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.into(),
            class_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_class(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CreateTimeInterval,
    UpdateTimeInterval,
    DeleteTimeInterval,
    CreateClass,
    UpdateClass,
    RemoveClass,
    AddSchedules,
    RemoveSchedule,
    CancelClassDates,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateTimeInterval => "CREATE_TIME_INTERVAL",
            ActionType::UpdateTimeInterval => "UPDATE_TIME_INTERVAL",
            ActionType::DeleteTimeInterval => "DELETE_TIME_INTERVAL",
            ActionType::CreateClass => "CREATE_CLASS",
            ActionType::UpdateClass => "UPDATE_CLASS",
            ActionType::RemoveClass => "REMOVE_CLASS",
            ActionType::AddSchedules => "ADD_SCHEDULES",
            ActionType::RemoveSchedule => "REMOVE_SCHEDULE",
            ActionType::CancelClassDates => "CANCEL_CLASS_DATES",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let found = match s {
            "CREATE_TIME_INTERVAL" => ActionType::CreateTimeInterval,
            "UPDATE_TIME_INTERVAL" => ActionType::UpdateTimeInterval,
            "DELETE_TIME_INTERVAL" => ActionType::DeleteTimeInterval,
            "CREATE_CLASS" => ActionType::CreateClass,
            "UPDATE_CLASS" => ActionType::UpdateClass,
            "REMOVE_CLASS" => ActionType::RemoveClass,
            "ADD_SCHEDULES" => ActionType::AddSchedules,
            "REMOVE_SCHEDULE" => ActionType::RemoveSchedule,
            "CANCEL_CLASS_DATES" => ActionType::CancelClassDates,
            _ => return None,
        };
        Some(found)
    }
}
