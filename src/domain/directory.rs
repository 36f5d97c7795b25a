// ==========================================
// 排课核心 - 目录实体
// ==========================================
// 楼栋/教室/课程/用户由各自的 CRUD 模块维护
// 核心仅按 ID 读取
// ==========================================

use crate::domain::types::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub building_id: String,
    pub name: String,
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub subject_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}
