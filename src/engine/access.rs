// ==========================================
// 排课核心 - 教学班权限判定
// ==========================================
// 角色语义只在这里解释一次，上层拿到 ClassCapability 后不再比较角色
// ==========================================

use crate::domain::class::Class;
use crate::domain::types::{Actor, Role};

/// 操作者对某个教学班的能力集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassCapability {
    /// 修改/删除教学班、增删排课、停课
    pub can_manage: bool,
    /// 更换任课教师
    pub can_reassign_teacher: bool,
    /// 查看教学班与停课记录
    pub can_view: bool,
}

impl ClassCapability {
    /// 计算能力集
    ///
    /// # 参数
    /// - is_enrolled: 操作者是否选修该班（学生可见性）
    pub fn evaluate(actor: &Actor, class: &Class, is_enrolled: bool) -> Self {
        if actor.is_admin() {
            return Self {
                can_manage: true,
                can_reassign_teacher: true,
                can_view: true,
            };
        }

        let owns = class.teacher_id == actor.user_id;
        Self {
            can_manage: owns,
            can_reassign_teacher: false,
            can_view: owns || is_enrolled,
        }
    }

    /// 开设教学班: 教师与管理员
    pub fn can_create_class(actor: &Actor) -> bool {
        matches!(actor.role, Role::Admin | Role::Teacher)
    }
}

/// 创建教学班时的任课教师解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherAssignmentDenied {
    pub actor_id: String,
    pub requested_teacher_id: String,
}

/// 解析创建教学班时的任课教师
///
/// 管理员可指定任意教师（未指定时为自己）；其他角色只能是自己
pub fn resolve_effective_teacher(
    actor: &Actor,
    requested: Option<&str>,
) -> Result<String, TeacherAssignmentDenied> {
    match requested {
        Some(teacher_id) if actor.is_admin() => Ok(teacher_id.to_string()),
        Some(teacher_id) if teacher_id != actor.user_id => Err(TeacherAssignmentDenied {
            actor_id: actor.user_id.clone(),
            requested_teacher_id: teacher_id.to_string(),
        }),
        _ => Ok(actor.user_id.clone()),
    }
}

/// 停课/教学班列表的可见范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    All,
    Classes(Vec<String>),
}

impl Visibility {
    /// 非管理员: 自己任教的班 ∪ 自己选修的班
    pub fn for_actor(actor: &Actor, taught: Vec<String>, enrolled: Vec<String>) -> Self {
        if actor.is_admin() {
            return Visibility::All;
        }
        let mut ids = taught;
        ids.extend(enrolled);
        ids.sort();
        ids.dedup();
        Visibility::Classes(ids)
    }

    pub fn class_ids(&self) -> Option<&[String]> {
        match self {
            Visibility::All => None,
            Visibility::Classes(ids) => Some(ids.as_slice()),
        }
    }
}
