// ==========================================
// 排课核心 - 教学班排课 API
// ==========================================
// 职责: 教学班创建/修改/删除、排课增删、教学班查询
// 红线:
// - 所有校验在写入前完成
// - 教学班与排课在同一事务写入，唯一约束违反统一为 Conflict
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Datelike;
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::class::{
    Class, ClassDetail, ClassDraft, ClassPatch, ClassScheduleAssignment, ScheduleDraft,
};
use crate::domain::types::{Actor, Role, Weekday};
use crate::engine::access::{resolve_effective_teacher, ClassCapability, Visibility};
use crate::engine::availability::AvailabilityIndex;
use crate::engine::clock::Clock;
use crate::engine::occurrence::OccurrenceStatusResolver;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::cancellation_repo::CancellationRepository;
use crate::repository::class_repo::ClassRepository;
use crate::repository::directory_repo::DirectoryRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::time_interval_repo::TimeIntervalRepository;

// ==========================================
// ClassApi - 教学班排课 API
// ==========================================

/// 教学班排课API
///
/// 职责：
/// 1. 解析任课教师并校验权限
/// 2. 教学班重复、教室占用、教师冲突的前置检查
/// 3. 单事务写入教学班与排课
/// 4. ActionLog记录
pub struct ClassApi {
    class_repo: Arc<ClassRepository>,
    interval_repo: Arc<TimeIntervalRepository>,
    cancellation_repo: Arc<CancellationRepository>,
    directory_repo: Arc<DirectoryRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    availability: Arc<AvailabilityIndex>,
    clock: Arc<dyn Clock>,
}

impl ClassApi {
    pub fn new(
        class_repo: Arc<ClassRepository>,
        interval_repo: Arc<TimeIntervalRepository>,
        cancellation_repo: Arc<CancellationRepository>,
        directory_repo: Arc<DirectoryRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        availability: Arc<AvailabilityIndex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            class_repo,
            interval_repo,
            cancellation_repo,
            directory_repo,
            action_log_repo,
            availability,
            clock,
        }
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 创建教学班并排课
    ///
    /// # 流程
    /// 0. 仅教师与管理员可开班
    /// 1. 解析任课教师（非管理员只能为自己开班）
    /// 2. 课程/学期/教师存在性
    /// 3. 同一 (教师, 课程, 学期) 不得重复开班
    /// 4. 请求内时间段不得重复
    /// 5. 逐项检查教室占用与教师冲突
    /// 6. 单事务写入
    pub fn create_with_schedules(
        &self,
        draft: ClassDraft,
        schedules: Vec<ScheduleDraft>,
        actor: &Actor,
    ) -> ApiResult<ClassDetail> {
        if !ClassCapability::can_create_class(actor) {
            return Err(ApiError::Unauthorized(format!(
                "用户 {} 无权开设教学班",
                actor.user_id
            )));
        }

        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("教学班名称不能为空".to_string()));
        }
        if schedules.is_empty() {
            return Err(ApiError::InvalidInput("至少需要一条排课".to_string()));
        }

        let teacher_id = resolve_effective_teacher(actor, draft.teacher_id.as_deref()).map_err(
            |denied| {
                ApiError::Unauthorized(format!(
                    "用户 {} 不能为其他教师 {} 开设教学班",
                    denied.actor_id, denied.requested_teacher_id
                ))
            },
        )?;

        if self.directory_repo.find_subject(&draft.subject_id)?.is_none() {
            return Err(ApiError::not_found("Subject", &draft.subject_id));
        }
        if self.directory_repo.find_term(&draft.term_id)?.is_none() {
            return Err(ApiError::not_found("Term", &draft.term_id));
        }
        self.ensure_teacher(&teacher_id)?;

        if let Some(existing) = self.class_repo.find_by_teacher_subject_term(
            &teacher_id,
            &draft.subject_id,
            &draft.term_id,
        )? {
            return Err(ApiError::DuplicateClass {
                existing_class_id: existing.class_id,
            });
        }

        let class = Class {
            class_id: uuid::Uuid::new_v4().to_string(),
            subject_id: draft.subject_id,
            term_id: draft.term_id,
            teacher_id,
            name,
            created_at: self.clock.now(),
        };
        let assignments = self.prepare_assignments(&class, &schedules, false)?;

        let inserted = self.class_repo.insert_with_schedules(&class, &assignments);
        self.explain_unique_violation(inserted, &class, &assignments)?;
        self.record(
            ActionLog::new(ActionType::CreateClass, &actor.user_id)
                .with_class(&class.class_id)
                .with_payload(json!({ "class": class, "schedules": assignments }))
                .with_detail(format!("{} ({} 条排课)", class.name, assignments.len())),
        );

        tracing::info!(
            class_id = %class.class_id,
            teacher_id = %class.teacher_id,
            schedules = assignments.len(),
            "教学班已创建"
        );
        self.hydrate(class)
    }

    /// 为已有教学班追加排课（单事务）
    ///
    /// 在创建时的检查之外，还要求教学班在该时间段尚未排课
    pub fn add_schedules(
        &self,
        class_id: &str,
        schedules: Vec<ScheduleDraft>,
        actor: &Actor,
    ) -> ApiResult<ClassDetail> {
        let class = self.load_class(class_id)?;
        self.require_manage(actor, &class)?;
        if schedules.is_empty() {
            return Err(ApiError::InvalidInput("至少需要一条排课".to_string()));
        }

        let assignments = self.prepare_assignments(&class, &schedules, true)?;
        let inserted = self.class_repo.insert_schedules(&assignments);
        self.explain_unique_violation(inserted, &class, &assignments)?;
        self.record(
            ActionLog::new(ActionType::AddSchedules, &actor.user_id)
                .with_class(class_id)
                .with_payload(json!(assignments))
                .with_detail(format!("追加 {} 条排课", assignments.len())),
        );

        tracing::info!(class_id = class_id, added = assignments.len(), "排课已追加");
        self.hydrate(class)
    }

    pub fn remove_schedule(&self, assignment_id: &str, actor: &Actor) -> ApiResult<ClassDetail> {
        let assignment = self
            .class_repo
            .find_assignment(assignment_id)?
            .ok_or_else(|| ApiError::not_found("ClassScheduleAssignment", assignment_id))?;
        let class = self.load_class(&assignment.class_id)?;
        self.require_manage(actor, &class)?;
        self.check_weekday_still_covered(&class, assignment_id)?;

        if self.class_repo.delete_assignment(assignment_id)? == 0 {
            return Err(ApiError::not_found("ClassScheduleAssignment", assignment_id));
        }
        self.record(
            ActionLog::new(ActionType::RemoveSchedule, &actor.user_id)
                .with_class(&class.class_id)
                .with_payload(json!(assignment)),
        );

        tracing::info!(
            class_id = %class.class_id,
            assignment_id = assignment_id,
            "排课已删除"
        );
        self.hydrate(class)
    }

    /// 局部更新教学班
    ///
    /// 更换任课教师仅管理员可用，并对现有排课重新做教学班重复与教师冲突检查
    pub fn update(&self, class_id: &str, patch: ClassPatch, actor: &Actor) -> ApiResult<ClassDetail> {
        let current = self.load_class(class_id)?;
        let capability = self.require_manage(actor, &current)?;
        if patch.is_empty() {
            return self.hydrate(current);
        }

        let mut updated = current.clone();
        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::InvalidInput("教学班名称不能为空".to_string()));
            }
            updated.name = name;
        }

        if let Some(teacher_id) = patch.teacher_id {
            if teacher_id != current.teacher_id {
                if !capability.can_reassign_teacher {
                    return Err(ApiError::Unauthorized(format!(
                        "用户 {} 无权更换教学班 {} 的任课教师",
                        actor.user_id, class_id
                    )));
                }
                self.ensure_teacher(&teacher_id)?;
                self.check_teacher_reassignment(&current, &teacher_id)?;
                updated.teacher_id = teacher_id;
            }
        }

        self.class_repo.update(&updated)?;
        self.record(
            ActionLog::new(ActionType::UpdateClass, &actor.user_id)
                .with_class(class_id)
                .with_payload(json!({ "before": current, "after": updated })),
        );

        tracing::info!(class_id = class_id, teacher_id = %updated.teacher_id, "教学班已更新");
        self.hydrate(updated)
    }

    /// 删除教学班（排课、停课、选课级联删除）
    pub fn remove(&self, class_id: &str, actor: &Actor) -> ApiResult<()> {
        let class = self.load_class(class_id)?;
        self.require_manage(actor, &class)?;

        if self.class_repo.delete(class_id)? == 0 {
            return Err(ApiError::not_found("Class", class_id));
        }
        self.record(
            ActionLog::new(ActionType::RemoveClass, &actor.user_id)
                .with_class(class_id)
                .with_payload(json!(class))
                .with_detail(class.name.clone()),
        );

        tracing::info!(class_id = class_id, "教学班已删除");
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_class(&self, class_id: &str, actor: &Actor) -> ApiResult<ClassDetail> {
        let class = self.load_class(class_id)?;
        let enrolled = self.directory_repo.is_enrolled(class_id, &actor.user_id)?;
        if !ClassCapability::evaluate(actor, &class, enrolled).can_view {
            return Err(ApiError::Unauthorized(format!(
                "用户 {} 无权查看教学班 {}",
                actor.user_id, class_id
            )));
        }
        self.hydrate(class)
    }

    /// 可见范围内的教学班列表
    pub fn list_classes(&self, term_id: Option<&str>, actor: &Actor) -> ApiResult<Vec<ClassDetail>> {
        let visibility = resolve_visibility(&self.class_repo, &self.directory_repo, actor)?;
        let classes = self.class_repo.list(term_id, visibility.class_ids())?;
        tracing::debug!(actor = %actor.user_id, count = classes.len(), "教学班列表查询");
        classes.into_iter().map(|c| self.hydrate(c)).collect()
    }

    /// 教学班的操作历史（最新在前）
    pub fn class_history(&self, class_id: &str, actor: &Actor) -> ApiResult<Vec<ActionLog>> {
        let class = self.load_class(class_id)?;
        self.require_manage(actor, &class)?;
        Ok(self.action_log_repo.find_by_class(class_id)?)
    }

    // ==========================================
    // 内部
    // ==========================================

    fn load_class(&self, class_id: &str) -> ApiResult<Class> {
        self.class_repo
            .find_by_id(class_id)?
            .ok_or_else(|| ApiError::not_found("Class", class_id))
    }

    fn require_manage(&self, actor: &Actor, class: &Class) -> ApiResult<ClassCapability> {
        let capability = ClassCapability::evaluate(actor, class, false);
        if !capability.can_manage {
            return Err(ApiError::Unauthorized(format!(
                "用户 {} 无权管理教学班 {}",
                actor.user_id, class.class_id
            )));
        }
        Ok(capability)
    }

    /// 任课教师必须是目录中角色为教师的用户
    fn ensure_teacher(&self, teacher_id: &str) -> ApiResult<()> {
        match self.directory_repo.find_user(teacher_id)? {
            Some(user) if user.role == Role::Teacher => Ok(()),
            Some(user) => Err(ApiError::ValidationError(format!(
                "用户 {} 的角色为 {}，不能担任任课教师",
                teacher_id, user.role
            ))),
            None => Err(ApiError::not_found("User", teacher_id)),
        }
    }

    /// 写入时撞上唯一约束（前置检查之后的并发写入者），重新查询给出具体冲突
    fn explain_unique_violation<T>(
        &self,
        inserted: RepositoryResult<T>,
        class: &Class,
        assignments: &[ClassScheduleAssignment],
    ) -> ApiResult<T> {
        let raw = match inserted {
            Err(RepositoryError::UniqueConstraintViolation(raw)) => raw,
            other => return Ok(other?),
        };
        tracing::warn!(class_id = %class.class_id, "并发写入冲突: {}", raw);

        if let Some(existing) = self.class_repo.find_by_teacher_subject_term(
            &class.teacher_id,
            &class.subject_id,
            &class.term_id,
        )? {
            if existing.class_id != class.class_id {
                return Err(ApiError::DuplicateClass {
                    existing_class_id: existing.class_id,
                });
            }
        }
        for assignment in assignments {
            if let Some(occupant) = self
                .availability
                .room_occupant(&assignment.room_id, &assignment.time_interval_id)?
            {
                return Err(ApiError::RoomConflict {
                    room_id: assignment.room_id.clone(),
                    time_interval_id: assignment.time_interval_id.clone(),
                    class_id: occupant.class_id,
                });
            }
        }
        Err(ApiError::Conflict(raw))
    }

    /// 把排课请求转换为待写入的排课记录
    ///
    /// # 参数
    /// - existing_class: 为 true 时额外检查教学班自身在该时间段是否已排课
    fn prepare_assignments(
        &self,
        class: &Class,
        drafts: &[ScheduleDraft],
        existing_class: bool,
    ) -> ApiResult<Vec<ClassScheduleAssignment>> {
        let mut seen: HashSet<&str> = HashSet::new();
        for draft in drafts {
            if !seen.insert(draft.time_interval_id.as_str()) {
                return Err(ApiError::ClassTimeConflict {
                    class_id: class.class_id.clone(),
                    time_interval_id: draft.time_interval_id.clone(),
                });
            }
        }

        let mut assignments = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if self.interval_repo.find_by_id(&draft.time_interval_id)?.is_none() {
                return Err(ApiError::not_found("TimeInterval", &draft.time_interval_id));
            }
            let room = self
                .directory_repo
                .find_room(&draft.room_id)?
                .ok_or_else(|| ApiError::not_found("Room", &draft.room_id))?;
            let building_id = match &draft.building_id {
                Some(building_id) => {
                    if self.directory_repo.find_building(building_id)?.is_none() {
                        return Err(ApiError::not_found("Building", building_id));
                    }
                    building_id.clone()
                }
                None => room.building_id.clone(),
            };

            if existing_class
                && !self
                    .availability
                    .is_time_interval_available_for_class(&class.class_id, &draft.time_interval_id)?
            {
                return Err(ApiError::ClassTimeConflict {
                    class_id: class.class_id.clone(),
                    time_interval_id: draft.time_interval_id.clone(),
                });
            }

            if let Some(occupant) = self
                .availability
                .room_occupant(&draft.room_id, &draft.time_interval_id)?
            {
                tracing::warn!(
                    room_id = %draft.room_id,
                    time_interval_id = %draft.time_interval_id,
                    occupant = %occupant.class_id,
                    "教室已被占用，排课被拒绝"
                );
                return Err(ApiError::RoomConflict {
                    room_id: draft.room_id.clone(),
                    time_interval_id: draft.time_interval_id.clone(),
                    class_id: occupant.class_id,
                });
            }

            let conflicts: Vec<String> = self
                .availability
                .teacher_conflicts(&class.teacher_id, &draft.time_interval_id)?
                .into_iter()
                .filter(|a| a.class_id != class.class_id)
                .map(|a| a.class_id)
                .collect();
            if !conflicts.is_empty() {
                tracing::warn!(
                    teacher_id = %class.teacher_id,
                    time_interval_id = %draft.time_interval_id,
                    "教师时间冲突，排课被拒绝"
                );
                return Err(ApiError::TeacherConflict {
                    teacher_id: class.teacher_id.clone(),
                    time_interval_id: draft.time_interval_id.clone(),
                    class_ids: conflicts,
                });
            }

            assignments.push(ClassScheduleAssignment::new(
                &class.class_id,
                &draft.time_interval_id,
                &draft.room_id,
                building_id,
            ));
        }
        Ok(assignments)
    }

    /// 删除排课前: 若这是该星期的最后一条排课，该星期上不得还有停课记录
    fn check_weekday_still_covered(&self, class: &Class, assignment_id: &str) -> ApiResult<()> {
        let schedules = self.class_repo.find_schedules(&class.class_id)?;
        let weekday = match schedules
            .iter()
            .find(|s| s.assignment.assignment_id == assignment_id)
        {
            Some(slot) => slot.interval.day_of_week,
            None => return Ok(()),
        };
        let still_meets = schedules.iter().any(|s| {
            s.assignment.assignment_id != assignment_id && s.interval.day_of_week == weekday
        });
        if still_meets {
            return Ok(());
        }

        let stranded = self
            .cancellation_repo
            .find_by_class(&class.class_id)?
            .into_iter()
            .filter(|c| Weekday::from(c.date.weekday()) == weekday)
            .count();
        if stranded > 0 {
            tracing::warn!(
                class_id = %class.class_id,
                assignment_id = assignment_id,
                weekday = %weekday,
                cancellations = stranded,
                "该星期仍有停课记录，拒绝删除最后一条排课"
            );
            return Err(ApiError::InUse {
                entity: "ClassScheduleAssignment".to_string(),
                id: assignment_id.to_string(),
                reference_count: stranded as i64,
            });
        }
        Ok(())
    }

    /// 更换教师前: 新教师不得已有同课同学期教学班，且现有排课时间不得与其冲突
    fn check_teacher_reassignment(&self, class: &Class, teacher_id: &str) -> ApiResult<()> {
        if let Some(existing) = self.class_repo.find_by_teacher_subject_term(
            teacher_id,
            &class.subject_id,
            &class.term_id,
        )? {
            return Err(ApiError::DuplicateClass {
                existing_class_id: existing.class_id,
            });
        }

        for slot in self.class_repo.find_schedules(&class.class_id)? {
            let interval_id = &slot.assignment.time_interval_id;
            let conflicts: Vec<String> = self
                .availability
                .teacher_conflicts(teacher_id, interval_id)?
                .into_iter()
                .map(|a| a.class_id)
                .filter(|id| id != &class.class_id)
                .collect();
            if !conflicts.is_empty() {
                return Err(ApiError::TeacherConflict {
                    teacher_id: teacher_id.to_string(),
                    time_interval_id: interval_id.clone(),
                    class_ids: conflicts,
                });
            }
        }
        Ok(())
    }

    /// 组装教学班完整视图（上课状态读时派生）
    fn hydrate(&self, class: Class) -> ApiResult<ClassDetail> {
        let schedules = self.class_repo.find_schedules(&class.class_id)?;
        let cancellations = self.cancellation_repo.find_by_class(&class.class_id)?;
        let occurrence = OccurrenceStatusResolver::resolve(&cancellations, self.clock.today());
        Ok(ClassDetail {
            class,
            schedules,
            cancellations,
            occurrence,
        })
    }

    /// 审计日志写入失败不回滚业务写入
    fn record(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(action_type = log.action_type.as_str(), "操作日志写入失败: {}", e);
        }
    }
}

/// 操作者的教学班可见范围
pub(crate) fn resolve_visibility(
    class_repo: &ClassRepository,
    directory_repo: &DirectoryRepository,
    actor: &Actor,
) -> ApiResult<Visibility> {
    if actor.is_admin() {
        return Ok(Visibility::All);
    }
    let taught = class_repo.class_ids_for_teacher(&actor.user_id)?;
    let enrolled = directory_repo.class_ids_for_student(&actor.user_id)?;
    Ok(Visibility::for_actor(actor, taught, enrolled))
}
