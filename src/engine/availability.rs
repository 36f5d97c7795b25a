// ==========================================
// 排课核心 - 教室/教师可用性索引
// ==========================================
// 只读查询，不防止并发竞争
// 最终冲突判定以 class_schedule_assignments 的唯一约束为准
// ==========================================

use crate::domain::class::ClassScheduleAssignment;
use crate::domain::directory::Room;
use crate::repository::class_repo::ClassRepository;
use crate::repository::directory_repo::DirectoryRepository;
use crate::repository::error::RepositoryResult;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

pub struct AvailabilityIndex {
    class_repo: Arc<ClassRepository>,
    directory_repo: Arc<DirectoryRepository>,
}

impl AvailabilityIndex {
    pub fn new(class_repo: Arc<ClassRepository>, directory_repo: Arc<DirectoryRepository>) -> Self {
        Self {
            class_repo,
            directory_repo,
        }
    }

    /// 教室在该时间段是否空闲
    pub fn is_room_available(&self, room_id: &str, time_interval_id: &str) -> RepositoryResult<bool> {
        Ok(self
            .class_repo
            .find_assignment_at(room_id, time_interval_id)?
            .is_none())
    }

    /// 该时间段是否仍占用教室（返回占用者）
    pub fn room_occupant(
        &self,
        room_id: &str,
        time_interval_id: &str,
    ) -> RepositoryResult<Option<ClassScheduleAssignment>> {
        self.class_repo.find_assignment_at(room_id, time_interval_id)
    }

    /// 教学班在该时间段是否尚未排课
    pub fn is_time_interval_available_for_class(
        &self,
        class_id: &str,
        time_interval_id: &str,
    ) -> RepositoryResult<bool> {
        Ok(self
            .class_repo
            .find_class_assignments_at(class_id, time_interval_id)?
            .is_empty())
    }

    /// 教师在该时间段已有的排课
    pub fn teacher_conflicts(
        &self,
        teacher_id: &str,
        time_interval_id: &str,
    ) -> RepositoryResult<Vec<ClassScheduleAssignment>> {
        self.class_repo
            .find_teacher_assignments_at(teacher_id, time_interval_id)
    }

    /// 该时间段空闲的教室 = 全部教室 - 已占用教室
    #[instrument(skip(self))]
    pub fn available_rooms(&self, time_interval_id: &str) -> RepositoryResult<Vec<Room>> {
        let occupied: HashSet<String> = self
            .class_repo
            .occupied_room_ids(time_interval_id)?
            .into_iter()
            .collect();
        let rooms: Vec<Room> = self
            .directory_repo
            .list_rooms()?
            .into_iter()
            .filter(|room| !occupied.contains(&room.room_id))
            .collect();
        tracing::debug!(
            occupied = occupied.len(),
            available = rooms.len(),
            "可用教室查询完成"
        );
        Ok(rooms)
    }
}
