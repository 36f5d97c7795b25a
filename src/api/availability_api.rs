// ==========================================
// 排课核心 - 可用性查询 API
// ==========================================
// 供界面预检查使用，结果仅供参考
// 写入时会重新校验，并以唯一约束为准
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::class::ClassScheduleAssignment;
use crate::domain::directory::Room;
use crate::engine::availability::AvailabilityIndex;
use crate::repository::directory_repo::DirectoryRepository;
use crate::repository::time_interval_repo::TimeIntervalRepository;

pub struct AvailabilityApi {
    index: Arc<AvailabilityIndex>,
    interval_repo: Arc<TimeIntervalRepository>,
    directory_repo: Arc<DirectoryRepository>,
}

impl AvailabilityApi {
    pub fn new(
        index: Arc<AvailabilityIndex>,
        interval_repo: Arc<TimeIntervalRepository>,
        directory_repo: Arc<DirectoryRepository>,
    ) -> Self {
        Self {
            index,
            interval_repo,
            directory_repo,
        }
    }

    pub fn is_room_available(&self, room_id: &str, time_interval_id: &str) -> ApiResult<bool> {
        self.ensure_room(room_id)?;
        self.ensure_interval(time_interval_id)?;
        Ok(self.index.is_room_available(room_id, time_interval_id)?)
    }

    pub fn is_time_interval_available_for_class(
        &self,
        class_id: &str,
        time_interval_id: &str,
    ) -> ApiResult<bool> {
        self.ensure_interval(time_interval_id)?;
        Ok(self
            .index
            .is_time_interval_available_for_class(class_id, time_interval_id)?)
    }

    pub fn teacher_conflicts(
        &self,
        teacher_id: &str,
        time_interval_id: &str,
    ) -> ApiResult<Vec<ClassScheduleAssignment>> {
        self.ensure_interval(time_interval_id)?;
        Ok(self.index.teacher_conflicts(teacher_id, time_interval_id)?)
    }

    pub fn available_rooms(&self, time_interval_id: &str) -> ApiResult<Vec<Room>> {
        self.ensure_interval(time_interval_id)?;
        Ok(self.index.available_rooms(time_interval_id)?)
    }

    fn ensure_room(&self, room_id: &str) -> ApiResult<()> {
        match self.directory_repo.find_room(room_id)? {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found("Room", room_id)),
        }
    }

    fn ensure_interval(&self, time_interval_id: &str) -> ApiResult<()> {
        match self.interval_repo.find_by_id(time_interval_id)? {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found("TimeInterval", time_interval_id)),
        }
    }
}
