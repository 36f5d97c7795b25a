// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 提供API层集成测试的通用环境与数据准备
// ==========================================
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tempfile::NamedTempFile;

use class_scheduling::app::AppState;
use class_scheduling::domain::{Actor, ClassDetail, ClassDraft, ScheduleDraft, Weekday};
use class_scheduling::engine::{Clock, ManualClock};

use crate::test_helpers::{self, ADMIN_ID, TERM_ID};

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// # 说明
/// - 使用临时数据库文件
/// - "今天"固定为 2024-02-20（周二）08:00，可通过 clock 推进
/// - 已写入标准目录数据（见 test_helpers::seed_directory）
pub struct ApiTestEnv {
    pub state: AppState,
    pub clock: Arc<ManualClock>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    pub fn new() -> Result<Self, String> {
        Self::on(test_helpers::date(2024, 2, 20))
    }

    /// 以指定日期为"今天"创建测试环境
    pub fn on(today: NaiveDate) -> Result<Self, String> {
        let (temp_file, db_path) = test_helpers::create_test_db()
            .map_err(|e| format!("创建测试数据库失败: {}", e))?;

        let start = today
            .and_hms_opt(8, 0, 0)
            .ok_or_else(|| "无效的测试时间".to_string())?;
        let clock = Arc::new(ManualClock::new(start));
        let state = AppState::with_clock(db_path, clock.clone() as Arc<dyn Clock>)?;

        test_helpers::seed_directory(&state.directory_repo)
            .map_err(|e| format!("写入目录数据失败: {}", e))?;

        Ok(Self {
            state,
            clock,
            _temp_file: temp_file,
        })
    }

    pub fn admin(&self) -> Actor {
        Actor::admin(ADMIN_ID)
    }

    /// 以管理员身份创建时间段，返回 interval_id
    pub fn create_interval(&self, day: Weekday, start: NaiveTime, end: NaiveTime) -> String {
        self.state
            .time_interval_api
            .create(start, end, day, &self.admin())
            .expect("创建时间段失败")
            .interval_id
    }

    /// 以教师本人身份开班（本学期）
    pub fn create_class(
        &self,
        teacher_id: &str,
        subject_id: &str,
        schedules: Vec<ScheduleDraft>,
    ) -> ClassDetail {
        self.state
            .class_api
            .create_with_schedules(
                class_draft(subject_id, None, &format!("{}-{}", subject_id, teacher_id)),
                schedules,
                &Actor::teacher(teacher_id),
            )
            .expect("创建教学班失败")
    }

    pub fn enroll(&self, class_id: &str, student_id: &str) {
        self.state
            .directory_repo
            .enroll_student(class_id, student_id)
            .expect("选课失败");
    }
}

/// 本学期的开班请求
pub fn class_draft(subject_id: &str, teacher_id: Option<&str>, name: &str) -> ClassDraft {
    ClassDraft {
        subject_id: subject_id.to_string(),
        term_id: TERM_ID.to_string(),
        teacher_id: teacher_id.map(str::to_string),
        name: name.to_string(),
    }
}
