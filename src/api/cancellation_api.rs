// ==========================================
// 排课核心 - 停课 API
// ==========================================
// 职责: 按日期停课、停课记录查询、停课通知发布
// 红线:
// - 日期违规全部收集后一次性拒绝
// - 批量写入全有或全无
// - 通知失败只记日志，不影响已提交的停课
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use crate::api::class_api::resolve_visibility;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::cancellation::{CancellationDateFilter, ClassCancellation};
use crate::domain::class::Class;
use crate::domain::types::Actor;
use crate::engine::access::ClassCapability;
use crate::engine::clock::Clock;
use crate::engine::events::{CancellationNotice, NoticeRecipient, OptionalNotifier};
use crate::engine::recurrence::RecurrenceValidator;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::cancellation_repo::CancellationRepository;
use crate::repository::class_repo::ClassRepository;
use crate::repository::directory_repo::DirectoryRepository;
use crate::repository::error::RepositoryError;

/// 停课API
pub struct CancellationApi {
    class_repo: Arc<ClassRepository>,
    cancellation_repo: Arc<CancellationRepository>,
    directory_repo: Arc<DirectoryRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    notifier: OptionalNotifier,
    clock: Arc<dyn Clock>,
}

impl CancellationApi {
    pub fn new(
        class_repo: Arc<ClassRepository>,
        cancellation_repo: Arc<CancellationRepository>,
        directory_repo: Arc<DirectoryRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        notifier: OptionalNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            class_repo,
            cancellation_repo,
            directory_repo,
            action_log_repo,
            notifier,
            clock,
        }
    }

    /// 按日期停课
    ///
    /// # 流程
    /// 1. 权限（任课教师或管理员）
    /// 2. 原因、日期非空
    /// 3. 学期与排课存在
    /// 4. 逐日校验: 已过去 / 超出学期 / 星期不符
    /// 5. 已停课日期检查
    /// 6. 单事务批量写入
    /// 7. 发布停课通知
    ///
    /// # 返回
    /// - Ok(Vec<ClassCancellation>): 新写入的停课记录（按日期升序）
    pub fn cancel(
        &self,
        class_id: &str,
        dates: &[NaiveDate],
        reason: &str,
        actor: &Actor,
    ) -> ApiResult<Vec<ClassCancellation>> {
        // ==========================================
        // 1. 权限
        // ==========================================
        let class = self.load_class(class_id)?;
        if !ClassCapability::evaluate(actor, &class, false).can_manage {
            return Err(ApiError::Unauthorized(format!(
                "用户 {} 无权为教学班 {} 停课",
                actor.user_id, class_id
            )));
        }

        // ==========================================
        // 2. 输入
        // ==========================================
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::InvalidInput("停课原因不能为空".to_string()));
        }
        if dates.is_empty() {
            return Err(ApiError::InvalidInput("停课日期不能为空".to_string()));
        }

        // ==========================================
        // 3. 学期与排课
        // ==========================================
        let term = self
            .directory_repo
            .find_term(&class.term_id)?
            .ok_or_else(|| ApiError::not_found("Term", &class.term_id))?;
        let weekdays = self.class_repo.class_weekdays(class_id)?;
        if weekdays.is_empty() {
            return Err(ApiError::ValidationError(format!(
                "教学班 {} 尚未排课，无法停课",
                class_id
            )));
        }

        // ==========================================
        // 4. 日期校验
        // ==========================================
        let today = self.clock.today();
        let report =
            RecurrenceValidator::validate_cancellation_dates(dates, today, &term, &weekdays);
        if !report.is_valid() {
            tracing::warn!(
                class_id = class_id,
                past = report.past_dates.len(),
                outside_term = report.outside_term_dates.len(),
                invalid_weekday = report.invalid_weekday_dates.len(),
                "停课日期校验未通过"
            );
            return Err(ApiError::InvalidCancellationDates {
                past_dates: report.past_dates,
                outside_term_dates: report.outside_term_dates,
                invalid_weekday_dates: report.invalid_weekday_dates,
            });
        }

        // ==========================================
        // 5. 重复停课
        // ==========================================
        let existing = self
            .cancellation_repo
            .find_existing_dates(class_id, &report.dates)?;
        if !existing.is_empty() {
            return Err(ApiError::AlreadyCancelled {
                class_id: class_id.to_string(),
                dates: existing,
            });
        }

        // ==========================================
        // 6. 写入（并发写入者在此由唯一约束拒绝）
        // ==========================================
        let now = self.clock.now();
        let created: Vec<ClassCancellation> = report
            .dates
            .iter()
            .map(|date| ClassCancellation::new(class_id, *date, reason, &actor.user_id, now))
            .collect();
        match self.cancellation_repo.batch_insert(&created) {
            Ok(_) => {}
            Err(RepositoryError::UniqueConstraintViolation(raw)) => {
                let existing = self
                    .cancellation_repo
                    .find_existing_dates(class_id, &report.dates)?;
                tracing::warn!(class_id = class_id, "并发停课冲突: {}", raw);
                if existing.is_empty() {
                    return Err(ApiError::Conflict(raw));
                }
                return Err(ApiError::AlreadyCancelled {
                    class_id: class_id.to_string(),
                    dates: existing,
                });
            }
            Err(e) => return Err(e.into()),
        }

        self.record(
            ActionLog::new(ActionType::CancelClassDates, &actor.user_id)
                .with_class(class_id)
                .with_payload(json!({ "dates": report.dates, "reason": reason }))
                .with_detail(format!("停课 {} 天", created.len())),
        );
        tracing::info!(
            class_id = class_id,
            dates = created.len(),
            canceled_by = %actor.user_id,
            "停课已登记"
        );

        // ==========================================
        // 7. 通知
        // ==========================================
        self.publish_notice(&class, &report.dates, reason);

        Ok(created)
    }

    /// 教学班的停课记录
    pub fn list_cancellations(
        &self,
        class_id: &str,
        actor: &Actor,
    ) -> ApiResult<Vec<ClassCancellation>> {
        let class = self.load_class(class_id)?;
        let enrolled = self.directory_repo.is_enrolled(class_id, &actor.user_id)?;
        if !ClassCapability::evaluate(actor, &class, enrolled).can_view {
            return Err(ApiError::Unauthorized(format!(
                "用户 {} 无权查看教学班 {} 的停课记录",
                actor.user_id, class_id
            )));
        }
        Ok(self.cancellation_repo.find_by_class(class_id)?)
    }

    /// 日期范围内的停课记录（非管理员只看到自己任教或选修的教学班）
    pub fn list_all_cancellations(
        &self,
        filter: CancellationDateFilter,
        actor: &Actor,
    ) -> ApiResult<Vec<ClassCancellation>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(ApiError::InvalidInput(format!(
                    "开始日期 {} 晚于结束日期 {}",
                    start, end
                )));
            }
        }

        let visibility = resolve_visibility(&self.class_repo, &self.directory_repo, actor)?;
        let rows = self
            .cancellation_repo
            .list(&filter, visibility.class_ids())?;
        tracing::debug!(actor = %actor.user_id, count = rows.len(), "停课记录查询");
        Ok(rows)
    }

    fn load_class(&self, class_id: &str) -> ApiResult<Class> {
        self.class_repo
            .find_by_id(class_id)?
            .ok_or_else(|| ApiError::not_found("Class", class_id))
    }

    /// 组装并发布停课通知；任何失败只记 warn
    fn publish_notice(&self, class: &Class, dates: &[NaiveDate], reason: &str) {
        let notice = match self.build_notice(class, dates, reason) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!(class_id = %class.class_id, "停课通知组装失败: {}", e);
                return;
            }
        };

        match self.notifier.publish(notice) {
            Ok(job_id) if !job_id.is_empty() => {
                tracing::debug!(class_id = %class.class_id, job_id = %job_id, "停课通知已发布");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(class_id = %class.class_id, "停课通知发布失败: {}", e);
            }
        }
    }

    fn build_notice(
        &self,
        class: &Class,
        dates: &[NaiveDate],
        reason: &str,
    ) -> ApiResult<CancellationNotice> {
        let subject_name = self
            .directory_repo
            .find_subject(&class.subject_id)?
            .map(|s| s.name)
            .unwrap_or_else(|| class.subject_id.clone());
        let teacher_name = self
            .directory_repo
            .find_user(&class.teacher_id)?
            .map(|u| u.name)
            .unwrap_or_else(|| class.teacher_id.clone());
        let recipients = self
            .directory_repo
            .list_enrolled_students(&class.class_id)?
            .into_iter()
            .map(|u| NoticeRecipient {
                user_id: u.user_id,
                name: u.name,
                email: u.email,
            })
            .collect();

        Ok(CancellationNotice {
            class_id: class.class_id.clone(),
            class_name: class.name.clone(),
            subject_name,
            teacher_name,
            dates: dates.to_vec(),
            reason: reason.to_string(),
            recipients,
        })
    }

    /// 审计日志写入失败不回滚业务写入
    fn record(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(action_type = log.action_type.as_str(), "操作日志写入失败: {}", e);
        }
    }
}
