// ==========================================
// 排课核心 - 时间段登记 API
// ==========================================
// 职责: 标准时间段的创建、修改、删除、查询、CSV 导入
// 红线: 同一星期内不允许重复或重叠的时间段
// ==========================================

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::time_interval::{TimeInterval, TimeIntervalPatch};
use crate::domain::types::{Actor, Weekday};
use crate::engine::interval_rules::{IntervalRules, IntervalViolation};
use crate::i18n::t_with_args;
use crate::importer::{ImportError, ParsedLine, TimeIntervalCsvParser};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::time_interval_repo::TimeIntervalRepository;

// ==========================================
// TimeIntervalApi - 时间段登记 API
// ==========================================

/// 时间段登记API
///
/// 职责：
/// 1. 写入前执行区间合法、完全重复、重叠三项校验
/// 2. 删除前检查排课引用
/// 3. ActionLog记录
pub struct TimeIntervalApi {
    interval_repo: Arc<TimeIntervalRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl TimeIntervalApi {
    pub fn new(
        interval_repo: Arc<TimeIntervalRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            interval_repo,
            action_log_repo,
        }
    }

    /// 创建时间段
    ///
    /// # 返回
    /// - Err(InvalidRange): end_time <= start_time
    /// - Err(DuplicateInterval): 同一星期已存在相同起止
    /// - Err(OverlapConflict): 同一星期已存在重叠时间段
    pub fn create(
        &self,
        start_time: NaiveTime,
        end_time: NaiveTime,
        day_of_week: Weekday,
        actor: &Actor,
    ) -> ApiResult<TimeInterval> {
        let interval = TimeInterval::new(start_time, end_time, day_of_week);
        self.check_rules(&interval)?;

        self.interval_repo.insert(&interval)?;
        self.record(
            ActionLog::new(ActionType::CreateTimeInterval, &actor.user_id)
                .with_payload(json!(interval))
                .with_detail(interval.label()),
        );

        tracing::info!(
            interval_id = %interval.interval_id,
            label = %interval.label(),
            "时间段已创建"
        );
        Ok(interval)
    }

    /// 局部更新时间段（自身不参与重叠比较）
    pub fn update(
        &self,
        interval_id: &str,
        patch: TimeIntervalPatch,
        actor: &Actor,
    ) -> ApiResult<TimeInterval> {
        let current = self.get(interval_id)?;
        if patch.is_empty() {
            return Ok(current);
        }

        let updated = patch.apply_to(&current);

        // 已被排课引用的时间段不能改星期，否则已有停课日期的星期会与教学班脱节
        if updated.day_of_week != current.day_of_week {
            let references = self.interval_repo.count_assignments(interval_id)?;
            if references > 0 {
                tracing::warn!(
                    interval_id = interval_id,
                    from = %current.day_of_week,
                    to = %updated.day_of_week,
                    "时间段被排课引用，拒绝修改星期"
                );
                return Err(ApiError::InUse {
                    entity: "TimeInterval".to_string(),
                    id: interval_id.to_string(),
                    reference_count: references,
                });
            }
        }
        self.check_rules(&updated)?;

        self.interval_repo.update(&updated)?;
        self.record(
            ActionLog::new(ActionType::UpdateTimeInterval, &actor.user_id)
                .with_payload(json!({ "before": current, "after": updated }))
                .with_detail(format!("{} → {}", current.label(), updated.label())),
        );

        tracing::info!(interval_id = interval_id, label = %updated.label(), "时间段已更新");
        Ok(updated)
    }

    /// 删除时间段
    ///
    /// # 返回
    /// - Err(InUse): 仍被排课引用
    pub fn delete(&self, interval_id: &str, actor: &Actor) -> ApiResult<()> {
        let current = self.get(interval_id)?;

        let references = self.interval_repo.count_assignments(interval_id)?;
        if references > 0 {
            return Err(ApiError::InUse {
                entity: "TimeInterval".to_string(),
                id: interval_id.to_string(),
                reference_count: references,
            });
        }

        // 计数与删除之间被新排课引用时，外键约束拒绝删除
        match self.interval_repo.delete(interval_id) {
            Ok(0) => return Err(ApiError::not_found("TimeInterval", interval_id)),
            Ok(_) => {}
            Err(crate::repository::RepositoryError::ForeignKeyViolation(_)) => {
                let reference_count = self.interval_repo.count_assignments(interval_id)?;
                return Err(ApiError::InUse {
                    entity: "TimeInterval".to_string(),
                    id: interval_id.to_string(),
                    reference_count,
                });
            }
            Err(e) => return Err(e.into()),
        }

        self.record(
            ActionLog::new(ActionType::DeleteTimeInterval, &actor.user_id)
                .with_payload(json!(current))
                .with_detail(current.label()),
        );
        tracing::info!(interval_id = interval_id, "时间段已删除");
        Ok(())
    }

    pub fn get(&self, interval_id: &str) -> ApiResult<TimeInterval> {
        self.interval_repo
            .find_by_id(interval_id)?
            .ok_or_else(|| ApiError::not_found("TimeInterval", interval_id))
    }

    /// 按星期、开始时间排序的时间段列表
    pub fn list(&self, day_of_week: Option<Weekday>) -> ApiResult<Vec<TimeInterval>> {
        Ok(self.interval_repo.list(day_of_week)?)
    }

    /// 从 CSV 文件批量导入
    pub fn import_csv_file(&self, path: &Path, actor: &Actor) -> ApiResult<IntervalImportReport> {
        let lines = TimeIntervalCsvParser::parse_file(path).map_err(import_error)?;
        Ok(self.import_lines(lines, actor))
    }

    /// 从任意 reader 批量导入
    pub fn import_csv<R: Read>(&self, reader: R, actor: &Actor) -> ApiResult<IntervalImportReport> {
        let lines = TimeIntervalCsvParser::parse_reader(reader).map_err(import_error)?;
        Ok(self.import_lines(lines, actor))
    }

    /// 逐行走 create，失败行不影响其他行
    fn import_lines(&self, lines: Vec<ParsedLine>, actor: &Actor) -> IntervalImportReport {
        let mut report = IntervalImportReport::default();
        for parsed in lines {
            let outcome = parsed
                .row
                .map_err(ApiError::ValidationError)
                .and_then(|row| self.create(row.start_time, row.end_time, row.day_of_week, actor));
            match outcome {
                Ok(interval) => report.created.push(interval),
                Err(e) => {
                    let message = e.to_string();
                    let line = parsed.line.to_string();
                    tracing::warn!(
                        "{}",
                        t_with_args(
                            "import.row_failed",
                            &[("line", line.as_str()), ("message", message.as_str())]
                        )
                    );
                    report.failures.push(ImportFailure {
                        line: parsed.line,
                        message,
                    });
                }
            }
        }

        tracing::info!(
            created = report.created.len(),
            failed = report.failures.len(),
            "时间段 CSV 导入完成"
        );
        report
    }

    fn check_rules(&self, candidate: &TimeInterval) -> ApiResult<()> {
        let same_day = self
            .interval_repo
            .find_same_day(candidate.day_of_week, Some(&candidate.interval_id))?;

        IntervalRules::check(candidate, &same_day).map_err(|violation| match violation {
            IntervalViolation::InvalidRange => ApiError::InvalidRange {
                start_time: candidate.start_time.format("%H:%M").to_string(),
                end_time: candidate.end_time.format("%H:%M").to_string(),
            },
            IntervalViolation::Duplicate { existing } => ApiError::DuplicateInterval {
                existing_id: existing.interval_id,
            },
            IntervalViolation::Overlap { conflicting } => {
                tracing::warn!(
                    candidate = %candidate.label(),
                    conflicting = %conflicting.label(),
                    "时间段重叠被拒绝"
                );
                ApiError::OverlapConflict {
                    label: conflicting.label(),
                    conflicting_id: conflicting.interval_id,
                }
            }
        })
    }

    /// 审计日志写入失败不回滚业务写入
    fn record(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(action_type = log.action_type.as_str(), "操作日志写入失败: {}", e);
        }
    }
}

fn import_error(err: ImportError) -> ApiError {
    match err {
        ImportError::FileNotFound(path) => {
            ApiError::NotFound(t_with_args("import.file_not_found", &[("path", path.as_str())]))
        }
        other => ApiError::InvalidInput(other.to_string()),
    }
}

// ==========================================
// CSV 导入结果
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntervalImportReport {
    pub created: Vec<TimeInterval>,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    /// CSV 行号（表头为第 1 行）
    pub line: usize,
    pub message: String,
}
