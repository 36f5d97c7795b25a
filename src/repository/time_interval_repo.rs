// ==========================================
// 排课核心 - 时间段数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（重叠判定在 engine 层）
// ==========================================

use crate::db::{format_time, parse_time_column};
use crate::domain::time_interval::TimeInterval;
use crate::domain::types::Weekday;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "interval_id, start_time, end_time, day_of_week";

/// 时间段仓储
/// 职责: 管理 time_intervals 表
pub struct TimeIntervalRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimeIntervalRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, interval: &TimeInterval) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO time_intervals (interval_id, start_time, end_time, day_of_week)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                interval.interval_id,
                format_time(interval.start_time),
                format_time(interval.end_time),
                interval.day_of_week.to_db_str(),
            ],
        )?;
        Ok(())
    }

    /// 更新时间段
    ///
    /// # 返回
    /// - Err(NotFound): 记录不存在
    pub fn update(&self, interval: &TimeInterval) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE time_intervals
            SET start_time = ?2, end_time = ?3, day_of_week = ?4
            WHERE interval_id = ?1
            "#,
            params![
                interval.interval_id,
                format_time(interval.start_time),
                format_time(interval.end_time),
                interval.day_of_week.to_db_str(),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "TimeInterval".to_string(),
                id: interval.interval_id.clone(),
            });
        }
        Ok(())
    }

    /// 删除时间段，返回删除行数
    ///
    /// 仍被排课引用时由外键拒绝（ForeignKeyViolation）
    pub fn delete(&self, interval_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM time_intervals WHERE interval_id = ?1",
            params![interval_id],
        )?;
        Ok(rows)
    }

    pub fn find_by_id(&self, interval_id: &str) -> RepositoryResult<Option<TimeInterval>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM time_intervals WHERE interval_id = ?1",
            SELECT_COLUMNS
        );
        let interval = conn
            .query_row(&sql, params![interval_id], map_interval_row)
            .optional()?;
        Ok(interval)
    }

    /// 查询时间段列表（按星期、开始时间排序）
    pub fn list(&self, day_of_week: Option<Weekday>) -> RepositoryResult<Vec<TimeInterval>> {
        let conn = self.get_conn()?;
        let mut intervals = match day_of_week {
            Some(day) => {
                let sql = format!(
                    "SELECT {} FROM time_intervals WHERE day_of_week = ?1 ORDER BY start_time",
                    SELECT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![day.to_db_str()], map_interval_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let sql = format!("SELECT {} FROM time_intervals", SELECT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], map_interval_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        // 星期按 ISO 顺序而不是字符串顺序
        intervals.sort_by(|a, b| {
            a.day_of_week
                .cmp(&b.day_of_week)
                .then(a.start_time.cmp(&b.start_time))
        });
        Ok(intervals)
    }

    /// 查询同一星期的其他时间段（用于重叠校验）
    pub fn find_same_day(
        &self,
        day_of_week: Weekday,
        exclude_id: Option<&str>,
    ) -> RepositoryResult<Vec<TimeInterval>> {
        let intervals = self.list(Some(day_of_week))?;
        Ok(intervals
            .into_iter()
            .filter(|i| exclude_id.map_or(true, |id| i.interval_id != id))
            .collect())
    }

    /// 引用该时间段的排课数量
    pub fn count_assignments(&self, interval_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM class_schedule_assignments WHERE time_interval_id = ?1",
            params![interval_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_interval_row(row: &Row<'_>) -> rusqlite::Result<TimeInterval> {
    map_interval_row_at(row, 0)
}

/// 从指定列偏移处读取时间段（联表查询复用）
pub(crate) fn map_interval_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<TimeInterval> {
    let day_raw: String = row.get(offset + 3)?;
    let day_of_week = Weekday::parse(&day_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 3,
            rusqlite::types::Type::Text,
            format!("未知星期: {}", day_raw).into(),
        )
    })?;
    Ok(TimeInterval {
        interval_id: row.get(offset)?,
        start_time: parse_time_column(offset + 1, &row.get::<_, String>(offset + 1)?)?,
        end_time: parse_time_column(offset + 2, &row.get::<_, String>(offset + 2)?)?,
        day_of_week,
    })
}
