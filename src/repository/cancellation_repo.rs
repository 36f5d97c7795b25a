// ==========================================
// 排课核心 - 停课记录数据仓储
// ==========================================
// (class_id, date) 唯一约束是重复停课的最终判定
// ==========================================

use crate::db::{format_date, format_datetime, parse_date_column, parse_datetime_column};
use crate::domain::cancellation::{CancellationDateFilter, ClassCancellation};
use crate::repository::class_repo::placeholders;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str =
    "cancellation_id, class_id, date, reason, canceled_by, students_notified, created_at";

/// 停课记录仓储
pub struct CancellationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CancellationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量写入停课记录
    ///
    /// # 红线
    /// - 必须在事务中完成，任一日期冲突则整体回滚
    pub fn batch_insert(&self, cancellations: &[ClassCancellation]) -> RepositoryResult<usize> {
        if cancellations.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO class_cancellations (
                    cancellation_id, class_id, date, reason, canceled_by,
                    students_notified, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for c in cancellations {
                stmt.execute(params![
                    c.cancellation_id,
                    c.class_id,
                    format_date(c.date),
                    c.reason,
                    c.canceled_by,
                    if c.students_notified { 1 } else { 0 },
                    format_datetime(c.created_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(cancellations.len())
    }

    /// 教学班的全部停课记录（按日期升序）
    pub fn find_by_class(&self, class_id: &str) -> RepositoryResult<Vec<ClassCancellation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM class_cancellations WHERE class_id = ?1 ORDER BY date",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![class_id], map_cancellation_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 在给定日期中筛出已停课的日期（升序）
    pub fn find_existing_dates(
        &self,
        class_id: &str,
        dates: &[NaiveDate],
    ) -> RepositoryResult<Vec<NaiveDate>> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT date FROM class_cancellations WHERE class_id = ? AND date IN ({}) ORDER BY date",
            placeholders(dates.len())
        );
        let mut values: Vec<Value> = vec![Value::from(class_id.to_string())];
        values.extend(dates.iter().map(|d| Value::from(format_date(*d))));

        let mut stmt = conn.prepare(&sql)?;
        let existing = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                parse_date_column(0, &row.get::<_, String>(0)?)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(existing)
    }

    /// 按日期范围查询停课记录
    ///
    /// # 参数
    /// - filter: 日期范围（首尾包含）
    /// - class_ids: 可见教学班范围（None 表示全部）
    pub fn list(
        &self,
        filter: &CancellationDateFilter,
        class_ids: Option<&[String]>,
    ) -> RepositoryResult<Vec<ClassCancellation>> {
        if matches!(class_ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let mut sql = format!("SELECT {} FROM class_cancellations WHERE 1 = 1", SELECT_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(start) = filter.start_date {
            sql.push_str(" AND date >= ?");
            values.push(Value::from(format_date(start)));
        }
        if let Some(end) = filter.end_date {
            sql.push_str(" AND date <= ?");
            values.push(Value::from(format_date(end)));
        }
        if let Some(ids) = class_ids {
            sql.push_str(&format!(" AND class_id IN ({})", placeholders(ids.len())));
            values.extend(ids.iter().map(|id| Value::from(id.clone())));
        }
        sql.push_str(" ORDER BY date, class_id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_cancellation_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 标记学生已通知（停课记录唯一允许的更新）
    pub fn mark_students_notified(
        &self,
        class_id: &str,
        dates: &[NaiveDate],
    ) -> RepositoryResult<usize> {
        if dates.is_empty() {
            return Ok(0);
        }

        let conn = self.get_conn()?;
        let sql = format!(
            "UPDATE class_cancellations SET students_notified = 1 WHERE class_id = ? AND date IN ({})",
            placeholders(dates.len())
        );
        let mut values: Vec<Value> = vec![Value::from(class_id.to_string())];
        values.extend(dates.iter().map(|d| Value::from(format_date(*d))));

        let rows = conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(rows)
    }
}

fn map_cancellation_row(row: &Row<'_>) -> rusqlite::Result<ClassCancellation> {
    Ok(ClassCancellation {
        cancellation_id: row.get(0)?,
        class_id: row.get(1)?,
        date: parse_date_column(2, &row.get::<_, String>(2)?)?,
        reason: row.get(3)?,
        canceled_by: row.get(4)?,
        students_notified: row.get::<_, i32>(5)? != 0,
        created_at: parse_datetime_column(6, &row.get::<_, String>(6)?)?,
    })
}
