// ==========================================
// 排课核心 - 教学班与排课数据仓储
// ==========================================
// 职责: classes / class_schedule_assignments 两张表
// 红线: 教学班与排课的写入在同一事务内完成，失败整体回滚
// ==========================================

use crate::db::{format_datetime, parse_datetime_column};
use crate::domain::class::{Class, ClassScheduleAssignment, ScheduledSlot};
use crate::domain::types::Weekday;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::time_interval_repo::map_interval_row_at;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const CLASS_COLUMNS: &str = "class_id, subject_id, term_id, teacher_id, name, created_at";
const ASSIGNMENT_COLUMNS: &str = "assignment_id, class_id, time_interval_id, room_id, building_id";

/// 教学班仓储
pub struct ClassRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ClassRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 在一个事务内写入教学班及其全部排课
    ///
    /// 任一行违反唯一约束时事务回滚，教学班行不会残留
    pub fn insert_with_schedules(
        &self,
        class: &Class,
        schedules: &[ClassScheduleAssignment],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO classes (class_id, subject_id, term_id, teacher_id, name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                class.class_id,
                class.subject_id,
                class.term_id,
                class.teacher_id,
                class.name,
                format_datetime(class.created_at),
            ],
        )?;
        insert_assignments(&tx, schedules)?;

        tx.commit()?;
        Ok(())
    }

    /// 为已有教学班追加排课（单事务）
    pub fn insert_schedules(&self, schedules: &[ClassScheduleAssignment]) -> RepositoryResult<usize> {
        if schedules.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        insert_assignments(&tx, schedules)?;
        tx.commit()?;
        Ok(schedules.len())
    }

    pub fn update(&self, class: &Class) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE classes SET name = ?2, teacher_id = ?3 WHERE class_id = ?1",
            params![class.class_id, class.name, class.teacher_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Class".to_string(),
                id: class.class_id.clone(),
            });
        }
        Ok(())
    }

    /// 删除教学班；排课、停课、选课记录通过 ON DELETE CASCADE 级联删除
    pub fn delete(&self, class_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM classes WHERE class_id = ?1", params![class_id])?;
        Ok(rows)
    }

    pub fn delete_assignment(&self, assignment_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM class_schedule_assignments WHERE assignment_id = ?1",
            params![assignment_id],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 教学班查询
    // ==========================================

    pub fn find_by_id(&self, class_id: &str) -> RepositoryResult<Option<Class>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM classes WHERE class_id = ?1", CLASS_COLUMNS);
        let class = conn
            .query_row(&sql, params![class_id], map_class_row)
            .optional()?;
        Ok(class)
    }

    /// 按 (教师, 课程, 学期) 查询（唯一）
    pub fn find_by_teacher_subject_term(
        &self,
        teacher_id: &str,
        subject_id: &str,
        term_id: &str,
    ) -> RepositoryResult<Option<Class>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM classes WHERE teacher_id = ?1 AND subject_id = ?2 AND term_id = ?3",
            CLASS_COLUMNS
        );
        let class = conn
            .query_row(&sql, params![teacher_id, subject_id, term_id], map_class_row)
            .optional()?;
        Ok(class)
    }

    /// 查询教学班列表
    ///
    /// # 参数
    /// - term_id: 学期过滤（可选）
    /// - class_ids: 可见教学班范围（None 表示不限）
    pub fn list(
        &self,
        term_id: Option<&str>,
        class_ids: Option<&[String]>,
    ) -> RepositoryResult<Vec<Class>> {
        if matches!(class_ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let mut sql = format!("SELECT {} FROM classes WHERE 1 = 1", CLASS_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(term_id) = term_id {
            sql.push_str(" AND term_id = ?");
            values.push(Value::from(term_id.to_string()));
        }
        if let Some(ids) = class_ids {
            sql.push_str(&format!(" AND class_id IN ({})", placeholders(ids.len())));
            values.extend(ids.iter().map(|id| Value::from(id.clone())));
        }
        sql.push_str(" ORDER BY name, class_id");

        let mut stmt = conn.prepare(&sql)?;
        let classes = stmt
            .query_map(params_from_iter(values.iter()), map_class_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(classes)
    }

    /// 教师任课的教学班 ID
    pub fn class_ids_for_teacher(&self, teacher_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT class_id FROM classes WHERE teacher_id = ?1")?;
        let ids = stmt
            .query_map(params![teacher_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ==========================================
    // 排课查询
    // ==========================================

    pub fn find_assignment(
        &self,
        assignment_id: &str,
    ) -> RepositoryResult<Option<ClassScheduleAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM class_schedule_assignments WHERE assignment_id = ?1",
            ASSIGNMENT_COLUMNS
        );
        let assignment = conn
            .query_row(&sql, params![assignment_id], map_assignment_row)
            .optional()?;
        Ok(assignment)
    }

    /// 教学班的排课及对应时间段（按星期、开始时间排序）
    pub fn find_schedules(&self, class_id: &str) -> RepositoryResult<Vec<ScheduledSlot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                a.assignment_id, a.class_id, a.time_interval_id, a.room_id, a.building_id,
                t.interval_id, t.start_time, t.end_time, t.day_of_week
            FROM class_schedule_assignments a
            JOIN time_intervals t ON t.interval_id = a.time_interval_id
            WHERE a.class_id = ?1
            "#,
        )?;
        let mut slots = stmt
            .query_map(params![class_id], |row| {
                Ok(ScheduledSlot {
                    assignment: map_assignment_row(row)?,
                    interval: map_interval_row_at(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        slots.sort_by(|a, b| {
            a.interval
                .day_of_week
                .cmp(&b.interval.day_of_week)
                .then(a.interval.start_time.cmp(&b.interval.start_time))
        });
        Ok(slots)
    }

    /// 教学班涉及的星期（去重，升序）
    pub fn class_weekdays(&self, class_id: &str) -> RepositoryResult<Vec<Weekday>> {
        let mut days: Vec<Weekday> = self
            .find_schedules(class_id)?
            .into_iter()
            .map(|s| s.interval.day_of_week)
            .collect();
        days.sort();
        days.dedup();
        Ok(days)
    }

    /// 某时间段某教室的排课（唯一约束保证最多一条）
    pub fn find_assignment_at(
        &self,
        room_id: &str,
        time_interval_id: &str,
    ) -> RepositoryResult<Option<ClassScheduleAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM class_schedule_assignments WHERE room_id = ?1 AND time_interval_id = ?2",
            ASSIGNMENT_COLUMNS
        );
        let assignment = conn
            .query_row(&sql, params![room_id, time_interval_id], map_assignment_row)
            .optional()?;
        Ok(assignment)
    }

    /// 教学班在某时间段的排课
    pub fn find_class_assignments_at(
        &self,
        class_id: &str,
        time_interval_id: &str,
    ) -> RepositoryResult<Vec<ClassScheduleAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM class_schedule_assignments WHERE class_id = ?1 AND time_interval_id = ?2",
            ASSIGNMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![class_id, time_interval_id], map_assignment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 教师在某时间段的全部排课（跨教学班）
    pub fn find_teacher_assignments_at(
        &self,
        teacher_id: &str,
        time_interval_id: &str,
    ) -> RepositoryResult<Vec<ClassScheduleAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT a.assignment_id, a.class_id, a.time_interval_id, a.room_id, a.building_id
            FROM class_schedule_assignments a
            JOIN classes c ON c.class_id = a.class_id
            WHERE c.teacher_id = ?1 AND a.time_interval_id = ?2
            ORDER BY a.class_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![teacher_id, time_interval_id], map_assignment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 某时间段已被占用的教室 ID
    pub fn occupied_room_ids(&self, time_interval_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT room_id FROM class_schedule_assignments WHERE time_interval_id = ?1",
        )?;
        let ids = stmt
            .query_map(params![time_interval_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

fn insert_assignments(
    conn: &Connection,
    schedules: &[ClassScheduleAssignment],
) -> RepositoryResult<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO class_schedule_assignments (
            assignment_id, class_id, time_interval_id, room_id, building_id
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for s in schedules {
        stmt.execute(params![
            s.assignment_id,
            s.class_id,
            s.time_interval_id,
            s.room_id,
            s.building_id,
        ])?;
    }
    Ok(())
}

pub(crate) fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(", ")
}

fn map_class_row(row: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        class_id: row.get(0)?,
        subject_id: row.get(1)?,
        term_id: row.get(2)?,
        teacher_id: row.get(3)?,
        name: row.get(4)?,
        created_at: parse_datetime_column(5, &row.get::<_, String>(5)?)?,
    })
}

fn map_assignment_row(row: &Row<'_>) -> rusqlite::Result<ClassScheduleAssignment> {
    Ok(ClassScheduleAssignment {
        assignment_id: row.get(0)?,
        class_id: row.get(1)?,
        time_interval_id: row.get(2)?,
        room_id: row.get(3)?,
        building_id: row.get(4)?,
    })
}
