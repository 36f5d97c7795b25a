// ==========================================
// 排课核心 - 目录数据仓储
// ==========================================
// 楼栋/教室/课程/学期/用户/选课 - 外部模块维护的简单记录
// 核心只通过 find_* 读取；upsert_* 供目录同步与初始化数据使用
// ==========================================

use crate::db::{format_date, parse_date_column};
use crate::domain::directory::{Building, DirectoryUser, Room, Subject};
use crate::domain::term::Term;
use crate::domain::types::Role;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct DirectoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DirectoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_building(&self, building_id: &str) -> RepositoryResult<Option<Building>> {
        let conn = self.get_conn()?;
        let building = conn
            .query_row(
                "SELECT building_id, name FROM buildings WHERE building_id = ?1",
                params![building_id],
                |row| {
                    Ok(Building {
                        building_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(building)
    }

    pub fn find_room(&self, room_id: &str) -> RepositoryResult<Option<Room>> {
        let conn = self.get_conn()?;
        let room = conn
            .query_row(
                "SELECT room_id, building_id, name, capacity FROM rooms WHERE room_id = ?1",
                params![room_id],
                map_room_row,
            )
            .optional()?;
        Ok(room)
    }

    /// 全部教室（按楼栋、名称排序）
    pub fn list_rooms(&self) -> RepositoryResult<Vec<Room>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT room_id, building_id, name, capacity FROM rooms ORDER BY building_id, name",
        )?;
        let rooms = stmt
            .query_map([], map_room_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rooms)
    }

    pub fn find_subject(&self, subject_id: &str) -> RepositoryResult<Option<Subject>> {
        let conn = self.get_conn()?;
        let subject = conn
            .query_row(
                "SELECT subject_id, name FROM subjects WHERE subject_id = ?1",
                params![subject_id],
                |row| {
                    Ok(Subject {
                        subject_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(subject)
    }

    pub fn find_term(&self, term_id: &str) -> RepositoryResult<Option<Term>> {
        let conn = self.get_conn()?;
        let term = conn
            .query_row(
                r#"
                SELECT term_id, year, sequence_number, start_date, end_date
                FROM terms WHERE term_id = ?1
                "#,
                params![term_id],
                |row| {
                    Ok(Term {
                        term_id: row.get(0)?,
                        year: row.get(1)?,
                        sequence_number: row.get(2)?,
                        start_date: parse_date_column(3, &row.get::<_, String>(3)?)?,
                        end_date: parse_date_column(4, &row.get::<_, String>(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(term)
    }

    pub fn find_user(&self, user_id: &str) -> RepositoryResult<Option<DirectoryUser>> {
        let conn = self.get_conn()?;
        let user = conn
            .query_row(
                "SELECT user_id, name, email, role FROM users WHERE user_id = ?1",
                params![user_id],
                map_user_row,
            )
            .optional()?;
        Ok(user)
    }

    /// 当前选修该教学班的学生
    pub fn list_enrolled_students(&self, class_id: &str) -> RepositoryResult<Vec<DirectoryUser>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT u.user_id, u.name, u.email, u.role
            FROM class_enrollments e
            JOIN users u ON u.user_id = e.student_id
            WHERE e.class_id = ?1
            ORDER BY u.name, u.user_id
            "#,
        )?;
        let students = stmt
            .query_map(params![class_id], map_user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    pub fn is_enrolled(&self, class_id: &str, student_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM class_enrollments WHERE class_id = ?1 AND student_id = ?2",
                params![class_id, student_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    /// 学生选修的教学班 ID
    pub fn class_ids_for_student(&self, student_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT class_id FROM class_enrollments WHERE student_id = ?1")?;
        let ids = stmt
            .query_map(params![student_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ==========================================
    // 目录同步
    // ==========================================

    pub fn upsert_building(&self, building: &Building) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO buildings (building_id, name) VALUES (?1, ?2)
            ON CONFLICT(building_id) DO UPDATE SET name = excluded.name
            "#,
            params![building.building_id, building.name],
        )?;
        Ok(())
    }

    pub fn upsert_room(&self, room: &Room) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO rooms (room_id, building_id, name, capacity) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(room_id) DO UPDATE SET
                building_id = excluded.building_id,
                name = excluded.name,
                capacity = excluded.capacity
            "#,
            params![room.room_id, room.building_id, room.name, room.capacity],
        )?;
        Ok(())
    }

    pub fn upsert_subject(&self, subject: &Subject) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO subjects (subject_id, name) VALUES (?1, ?2)
            ON CONFLICT(subject_id) DO UPDATE SET name = excluded.name
            "#,
            params![subject.subject_id, subject.name],
        )?;
        Ok(())
    }

    /// 写入学期；start_date >= end_date 时拒绝
    pub fn upsert_term(&self, term: &Term) -> RepositoryResult<()> {
        if !term.is_valid() {
            return Err(RepositoryError::FieldValueError {
                field: "end_date".to_string(),
                message: format!(
                    "学期结束日期必须晚于开始日期: {} ~ {}",
                    term.start_date, term.end_date
                ),
            });
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO terms (term_id, year, sequence_number, start_date, end_date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(term_id) DO UPDATE SET
                year = excluded.year,
                sequence_number = excluded.sequence_number,
                start_date = excluded.start_date,
                end_date = excluded.end_date
            "#,
            params![
                term.term_id,
                term.year,
                term.sequence_number,
                format_date(term.start_date),
                format_date(term.end_date),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_user(&self, user: &DirectoryUser) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO users (user_id, name, email, role) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role
            "#,
            params![user.user_id, user.name, user.email, user.role.to_db_str()],
        )?;
        Ok(())
    }

    pub fn enroll_student(&self, class_id: &str, student_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO class_enrollments (class_id, student_id) VALUES (?1, ?2)",
            params![class_id, student_id],
        )?;
        Ok(())
    }
}

fn map_room_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        room_id: row.get(0)?,
        building_id: row.get(1)?,
        name: row.get(2)?,
        capacity: row.get(3)?,
    })
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<DirectoryUser> {
    let role_raw: String = row.get(3)?;
    let role = Role::from_db_str(&role_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("未知角色: {}", role_raw).into(),
        )
    })?;
    Ok(DirectoryUser {
        user_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role,
    })
}
