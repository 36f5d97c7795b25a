// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、目录数据准备等功能
// ==========================================
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use class_scheduling::db::{init_schema, open_sqlite_connection};
use class_scheduling::domain::{Building, DirectoryUser, Role, Room, Subject, Term};
use class_scheduling::repository::DirectoryRepository;
use rusqlite::Connection;
use std::error::Error;
use tempfile::NamedTempFile;

// ==========================================
// 目录数据常量
// ==========================================

pub const TERM_ID: &str = "T2024-1";
pub const BUILDING_ID: &str = "B-MAIN";
pub const ROOM_101: &str = "R-101";
pub const ROOM_102: &str = "R-102";
pub const ROOM_201: &str = "R-201";
pub const SUBJECT_MATH: &str = "SUB-MATH";
pub const SUBJECT_PHYS: &str = "SUB-PHYS";
pub const SUBJECT_CHEM: &str = "SUB-CHEM";
pub const ADMIN_ID: &str = "adm-1";
pub const TEACHER_WANG: &str = "tch-wang";
pub const TEACHER_LI: &str = "tch-li";
pub const STUDENT_A: &str = "stu-a";
pub const STUDENT_B: &str = "stu-b";
pub const STUDENT_C: &str = "stu-c";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试连接（统一 PRAGMA）
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(open_sqlite_connection(db_path)?)
}

/// 写入标准目录数据
///
/// - 学期 2024-03-01 ~ 2024-07-15
/// - 主教学楼 3 间教室
/// - 3 门课程
/// - 管理员 1、教师 2、学生 3
pub fn seed_directory(repo: &DirectoryRepository) -> Result<(), Box<dyn Error>> {
    repo.upsert_term(&Term {
        term_id: TERM_ID.to_string(),
        year: 2024,
        sequence_number: 1,
        start_date: date(2024, 3, 1),
        end_date: date(2024, 7, 15),
    })?;

    repo.upsert_building(&Building {
        building_id: BUILDING_ID.to_string(),
        name: "主教学楼".to_string(),
    })?;
    for (room_id, name) in [(ROOM_101, "101"), (ROOM_102, "102"), (ROOM_201, "201")] {
        repo.upsert_room(&Room {
            room_id: room_id.to_string(),
            building_id: BUILDING_ID.to_string(),
            name: name.to_string(),
            capacity: Some(60),
        })?;
    }

    for (subject_id, name) in [
        (SUBJECT_MATH, "高等数学"),
        (SUBJECT_PHYS, "大学物理"),
        (SUBJECT_CHEM, "普通化学"),
    ] {
        repo.upsert_subject(&Subject {
            subject_id: subject_id.to_string(),
            name: name.to_string(),
        })?;
    }

    for (user_id, name, role) in [
        (ADMIN_ID, "教务处", Role::Admin),
        (TEACHER_WANG, "王老师", Role::Teacher),
        (TEACHER_LI, "李老师", Role::Teacher),
        (STUDENT_A, "学生甲", Role::Student),
        (STUDENT_B, "学生乙", Role::Student),
        (STUDENT_C, "学生丙", Role::Student),
    ] {
        repo.upsert_user(&DirectoryUser {
            user_id: user_id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.edu", user_id),
            role,
        })?;
    }
    Ok(())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}
