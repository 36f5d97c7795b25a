// ==========================================
// 排课核心 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表脚本，唯一约束即冲突判定的最终依据
// - 统一日期/钟点列的读写格式
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 日期列格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// 钟点列格式（零填充，可直接按字符串比较）
pub const TIME_FORMAT: &str = "%H:%M";
/// 时间戳列格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// 毫秒时间戳格式（通知任务的退避调度）
pub const DATETIME_MILLIS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 都是"每个连接"单独生效
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
///
/// 两个复合唯一索引是教室互斥的最终保证:
/// - uq_assignment_class_slot_room (class_id, time_interval_id, room_id)
/// - uq_assignment_slot_room (time_interval_id, room_id)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 目录数据（外部维护，核心只读） =====
CREATE TABLE IF NOT EXISTS buildings (
    building_id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rooms (
    room_id TEXT PRIMARY KEY,
    building_id TEXT NOT NULL REFERENCES buildings(building_id),
    name TEXT NOT NULL,
    capacity INTEGER
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS terms (
    term_id TEXT PRIMARY KEY,
    year INTEGER NOT NULL,
    sequence_number INTEGER NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    CHECK (start_date < end_date)
);

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    role TEXT NOT NULL
);

-- ===== 排课核心 =====
CREATE TABLE IF NOT EXISTS time_intervals (
    interval_id TEXT PRIMARY KEY,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    day_of_week TEXT NOT NULL,
    CHECK (end_time > start_time)
);

CREATE INDEX IF NOT EXISTS idx_time_intervals_day
  ON time_intervals(day_of_week, start_time);

CREATE TABLE IF NOT EXISTS classes (
    class_id TEXT PRIMARY KEY,
    subject_id TEXT NOT NULL REFERENCES subjects(subject_id),
    term_id TEXT NOT NULL REFERENCES terms(term_id),
    teacher_id TEXT NOT NULL REFERENCES users(user_id),
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (teacher_id, subject_id, term_id)
);

CREATE TABLE IF NOT EXISTS class_schedule_assignments (
    assignment_id TEXT PRIMARY KEY,
    class_id TEXT NOT NULL REFERENCES classes(class_id) ON DELETE CASCADE,
    time_interval_id TEXT NOT NULL REFERENCES time_intervals(interval_id),
    room_id TEXT NOT NULL REFERENCES rooms(room_id),
    building_id TEXT NOT NULL REFERENCES buildings(building_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_class_slot_room
  ON class_schedule_assignments(class_id, time_interval_id, room_id);

CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_slot_room
  ON class_schedule_assignments(time_interval_id, room_id);

CREATE INDEX IF NOT EXISTS idx_assignment_class
  ON class_schedule_assignments(class_id);

CREATE TABLE IF NOT EXISTS class_cancellations (
    cancellation_id TEXT PRIMARY KEY,
    class_id TEXT NOT NULL REFERENCES classes(class_id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    reason TEXT NOT NULL,
    canceled_by TEXT NOT NULL,
    students_notified INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (class_id, date)
);

CREATE INDEX IF NOT EXISTS idx_cancellations_date
  ON class_cancellations(date);

CREATE TABLE IF NOT EXISTS class_enrollments (
    class_id TEXT NOT NULL REFERENCES classes(class_id) ON DELETE CASCADE,
    student_id TEXT NOT NULL REFERENCES users(user_id),
    enrolled_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (class_id, student_id)
);

-- ===== 通知队列 =====
CREATE TABLE IF NOT EXISTS notification_jobs (
    job_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 3,
    backoff_base_ms INTEGER NOT NULL DEFAULT 1000,
    next_attempt_at TEXT NOT NULL,
    last_error TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_notification_jobs_due
  ON notification_jobs(status, next_attempt_at);

-- ===== 审计 =====
-- class_id 不设外键: 教学班删除后日志仍需保留
CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    class_id TEXT,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_class
  ON action_log(class_id, action_ts);
"#;

// ==========================================
// 列值解析
// ==========================================
// 解析失败统一转为 FromSqlConversionFailure，由调用方以 ? 传播

fn conversion_error(
    idx: usize,
    raw: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    tracing::debug!(column = idx, raw = raw, "列值解析失败");
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn parse_date_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| conversion_error(idx, raw, e))
}

pub fn parse_time_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| conversion_error(idx, raw, e))
}

pub fn parse_datetime_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    // %.f 同时接受有无小数秒
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| conversion_error(idx, raw, e))
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub fn format_time(t: NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

pub fn format_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

pub fn format_datetime_millis(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_MILLIS_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }

    #[test]
    fn test_parse_columns() {
        assert_eq!(
            parse_date_column(0, "2024-03-06").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
        );
        assert!(parse_date_column(0, "2024/03/06").is_err());
        assert_eq!(format_time(parse_time_column(1, "08:00").unwrap()), "08:00");
        assert_eq!(format_time(parse_time_column(1, "08:00:00").unwrap()), "08:00");
    }

    #[test]
    fn test_datetime_with_and_without_millis() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 6)
            .unwrap()
            .and_hms_milli_opt(8, 0, 0, 250)
            .unwrap();
        assert_eq!(parse_datetime_column(0, &format_datetime_millis(ts)).unwrap(), ts);
        assert!(parse_datetime_column(0, "2024-03-06 08:00:00").is_ok());
    }
}
