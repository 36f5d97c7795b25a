use super::ActionLogRepository;
use crate::db::parse_datetime_column;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, OptionalExtension, Row};

const SELECT_COLUMNS: &str =
    "action_id, action_type, action_ts, actor, class_id, payload_json, detail";

impl ActionLogRepository {
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?1", SELECT_COLUMNS);
        let log = conn
            .query_row(&sql, params![action_id], map_action_log_row)
            .optional()?;
        Ok(log)
    }

    /// 教学班的操作历史（时间升序）
    pub fn find_by_class(&self, class_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE class_id = ?1 ORDER BY action_ts, rowid",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![class_id], map_action_log_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// 最近的操作日志（时间倒序）
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?1",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit], map_action_log_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

fn map_action_log_row(row: &Row<'_>) -> rusqlite::Result<ActionLog> {
    let type_raw: String = row.get(1)?;
    let action_type = ActionType::from_str(&type_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("未知操作类型: {}", type_raw).into(),
        )
    })?;
    let payload_raw: Option<String> = row.get(5)?;
    let payload_json = match payload_raw {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type,
        action_ts: parse_datetime_column(2, &row.get::<_, String>(2)?)?,
        actor: row.get(3)?,
        class_id: row.get(4)?,
        payload_json,
        detail: row.get(6)?,
    })
}
