// ==========================================
// 排课核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值配置；格式错误时告警并回退默认值
    fn get_number_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        Ok(raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
            default
        }))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(
        &self,
        snapshot_json: &str,
    ) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
                params![GLOBAL_SCOPE, key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    // ===== 通知配置 =====

    /// 通知任务的重试策略
    pub fn get_notification_policy(&self) -> Result<NotificationPolicy, Box<dyn Error>> {
        let defaults = NotificationPolicy::default();
        Ok(NotificationPolicy {
            max_attempts: self
                .get_number_or_default(config_keys::NOTIFICATION_MAX_ATTEMPTS, defaults.max_attempts)?
                .max(1),
            backoff_base_ms: self.get_number_or_default(
                config_keys::NOTIFICATION_BACKOFF_BASE_MS,
                defaults.backoff_base_ms,
            )?,
            poll_interval_ms: self.get_number_or_default(
                config_keys::NOTIFICATION_POLL_INTERVAL_MS,
                defaults.poll_interval_ms,
            )?,
            batch_size: self
                .get_number_or_default(config_keys::NOTIFICATION_BATCH_SIZE, defaults.batch_size)?
                .max(1),
        })
    }

    /// 通知文案语言
    pub fn get_notification_locale(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::NOTIFICATION_LOCALE, DEFAULT_NOTIFICATION_LOCALE)
    }
}

pub const DEFAULT_NOTIFICATION_LOCALE: &str = "zh-CN";

// ==========================================
// NotificationPolicy - 通知重试策略
// ==========================================
// 第 n 次失败后等待 backoff_base_ms * 2^(n-1) 毫秒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPolicy {
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
    pub poll_interval_ms: u64,
    pub batch_size: i64,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            poll_interval_ms: 5000,
            batch_size: 20,
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 通知队列
    pub const NOTIFICATION_MAX_ATTEMPTS: &str = "notification_max_attempts";
    pub const NOTIFICATION_BACKOFF_BASE_MS: &str = "notification_backoff_base_ms";
    pub const NOTIFICATION_POLL_INTERVAL_MS: &str = "notification_poll_interval_ms";
    pub const NOTIFICATION_BATCH_SIZE: &str = "notification_batch_size";

    // 通知文案
    pub const NOTIFICATION_LOCALE: &str = "notification_locale";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_notification_policy_defaults() {
        let config = setup();
        assert_eq!(
            config.get_notification_policy().unwrap(),
            NotificationPolicy::default()
        );
        assert_eq!(config.get_notification_locale().unwrap(), "zh-CN");
    }

    #[test]
    fn test_override_and_bad_value_fallback() {
        let config = setup();
        config
            .set_global_config_value(config_keys::NOTIFICATION_MAX_ATTEMPTS, "5")
            .unwrap();
        config
            .set_global_config_value(config_keys::NOTIFICATION_BACKOFF_BASE_MS, "abc")
            .unwrap();
        let policy = config.get_notification_policy().unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff_base_ms, 1000);
    }

    #[test]
    fn test_snapshot_restore() {
        let config = setup();
        config
            .set_global_config_value(config_keys::NOTIFICATION_LOCALE, "en")
            .unwrap();
        let snapshot = config.get_config_snapshot().unwrap();

        config
            .set_global_config_value(config_keys::NOTIFICATION_LOCALE, "zh-CN")
            .unwrap();
        assert_eq!(config.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(config.get_notification_locale().unwrap(), "en");
    }
}
