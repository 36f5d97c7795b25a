// ==========================================
// 排课核心 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 全部仓储共用一个 Arc<Mutex<Connection>>
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AvailabilityApi, CancellationApi, ClassApi, TimeIntervalApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::availability::AvailabilityIndex;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::events::{CancellationNotifier, OptionalNotifier};
use crate::notification::{NotificationQueue, NotificationSender, NotificationWorker};
use crate::repository::{
    action_log_repo::ActionLogRepository, cancellation_repo::CancellationRepository,
    class_repo::ClassRepository, directory_repo::DirectoryRepository,
    time_interval_repo::TimeIntervalRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 时间段登记API
    pub time_interval_api: Arc<TimeIntervalApi>,

    /// 可用性查询API
    pub availability_api: Arc<AvailabilityApi>,

    /// 教学班排课API
    pub class_api: Arc<ClassApi>,

    /// 停课API
    pub cancellation_api: Arc<CancellationApi>,

    /// 目录数据（楼栋/教室/课程/学期/用户/选课）
    pub directory_repo: Arc<DirectoryRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 停课通知队列
    pub notification_queue: Arc<NotificationQueue>,

    cancellation_repo: Arc<CancellationRepository>,
}

impl AppState {
    /// 创建新的AppState实例（系统时钟）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 成功创建
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_clock(db_path, Arc::new(SystemClock))
    }

    /// 使用指定时钟创建AppState（测试中固定"今天"）
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并建表
    /// 2. 读取通知配置
    /// 3. 初始化所有Repository与Engine
    /// 4. 创建所有API实例
    pub fn with_clock(db_path: String, clock: Arc<dyn Clock>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let policy = config_manager
            .get_notification_policy()
            .map_err(|e| format!("读取通知配置失败: {}", e))?;

        // ==========================================
        // Repository层
        // ==========================================
        let interval_repo = Arc::new(TimeIntervalRepository::new(conn.clone()));
        let class_repo = Arc::new(ClassRepository::new(conn.clone()));
        let cancellation_repo = Arc::new(CancellationRepository::new(conn.clone()));
        let directory_repo = Arc::new(DirectoryRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // ==========================================
        // Engine层
        // ==========================================
        let availability = Arc::new(AvailabilityIndex::new(
            class_repo.clone(),
            directory_repo.clone(),
        ));
        let notification_queue = Arc::new(NotificationQueue::new(
            conn.clone(),
            policy,
            clock.clone(),
        ));
        let notifier = OptionalNotifier::with_notifier(
            notification_queue.clone() as Arc<dyn CancellationNotifier>
        );

        // ==========================================
        // API层
        // ==========================================
        let time_interval_api = Arc::new(TimeIntervalApi::new(
            interval_repo.clone(),
            action_log_repo.clone(),
        ));
        let availability_api = Arc::new(AvailabilityApi::new(
            availability.clone(),
            interval_repo.clone(),
            directory_repo.clone(),
        ));
        let class_api = Arc::new(ClassApi::new(
            class_repo.clone(),
            interval_repo,
            cancellation_repo.clone(),
            directory_repo.clone(),
            action_log_repo.clone(),
            availability,
            clock.clone(),
        ));
        let cancellation_api = Arc::new(CancellationApi::new(
            class_repo,
            cancellation_repo.clone(),
            directory_repo.clone(),
            action_log_repo,
            notifier,
            clock,
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            time_interval_api,
            availability_api,
            class_api,
            cancellation_api,
            directory_repo,
            config_manager,
            notification_queue,
            cancellation_repo,
        })
    }

    /// 创建通知 worker（语言取自配置，读取失败时回退默认语言）
    pub fn notification_worker(&self, sender: Arc<dyn NotificationSender>) -> NotificationWorker {
        let locale = self
            .config_manager
            .get_notification_locale()
            .unwrap_or_else(|e| {
                tracing::warn!("读取通知语言失败，使用默认语言: {}", e);
                crate::config::config_manager::DEFAULT_NOTIFICATION_LOCALE.to_string()
            });
        NotificationWorker::new(
            self.notification_queue.clone(),
            self.cancellation_repo.clone(),
            sender,
            locale,
        )
    }
}

// ==========================================

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "CLASS_SCHEDULING_DB";

/// 获取默认数据库路径
///
/// # 返回
/// - 设置了 CLASS_SCHEDULING_DB 时使用该值
/// - 否则: 用户数据目录/class-scheduling/class_scheduling.db
/// - 无法获取用户数据目录时: ./class_scheduling.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./class_scheduling.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("class-scheduling");
        // 目录创建失败时 open 会给出明确错误
        std::fs::create_dir_all(&dir).ok();
        path = dir.join("class_scheduling.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_on_temp_db() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let state = AppState::new(file.path().to_string_lossy().to_string()).unwrap();
        assert!(state.time_interval_api.list(None).unwrap().is_empty());
        assert_eq!(state.notification_queue.policy().max_attempts, 3);
    }
}
