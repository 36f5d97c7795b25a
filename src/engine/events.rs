// ==========================================
// 排课核心 - 停课通知发布
// ==========================================
// 职责: 定义停课通知发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，notification 模块实现持久化队列
// 发布失败不影响已经成功的停课
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

/// 通知收件人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeRecipient {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

/// 停课通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationNotice {
    pub class_id: String,
    pub class_name: String,
    pub subject_name: String,
    pub teacher_name: String,
    pub dates: Vec<NaiveDate>,
    pub reason: String,
    pub recipients: Vec<NoticeRecipient>,
}

/// 停课通知发布者 Trait
///
/// # 实现说明
/// - `NotificationQueue` 将通知写入 notification_jobs 表
/// - 返回值为任务 ID（如果支持）或空字符串
pub trait CancellationNotifier: Send + Sync {
    fn publish(&self, notice: CancellationNotice) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作发布者（单元测试或未启用通知时）
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

impl CancellationNotifier for NoOpNotifier {
    fn publish(&self, notice: CancellationNotice) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpNotifier: 跳过停课通知 - class_id={}, dates={}",
            notice.class_id,
            notice.dates.len()
        );
        Ok(String::new())
    }
}

/// 可选的通知发布者包装
pub struct OptionalNotifier {
    inner: Option<Arc<dyn CancellationNotifier>>,
}

impl OptionalNotifier {
    pub fn with_notifier(notifier: Arc<dyn CancellationNotifier>) -> Self {
        Self {
            inner: Some(notifier),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, notice: CancellationNotice) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(notifier) => notifier.publish(notice),
            None => {
                tracing::debug!(
                    "OptionalNotifier: 未配置发布者，跳过通知 - class_id={}",
                    notice.class_id
                );
                Ok(String::new())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalNotifier {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sample_notice() -> CancellationNotice {
        CancellationNotice {
            class_id: "c1".to_string(),
            class_name: "线性代数 A 班".to_string(),
            subject_name: "线性代数".to_string(),
            teacher_name: "王老师".to_string(),
            dates: vec![NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()],
            reason: "学术会议".to_string(),
            recipients: vec![],
        }
    }

    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
    }

    impl CancellationNotifier for RecordingNotifier {
        fn publish(
            &self,
            notice: CancellationNotice,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.seen.lock().unwrap().push(notice.class_id);
            Ok("job-1".to_string())
        }
    }

    #[test]
    fn test_noop_notifier() {
        let result = NoOpNotifier.publish(sample_notice());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_notifier_none() {
        let notifier = OptionalNotifier::none();
        assert!(!notifier.is_configured());
        assert!(notifier.publish(sample_notice()).is_ok());
    }

    #[test]
    fn test_optional_notifier_delegates() {
        let inner = Arc::new(RecordingNotifier {
            seen: Mutex::new(Vec::new()),
        });
        let notifier = OptionalNotifier::with_notifier(inner.clone());
        assert_eq!(notifier.publish(sample_notice()).unwrap(), "job-1");
        assert_eq!(inner.seen.lock().unwrap().as_slice(), &["c1".to_string()]);
    }
}
