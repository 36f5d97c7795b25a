// ==========================================
// 排课核心 - 通知发送
// ==========================================
// 邮件投递由外部服务完成，核心只负责渲染与调用
// ==========================================

use crate::engine::events::{CancellationNotice, NoticeRecipient};
use crate::i18n::t_in_locale;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 渲染后的单封通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub recipient: NoticeRecipient,
    pub subject: String,
    pub body: String,
}

/// 通知发送者
///
/// 实现方负责实际投递（SMTP、消息平台等）
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &RenderedMessage) -> anyhow::Result<()>;
}

/// 只写日志的发送者（未接入邮件服务时使用）
#[derive(Debug, Clone, Default)]
pub struct LoggingSender;

#[async_trait]
impl NotificationSender for LoggingSender {
    async fn send(&self, message: &RenderedMessage) -> anyhow::Result<()> {
        tracing::info!(
            to = %message.recipient.email,
            subject = %message.subject,
            "发送停课通知"
        );
        Ok(())
    }
}

/// 为单个收件人渲染停课通知
pub fn render_cancellation(
    notice: &CancellationNotice,
    recipient: &NoticeRecipient,
    locale: &str,
) -> RenderedMessage {
    let separator = t_in_locale("notification.class_cancelled.date_separator", locale, &[]);
    let dates = notice
        .dates
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(&separator);

    let subject = t_in_locale(
        "notification.class_cancelled.subject",
        locale,
        &[("class_name", notice.class_name.as_str())],
    );
    let body = t_in_locale(
        "notification.class_cancelled.body",
        locale,
        &[
            ("student_name", recipient.name.as_str()),
            ("teacher_name", notice.teacher_name.as_str()),
            ("subject_name", notice.subject_name.as_str()),
            ("class_name", notice.class_name.as_str()),
            ("dates", dates.as_str()),
            ("reason", notice.reason.as_str()),
        ],
    );

    RenderedMessage {
        recipient: recipient.clone(),
        subject,
        body,
    }
}
