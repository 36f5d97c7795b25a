// ==========================================
// 排课核心 - 通知投递 Worker
// ==========================================
// 职责: 轮询到期任务 → 按收件人并发发送 → 成功则回写 students_notified
// 约束: 不在 .await 期间持有数据库锁
// ==========================================

use crate::engine::events::NoticeRecipient;
use crate::notification::job::{JobStatus, NotificationJob};
use crate::notification::queue::NotificationQueue;
use crate::notification::sender::{render_cancellation, NotificationSender};
use crate::repository::cancellation_repo::CancellationRepository;
use crate::repository::error::RepositoryResult;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// 单轮处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct NotificationWorker {
    queue: Arc<NotificationQueue>,
    cancellation_repo: Arc<CancellationRepository>,
    sender: Arc<dyn NotificationSender>,
    locale: String,
}

impl NotificationWorker {
    pub fn new(
        queue: Arc<NotificationQueue>,
        cancellation_repo: Arc<CancellationRepository>,
        sender: Arc<dyn NotificationSender>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            cancellation_repo,
            sender,
            locale: locale.into(),
        }
    }

    /// 处理一批到期任务
    pub async fn process_due(&self) -> RepositoryResult<WorkerReport> {
        let jobs = self.queue.dequeue_due(self.queue.policy().batch_size)?;
        let mut report = WorkerReport::default();

        // 单个任务出错不影响同批其他任务，出错的任务按失败重新排队
        for job in jobs {
            let status = match self.deliver(&job).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!(job_id = %job.job_id, "通知任务处理出错: {}", e);
                    match self.queue.mark_failed(&job, &e.to_string(), &job.payload) {
                        Ok(status) => status,
                        Err(e) => {
                            tracing::error!(
                                job_id = %job.job_id,
                                "通知任务状态回写失败，保持 RUNNING 待恢复: {}",
                                e
                            );
                            continue;
                        }
                    }
                }
            };
            match status {
                JobStatus::Completed => report.delivered += 1,
                JobStatus::Pending => report.retried += 1,
                _ => report.failed += 1,
            }
        }

        if report != WorkerReport::default() {
            tracing::info!(
                delivered = report.delivered,
                retried = report.retried,
                failed = report.failed,
                "通知投递轮次完成"
            );
        }
        Ok(report)
    }

    async fn deliver(&self, job: &NotificationJob) -> RepositoryResult<JobStatus> {
        let notice = &job.payload;
        let sends = notice.recipients.iter().map(|recipient| {
            let message = render_cancellation(notice, recipient, &self.locale);
            let sender = Arc::clone(&self.sender);
            async move {
                let result = sender.send(&message).await;
                (message.recipient, result)
            }
        });
        let results = join_all(sends).await;

        let mut failed_recipients: Vec<NoticeRecipient> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        for (recipient, result) in results {
            if let Err(e) = result {
                errors.push(format!("{}: {}", recipient.email, e));
                failed_recipients.push(recipient);
            }
        }

        if failed_recipients.is_empty() {
            // 先回写已通知标记，再完成任务；回写失败时只重试回写，不再重发邮件
            match self
                .cancellation_repo
                .mark_students_notified(&notice.class_id, &notice.dates)
            {
                Ok(updated) => {
                    tracing::debug!(
                        job_id = %job.job_id,
                        class_id = %notice.class_id,
                        updated = updated,
                        "停课记录已标记为已通知"
                    );
                }
                Err(e) => {
                    let mut remaining = notice.clone();
                    remaining.recipients.clear();
                    return self.queue.mark_failed(
                        job,
                        &format!("已通知标记回写失败: {}", e),
                        &remaining,
                    );
                }
            }
            self.queue.mark_completed(&job.job_id)?;
            return Ok(JobStatus::Completed);
        }

        let mut remaining = notice.clone();
        remaining.recipients = failed_recipients;
        self.queue.mark_failed(job, &errors.join("; "), &remaining)
    }

    /// 持续轮询，直到 shutdown 收到 true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_millis(self.queue.policy().poll_interval_ms);
        tracing::info!(poll_interval_ms = interval.as_millis() as u64, "通知 worker 启动");

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.process_due().await {
                tracing::error!("通知投递轮次失败: {}", e);
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("通知 worker 已停止");
    }
}
