// ==========================================
// 停课通知 Worker 集成测试
// ==========================================
// 测试范围:
// 1. 投递成功后回写 students_notified
// 2. 部分收件人失败: 退避重试，只重发失败的收件人
// 3. 重试耗尽后任务置为 FAILED
// 4. 单个任务回写失败不影响同批其他任务
// 5. 中断任务恢复
// ==========================================

mod helpers;
mod test_helpers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use class_scheduling::domain::{Actor, ClassDetail, ScheduleDraft, Weekday};
use class_scheduling::notification::{
    JobStatus, NotificationSender, NotificationWorker, RenderedMessage, WorkerReport,
};
use helpers::api_test_helper::*;
use test_helpers::*;

// ==========================================
// 测试用发送者
// ==========================================

/// 记录所有投递；对指定邮箱按次数模拟失败（u32::MAX 表示一直失败）
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<RenderedMessage>>,
    failures: Mutex<HashMap<String, u32>>,
}

impl RecordingSender {
    fn failing(email: &str, times: u32) -> Self {
        let sender = Self::default();
        sender
            .failures
            .lock()
            .unwrap()
            .insert(email.to_string(), times);
        sender
    }

    fn sent_to(&self, email: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.recipient.email == email)
            .count()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, message: &RenderedMessage) -> anyhow::Result<()> {
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&message.recipient.email) {
                if *left > 0 {
                    if *left != u32::MAX {
                        *left -= 1;
                    }
                    anyhow::bail!("邮件服务拒绝: {}", message.recipient.email);
                }
            }
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ==========================================
// 辅助
// ==========================================

const EMAIL_A: &str = "stu-a@example.edu";
const EMAIL_B: &str = "stu-b@example.edu";
const EMAIL_C: &str = "stu-c@example.edu";

fn cancelled_class(env: &ApiTestEnv) -> ClassDetail {
    let wed = env.create_interval(Weekday::Wednesday, hm(8, 0), hm(9, 40));
    let detail = env.create_class(TEACHER_WANG, SUBJECT_MATH, vec![ScheduleDraft::new(&wed, ROOM_101)]);
    env.enroll(&detail.class.class_id, STUDENT_A);
    env.enroll(&detail.class.class_id, STUDENT_B);
    env.state
        .cancellation_api
        .cancel(
            &detail.class.class_id,
            &[date(2024, 3, 6), date(2024, 3, 13)],
            "教师出差",
            &Actor::teacher(TEACHER_WANG),
        )
        .unwrap();
    detail
}

fn worker(env: &ApiTestEnv, sender: Arc<RecordingSender>) -> NotificationWorker {
    env.state.notification_worker(sender)
}

fn all_notified(env: &ApiTestEnv, class_id: &str) -> bool {
    env.state
        .cancellation_api
        .list_cancellations(class_id, &env.admin())
        .unwrap()
        .iter()
        .all(|c| c.students_notified)
}

// ==========================================
// 测试
// ==========================================

#[tokio::test]
async fn test_worker_投递成功回写已通知() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let detail = cancelled_class(&env);
    let sender = Arc::new(RecordingSender::default());
    let worker = worker(&env, sender.clone());

    assert!(!all_notified(&env, &detail.class.class_id));

    let report = worker.process_due().await.unwrap();
    assert_eq!(
        report,
        WorkerReport {
            delivered: 1,
            retried: 0,
            failed: 0
        }
    );
    assert_eq!(sender.sent_to(EMAIL_A), 1);
    assert_eq!(sender.sent_to(EMAIL_B), 1);
    assert!(all_notified(&env, &detail.class.class_id));

    // 中文文案（默认语言）
    let sent = sender.sent.lock().unwrap();
    assert!(sent[0].subject.contains(&detail.class.name));
    assert!(sent[0].body.contains("2024-03-06"));
    drop(sent);

    let queue = &env.state.notification_queue;
    assert_eq!(queue.count_by_status(JobStatus::Completed).unwrap(), 1);

    // 再次轮询没有任务
    assert_eq!(worker.process_due().await.unwrap(), WorkerReport::default());
}

#[tokio::test]
async fn test_worker_失败后退避重试只发失败收件人() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let detail = cancelled_class(&env);
    let sender = Arc::new(RecordingSender::failing(EMAIL_B, 1));
    let worker = worker(&env, sender.clone());

    let report = worker.process_due().await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(sender.sent_to(EMAIL_A), 1);
    assert_eq!(sender.sent_to(EMAIL_B), 0);
    assert!(!all_notified(&env, &detail.class.class_id));

    // 退避期内不会被领取（第一次失败后等待 1000ms）
    env.clock.advance(Duration::milliseconds(500));
    assert_eq!(worker.process_due().await.unwrap(), WorkerReport::default());

    env.clock.advance(Duration::milliseconds(500));
    let report = worker.process_due().await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(sender.sent_to(EMAIL_A), 1);
    assert_eq!(sender.sent_to(EMAIL_B), 1);
    assert!(all_notified(&env, &detail.class.class_id));
}

#[tokio::test]
async fn test_worker_重试耗尽置为失败() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let detail = cancelled_class(&env);
    let sender = Arc::new(RecordingSender::failing(EMAIL_B, u32::MAX));
    let worker = worker(&env, sender.clone());
    let queue = &env.state.notification_queue;

    // 第 1 次失败 → 等 1s；第 2 次失败 → 等 2s；第 3 次失败 → FAILED
    assert_eq!(worker.process_due().await.unwrap().retried, 1);
    env.clock.advance(Duration::seconds(1));
    assert_eq!(worker.process_due().await.unwrap().retried, 1);
    env.clock.advance(Duration::seconds(1));
    assert_eq!(worker.process_due().await.unwrap(), WorkerReport::default());
    env.clock.advance(Duration::seconds(1));
    assert_eq!(worker.process_due().await.unwrap().failed, 1);

    assert_eq!(queue.count_by_status(JobStatus::Failed).unwrap(), 1);
    assert_eq!(queue.count_by_status(JobStatus::Pending).unwrap(), 0);
    assert_eq!(sender.sent_to(EMAIL_A), 1);
    assert!(!all_notified(&env, &detail.class.class_id));

    // 停课记录本身不受影响
    let rows = env
        .state
        .cancellation_api
        .list_cancellations(&detail.class.class_id, &env.admin())
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_worker_回写失败不卡住同批任务() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let first = cancelled_class(&env);
    let fri = env.create_interval(Weekday::Friday, hm(8, 0), hm(9, 40));
    let second = env.create_class(TEACHER_LI, SUBJECT_PHYS, vec![ScheduleDraft::new(&fri, ROOM_102)]);
    env.enroll(&second.class.class_id, STUDENT_C);
    env.state
        .cancellation_api
        .cancel(
            &second.class.class_id,
            &[date(2024, 3, 8)],
            "实验室检修",
            &Actor::teacher(TEACHER_LI),
        )
        .unwrap();

    // 另一条连接上的触发器让 students_notified 回写全部失败
    let conn = open_test_connection(&env.state.db_path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_notified BEFORE UPDATE ON class_cancellations
         BEGIN SELECT RAISE(ABORT, 'notified flag locked'); END;",
    )
    .unwrap();

    let sender = Arc::new(RecordingSender::default());
    let worker = worker(&env, sender.clone());
    let queue = &env.state.notification_queue;

    let report = worker.process_due().await.unwrap();
    assert_eq!(report.retried, 2, "两个任务都应重新排队");
    assert_eq!(queue.count_by_status(JobStatus::Running).unwrap(), 0);
    assert_eq!(queue.count_by_status(JobStatus::Completed).unwrap(), 0);
    assert_eq!(queue.count_by_status(JobStatus::Pending).unwrap(), 2);
    assert_eq!(sender.sent_to(EMAIL_A), 1);
    assert_eq!(sender.sent_to(EMAIL_C), 1);

    conn.execute_batch("DROP TRIGGER block_notified;").unwrap();
    env.clock.advance(Duration::seconds(1));

    let report = worker.process_due().await.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(queue.count_by_status(JobStatus::Completed).unwrap(), 2);
    assert!(all_notified(&env, &first.class.class_id));
    assert!(all_notified(&env, &second.class.class_id));

    // 邮件已送达，重试只补回写，不重复发送
    assert_eq!(sender.sent_to(EMAIL_A), 1);
    assert_eq!(sender.sent_to(EMAIL_C), 1);
}

#[tokio::test]
async fn test_queue_恢复中断任务() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    cancelled_class(&env);
    let queue = &env.state.notification_queue;

    let jobs = queue.dequeue_due(10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(queue.count_by_status(JobStatus::Running).unwrap(), 1);

    assert_eq!(queue.recover_running().unwrap(), 1);
    assert_eq!(queue.count_by_status(JobStatus::Pending).unwrap(), 1);

    let sender = Arc::new(RecordingSender::default());
    let report = worker(&env, sender).process_due().await.unwrap();
    assert_eq!(report.delivered, 1);
}

#[tokio::test]
async fn test_worker_run_收到停止信号退出() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let detail = cancelled_class(&env);
    let sender = Arc::new(RecordingSender::default());
    let worker = worker(&env, sender.clone());

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(rx).await });

    // run 启动后立即处理一轮
    for _ in 0..50 {
        if sender.sent_to(EMAIL_A) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(sender.sent_to(EMAIL_A), 1);
    assert!(all_notified(&env, &detail.class.class_id));
}
