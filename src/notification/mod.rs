// ==========================================
// 排课核心 - 停课通知
// ==========================================
// 持久化队列 + 异步 worker；失败按指数退避重试
// 停课本身不依赖通知结果
// ==========================================

pub mod job;
pub mod queue;
pub mod sender;
pub mod worker;

pub use job::{backoff_delay, JobStatus, NotificationJob, KIND_CLASS_CANCELLED};
pub use queue::NotificationQueue;
pub use sender::{render_cancellation, LoggingSender, NotificationSender, RenderedMessage};
pub use worker::{NotificationWorker, WorkerReport};
