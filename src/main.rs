// ==========================================
// 排课核心 - 通知 worker 主入口
// ==========================================
// 打开数据库、恢复中断的任务、持续投递停课通知，直到 Ctrl-C
// ==========================================

use std::sync::Arc;

use class_scheduling::app::{get_default_db_path, AppState};
use class_scheduling::logging;
use class_scheduling::notification::LoggingSender;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", class_scheduling::APP_NAME);
    tracing::info!("系统版本: {}", class_scheduling::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    let recovered = state.notification_queue.recover_running()?;
    if recovered > 0 {
        tracing::warn!("恢复上次中断的通知任务: {} 条", recovered);
    }

    let worker = state.notification_worker(Arc::new(LoggingSender));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("收到退出信号，正在停止...");
    shutdown_tx.send(true)?;
    handle.await?;

    Ok(())
}
