//! 后台任务管理
//!
//! # 任务
//!
//! - **expiry-sweep** (Periodic): 定时取消无人查看的超时订单。
//!   和懒过期走同一个判定/转换函数，二者不会分叉。
//! - **notifications** (Listener): 事件总线 → 通知记录。
//!
//! 任务体用 catch_unwind 包裹，单个任务 panic 不拖垮进程。

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::utils::time::now_millis;

/// 已启动的后台任务集合
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    /// Start the expiry sweep and the notification listener
    pub fn start(state: &ServerState) -> Self {
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        // Periodic expiry sweep — best-effort batch; the lazy on-read
        // path stays authoritative
        {
            let manager = state.manager.clone();
            let token = cancel.child_token();
            let period = Duration::from_secs(state.config.expiry_sweep_secs.max(1));
            handles.push((
                "expiry-sweep",
                tokio::spawn(async move {
                    let task = async move {
                        let mut ticker = tokio::time::interval(period);
                        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                        loop {
                            tokio::select! {
                                _ = token.cancelled() => break,
                                _ = ticker.tick() => {
                                    match manager.sweep_expired(now_millis()) {
                                        Ok(0) => {}
                                        Ok(cancelled) => {
                                            tracing::info!(cancelled, "Expiry sweep finished");
                                        }
                                        Err(e) => {
                                            tracing::error!(error = %e, "Expiry sweep failed");
                                        }
                                    }
                                }
                            }
                        }
                    };
                    if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                        tracing::error!("expiry-sweep task panicked");
                    }
                }),
            ));
        }

        // Notification listener
        {
            let notifications = state.notifications.clone();
            let receiver = state.events.subscribe();
            let token = cancel.child_token();
            handles.push((
                "notifications",
                tokio::spawn(async move {
                    let task = notifications.run(receiver, token);
                    if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                        tracing::error!("notifications task panicked");
                    }
                }),
            ));
        }

        tracing::info!(tasks = handles.len(), "Background tasks started");
        Self { cancel, handles }
    }

    /// Stop all tasks and wait for them to drain
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(task = name, error = %e, "Background task join failed");
            }
        }
    }
}
