//! 驱动任务核心实现
//! Driver task core implementation

use crate::timer::stats::DrainReport;
use crate::timer::store::TimerStore;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::commands::DriverCommand;

/// 驱动任务
/// Driver task
pub(crate) struct DriverTask {
    store: TimerStore,
    tick_interval: Duration,
    command_rx: mpsc::Receiver<DriverCommand>,
}

impl DriverTask {
    pub(crate) fn new(
        store: TimerStore,
        tick_interval: Duration,
        command_rx: mpsc::Receiver<DriverCommand>,
    ) -> Self {
        Self {
            store,
            tick_interval,
            command_rx,
        }
    }

    /// 运行驱动主循环
    /// Run the driver main loop
    pub(crate) async fn run(mut self) {
        info!("Timer driver started");

        // 第一次唤醒在一个间隔之后
        // First wakeup is one interval from now
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("All driver handles dropped");
                        self.store.release_driver();
                        break;
                    };
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.drain().await;
                }
            }
        }

        // 存储只在退出分支中释放一次
        // The store is released exactly once, on the exit path
        info!("Timer driver shutdown completed");
    }

    /// 处理命令
    /// Handle a command
    ///
    /// # Returns
    /// 返回false表示应该关闭任务
    /// Returns false if the task should shut down
    async fn handle_command(&mut self, command: DriverCommand) -> bool {
        match command {
            DriverCommand::Drain { response_tx } => {
                let report = self.drain().await;
                if let Err(report) = response_tx.send(report) {
                    warn!(?report, "Failed to send drain response");
                }
            }

            DriverCommand::GetStats { response_tx } => {
                if response_tx.send(self.store.stats()).is_err() {
                    warn!("Failed to send stats response");
                }
            }

            DriverCommand::Shutdown { response_tx } => {
                info!("Received shutdown command");
                let report = self.drain().await;
                // 先释放存储，确保调用方收到响应后可以立即启动新的驱动
                // Release the store first so a caller may start a new driver as soon as it gets the response
                self.store.release_driver();
                if let Err(report) = response_tx.send(report) {
                    warn!(?report, "Failed to send shutdown response");
                }
                return false;
            }
        }

        true
    }

    /// 在阻塞线程池上处理到期条目，回调不会占用运行时工作线程
    /// Drain on the blocking pool so callbacks never occupy a runtime worker
    async fn drain(&self) -> DrainReport {
        let store = self.store.clone();
        match task::spawn_blocking(move || store.drain(Instant::now())).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "Drain pass failed");
                DrainReport::default()
            }
        }
    }
}
