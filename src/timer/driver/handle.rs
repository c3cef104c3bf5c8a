//! 驱动任务句柄
//! Driver handle
//!
//! 本模块包含驱动任务的客户端句柄。句柄可以克隆；所有句柄被丢弃后，
//! 驱动任务也会退出。
//!
//! This module contains the client handle for the driver task. The handle is
//! cloneable; once every clone is dropped the driver exits as well.

use crate::error::{Result, TimerError};
use crate::timer::stats::{DrainReport, TimerStats};
use tokio::sync::{mpsc, oneshot};

use super::commands::DriverCommand;

/// 驱动任务的句柄
/// Handle for the driver task
#[derive(Debug, Clone)]
pub struct DriverHandle {
    /// 命令发送通道
    /// Command sender channel
    command_tx: mpsc::Sender<DriverCommand>,
}

impl DriverHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<DriverCommand>) -> Self {
        Self { command_tx }
    }

    /// 立即处理一次到期条目，不等待下一个 tick
    /// Drain due entries now instead of waiting for the next tick
    pub async fn drain_now(&self) -> Result<DrainReport> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(DriverCommand::Drain { response_tx }).await?;
        response_rx.await.map_err(|_| TimerError::DriverShutdown)
    }

    /// 获取统计信息
    /// Get statistics
    pub async fn stats(&self) -> Result<TimerStats> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(DriverCommand::GetStats { response_tx }).await?;
        response_rx.await.map_err(|_| TimerError::DriverShutdown)
    }

    /// 关闭驱动任务
    /// Shutdown the driver task
    ///
    /// Entries already due are drained one last time; the report of that pass
    /// is returned. Entries not yet due stay in the store, and a new driver
    /// may be started for it afterwards.
    pub async fn shutdown(&self) -> Result<DrainReport> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(DriverCommand::Shutdown { response_tx }).await?;
        response_rx.await.map_err(|_| TimerError::DriverShutdown)
    }

    /// Whether the driver task has exited.
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn send(&self, command: DriverCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| TimerError::DriverShutdown)
    }
}
