//! 驱动任务命令定义
//! Driver command definitions
//!
//! 定义了 `DriverHandle` 与驱动任务之间的通信协议。
//!
//! Defines the protocol between a `DriverHandle` and the driver task.

use crate::timer::stats::{DrainReport, TimerStats};
use tokio::sync::oneshot;

/// 驱动任务命令
/// Driver commands
#[derive(Debug)]
pub(crate) enum DriverCommand {
    /// 立即处理到期条目
    /// Drain due entries now
    Drain {
        response_tx: oneshot::Sender<DrainReport>,
    },
    /// 获取统计信息
    /// Get statistics
    GetStats {
        response_tx: oneshot::Sender<TimerStats>,
    },
    /// 处理最后一批到期条目后关闭
    /// Drain one last time, then stop
    Shutdown {
        response_tx: oneshot::Sender<DrainReport>,
    },
}
