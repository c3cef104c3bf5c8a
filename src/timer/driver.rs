//! 定时器驱动任务
//! Timer driver task
//!
//! 驱动任务按固定间隔唤醒并处理到期条目。它是轮询式的：无论是否有条目到期
//! 都会唤醒，空闲时每次只查看一次堆顶。调用方通过 `DriverHandle` 与其通信，
//! 可以立即触发一次处理、查询统计信息，或优雅关闭。
//!
//! The driver wakes on a fixed tick and drains due entries. It is poll driven:
//! it wakes whether or not anything is due, and costs one heap peek per idle
//! tick. Callers talk to it through a `DriverHandle` to force a drain, query
//! statistics, or shut it down gracefully.

mod commands;
mod handle;
mod task;

pub(crate) use commands::DriverCommand;
pub use handle::DriverHandle;

use crate::timer::store::TimerStore;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::info;

/// `tokio::time::interval` rejects a zero period.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// 在给定运行时上启动驱动任务
/// Spawn the driver task on the given runtime
pub(crate) fn spawn(
    runtime: &Handle,
    store: TimerStore,
    tick_interval: Duration,
    command_buffer_size: usize,
) -> DriverHandle {
    let tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
    let (command_tx, command_rx) = mpsc::channel(command_buffer_size.max(1));
    let task = task::DriverTask::new(store, tick_interval, command_rx);

    runtime.spawn(task.run());

    info!(tick_ms = tick_interval.as_millis(), "Timer driver spawned");
    DriverHandle::new(command_tx)
}
