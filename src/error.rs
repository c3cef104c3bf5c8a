//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the timer scheduler.
/// 定时器调度器的主要错误类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// A strict registration found the task key already bound to a pending entry.
    /// 严格注册时发现任务键已绑定到一个待执行的条目。
    #[error("task key `{0}` is already scheduled")]
    DuplicateKey(String),

    /// A driver is already running for this store.
    /// 该存储已有驱动任务在运行。
    #[error("timer driver is already running")]
    DriverAlreadyRunning,

    /// The driver could not be spawned because no tokio runtime is active.
    /// 没有活动的 tokio 运行时，无法启动驱动任务。
    #[error("no tokio runtime available to spawn the timer driver")]
    NoRuntime,

    /// The driver task has exited and no longer accepts commands.
    /// 驱动任务已退出，不再接受命令。
    #[error("timer driver has been shutdown")]
    DriverShutdown,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, TimerError>;
