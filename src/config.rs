//! 定义了定时器存储和驱动任务的可配置参数。
//! Defines configurable parameters for the timer store and its driver.

use crate::timer::execute::PanicHandler;
use std::fmt;
use std::time::Duration;

/// A structure containing all configurable parameters for a timer store.
///
/// 包含定时器存储所有可配置参数的结构体。
#[derive(Clone, Default)]
pub struct TimerConfig {
    /// Scheduling-related parameters.
    /// 调度相关参数。
    pub scheduling: SchedulingConfig,

    /// Driver-related parameters.
    /// 驱动任务相关参数。
    pub driver: DriverConfig,

    /// Optional hook invoked after a callback panicked. The panic is always
    /// logged through `tracing`; this hook is for callers that want to react to it.
    ///
    /// 回调发生 panic 后调用的可选钩子。panic 总会通过 `tracing` 记录；
    /// 此钩子供需要自行处理的调用方使用。
    pub panic_handler: Option<PanicHandler>,
}

/// What happens to the key index when a repeating entry is rearmed.
///
/// 重复条目重新装载时键索引的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RearmIndexPolicy {
    /// The key binding is dropped when the entry is popped and not restored.
    /// After its first firing a repeating entry can only be cancelled through
    /// its `TimerHandle`.
    ///
    /// 条目弹出时删除键绑定且不恢复。重复条目首次触发后只能通过 `TimerHandle` 取消。
    #[default]
    Drop,
    /// The key is bound to the entry again on rearm, unless another entry
    /// claimed the key while the callback was running.
    ///
    /// 重新装载时再次绑定键，除非回调运行期间该键已被其他条目占用。
    Reinsert,
}

/// What happens to the key index when an entry is popped from the heap.
///
/// 条目从堆中弹出时键索引的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopIndexPolicy {
    /// The popped entry's key is removed from the index, even when a later
    /// registration has rebound the key to a newer entry. That newer entry
    /// then stays queued but can no longer be cancelled by key.
    ///
    /// 无条件删除弹出条目的键，即使该键已被后来的注册重新绑定到新条目。
    /// 新条目仍在队列中，但无法再按键取消。
    #[default]
    Always,
    /// The key is removed only if it is still bound to the popped entry.
    ///
    /// 仅当键仍绑定到弹出的条目时才删除。
    IfBound,
}

/// Scheduling-related parameters.
///
/// 调度相关参数。
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// Delays below this floor are raised to it.
    /// 低于此下限的延迟会被提升到下限。
    pub min_delay: Duration,
    /// Index handling for rearmed repeating entries.
    /// 重复条目重新装载时的索引策略。
    pub rearm_index_policy: RearmIndexPolicy,
    /// Index handling for popped entries.
    /// 条目弹出时的索引策略。
    pub pop_index_policy: PopIndexPolicy,
}

/// Driver-related parameters.
///
/// 驱动任务相关参数。
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The interval at which the driver wakes up and drains due entries.
    /// This bounds the worst-case firing latency.
    ///
    /// 驱动任务唤醒并处理到期条目的间隔。它决定了最坏情况下的触发延迟。
    pub tick_interval: Duration,
    /// Capacity of the driver's command channel.
    /// 驱动任务命令通道的容量。
    pub command_buffer_size: usize,
}

impl fmt::Debug for TimerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerConfig")
            .field("scheduling", &self.scheduling)
            .field("driver", &self.driver)
            .field("panic_handler", &self.panic_handler.as_ref().map(|_| "<handler>"))
            .finish()
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1),
            rearm_index_policy: RearmIndexPolicy::Drop,
            pop_index_policy: PopIndexPolicy::Always,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            command_buffer_size: 64,
        }
    }
}
