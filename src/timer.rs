//! 堆定时器模块
//! Heap Timer Module
//!
//! 该模块实现了基于二叉最小堆的定时器调度器。条目按（到期时间，插入序号）排序，
//! 通过任务键索引支持取消，并由后台驱动任务按固定间隔轮询执行到期回调。
//!
//! This module implements a timer scheduler based on a binary min-heap. Entries are
//! ordered by (deadline, insertion sequence), can be cancelled through a task-key
//! index, and are fired by a background driver that polls on a fixed tick.

pub mod driver;
pub mod entry;
pub mod execute;
pub mod heap;
pub mod key;
pub mod stats;
pub mod store;


pub use driver::DriverHandle;
pub use entry::{Callback, EntryState, TaskKey, TimerEntry, TimerHandle, TimerKind};
pub use execute::{CallbackPanic, PanicHandler};
pub use heap::TimerHeap;
pub use stats::{DrainReport, StoreSize, TimerStats};
pub use store::TimerStore;
