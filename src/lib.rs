#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the in-process timer scheduler library.
//! 进程内定时器调度库的根。

pub mod config;
pub mod error;
pub mod timer;

pub use config::{DriverConfig, PopIndexPolicy, RearmIndexPolicy, SchedulingConfig, TimerConfig};
pub use error::{Result, TimerError};
pub use timer::{
    CallbackPanic, DrainReport, DriverHandle, EntryState, StoreSize, TimerHandle, TimerKind,
    TimerStats, TimerStore,
};
