//! 定时器条目实现
//! Timer entry implementation
//!
//! 条目在堆、键索引和调用方持有的 `TimerHandle` 之间共享。
//! 取消只修改条目状态，从不直接把条目移出堆（惰性删除）。
//!
//! An entry is shared between the heap, the key index and any `TimerHandle`
//! held by the caller. Cancelling only flips the entry's state; the entry is
//! never removed from the heap directly (lazy deletion).

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// 任务键，用于按键取消
/// Task key, used for cancel-by-key lookups
pub type TaskKey = String;

/// 用户提供的零参数回调
/// User supplied zero-argument callback
pub type Callback = Box<dyn FnMut() + Send + 'static>;

/// 条目执行方式
/// How an entry behaves after it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// 触发一次后丢弃
    /// Discarded after firing once
    OneShot,
    /// 触发后按间隔重新装载
    /// Rearmed by its interval after each firing
    Repeating,
}

/// 条目生命周期状态
/// Entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// 等待到期
    /// Waiting for its deadline
    Scheduled,
    /// 已取消，弹出时被静默丢弃
    /// Cancelled; silently discarded when popped
    Cancelled,
    /// 一次性条目已经触发
    /// One-shot entry has fired
    Fired,
}

struct EntryInner {
    state: EntryState,
    /// `None` while a repeating callback is running outside the store lock.
    callback: Option<Callback>,
    deadline: Instant,
}

/// 单个计划调用
/// One scheduled invocation
pub struct TimerEntry {
    key: TaskKey,
    kind: TimerKind,
    interval: Duration,
    inner: Mutex<EntryInner>,
}

impl TimerEntry {
    pub(crate) fn new(
        key: TaskKey,
        kind: TimerKind,
        interval: Duration,
        deadline: Instant,
        callback: Callback,
    ) -> Self {
        Self {
            key,
            kind,
            interval,
            inner: Mutex::new(EntryInner {
                state: EntryState::Scheduled,
                callback: Some(callback),
                deadline,
            }),
        }
    }

    /// Makes the entry inert. Returns `true` if the entry was still scheduled.
    /// An execution already in progress is not interrupted.
    pub fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != EntryState::Scheduled {
            return false;
        }
        inner.state = EntryState::Cancelled;
        inner.callback = None;
        true
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().state == EntryState::Scheduled
    }

    pub fn state(&self) -> EntryState {
        self.inner.lock().state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The deadline the entry is currently queued for.
    pub fn deadline(&self) -> Instant {
        self.inner.lock().deadline
    }

    /// Takes the callback out for execution. One-shot entries move to `Fired`.
    /// Returns `None` for entries that are no longer scheduled.
    pub(crate) fn take_for_run(&self) -> Option<Callback> {
        let mut inner = self.inner.lock();
        if inner.state != EntryState::Scheduled {
            return None;
        }
        if self.kind == TimerKind::OneShot {
            inner.state = EntryState::Fired;
        }
        inner.callback.take()
    }

    /// Puts a repeating callback back and records the next deadline.
    /// Returns `false` if the entry was cancelled while the callback ran, in
    /// which case the callback is dropped.
    pub(crate) fn rearm(&self, callback: Callback, deadline: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != EntryState::Scheduled {
            return false;
        }
        inner.callback = Some(callback);
        inner.deadline = deadline;
        true
    }
}

impl fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TimerEntry")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("interval", &self.interval)
            .field("state", &inner.state)
            .field("deadline", &inner.deadline)
            .finish()
    }
}

/// 调用方持有的条目引用，可绕过键索引直接取消
/// Caller-held reference to an entry; cancels without going through the key index
#[derive(Debug, Clone)]
pub struct TimerHandle {
    entry: Arc<TimerEntry>,
}

impl TimerHandle {
    pub(crate) fn new(entry: Arc<TimerEntry>) -> Self {
        Self { entry }
    }

    /// 取消定时器
    /// Cancel the timer
    pub fn cancel(&self) -> bool {
        self.entry.cancel()
    }

    pub fn is_active(&self) -> bool {
        self.entry.is_active()
    }

    pub fn state(&self) -> EntryState {
        self.entry.state()
    }

    pub fn key(&self) -> &str {
        self.entry.key()
    }

    pub fn kind(&self) -> TimerKind {
        self.entry.kind()
    }

    pub fn interval(&self) -> Duration {
        self.entry.interval()
    }

    pub fn deadline(&self) -> Instant {
        self.entry.deadline()
    }

    pub(crate) fn entry(&self) -> &Arc<TimerEntry> {
        &self.entry
    }
}
