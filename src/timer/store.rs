//! 定时器存储核心实现
//! Timer store core implementation
//!
//! 本模块包含受互斥锁保护的最小堆和任务键索引，负责注册、按键取消、
//! 以及弹出并执行所有到期条目。用户回调永远不会在持有存储锁时执行。
//!
//! This module contains the mutex-protected min-heap and task-key index. It
//! handles registration, cancel-by-key, and popping and executing every due
//! entry. User callbacks never run while the store lock is held.

use crate::config::{PopIndexPolicy, RearmIndexPolicy, TimerConfig};
use crate::error::{Result, TimerError};
use crate::timer::driver::{self, DriverHandle};
use crate::timer::entry::{Callback, TaskKey, TimerEntry, TimerHandle, TimerKind};
use crate::timer::execute::{report_panic, run_callback};
use crate::timer::heap::{HeapNode, TimerHeap};
use crate::timer::key::generate_task_key;
use crate::timer::stats::{DrainReport, StoreSize, TimerStats};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// 存储可接受的最小延迟下限，保证重复条目总是向前推进
/// Lowest accepted delay floor; keeps repeating entries moving forward
const MIN_DELAY_FLOOR: Duration = Duration::from_nanos(1);

/// 与 tokio 一致的"遥远未来"，用于延迟溢出时
/// "Far future" used when a delay overflows, matching tokio's choice
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// 定时器存储，可廉价克隆并在线程间共享
/// Timer store; cheap to clone and share between threads
#[derive(Clone)]
pub struct TimerStore {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<StoreInner>,
    config: TimerConfig,
    min_delay: Duration,
    driver_running: AtomicBool,
}

struct StoreInner {
    heap: TimerHeap,
    index: HashMap<TaskKey, Arc<TimerEntry>>,
    next_sequence: u64,
    stats: TimerStats,
}

impl StoreInner {
    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn unused_key(&self) -> TaskKey {
        loop {
            let key = generate_task_key();
            if !self.index.contains_key(&key) {
                return key;
            }
        }
    }

    /// Drops the index binding of a popped entry according to `policy`.
    fn unbind(&mut self, entry: &Arc<TimerEntry>, policy: PopIndexPolicy) {
        if entry.key().is_empty() {
            return;
        }
        match policy {
            PopIndexPolicy::Always => {
                self.index.remove(entry.key());
            }
            PopIndexPolicy::IfBound => {
                if self
                    .index
                    .get(entry.key())
                    .is_some_and(|bound| Arc::ptr_eq(bound, entry))
                {
                    self.index.remove(entry.key());
                }
            }
        }
    }

    fn size(&self) -> StoreSize {
        StoreSize {
            pending: self.heap.len(),
            indexed: self.index.len(),
        }
    }
}

impl Default for TimerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerStore {
    /// 创建默认配置的空存储
    /// Create an empty store with default configuration
    pub fn new() -> Self {
        Self::with_config(TimerConfig::default())
    }

    /// 使用给定配置创建空存储
    /// Create an empty store with the given configuration
    pub fn with_config(config: TimerConfig) -> Self {
        let min_delay = config.scheduling.min_delay.max(MIN_DELAY_FLOOR);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(StoreInner {
                    heap: TimerHeap::new(),
                    index: HashMap::new(),
                    next_sequence: 1,
                    stats: TimerStats::default(),
                }),
                config,
                min_delay,
                driver_running: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &TimerConfig {
        &self.shared.config
    }

    /// 注册一次性定时器
    /// Register a one-shot timer
    ///
    /// An empty `key` is replaced by a generated one. A key that is already
    /// bound is silently rebound to the new entry; the previous entry stays
    /// queued and still fires, but can no longer be cancelled by key.
    pub fn add_one_shot<F>(&self, delay: Duration, key: impl Into<TaskKey>, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.insert(Instant::now(), delay, key.into(), TimerKind::OneShot, once(callback))
    }

    /// 注册重复定时器，间隔等于延迟
    /// Register a repeating timer whose interval equals `delay`
    ///
    /// Duplicate keys behave as in [`TimerStore::add_one_shot`].
    pub fn add_repeating<F>(&self, delay: Duration, key: impl Into<TaskKey>, callback: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        self.insert(Instant::now(), delay, key.into(), TimerKind::Repeating, Box::new(callback))
    }

    /// Like [`TimerStore::add_one_shot`], but fails with
    /// [`TimerError::DuplicateKey`] instead of orphaning a pending entry.
    pub fn try_add_one_shot<F>(&self, delay: Duration, key: impl Into<TaskKey>, callback: F) -> Result<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_insert(Instant::now(), delay, key.into(), TimerKind::OneShot, once(callback))
    }

    /// Like [`TimerStore::add_repeating`], but fails with
    /// [`TimerError::DuplicateKey`] instead of orphaning a pending entry.
    pub fn try_add_repeating<F>(&self, delay: Duration, key: impl Into<TaskKey>, callback: F) -> Result<TimerHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.try_insert(Instant::now(), delay, key.into(), TimerKind::Repeating, Box::new(callback))
    }

    pub(crate) fn insert(
        &self,
        now: Instant,
        delay: Duration,
        key: TaskKey,
        kind: TimerKind,
        callback: Callback,
    ) -> TimerHandle {
        let mut inner = self.shared.inner.lock();
        let key = if key.is_empty() { inner.unused_key() } else { key };
        self.push_new(&mut inner, now, delay, key, kind, callback)
    }

    pub(crate) fn try_insert(
        &self,
        now: Instant,
        delay: Duration,
        key: TaskKey,
        kind: TimerKind,
        callback: Callback,
    ) -> Result<TimerHandle> {
        let mut inner = self.shared.inner.lock();
        let key = if key.is_empty() { inner.unused_key() } else { key };
        if inner.index.contains_key(&key) {
            return Err(TimerError::DuplicateKey(key));
        }
        Ok(self.push_new(&mut inner, now, delay, key, kind, callback))
    }

    fn push_new(
        &self,
        inner: &mut StoreInner,
        now: Instant,
        delay: Duration,
        key: TaskKey,
        kind: TimerKind,
        callback: Callback,
    ) -> TimerHandle {
        let delay = delay.max(self.shared.min_delay);
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
        let entry = Arc::new(TimerEntry::new(key.clone(), kind, delay, deadline, callback));
        let sequence = inner.next_sequence();

        inner.heap.push(HeapNode {
            deadline,
            sequence,
            entry: entry.clone(),
        });
        inner.stats.scheduled += 1;

        if let Some(previous) = inner.index.insert(key, entry.clone()) {
            if previous.is_active() {
                inner.stats.orphaned += 1;
                debug!(task_key = %previous.key(), "Duplicate task key orphaned a pending timer");
            }
        }

        trace!(
            task_key = %entry.key(),
            sequence,
            kind = ?kind,
            delay_ms = delay.as_millis(),
            "Timer scheduled"
        );

        TimerHandle::new(entry)
    }

    /// 按键取消定时器
    /// Cancel a timer by task key
    ///
    /// The entry is only marked inert; it stays in the heap and the index
    /// until the drain loop pops and discards it. Returns `true` if a
    /// scheduled entry was cancelled.
    pub fn cancel_by_key(&self, key: &str) -> bool {
        let inner = self.shared.inner.lock();
        let cancelled = inner.index.get(key).is_some_and(|entry| entry.cancel());
        trace!(task_key = key, cancelled, "Cancel by key");
        cancelled
    }

    /// Whether `key` is currently bound in the index.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.inner.lock().index.contains_key(key)
    }

    pub fn size(&self) -> StoreSize {
        self.shared.inner.lock().size()
    }

    pub fn stats(&self) -> TimerStats {
        let inner = self.shared.inner.lock();
        let mut stats = inner.stats.clone();
        stats.size = inner.size();
        stats
    }

    /// Deadline of the heap root, including cancelled entries not yet popped.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.shared.inner.lock().heap.peek().map(|node| node.deadline)
    }

    /// 弹出并执行所有到期条目
    /// Pop and execute every entry due at `now`
    ///
    /// Entries fire in (deadline, sequence) order. Each callback runs with the
    /// store unlocked. A repeating entry is rearmed at `previous deadline +
    /// interval`, or at `now + interval` when that would already be due, so
    /// missed periods are skipped instead of fired in a burst.
    pub fn drain(&self, now: Instant) -> DrainReport {
        let mut report = DrainReport::default();
        let pop_policy = self.shared.config.scheduling.pop_index_policy;
        let mut inner = self.shared.inner.lock();

        while let Some(HeapNode { deadline, entry, .. }) = inner.heap.pop_due(now) {
            inner.unbind(&entry, pop_policy);

            let Some(mut callback) = entry.take_for_run() else {
                report.skipped += 1;
                continue;
            };

            let panicked = MutexGuard::unlocked(&mut inner, || {
                let Some(panic) = run_callback(entry.key(), &mut callback) else {
                    return false;
                };
                if let Some(handler) = &self.shared.config.panic_handler {
                    report_panic(handler, &panic);
                }
                true
            });
            report.fired += 1;
            if panicked {
                report.panicked += 1;
            }

            if entry.kind() == TimerKind::Repeating {
                self.rearm(&mut inner, &entry, callback, deadline, now, &mut report);
            }
        }

        inner.stats.record_drain(&report);
        let size = inner.size();
        drop(inner);

        if !report.is_empty() {
            debug!(
                fired = report.fired,
                skipped = report.skipped,
                panicked = report.panicked,
                rearmed = report.rearmed,
                pending = size.pending,
                "Drained due timers"
            );
        }
        report
    }

    fn rearm(
        &self,
        inner: &mut StoreInner,
        entry: &Arc<TimerEntry>,
        callback: Callback,
        previous: Instant,
        now: Instant,
        report: &mut DrainReport,
    ) {
        let interval = entry.interval();
        let mut next = previous.checked_add(interval).unwrap_or(now + FAR_FUTURE);
        if next <= now {
            next = now + interval;
        }

        if !entry.rearm(callback, next) {
            trace!(task_key = %entry.key(), "Repeating timer cancelled while running");
            return;
        }

        let sequence = inner.next_sequence();
        inner.heap.push(HeapNode {
            deadline: next,
            sequence,
            entry: entry.clone(),
        });
        if self.shared.config.scheduling.rearm_index_policy == RearmIndexPolicy::Reinsert {
            inner
                .index
                .entry(entry.key().to_string())
                .or_insert_with(|| entry.clone());
        }
        report.rearmed += 1;
    }

    /// 启动后台驱动任务
    /// Start the background driver task
    ///
    /// Must be called from within a tokio runtime. Only one driver may run
    /// per store at a time.
    pub fn start_driver(&self, tick_interval: Duration) -> Result<DriverHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        if self
            .shared
            .driver_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TimerError::DriverAlreadyRunning);
        }
        Ok(driver::spawn(
            &runtime,
            self.clone(),
            tick_interval,
            self.shared.config.driver.command_buffer_size,
        ))
    }

    /// Start the driver with the configured tick interval.
    pub fn start_default_driver(&self) -> Result<DriverHandle> {
        self.start_driver(self.shared.config.driver.tick_interval)
    }

    pub fn is_driver_running(&self) -> bool {
        self.shared.driver_running.load(Ordering::Acquire)
    }

    pub(crate) fn release_driver(&self) {
        self.shared.driver_running.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for TimerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerStore")
            .field("size", &self.size())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Adapts a one-shot closure to the repeatable callback type.
fn once<F>(callback: F) -> Callback
where
    F: FnOnce() + Send + 'static,
{
    let mut callback = Some(callback);
    Box::new(move || {
        if let Some(callback) = callback.take() {
            callback();
        }
    })
}
