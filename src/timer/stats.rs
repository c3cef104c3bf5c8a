//! 定时器存储统计信息
//! Timer store statistics

use std::fmt;

/// 存储当前大小
/// Current size of the store
///
/// `pending` counts every entry physically in the heap, including cancelled
/// entries that have not been popped yet, so it can exceed `indexed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreSize {
    /// 堆中的条目数
    /// Entries in the heap
    pub pending: usize,
    /// 索引中的键数
    /// Keys in the index
    pub indexed: usize,
}

/// 单次 drain 的结果
/// Outcome of a single drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// 执行的回调数（包括 panic 的回调）
    /// Callbacks executed, including the ones that panicked
    pub fired: usize,
    /// 被跳过的已取消条目数
    /// Cancelled entries discarded without running
    pub skipped: usize,
    /// panic 的回调数
    /// Callbacks that panicked
    pub panicked: usize,
    /// 重新装载的重复条目数
    /// Repeating entries pushed back onto the heap
    pub rearmed: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.fired == 0 && self.skipped == 0
    }
}

/// 累计统计信息
/// Cumulative statistics
#[derive(Debug, Clone, Default)]
pub struct TimerStats {
    /// 注册的条目总数
    /// Entries registered
    pub scheduled: u64,
    /// 已执行的回调数
    /// Callbacks executed
    pub fired: u64,
    /// 弹出时因已取消而丢弃的条目数
    /// Entries discarded on pop because they were cancelled
    pub cancelled: u64,
    /// panic 的回调数
    /// Callbacks that panicked
    pub panicked: u64,
    /// 重新装载次数
    /// Rearms of repeating entries
    pub rearmed: u64,
    /// 因重复键失去索引绑定的条目数
    /// Entries whose index binding was overwritten by a duplicate key
    pub orphaned: u64,
    /// 当前大小
    /// Current size
    pub size: StoreSize,
}

impl TimerStats {
    pub(crate) fn record_drain(&mut self, report: &DrainReport) {
        self.fired += report.fired as u64;
        self.cancelled += report.skipped as u64;
        self.panicked += report.panicked as u64;
        self.rearmed += report.rearmed as u64;
    }
}

impl fmt::Display for TimerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimerStats {{ scheduled: {}, fired: {}, cancelled: {}, panicked: {}, rearmed: {}, orphaned: {}, pending: {}, indexed: {} }}",
            self.scheduled,
            self.fired,
            self.cancelled,
            self.panicked,
            self.rearmed,
            self.orphaned,
            self.size.pending,
            self.size.indexed
        )
    }
}
