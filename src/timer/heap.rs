//! 二叉最小堆实现
//! Binary min-heap implementation
//!
//! 基于数组的二叉最小堆，按（到期时间，插入序号）排序。序号保证相同到期时间的
//! 条目按注册顺序弹出。
//!
//! Array-backed binary min-heap ordered by (deadline, insertion sequence). The
//! sequence makes entries with equal deadlines pop in registration order.

use crate::timer::entry::TimerEntry;
use std::sync::Arc;
use tokio::time::Instant;

/// 堆中的节点，排序键与条目分开存放，比较时无需加条目锁
/// A heap node. The ordering key lives next to the entry so comparisons never
/// touch the entry's lock.
#[derive(Debug, Clone)]
pub struct HeapNode {
    pub deadline: Instant,
    pub sequence: u64,
    pub entry: Arc<TimerEntry>,
}

impl HeapNode {
    fn sort_key(&self) -> (Instant, u64) {
        (self.deadline, self.sequence)
    }
}

/// 定时器最小堆
/// Timer min-heap
#[derive(Debug, Default)]
pub struct TimerHeap {
    nodes: Vec<HeapNode>,
}

impl TimerHeap {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root node, i.e. the next entry to become due.
    pub fn peek(&self) -> Option<&HeapNode> {
        self.nodes.first()
    }

    pub fn push(&mut self, node: HeapNode) {
        self.nodes.push(node);
        self.sift_up(self.nodes.len() - 1);
    }

    /// Removes and returns the root.
    pub fn pop(&mut self) -> Option<HeapNode> {
        if self.nodes.is_empty() {
            return None;
        }
        let last = self.nodes.len() - 1;
        self.nodes.swap(0, last);
        let root = self.nodes.pop();
        if !self.nodes.is_empty() {
            self.sift_down(0);
        }
        root
    }

    /// Pops the root only if its deadline is `<= now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<HeapNode> {
        match self.peek() {
            Some(root) if root.deadline <= now => self.pop(),
            _ => None,
        }
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.nodes[a].sort_key() < self.nodes[b].sort_key()
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.less(index, parent) {
                break;
            }
            self.nodes.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.nodes.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.less(right, left) {
                smallest = right;
            }
            if !self.less(smallest, index) {
                break;
            }
            self.nodes.swap(index, smallest);
            index = smallest;
        }
    }

    #[cfg(test)]
    pub(crate) fn is_heap_ordered(&self) -> bool {
        (1..self.nodes.len()).all(|i| !self.less(i, (i - 1) / 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::entry::TimerKind;
    use std::time::Duration;

    fn node(base: Instant, offset_ms: u64, sequence: u64) -> HeapNode {
        let deadline = base + Duration::from_millis(offset_ms);
        HeapNode {
            deadline,
            sequence,
            entry: Arc::new(TimerEntry::new(
                sequence.to_string(),
                TimerKind::OneShot,
                Duration::from_millis(offset_ms),
                deadline,
                Box::new(|| {}),
            )),
        }
    }

    #[test]
    fn test_pop_returns_nodes_in_deadline_order() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        let offsets = [70, 10, 50, 30, 90, 20, 80, 40, 60];
        for (seq, offset) in offsets.iter().enumerate() {
            heap.push(node(base, *offset, seq as u64));
            assert!(heap.is_heap_ordered());
        }
        assert_eq!(heap.len(), offsets.len());

        let mut popped = Vec::new();
        while let Some(n) = heap.pop() {
            assert!(heap.is_heap_ordered());
            popped.push(n.deadline);
        }
        let mut sorted = popped.clone();
        sorted.sort();
        assert_eq!(popped, sorted);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_equal_deadlines_break_ties_by_sequence() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        for seq in [5, 2, 9, 1, 7] {
            heap.push(node(base, 20, seq));
        }
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop()).map(|n| n.sequence).collect();
        assert_eq!(order, vec![1, 2, 5, 7, 9]);
    }

    #[test]
    fn test_pop_due_respects_now() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        heap.push(node(base, 50, 1));

        assert!(heap.pop_due(base + Duration::from_millis(10)).is_none());
        assert_eq!(heap.len(), 1);

        // 到期时间等于 now 视为到期
        assert!(heap.pop_due(base + Duration::from_millis(50)).is_some());
        assert!(heap.pop_due(base + Duration::from_millis(50)).is_none());
    }
}
