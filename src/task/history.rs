//! 探测结果历史
//!
//! 固定容量的环形缓冲区，写满后淘汰最旧的结果

use crate::probe::ProbeOutcome;
use std::collections::VecDeque;

/// 固定容量的结果历史
#[derive(Debug, Clone)]
pub struct ResultHistory {
    entries: VecDeque<ProbeOutcome>,
    capacity: usize,
}

impl ResultHistory {
    /// 创建指定容量的历史，容量至少为1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加结果，超过容量时淘汰最旧的一条
    pub fn push(&mut self, outcome: ProbeOutcome) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(outcome);
    }

    /// 返回最近 `min(n, len)` 条结果，按时间先后排列
    pub fn snapshot(&self, n: usize) -> Vec<ProbeOutcome> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// 最近一条结果
    pub fn latest(&self) -> Option<&ProbeOutcome> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
