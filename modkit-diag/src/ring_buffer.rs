//! 有界环形缓冲区
//!
//! 满了之后丢弃最旧的元素（FIFO）。本身不加锁，由聚合器的临界区保护。

use std::collections::VecDeque;

/// 固定容量的有序缓冲区
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// 创建新的环形缓冲区
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// 写入元素，返回被挤出的最旧元素
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// 最新写入的元素
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    /// 按写入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 清空缓冲区
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
