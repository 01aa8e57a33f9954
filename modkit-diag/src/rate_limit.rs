//! 每个 mod 的令牌桶

use std::time::{Duration, Instant};

/// 令牌桶
///
/// 窗口开始后经过一个完整的补充间隔，桶被一次性补满。
#[derive(Clone, Debug)]
pub struct RateBucket {
    tokens: u32,
    capacity: u32,
    refill_interval: Duration,
    window_start: Instant,
}

impl RateBucket {
    /// 创建满桶
    pub fn new(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        RateBucket {
            tokens: capacity,
            capacity,
            refill_interval,
            window_start: now,
        }
    }

    /// 尝试消费一个令牌
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// 剩余令牌数（不触发补充）
    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= self.refill_interval {
            self.tokens = self.capacity;
            self.window_start = now;
        }
    }
}
