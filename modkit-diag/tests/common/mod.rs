//! 测试辅助工具

use modkit_diag::{Diagnostics, DiagnosticsConfig, ErrorEntry, RateLimitConfig};
use std::sync::{Arc, Mutex};

/// 不限速的聚合器，用于测试容量与淘汰
pub fn unlimited(per_mod_capacity: usize, global_capacity: usize) -> Arc<Diagnostics> {
    Diagnostics::new(DiagnosticsConfig {
        per_mod_capacity,
        global_capacity,
        rate_limit: RateLimitConfig {
            capacity: u32::MAX,
            refill_interval_ms: 60_000,
        },
    })
}

/// 指定令牌桶参数的聚合器
pub fn with_rate(capacity: u32, refill_interval_ms: u64) -> Arc<Diagnostics> {
    Diagnostics::new(DiagnosticsConfig {
        rate_limit: RateLimitConfig {
            capacity,
            refill_interval_ms,
        },
        ..DiagnosticsConfig::default()
    })
}

/// 收集 OnError 事件
pub fn collect_events(diag: &Diagnostics) -> Arc<Mutex<Vec<ErrorEntry>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    diag.subscribe(move |entry: &ErrorEntry| {
        sink.lock().unwrap().push(entry.clone());
    });
    events
}

pub fn messages(entries: &[ErrorEntry]) -> Vec<String> {
    entries.iter().map(|e| e.message.clone()).collect()
}
