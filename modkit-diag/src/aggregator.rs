//! 诊断聚合器实现

use crate::rate_limit::RateBucket;
use crate::record::{ErrorEntry, Severity};
use crate::ring_buffer::RingBuffer;
use crate::sink::{ErrorSink, Subscribers, SubscriptionId};
use modkit_config::DiagnosticsConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// 空 mod id 规范化后的名字
pub const UNKNOWN_MOD: &str = "unknown";

/// 规范化 mod id：缺省或空白都归为 `"unknown"`
pub fn normalize_mod_id(mod_id: Option<&str>) -> String {
    match mod_id {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => UNKNOWN_MOD.to_string(),
    }
}

/// 聚合器统计信息
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticsStats {
    /// 仍被任一缓冲区持有的条目数
    pub entry_count: usize,
    /// 全局缓冲区中的条目数
    pub global_count: usize,
    /// 拥有条目的 mod 数量
    pub mod_count: usize,
    /// 因限速被丢弃的上报次数
    pub dropped_by_rate_limit: u64,
    /// 被全局缓冲区挤出的条目数
    pub evicted_from_global: u64,
}

/// 条目存储槽，记录它还在哪些缓冲区里
struct Slot {
    entry: ErrorEntry,
    in_mod: bool,
    in_global: bool,
}

enum Acceptance {
    New(ErrorEntry),
    Duplicate(ErrorEntry),
    Dropped,
}

/// 受单一临界区保护的全部状态
struct State {
    next_id: u64,
    slots: HashMap<u64, Slot>,
    per_mod: HashMap<String, RingBuffer<u64>>,
    global: RingBuffer<u64>,
    buckets: HashMap<String, RateBucket>,
    dropped: u64,
    evicted: u64,
}

impl State {
    fn new(global_capacity: usize) -> Self {
        State {
            next_id: 0,
            slots: HashMap::new(),
            per_mod: HashMap::new(),
            global: RingBuffer::new(global_capacity),
            buckets: HashMap::new(),
            dropped: 0,
            evicted: 0,
        }
    }

    fn accept(
        &mut self,
        config: &DiagnosticsConfig,
        mod_id: String,
        message: String,
        severity: Severity,
        now: Instant,
    ) -> Acceptance {
        // 1. 与该 mod 最近一条相同：原地计数，不消耗令牌
        let last = self.per_mod.get(&mod_id).and_then(|ring| ring.back().copied());
        if let Some(slot) = last.and_then(|id| self.slots.get_mut(&id)) {
            if slot.entry.message == message {
                slot.entry.occurrence_count = slot.entry.occurrence_count.saturating_add(1);
                return Acceptance::Duplicate(slot.entry.clone());
            }
        }

        // 2. 限速
        let rate = &config.rate_limit;
        let bucket = self.buckets.entry(mod_id.clone()).or_insert_with(|| {
            RateBucket::new(
                rate.capacity,
                Duration::from_millis(rate.refill_interval_ms),
                now,
            )
        });
        if !bucket.try_consume(now) {
            self.dropped += 1;
            return Acceptance::Dropped;
        }

        // 3. 新条目写入两个缓冲区，各自独立淘汰
        let id = self.next_id;
        self.next_id += 1;
        let entry = ErrorEntry::new(mod_id.clone(), message, severity);
        self.slots.insert(
            id,
            Slot {
                entry: entry.clone(),
                in_mod: true,
                in_global: true,
            },
        );

        let per_mod_capacity = config.per_mod_capacity;
        let evicted_mod = self
            .per_mod
            .entry(mod_id)
            .or_insert_with(|| RingBuffer::new(per_mod_capacity))
            .push(id);
        if let Some(old) = evicted_mod {
            self.release(old, false);
        }
        if let Some(old) = self.global.push(id) {
            self.evicted += 1;
            self.release(old, true);
        }

        Acceptance::New(entry)
    }

    /// 条目离开一个缓冲区；两个都不再持有时释放
    fn release(&mut self, id: u64, from_global: bool) {
        let unused = match self.slots.get_mut(&id) {
            Some(slot) => {
                if from_global {
                    slot.in_global = false;
                } else {
                    slot.in_mod = false;
                }
                !slot.in_mod && !slot.in_global
            }
            None => false,
        };
        if unused {
            self.slots.remove(&id);
        }
    }

    fn snapshot<'a>(&self, ids: impl Iterator<Item = &'a u64>) -> Vec<ErrorEntry> {
        ids.filter_map(|id| self.slots.get(id))
            .map(|slot| slot.entry.clone())
            .collect()
    }
}

/// 进程级诊断聚合器
///
/// 所有操作同步、不阻塞，可从任意线程调用。
///
/// # 示例
///
/// ```
/// use modkit_diag::{Diagnostics, Severity};
///
/// let diag = Diagnostics::with_defaults();
/// diag.report(Some("my.mod"), "texture missing");
/// diag.report(Some("my.mod"), "texture missing");
///
/// let entries = diag.errors(Some("my.mod"));
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].occurrence_count, 2);
/// assert_eq!(entries[0].severity, Severity::Error);
/// ```
pub struct Diagnostics {
    config: DiagnosticsConfig,
    state: Mutex<State>,
    subscribers: Subscribers,
}

impl Diagnostics {
    /// 创建聚合器
    pub fn new(config: DiagnosticsConfig) -> Arc<Self> {
        let state = State::new(config.global_capacity);
        Arc::new(Diagnostics {
            config,
            state: Mutex::new(state),
            subscribers: Subscribers::new(),
        })
    }

    /// 使用默认容量（200 / 1000 / 10）
    pub fn with_defaults() -> Arc<Self> {
        Self::new(DiagnosticsConfig::default())
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    /// 上报错误
    pub fn report(&self, mod_id: Option<&str>, message: impl Into<String>) {
        self.record(mod_id, message.into(), Severity::Error);
    }

    /// 上报警告
    pub fn warn(&self, mod_id: Option<&str>, message: impl Into<String>) {
        self.record(mod_id, message.into(), Severity::Warning);
    }

    /// 上报信息
    pub fn info(&self, mod_id: Option<&str>, message: impl Into<String>) {
        self.record(mod_id, message.into(), Severity::Info);
    }

    /// 按指定级别上报，返回被接受的条目（被限速丢弃时为 None）
    pub fn record(
        &self,
        mod_id: Option<&str>,
        message: String,
        severity: Severity,
    ) -> Option<ErrorEntry> {
        let mod_id = normalize_mod_id(mod_id);
        let acceptance =
            self.lock_state()
                .accept(&self.config, mod_id, message, severity, Instant::now());

        // 临界区外通知，订阅者可以重入
        match acceptance {
            Acceptance::New(entry) => {
                trace_entry(&entry);
                self.subscribers.notify(&entry);
                Some(entry)
            }
            Acceptance::Duplicate(entry) => {
                tracing::trace!(
                    target: "modkit::diag",
                    mod_id = %entry.mod_id,
                    count = entry.occurrence_count,
                    "duplicate diagnostic"
                );
                self.subscribers.notify(&entry);
                Some(entry)
            }
            Acceptance::Dropped => {
                tracing::trace!(target: "modkit::diag", "diagnostic dropped by rate limit");
                None
            }
        }
    }

    /// 清空所有条目与令牌桶
    pub fn clear(&self) {
        let mut state = self.lock_state();
        *state = State::new(self.config.global_capacity);
    }

    /// 条目快照：指定 mod 时只返回该 mod 的条目，否则返回全部
    pub fn errors(&self, mod_id: Option<&str>) -> Vec<ErrorEntry> {
        let state = self.lock_state();
        match mod_id {
            Some(_) => {
                let key = normalize_mod_id(mod_id);
                match state.per_mod.get(&key) {
                    Some(ring) => state.snapshot(ring.iter()),
                    None => Vec::new(),
                }
            }
            None => state.snapshot(state.global.iter()),
        }
    }

    /// 全局缓冲区快照（按写入顺序）
    pub fn recent_errors(&self) -> Vec<ErrorEntry> {
        let state = self.lock_state();
        state.snapshot(state.global.iter())
    }

    /// 当前拥有条目的 mod（排序后）
    pub fn mods(&self) -> Vec<String> {
        let state = self.lock_state();
        let mut mods: Vec<String> = state
            .per_mod
            .iter()
            .filter(|(_, ring)| !ring.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        mods.sort();
        mods
    }

    pub fn stats(&self) -> DiagnosticsStats {
        let state = self.lock_state();
        DiagnosticsStats {
            entry_count: state.slots.len(),
            global_count: state.global.len(),
            mod_count: state.per_mod.values().filter(|ring| !ring.is_empty()).count(),
            dropped_by_rate_limit: state.dropped,
            evicted_from_global: state.evicted,
        }
    }

    /// 订阅 OnError 事件
    pub fn subscribe<S: ErrorSink + 'static>(&self, sink: S) -> SubscriptionId {
        self.subscribers.add(Arc::new(sink))
    }

    /// 取消订阅，返回是否存在该订阅
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

fn trace_entry(entry: &ErrorEntry) {
    match entry.severity {
        Severity::Error => {
            tracing::error!(target: "modkit::diag", mod_id = %entry.mod_id, "{}", entry.message)
        }
        Severity::Warning => {
            tracing::warn!(target: "modkit::diag", mod_id = %entry.mod_id, "{}", entry.message)
        }
        Severity::Info => {
            tracing::info!(target: "modkit::diag", mod_id = %entry.mod_id, "{}", entry.message)
        }
    }
}
