//! OnError 订阅者

use crate::record::ErrorEntry;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// 诊断输出目标 trait
pub trait ErrorSink: Send + Sync {
    /// 接收一条已被接受的条目
    fn on_error(&self, entry: &ErrorEntry);
}

impl<F> ErrorSink for F
where
    F: Fn(&ErrorEntry) + Send + Sync,
{
    fn on_error(&self, entry: &ErrorEntry) {
        self(entry)
    }
}

/// 订阅句柄，用于取消订阅
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 订阅者列表
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    sinks: RwLock<Vec<(SubscriptionId, Arc<dyn ErrorSink>)>>,
}

impl Subscribers {
    pub(crate) fn new() -> Self {
        Subscribers {
            next_id: AtomicU64::new(1),
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, sink: Arc<dyn ErrorSink>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, sink));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        let before = sinks.len();
        sinks.retain(|(sid, _)| *sid != id);
        sinks.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 依次通知所有订阅者
    ///
    /// 先复制列表再调用，回调里可以再次订阅或上报。单个回调 panic 不影响其他订阅者。
    pub(crate) fn notify(&self, entry: &ErrorEntry) {
        let sinks: Vec<Arc<dyn ErrorSink>> = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, sink)| Arc::clone(sink))
            .collect();

        for sink in sinks {
            if catch_unwind(AssertUnwindSafe(|| sink.on_error(entry))).is_err() {
                tracing::warn!(
                    target: "modkit::diag",
                    mod_id = %entry.mod_id,
                    "OnError subscriber panicked"
                );
            }
        }
    }
}
