//! modkit-diag - 进程级诊断聚合器
//!
//! 收集各个 mod 上报的错误、警告和信息，特点：
//! - **按 mod 隔离**：每个 mod 一个有界环形缓冲区（默认 200 条）
//! - **全局视图**：所有 mod 共享一个全局缓冲区（默认 1000 条）
//! - **去重**：与该 mod 最近一条消息相同时只递增计数
//! - **限速**：每个 mod 一个令牌桶，超出的上报被静默丢弃
//! - **订阅**：新条目和去重计数变化都会通知 OnError 订阅者
//!
//! # 快速开始
//!
//! ```
//! use modkit_diag::Diagnostics;
//!
//! let diag = Diagnostics::with_defaults();
//! diag.subscribe(|entry: &modkit_diag::ErrorEntry| println!("{}", entry.format()));
//! diag.warn(Some("my.mod"), "config key missing");
//! assert_eq!(diag.recent_errors().len(), 1);
//! ```

pub mod aggregator;
pub mod rate_limit;
pub mod record;
pub mod ring_buffer;
pub mod sink;

pub use aggregator::{normalize_mod_id, Diagnostics, DiagnosticsStats, UNKNOWN_MOD};
pub use rate_limit::RateBucket;
pub use record::{ErrorEntry, Severity};
pub use ring_buffer::RingBuffer;
pub use sink::{ErrorSink, SubscriptionId};

pub use modkit_config::{DiagnosticsConfig, RateLimitConfig};
