//! 全局配置与诊断单例
//!
//! 各组件都可以显式注入 `SdkConfig` / `Arc<Diagnostics>`；这里只为不方便传参的宿主
//! 提供一份进程级实例。
//!
//! # 使用示例
//! ```
//! use modkit::{config, init_config, is_initialized, SdkConfig};
//!
//! let mut cfg = SdkConfig::default();
//! cfg.evaluator.history_limit = Some(32);
//! init_config(cfg).unwrap();
//!
//! assert!(is_initialized());
//! assert_eq!(config().evaluator.history_limit, Some(32));
//! ```

use modkit_config::SdkConfig;
use modkit_diag::Diagnostics;
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL_CONFIG: OnceCell<SdkConfig> = OnceCell::new();
static GLOBAL_DIAGNOSTICS: OnceCell<Arc<Diagnostics>> = OnceCell::new();

/// 初始化全局配置，只能成功一次
///
/// 已经初始化（或已被 [`config`] 以默认值占用）时原样返回传入的配置。
pub fn init_config(config: SdkConfig) -> Result<(), SdkConfig> {
    GLOBAL_CONFIG.set(config)
}

/// 获取全局配置；未初始化时固定为默认配置
pub fn config() -> &'static SdkConfig {
    GLOBAL_CONFIG.get_or_init(SdkConfig::default)
}

/// 检查配置是否已初始化
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

/// 进程级诊断聚合器，首次访问时按全局配置创建
pub fn diagnostics() -> Arc<Diagnostics> {
    Arc::clone(GLOBAL_DIAGNOSTICS.get_or_init(|| Diagnostics::new(config().diagnostics.clone())))
}
