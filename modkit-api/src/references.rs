//! 引用提供者：编译器可以导入的原生模块集合

use modkit_core::runtime::stdlib::prelude;
use modkit_core::NativeModule;
use std::sync::{Arc, PoisonError, RwLock};

/// 枚举可被片段导入的模块
pub trait ReferenceProvider: Send + Sync {
    fn modules(&self) -> Vec<Arc<NativeModule>>;
}

/// 默认提供者：内置模块 + 宿主注册的模块，过滤框架模块
pub struct HostReferences {
    excluded_prefixes: Vec<String>,
    modules: RwLock<Vec<Arc<NativeModule>>>,
}

impl HostReferences {
    pub fn new(excluded_prefixes: Vec<String>) -> Self {
        HostReferences {
            excluded_prefixes,
            modules: RwLock::new(prelude()),
        }
    }

    /// 注册宿主模块；同名模块被替换
    pub fn register(&self, module: Arc<NativeModule>) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.retain(|m| m.name() != module.name());
        tracing::debug!(target: "modkit::api", module = module.name(), "registered host module");
        modules.push(module);
    }

    pub fn with_module(self, module: NativeModule) -> Self {
        self.register(Arc::new(module));
        self
    }

    /// 名称是否以框架前缀开头
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }
}

impl Default for HostReferences {
    fn default() -> Self {
        HostReferences::new(modkit_config::CompilerConfig::default().excluded_module_prefixes)
    }
}

impl ReferenceProvider for HostReferences {
    fn modules(&self) -> Vec<Arc<NativeModule>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| !self.is_excluded(m.name()))
            .cloned()
            .collect()
    }
}
