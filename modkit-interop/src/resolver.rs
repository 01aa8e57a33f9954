//! 字段偏移解析器

use crate::candidates;
use crate::handle::{ClassHandle, FieldHandle};
use crate::runtime::{guarded, NativeRuntime};
use dashmap::DashMap;
use modkit_config::InteropConfig;
use modkit_diag::Diagnostics;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// 解析失败上报时使用的 mod id
pub const INTEROP_MOD: &str = "modkit.interop";

/// 偏移哨兵值：0 表示未解析
pub const UNRESOLVED: u32 = 0;

/// 带缓存的字段偏移解析器
///
/// 缓存键为 (类型句柄, 逻辑字段名)，一旦写入就不再失效；未解析的哨兵值同样被缓存。
/// 所有查询都不会失败，失败一律折叠为 [`UNRESOLVED`] 并以 Warning 上报。
pub struct OffsetResolver {
    runtime: Arc<dyn NativeRuntime>,
    diagnostics: Arc<Diagnostics>,
    config: InteropConfig,
    cache: DashMap<(ClassHandle, String), u32>,
    well_known: DashMap<String, u32>,
    base_class: OnceCell<ClassHandle>,
}

impl OffsetResolver {
    pub fn new(
        runtime: Arc<dyn NativeRuntime>,
        diagnostics: Arc<Diagnostics>,
        config: InteropConfig,
    ) -> Self {
        OffsetResolver {
            runtime,
            diagnostics,
            config,
            cache: DashMap::new(),
            well_known: DashMap::new(),
            base_class: OnceCell::new(),
        }
    }

    pub fn with_defaults(runtime: Arc<dyn NativeRuntime>, diagnostics: Arc<Diagnostics>) -> Self {
        Self::new(runtime, diagnostics, InteropConfig::default())
    }

    pub fn config(&self) -> &InteropConfig {
        &self.config
    }

    /// 预解析宿主基础类型的常用字段偏移
    ///
    /// 尽力而为：失败只上报 Warning，对应偏移保持哨兵值。重复调用不会再次查询宿主。
    pub fn initialize(&self) -> ClassHandle {
        *self.base_class.get_or_init(|| {
            let base = &self.config.base_type;
            let class = self.resolve_class(&base.module, &base.namespace, &base.name);
            if !class.is_valid() {
                self.report(format!(
                    "base type {}.{} not found in module {}",
                    base.namespace, base.name, base.module
                ));
                return ClassHandle::NULL;
            }

            for field in &self.config.well_known_fields {
                let offset = self.get_or_resolve(class, field);
                self.well_known.insert(field.clone(), offset);
            }
            tracing::debug!(
                target: "modkit::interop",
                base = %base.name,
                fields = self.well_known.len(),
                "well-known offsets initialized"
            );
            class
        })
    }

    /// 是否已执行过初始化
    pub fn is_initialized(&self) -> bool {
        self.base_class.get().is_some()
    }

    /// 初始化时解析到的基础类型
    pub fn base_class(&self) -> ClassHandle {
        self.base_class.get().copied().unwrap_or(ClassHandle::NULL)
    }

    /// 预解析的常用字段偏移，未知时为 0
    pub fn well_known(&self, field: &str) -> u32 {
        self.well_known.get(field).map(|v| *v).unwrap_or(UNRESOLVED)
    }

    /// 按 (模块, 命名空间, 名称) 解析类型，失败返回空句柄
    pub fn resolve_class(&self, module: &str, namespace: &str, name: &str) -> ClassHandle {
        match guarded("resolve_class", || {
            self.runtime.resolve_class(module, namespace, name)
        }) {
            Ok(class) => class,
            Err(err) => {
                tracing::debug!(target: "modkit::interop", %name, error = %err, "resolve_class failed");
                ClassHandle::NULL
            }
        }
    }

    /// 取缓存的偏移，首次访问时解析并缓存
    pub fn get_or_resolve(&self, class: ClassHandle, field: &str) -> u32 {
        let key = (class, field.to_string());
        if let Some(offset) = self.cache.get(&key) {
            return *offset;
        }

        // 并发解析同一个键是安全的：宿主元数据不可变，结果相同
        let offset = match self.resolve_offset(class, field) {
            Ok(offset) => offset,
            Err(reason) => {
                self.report(reason);
                UNRESOLVED
            }
        };
        self.cache.insert(key, offset);
        offset
    }

    /// 按候选名优先级查找字段，每个候选都沿继承链查找
    pub fn find_field(&self, class: ClassHandle, field: &str) -> FieldHandle {
        if !class.is_valid() || field.is_empty() {
            return FieldHandle::NULL;
        }
        for candidate in candidates::candidate_names(field) {
            let handle = self.find_in_hierarchy(class, &candidate);
            if handle.is_valid() {
                tracing::trace!(target: "modkit::interop", %field, %candidate, "field matched");
                return handle;
            }
        }
        FieldHandle::NULL
    }

    /// 按优先级排列的候选名
    pub fn candidate_names(&self, field: &str) -> Vec<String> {
        candidates::candidate_names(field)
    }

    /// 已缓存的键数量（含哨兵）
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn resolve_offset(&self, class: ClassHandle, field: &str) -> Result<u32, String> {
        if !class.is_valid() {
            return Err(format!("cannot resolve field {field}: invalid class handle"));
        }
        let handle = self.find_field(class, field);
        if !handle.is_valid() {
            return Err(format!("field {field} not found on {class:?} or its ancestors"));
        }
        match guarded("field_offset", || self.runtime.field_offset(handle)) {
            Ok(UNRESOLVED) => Err(format!("field {field} reported a zero offset")),
            Ok(offset) => Ok(offset),
            Err(err) => Err(format!("offset of field {field} unavailable: {err}")),
        }
    }

    fn find_in_hierarchy(&self, class: ClassHandle, name: &str) -> FieldHandle {
        let mut current = class;
        let mut visited: Vec<ClassHandle> = Vec::new();

        for _ in 0..self.config.max_hierarchy_depth {
            if !current.is_valid() || visited.contains(&current) {
                break;
            }
            visited.push(current);

            let field = guarded("class_field", || self.runtime.class_field(current, name))
                .unwrap_or(FieldHandle::NULL);
            if field.is_valid() {
                return field;
            }
            current = guarded("parent_class", || self.runtime.parent_class(current))
                .unwrap_or(ClassHandle::NULL);
        }
        FieldHandle::NULL
    }

    fn report(&self, message: String) {
        tracing::warn!(target: "modkit::interop", "{}", message);
        self.diagnostics.warn(Some(INTEROP_MOD), message);
    }
}

impl fmt::Debug for OffsetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffsetResolver")
            .field("base_class", &self.base_class())
            .field("cached", &self.cache.len())
            .finish()
    }
}
