//! 原生模块
//!
//! 脚本可见的原生能力全部通过 [`NativeModule`] 注册；没有注册的能力脚本无法触及。

mod math;
mod std_module;
mod text;

use super::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 原生函数签名
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// 参数个数约束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::AtLeast(min) => write!(f, "at least {min}"),
        }
    }
}

/// 原生函数
pub struct NativeFunction {
    /// 完整名称（`module.name`）
    pub name: String,
    pub arity: Arity,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        NativeFunction {
            name: name.into(),
            arity,
            func: Box::new(func),
        }
    }

    /// 调用（参数个数由调用方检查）
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// 原生模块：名称 + 成员表
#[derive(Clone)]
pub struct NativeModule {
    name: String,
    members: BTreeMap<String, Value>,
}

impl NativeModule {
    pub fn new(name: impl Into<String>) -> Self {
        NativeModule {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// 注册函数
    pub fn function<F>(mut self, name: &str, arity: Arity, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let full_name = format!("{}.{}", self.name, name);
        self.members.insert(
            name.to_string(),
            Value::Native(Arc::new(NativeFunction::new(full_name, arity, func))),
        );
        self
    }

    /// 注册常量
    pub fn constant(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.members.insert(name.to_string(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.members.get(member)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains_key(member)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 可被 `import` 的模块集合
#[derive(Clone, Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<NativeModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含 std / math / text 的注册表
    pub fn with_prelude() -> Self {
        let mut registry = Self::new();
        for module in prelude() {
            registry.register(module);
        }
        registry
    }

    /// 注册模块，同名模块被替换
    pub fn register(&mut self, module: Arc<NativeModule>) -> Option<Arc<NativeModule>> {
        self.modules.insert(module.name().to_string(), module)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NativeModule>> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<NativeModule>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// 内置模块
pub fn prelude() -> Vec<Arc<NativeModule>> {
    vec![
        Arc::new(std_module::module()),
        Arc::new(math::module()),
        Arc::new(text::module()),
    ]
}

/// 参数类型错误信息
pub(crate) fn expected(function: &str, what: &str, found: &Value) -> String {
    format!("{function}() expects {what}, found {}", found.type_name())
}
