//! 宿主运行时查询接口

use crate::handle::{ClassHandle, FieldHandle};
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// 宿主运行时查询错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteropError {
    #[error("host runtime is not attached")]
    NotAttached,

    #[error("host runtime call failed: {0}")]
    Host(String),

    #[error("host runtime panicked during {0}")]
    Panicked(&'static str),
}

/// 宿主原生类型系统的查询能力
///
/// 所有方法都可能失败；调用方一律通过 [`guarded`] 包裹，错误与 panic 都折叠为“未找到”。
pub trait NativeRuntime: Send + Sync {
    /// 按 (模块, 命名空间, 名称) 解析类型；不存在时返回空句柄
    fn resolve_class(
        &self,
        module: &str,
        namespace: &str,
        name: &str,
    ) -> Result<ClassHandle, InteropError>;

    /// 只在声明类上按精确名称查找字段（不查父类）
    fn class_field(&self, class: ClassHandle, name: &str) -> Result<FieldHandle, InteropError>;

    /// 父类句柄，根类型返回空句柄
    fn parent_class(&self, class: ClassHandle) -> Result<ClassHandle, InteropError>;

    /// 字段相对实例起始处的字节偏移
    fn field_offset(&self, field: FieldHandle) -> Result<u32, InteropError>;
}

/// 执行一次宿主调用，把错误和 panic 都转成 `Err`
pub fn guarded<T>(
    operation: &'static str,
    call: impl FnOnce() -> Result<T, InteropError>,
) -> Result<T, InteropError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(_) => Err(InteropError::Panicked(operation)),
    }
}
