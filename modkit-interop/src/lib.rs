//! modkit-interop - 宿主原生对象系统互操作
//!
//! 宿主对象的内存布局只有在宿主运行时启动后才能查询。本 crate 提供：
//! - [`NativeRuntime`]：宿主类型系统查询接口（外部协作者）
//! - [`OffsetResolver`]：多命名习惯、沿继承链查找并缓存字段偏移
//! - [`ObjectView`]：基于偏移的类型化字段读写
//! - [`LayoutDump`]：解析宿主导出的文本布局转储，离线提供 [`NativeRuntime`]
//!
//! 所有查询失败都折叠为偏移 0（未解析），并以 Warning 上报到诊断聚合器。

pub mod candidates;
pub mod dump;
pub mod handle;
pub mod memory;
pub mod resolver;
pub mod runtime;

pub use candidates::{candidate_names, CANDIDATE_GENERATORS};
pub use dump::{DumpClass, DumpError, DumpField, LayoutDump};
pub use handle::{ClassHandle, FieldHandle};
pub use memory::{FieldValue, HostMemory, ObjectView, OBJECT_HEADER_SIZE};
pub use resolver::{OffsetResolver, INTEROP_MOD, UNRESOLVED};
pub use runtime::{guarded, InteropError, NativeRuntime};
