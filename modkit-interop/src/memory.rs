//! 类型化的宿主对象字段访问

use crate::handle::ClassHandle;
use crate::resolver::{OffsetResolver, UNRESOLVED};
use crate::runtime::{guarded, InteropError};

/// 宿主对象头大小；值类型内联存放时没有对象头
pub const OBJECT_HEADER_SIZE: u32 = 0x10;

/// 宿主进程内存访问能力
pub trait HostMemory: Send + Sync {
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), InteropError>;
    fn write(&self, address: usize, bytes: &[u8]) -> Result<(), InteropError>;
}

/// 可按固定宽度读写的字段类型
pub trait FieldValue: Copy {
    const SIZE: usize;

    fn decode(bytes: &[u8]) -> Self;
    fn encode(self) -> Vec<u8>;
}

macro_rules! impl_field_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_ne_bytes(raw)
                }

                fn encode(self) -> Vec<u8> {
                    self.to_ne_bytes().to_vec()
                }
            }
        )*
    };
}

impl_field_value!(u8, i8, i16, u16, i32, u32, i64, u64, f32, f64);

impl FieldValue for bool {
    const SIZE: usize = 1;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn encode(self) -> Vec<u8> {
        vec![u8::from(self)]
    }
}

/// 宿主对象视图：实例地址 + 类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectView {
    pub address: usize,
    pub class: ClassHandle,
    header_adjust: u32,
}

impl ObjectView {
    pub fn new(address: usize, class: ClassHandle) -> Self {
        ObjectView {
            address,
            class,
            header_adjust: 0,
        }
    }

    /// 内联存放的值类型：偏移需减去对象头大小
    pub fn embedded(address: usize, class: ClassHandle) -> Self {
        ObjectView {
            address,
            class,
            header_adjust: OBJECT_HEADER_SIZE,
        }
    }

    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// 字段的绝对地址；偏移未解析或地址为空时返回 None
    pub fn field_address(&self, resolver: &OffsetResolver, field: &str) -> Option<usize> {
        if self.is_null() {
            return None;
        }
        let offset = resolver.get_or_resolve(self.class, field);
        if offset == UNRESOLVED || offset < self.header_adjust {
            return None;
        }
        self.address
            .checked_add((offset - self.header_adjust) as usize)
    }

    /// 读取字段值
    pub fn read<T: FieldValue>(
        &self,
        resolver: &OffsetResolver,
        memory: &dyn HostMemory,
        field: &str,
    ) -> Option<T> {
        let address = self.field_address(resolver, field)?;
        let mut buf = vec![0u8; T::SIZE];
        match guarded("read", || memory.read(address, &mut buf)) {
            Ok(()) => Some(T::decode(&buf)),
            Err(err) => {
                tracing::debug!(target: "modkit::interop", %field, error = %err, "field read failed");
                None
            }
        }
    }

    /// 写入字段值，返回是否成功
    pub fn write<T: FieldValue>(
        &self,
        resolver: &OffsetResolver,
        memory: &dyn HostMemory,
        field: &str,
        value: T,
    ) -> bool {
        let Some(address) = self.field_address(resolver, field) else {
            return false;
        };
        let bytes = value.encode();
        match guarded("write", || memory.write(address, &bytes)) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(target: "modkit::interop", %field, error = %err, "field write failed");
                false
            }
        }
    }
}
