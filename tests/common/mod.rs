//! 测试辅助工具
//!
//! 提供端到端测试共用的宿主布局转储与内存替身

#![allow(dead_code)]

use modkit::interop::InteropError;
use modkit::{HostMemory, LayoutDump};
use std::sync::Mutex;

/// 宿主导出的类型布局
pub const GAME_DUMP: &str = r#"
// Namespace: Host
public class Object
{
    private IntPtr m_CachedPtr; // 0x10
}

// Namespace: Game
public class Entity : Object
{
    private int m_Health; // 0x18
    public float speed; // 0x1C
}

public sealed class Character : Entity
{
    public bool IsAlive; // 0x20
    private int <Level>k__BackingField; // 0x24
}
"#;

pub fn game_dump() -> LayoutDump {
    LayoutDump::parse(GAME_DUMP).unwrap()
}

/// 平坦的字节数组，地址即下标
pub struct FlatMemory {
    bytes: Mutex<Vec<u8>>,
}

impl FlatMemory {
    pub fn new(size: usize) -> Self {
        FlatMemory {
            bytes: Mutex::new(vec![0; size]),
        }
    }
}

impl HostMemory for FlatMemory {
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), InteropError> {
        let bytes = self.bytes.lock().unwrap();
        let src = bytes
            .get(address..address + buf.len())
            .ok_or_else(|| InteropError::Host(format!("read out of range at {address:#x}")))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&self, address: usize, data: &[u8]) -> Result<(), InteropError> {
        let mut bytes = self.bytes.lock().unwrap();
        let dst = bytes
            .get_mut(address..address + data.len())
            .ok_or_else(|| InteropError::Host(format!("write out of range at {address:#x}")))?;
        dst.copy_from_slice(data);
        Ok(())
    }
}
