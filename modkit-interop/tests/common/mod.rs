//! 测试用宿主运行时与内存替身

#![allow(dead_code)]

use modkit_interop::{ClassHandle, FieldHandle, HostMemory, InteropError, NativeRuntime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// 字段偏移查询的失败方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    Error,
    Panic,
}

#[derive(Default)]
struct FakeClass {
    name: String,
    parent: usize,
    fields: Vec<(String, usize)>,
}

/// 内存中的宿主类型系统
///
/// 类型句柄为类下标 + 1，字段句柄为全局字段编号。
#[derive(Default)]
pub struct FakeRuntime {
    classes: Vec<FakeClass>,
    offsets: HashMap<usize, Result<u32, Failure>>,
    next_field: usize,
    pub class_field_calls: AtomicUsize,
    pub field_offset_calls: AtomicUsize,
    pub lookups: Mutex<Vec<(usize, String)>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加类型，parent 为 NULL 表示根类型
    pub fn add_class(&mut self, name: &str, parent: ClassHandle) -> ClassHandle {
        self.classes.push(FakeClass {
            name: name.to_string(),
            parent: parent.raw(),
            fields: Vec::new(),
        });
        ClassHandle::from_raw(self.classes.len())
    }

    pub fn set_parent(&mut self, class: ClassHandle, parent: ClassHandle) {
        self.classes[class.raw() - 1].parent = parent.raw();
    }

    pub fn add_field(&mut self, class: ClassHandle, name: &str, offset: u32) -> FieldHandle {
        self.add_field_with(class, name, Ok(offset))
    }

    pub fn add_failing_field(&mut self, class: ClassHandle, name: &str, failure: Failure) -> FieldHandle {
        self.add_field_with(class, name, Err(failure))
    }

    fn add_field_with(&mut self, class: ClassHandle, name: &str, offset: Result<u32, Failure>) -> FieldHandle {
        self.next_field += 1;
        let id = self.next_field;
        self.classes[class.raw() - 1].fields.push((name.to_string(), id));
        self.offsets.insert(id, offset);
        FieldHandle::from_raw(id)
    }

    pub fn total_calls(&self) -> usize {
        self.class_field_calls.load(Ordering::SeqCst) + self.field_offset_calls.load(Ordering::SeqCst)
    }

    pub fn looked_up(&self) -> Vec<(usize, String)> {
        self.lookups.lock().unwrap().clone()
    }
}

impl NativeRuntime for FakeRuntime {
    fn resolve_class(&self, _module: &str, _namespace: &str, name: &str) -> Result<ClassHandle, InteropError> {
        Ok(self
            .classes
            .iter()
            .position(|c| c.name == name)
            .map(|i| ClassHandle::from_raw(i + 1))
            .unwrap_or(ClassHandle::NULL))
    }

    fn class_field(&self, class: ClassHandle, name: &str) -> Result<FieldHandle, InteropError> {
        self.class_field_calls.fetch_add(1, Ordering::SeqCst);
        self.lookups.lock().unwrap().push((class.raw(), name.to_string()));
        let declared = self
            .classes
            .get(class.raw().wrapping_sub(1))
            .ok_or_else(|| InteropError::Host("no such class".into()))?;
        Ok(declared
            .fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, id)| FieldHandle::from_raw(*id))
            .unwrap_or(FieldHandle::NULL))
    }

    fn parent_class(&self, class: ClassHandle) -> Result<ClassHandle, InteropError> {
        let declared = self
            .classes
            .get(class.raw().wrapping_sub(1))
            .ok_or_else(|| InteropError::Host("no such class".into()))?;
        Ok(ClassHandle::from_raw(declared.parent))
    }

    fn field_offset(&self, field: FieldHandle) -> Result<u32, InteropError> {
        self.field_offset_calls.fetch_add(1, Ordering::SeqCst);
        match self.offsets.get(&field.raw()) {
            Some(Ok(offset)) => Ok(*offset),
            Some(Err(Failure::Error)) => Err(InteropError::Host("metadata unavailable".into())),
            Some(Err(Failure::Panic)) => panic!("native crash while reading offset"),
            None => Err(InteropError::Host("no such field".into())),
        }
    }
}

/// 以字节为单位的稀疏内存
#[derive(Default)]
pub struct FakeMemory {
    bytes: Mutex<HashMap<usize, u8>>,
}

impl FakeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poke(&self, address: usize, data: &[u8]) {
        let mut bytes = self.bytes.lock().unwrap();
        for (i, b) in data.iter().enumerate() {
            bytes.insert(address + i, *b);
        }
    }

    pub fn peek(&self, address: usize, len: usize) -> Vec<u8> {
        let bytes = self.bytes.lock().unwrap();
        (0..len).map(|i| bytes.get(&(address + i)).copied().unwrap_or(0)).collect()
    }
}

impl HostMemory for FakeMemory {
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), InteropError> {
        let data = self.peek(address, buf.len());
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write(&self, address: usize, data: &[u8]) -> Result<(), InteropError> {
        self.poke(address, data);
        Ok(())
    }
}
