//! 宿主类型布局转储
//!
//! 解析宿主导出的文本类型转储：
//!
//! ```text
//! // Namespace: Game
//! public class Character : Entity
//! {
//!     public int Health; // 0x18
//!     private string m_Name; // 0x20
//! }
//! ```
//!
//! 解析结果实现 [`NativeRuntime`]，可以离线解析偏移，也可以作为测试替身。

use crate::handle::{ClassHandle, FieldHandle};
use crate::runtime::{InteropError, NativeRuntime};
use std::path::Path;
use thiserror::Error;

/// 转储解析错误
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to read dump '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid field offset '{text}'")]
    InvalidOffset { line: usize, text: String },
}

/// 实例字段
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpField {
    pub name: String,
    pub type_name: String,
    pub offset: u32,
}

/// 类型定义
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpClass {
    pub namespace: String,
    pub name: String,
    pub base: Option<String>,
    pub fields: Vec<DumpField>,
}

impl DumpClass {
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "enum", "interface"];
const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "abstract", "sealed", "static", "readonly",
    "volatile", "const", "unsafe", "new",
];

/// 解析后的布局转储
#[derive(Clone, Debug, Default)]
pub struct LayoutDump {
    classes: Vec<DumpClass>,
    /// 字段句柄 - 1 -> (类下标, 字段下标)
    field_slots: Vec<(usize, usize)>,
}

impl LayoutDump {
    /// 从文本解析
    pub fn parse(text: &str) -> Result<Self, DumpError> {
        let mut classes = Vec::new();
        let mut namespace = String::new();
        let mut current: Option<DumpClass> = None;
        let mut depth: i32 = 0;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();

            if depth == 0 {
                if let Some(rest) = line.strip_prefix("// Namespace:") {
                    namespace = rest.trim().to_string();
                    continue;
                }
                if current.is_none() {
                    current = parse_type_header(line, &namespace);
                }
            } else if depth == 1 {
                if let Some(class) = current.as_mut() {
                    if let Some(field) = parse_field(line, index + 1)? {
                        class.fields.push(field);
                    }
                }
            }

            let opened = line.matches('{').count() as i32;
            let closed = line.matches('}').count() as i32;
            let was_open = depth > 0 || opened > 0;
            depth = (depth + opened - closed).max(0);

            if depth == 0 && was_open {
                if let Some(class) = current.take() {
                    classes.push(class);
                }
            }
        }
        if let Some(class) = current.take() {
            classes.push(class);
        }

        Ok(Self::from_classes(classes))
    }

    /// 从文件读取并解析
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DumpError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn from_classes(classes: Vec<DumpClass>) -> Self {
        let field_slots = classes
            .iter()
            .enumerate()
            .flat_map(|(ci, class)| (0..class.fields.len()).map(move |fi| (ci, fi)))
            .collect();
        LayoutDump {
            classes,
            field_slots,
        }
    }

    pub fn classes(&self) -> &[DumpClass] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// 按名称查找类型；命名空间为空时匹配任意命名空间中的第一个
    pub fn find_class(&self, namespace: &str, name: &str) -> ClassHandle {
        self.classes
            .iter()
            .position(|c| c.name == name && (namespace.is_empty() || c.namespace == namespace))
            .map(|index| ClassHandle::from_raw(index + 1))
            .unwrap_or(ClassHandle::NULL)
    }

    pub fn class(&self, handle: ClassHandle) -> Option<&DumpClass> {
        handle
            .raw()
            .checked_sub(1)
            .and_then(|index| self.classes.get(index))
    }

    fn class_or_err(&self, handle: ClassHandle) -> Result<&DumpClass, InteropError> {
        self.class(handle)
            .ok_or_else(|| InteropError::Host(format!("unknown class handle {handle:?}")))
    }
}

impl NativeRuntime for LayoutDump {
    fn resolve_class(
        &self,
        _module: &str,
        namespace: &str,
        name: &str,
    ) -> Result<ClassHandle, InteropError> {
        Ok(self.find_class(namespace, name))
    }

    fn class_field(&self, class: ClassHandle, name: &str) -> Result<FieldHandle, InteropError> {
        let declared = self.class_or_err(class)?;
        let owner = class.raw() - 1;
        let Some(field_index) = declared.fields.iter().position(|f| f.name == name) else {
            return Ok(FieldHandle::NULL);
        };
        Ok(self
            .field_slots
            .iter()
            .position(|slot| *slot == (owner, field_index))
            .map(|slot| FieldHandle::from_raw(slot + 1))
            .unwrap_or(FieldHandle::NULL))
    }

    fn parent_class(&self, class: ClassHandle) -> Result<ClassHandle, InteropError> {
        let declared = self.class_or_err(class)?;
        Ok(match &declared.base {
            Some(base) => {
                let local = self.find_class(&declared.namespace, base);
                if local.is_valid() {
                    local
                } else {
                    self.find_class("", base)
                }
            }
            None => ClassHandle::NULL,
        })
    }

    fn field_offset(&self, field: FieldHandle) -> Result<u32, InteropError> {
        field
            .raw()
            .checked_sub(1)
            .and_then(|slot| self.field_slots.get(slot))
            .map(|&(ci, fi)| self.classes[ci].fields[fi].offset)
            .ok_or_else(|| InteropError::Host(format!("unknown field handle {field:?}")))
    }
}

/// `public sealed class Name<T> : Base, IFace {` -> DumpClass
fn parse_type_header(line: &str, namespace: &str) -> Option<DumpClass> {
    let (head, base_part) = match line.split_once(':') {
        Some((head, rest)) => (head, Some(rest)),
        None => (line, None),
    };
    let mut tokens = head
        .split_whitespace()
        .skip_while(|token| MODIFIERS.contains(token));
    let keyword = tokens.next()?;
    if !TYPE_KEYWORDS.contains(&keyword) {
        return None;
    }
    let name = strip_generics(tokens.next()?.trim_end_matches('{'));
    if name.is_empty() {
        return None;
    }

    let base = base_part
        .and_then(|rest| rest.split(',').next())
        .map(|base| strip_generics(base.trim().trim_end_matches('{').trim()))
        .filter(|base| !base.is_empty());

    Some(DumpClass {
        namespace: namespace.to_string(),
        name,
        base,
        fields: Vec::new(),
    })
}

/// `public int Health; // 0x18` -> DumpField；静态字段和非字段行返回 None
fn parse_field(line: &str, line_no: usize) -> Result<Option<DumpField>, DumpError> {
    let Some((decl, comment)) = line.split_once("//") else {
        return Ok(None);
    };
    let Some(decl) = decl.trim().strip_suffix(';') else {
        return Ok(None);
    };
    let Some(hex) = comment.trim().strip_prefix("0x") else {
        return Ok(None);
    };
    let hex = hex.split_whitespace().next().unwrap_or_default();
    let offset = u32::from_str_radix(hex, 16).map_err(|_| DumpError::InvalidOffset {
        line: line_no,
        text: hex.to_string(),
    })?;

    let tokens: Vec<&str> = decl.split_whitespace().collect();
    if tokens.iter().any(|t| *t == "static" || *t == "const") || decl.contains('(') {
        return Ok(None);
    }
    let declared: Vec<&str> = tokens
        .into_iter()
        .skip_while(|token| MODIFIERS.contains(token))
        .collect();
    let Some((name, type_tokens)) = declared.split_last() else {
        return Ok(None);
    };
    if type_tokens.is_empty() {
        return Ok(None);
    }

    Ok(Some(DumpField {
        name: name.to_string(),
        type_name: type_tokens.join(" "),
        offset,
    }))
}

fn strip_generics(name: &str) -> String {
    name.split('<').next().unwrap_or_default().trim().to_string()
}
