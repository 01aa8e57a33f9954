//! 诊断条目定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 诊断严重级别
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Severity {
    /// 一般信息
    Info = 0,
    /// 警告
    Warning = 1,
    /// 错误
    Error = 2,
}

impl Severity {
    /// 将级别转换为字符串
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// 从u8解析级别
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Severity::Info),
            1 => Some(Severity::Warning),
            2 => Some(Severity::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 单条诊断记录
///
/// 创建后只有 `occurrence_count` 会在去重时原地递增。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// 上报者（已规范化，空值为 `"unknown"`）
    pub mod_id: String,
    pub message: String,
    pub severity: Severity,
    /// 首次出现时间
    pub timestamp: DateTime<Utc>,
    /// 连续重复次数，至少为 1
    pub occurrence_count: u32,
}

impl ErrorEntry {
    /// 创建新条目
    pub fn new(mod_id: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            mod_id: mod_id.into(),
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            occurrence_count: 1,
        }
    }

    /// 格式化为单行文本
    pub fn format(&self) -> String {
        let repeat = if self.occurrence_count > 1 {
            format!(" (x{})", self.occurrence_count)
        } else {
            String::new()
        };

        format!(
            "[{}] {} {}: {}{}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.severity,
            self.mod_id,
            self.message,
            repeat
        )
    }
}
