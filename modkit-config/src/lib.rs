//! Modkit Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Modkit crates.
//!
//! 所有结构都实现 `Default`，并可以从 JSON 反序列化；缺省字段使用默认值。

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// SDK 全部配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub diagnostics: DiagnosticsConfig,
    pub interop: InteropConfig,
    pub compiler: CompilerConfig,
    pub limits: LimitConfig,
    pub evaluator: EvaluatorConfig,
    pub log: LogConfig,
}

impl SdkConfig {
    /// 从 JSON 文本解析
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// 序列化为格式化 JSON
    pub fn to_json_pretty(&self) -> String {
        // 所有字段都是可序列化的普通数据
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// 诊断聚合器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// 每个 mod 保留的最大条目数
    pub per_mod_capacity: usize,
    /// 全局环形缓冲区容量
    pub global_capacity: usize,
    /// 速率限制
    pub rate_limit: RateLimitConfig,
}

/// 令牌桶配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 桶容量
    pub capacity: u32,
    /// 补满间隔（毫秒）
    pub refill_interval_ms: u64,
}

/// 宿主类型引用（module, namespace, name）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTypeRef {
    pub module: String,
    pub namespace: String,
    pub name: String,
}

/// 原生互操作配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteropConfig {
    /// 宿主对象基类
    pub base_type: HostTypeRef,
    /// 初始化时预解析的字段
    pub well_known_fields: Vec<String>,
    /// 祖先链遍历的最大深度
    pub max_hierarchy_depth: usize,
}

/// Configuration for compiler behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// 隐式导入的模块（白名单）
    pub implicit_imports: Vec<String>,
    /// 语法分析器是否接受 `unsafe { }` 块
    ///
    /// 只作用于语法分析这一层。`modkit-api` 的安全闸门在此之前按子串拦截 `unsafe`，
    /// 不受此开关影响；直接调用 `modkit_core::compile` 时才会看到区别。
    pub allow_unsafe: bool,
    /// 是否生成警告（未使用变量等）
    pub emit_warnings: bool,
    /// 框架模块名前缀，引用解析时过滤
    pub excluded_module_prefixes: Vec<String>,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum stack size
    pub max_stack_size: usize,
    /// Maximum call depth
    pub max_call_depth: usize,
    /// 最大执行指令数（None 表示不限制）
    pub max_instructions: Option<u64>,
    /// 执行超时（毫秒，None 表示不限制）
    pub timeout_ms: Option<u64>,
    /// 单个值的大小上限：字符串按字节，列表按元素个数
    pub max_value_len: usize,
}

/// 求值器配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// 历史记录上限（None 表示不限制）
    pub history_limit: Option<usize>,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// 全局默认日志级别
    pub global: LogLevel,
    /// Lexer 日志级别（None 表示使用 global）
    pub lexer: Option<LogLevel>,
    /// Parser 日志级别
    pub parser: Option<LogLevel>,
    /// Compiler 日志级别
    pub compiler: Option<LogLevel>,
    /// VM 日志级别
    pub vm: Option<LogLevel>,
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Lexer,
    Parser,
    Compiler,
    Vm,
}

impl Phase {
    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Parser => "parser",
            Phase::Compiler => "compiler",
            Phase::Vm => "vm",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("modkit::{}", self.as_str())
    }
}

impl LogConfig {
    /// 获取指定阶段的实际日志级别
    pub fn level_for(&self, phase: Phase) -> LogLevel {
        let specific = match phase {
            Phase::Lexer => self.lexer,
            Phase::Parser => self.parser,
            Phase::Compiler => self.compiler,
            Phase::Vm => self.vm,
        };
        specific.unwrap_or(self.global)
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            per_mod_capacity: 200,
            global_capacity: 1000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_interval_ms: 1000,
        }
    }
}

impl Default for HostTypeRef {
    fn default() -> Self {
        Self {
            module: "HostCore".to_string(),
            namespace: "Host".to_string(),
            name: "Object".to_string(),
        }
    }
}

impl Default for InteropConfig {
    fn default() -> Self {
        Self {
            base_type: HostTypeRef::default(),
            well_known_fields: vec!["CachedPtr".to_string(), "InstanceId".to_string()],
            max_hierarchy_depth: 32,
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            implicit_imports: vec!["std".to_string(), "math".to_string(), "text".to_string()],
            allow_unsafe: false,
            emit_warnings: true,
            excluded_module_prefixes: vec!["core".to_string(), "sys".to_string(), "__".to_string()],
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            max_call_depth: 64,
            max_instructions: Some(10_000_000),
            timeout_ms: Some(5_000),
            max_value_len: 1 << 20,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: LogLevel::Info,
            lexer: None,
            parser: None,
            compiler: None,
            vm: None,
        }
    }
}
