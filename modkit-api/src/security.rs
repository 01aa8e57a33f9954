//! 安全闸门
//!
//! 对组装后的完整文本做子串匹配，在词法分析之前执行。
//! 匹配是保守的：宁可误拦，不可漏拦。

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 被禁止的命名空间
pub const BLOCKED_NAMESPACES: &[&str] = &[
    "reflect.emit",
    "emit.",
    "ffi.",
    "interop.",
    "process.",
    "fs.",
    "net.",
    "socket.",
];

/// 被禁止的 API 调用
pub const BLOCKED_CALLS: &[&str] = &[
    "spawn(",
    "exec(",
    "load_library(",
    "load_module(",
    "dlopen(",
    "create_instance(",
    "invoke(",
    "new_domain(",
    "remove_file(",
    "remove_dir(",
    "remove_dir_all(",
    "exit(",
    "abort(",
    "kill(",
];

/// 不安全代码与指针语法标记
pub const UNSAFE_MARKERS: &[&str] = &["unsafe", "stackalloc", "*mut", "*const", "&raw", "asm!"];

/// 触发的规则类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SecurityRule {
    BlockedNamespace,
    BlockedCall,
    UnsafeCode,
}

impl SecurityRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityRule::BlockedNamespace => "blocked namespace",
            SecurityRule::BlockedCall => "blocked API call",
            SecurityRule::UnsafeCode => "unsafe code",
        }
    }
}

impl fmt::Display for SecurityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 安全违规
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("security violation ({rule}): '{pattern}' is not allowed")]
pub struct SecurityViolation {
    pub rule: SecurityRule,
    pub pattern: String,
}

/// 子串黑名单策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    namespaces: Vec<String>,
    calls: Vec<String>,
    markers: Vec<String>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        SecurityPolicy {
            namespaces: owned(BLOCKED_NAMESPACES),
            calls: owned(BLOCKED_CALLS),
            markers: owned(UNSAFE_MARKERS),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SecurityPolicy {
    /// 追加命名空间黑名单
    pub fn block_namespace(mut self, pattern: impl Into<String>) -> Self {
        self.namespaces.push(pattern.into());
        self
    }

    /// 追加 API 调用黑名单
    pub fn block_call(mut self, pattern: impl Into<String>) -> Self {
        self.calls.push(pattern.into());
        self
    }

    /// 依次检查命名空间、API 调用、不安全标记；返回第一个命中的规则
    pub fn check(&self, text: &str) -> Result<(), SecurityViolation> {
        let groups = [
            (SecurityRule::BlockedNamespace, &self.namespaces),
            (SecurityRule::BlockedCall, &self.calls),
            (SecurityRule::UnsafeCode, &self.markers),
        ];
        for (rule, patterns) in groups {
            if let Some(pattern) = patterns.iter().find(|p| text.contains(p.as_str())) {
                return Err(SecurityViolation {
                    rule,
                    pattern: pattern.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_passes() {
        let policy = SecurityPolicy::default();
        assert!(policy.check("import math; return math.sqrt(4);").is_ok());
    }

    #[test]
    fn test_each_rule_is_named() {
        let policy = SecurityPolicy::default();
        assert_eq!(
            policy.check("return fs.read(\"a\");").unwrap_err().rule,
            SecurityRule::BlockedNamespace
        );
        assert_eq!(
            policy.check("spawn(\"sh\")").unwrap_err(),
            SecurityViolation {
                rule: SecurityRule::BlockedCall,
                pattern: "spawn(".into()
            }
        );
        assert_eq!(
            policy.check("unsafe { }").unwrap_err().rule,
            SecurityRule::UnsafeCode
        );
    }

    #[test]
    fn test_namespace_checked_before_calls() {
        let err = SecurityPolicy::default()
            .check("process.exit(1)")
            .unwrap_err();
        assert_eq!(err.rule, SecurityRule::BlockedNamespace);
        assert_eq!(err.pattern, "process.");
    }

    #[test]
    fn test_conservative_over_blocking() {
        // 子串匹配会误拦包含黑名单片段的普通标识符
        let err = SecurityPolicy::default().check("return myexec(1);").unwrap_err();
        assert_eq!(err.pattern, "exec(");
    }

    #[test]
    fn test_custom_patterns() {
        let policy = SecurityPolicy::default().block_call("teleport(");
        assert!(policy.check("teleport(1)").is_err());
        assert_eq!(
            SecurityPolicy::default()
                .block_namespace("host.")
                .check("host.x")
                .unwrap_err()
                .to_string(),
            "security violation (blocked namespace): 'host.' is not allowed"
        );
    }
}
