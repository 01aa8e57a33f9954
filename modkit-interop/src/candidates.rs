//! 字段候选名生成器
//!
//! 不同宿主版本对同一逻辑字段使用不同的命名习惯。这里按固定优先级列出所有生成器，
//! 解析器依次尝试，第一个命中的候选获胜。

/// 候选名生成器：输入逻辑字段名，返回候选名（不适用时返回 None）
pub type CandidateGenerator = fn(&str) -> Option<String>;

/// 按优先级排列的生成器
pub const CANDIDATE_GENERATORS: &[(&str, CandidateGenerator)] = &[
    ("exact", exact),
    ("underscore", underscore),
    ("member", member),
    ("lower", lower),
    ("lower-underscore", lower_underscore),
    ("lower-member", lower_member),
    ("backing-field", backing_field),
];

fn exact(name: &str) -> Option<String> {
    Some(name.to_string())
}

fn underscore(name: &str) -> Option<String> {
    Some(format!("_{name}"))
}

fn member(name: &str) -> Option<String> {
    Some(format!("m_{name}"))
}

fn lower(name: &str) -> Option<String> {
    Some(lower_first(name))
}

fn lower_underscore(name: &str) -> Option<String> {
    Some(format!("_{}", lower_first(name)))
}

fn lower_member(name: &str) -> Option<String> {
    Some(format!("m_{}", lower_first(name)))
}

/// 自动属性的编译器生成字段
fn backing_field(name: &str) -> Option<String> {
    Some(format!("<{name}>k__BackingField"))
}

/// 首字母小写
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 按优先级生成所有候选名，重复的只保留第一次出现
pub fn candidate_names(field: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(CANDIDATE_GENERATORS.len());
    for (_, generate) in CANDIDATE_GENERATORS {
        if let Some(candidate) = generate(field) {
            if !names.contains(&candidate) {
                names.push(candidate);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order() {
        assert_eq!(
            candidate_names("Health"),
            vec![
                "Health",
                "_Health",
                "m_Health",
                "health",
                "_health",
                "m_health",
                "<Health>k__BackingField",
            ]
        );
    }

    #[test]
    fn test_lowercase_name_skips_duplicates() {
        assert_eq!(
            candidate_names("health"),
            vec!["health", "_health", "m_health", "<health>k__BackingField"]
        );
    }

    #[test]
    fn test_lower_first() {
        assert_eq!(lower_first("InstanceId"), "instanceId");
        assert_eq!(lower_first(""), "");
        assert_eq!(lower_first("Ärger"), "ärger");
    }
}
