//! 片段模式检测与组装

use std::fmt;

/// 生成的入口函数名
pub const ENTRY_FUNCTION: &str = "run";
/// 生成模块名前缀
pub const FRAGMENT_PREFIX: &str = "__fragment_";

const EXPRESSION_PREFIX: &str = "return ";

/// 片段模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMode {
    /// 单个表达式，作为返回值
    Expression,
    /// 语句序列，原样使用
    Statements,
}

impl FragmentMode {
    /// 自动检测：含花括号、多于一个分号、或以分号结尾且不以 `return` 开头时为语句
    pub fn detect(text: &str) -> FragmentMode {
        let text = text.trim();
        if text.contains('{') || text.contains('}') {
            return FragmentMode::Statements;
        }
        if text.matches(';').count() > 1 {
            return FragmentMode::Statements;
        }
        if text.ends_with(';') && !starts_with_return(text) {
            return FragmentMode::Statements;
        }
        FragmentMode::Expression
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentMode::Expression => "expression",
            FragmentMode::Statements => "statements",
        }
    }
}

impl fmt::Display for FragmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn starts_with_return(text: &str) -> bool {
    match text.strip_prefix("return") {
        Some(rest) => !rest.starts_with(is_ident_char),
        None => false,
    }
}

/// 文本中是否出现独立的 `return` 关键字
fn mentions_return(text: &str) -> bool {
    text.split(|ch: char| !is_ident_char(ch))
        .any(|word| word == "return")
}

/// 组装后的源码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledSource {
    /// 模块名（`__fragment_<n>`）
    pub module: String,
    pub text: String,
    pub mode: FragmentMode,
    /// 片段第一行之前的行数
    pub line_offset: usize,
    /// 片段第一行前插入的字符数
    pub column_offset: usize,
    /// 用户输入的行数
    pub user_lines: usize,
    /// 用户最后一行末尾之后的列
    pub end_column: usize,
}

impl AssembledSource {
    /// 将组装文本中的坐标映射回用户输入
    ///
    /// 落在生成的收尾部分（补充的 `return null;`、闭合花括号）的坐标
    /// 归到用户输入的末尾。
    pub fn map_position(&self, line: usize, column: usize) -> (usize, usize) {
        if line <= self.line_offset {
            return (1, 1);
        }
        let line = line - self.line_offset;
        if line > self.user_lines {
            return (self.user_lines, self.end_column);
        }
        let column = if line == 1 {
            column.saturating_sub(self.column_offset).max(1)
        } else {
            column
        };
        if line == self.user_lines {
            (line, column.min(self.end_column))
        } else {
            (line, column)
        }
    }

    /// 行号映射（运行时错误只有行号）
    pub fn map_line(&self, line: usize) -> usize {
        line.saturating_sub(self.line_offset).clamp(1, self.user_lines)
    }
}

/// 按模式生成函数体
pub fn fragment_body(text: &str, mode: FragmentMode) -> (String, usize) {
    let text = text.trim();
    match mode {
        FragmentMode::Expression => {
            let (expr, leading) = match text.strip_prefix("return") {
                Some(rest) if starts_with_return(text) => {
                    let rest = rest.trim_start();
                    (rest, text.len() - rest.len())
                }
                _ => (text, 0),
            };
            let expr = expr.strip_suffix(';').unwrap_or(expr).trim_end();
            if expr.is_empty() {
                ("return null;".to_string(), 0)
            } else {
                let column_offset = EXPRESSION_PREFIX.len().saturating_sub(leading);
                (format!("{EXPRESSION_PREFIX}{expr};"), column_offset)
            }
        }
        FragmentMode::Statements => {
            if mentions_return(text) {
                (text.to_string(), 0)
            } else {
                (format!("{text}\nreturn null;"), 0)
            }
        }
    }
}

/// 组装完整源码：隐式导入 + 生成模块 + 入口函数
pub fn assemble(module: &str, imports: &[String], text: &str, mode: FragmentMode) -> AssembledSource {
    let (body, column_offset) = fragment_body(text, mode);
    let mut source = String::with_capacity(body.len() + 64 + imports.len() * 16);
    for import in imports {
        source.push_str("import ");
        source.push_str(import);
        source.push_str(";\n");
    }
    source.push_str("module ");
    source.push_str(module);
    source.push_str(" {\nfn ");
    source.push_str(ENTRY_FUNCTION);
    source.push_str("() {\n");
    source.push_str(&body);
    source.push_str("\n}\n}\n");

    AssembledSource {
        module: module.to_string(),
        text: source,
        mode,
        line_offset: imports.len() + 2,
        column_offset,
        user_lines: text.lines().count().max(1),
        end_column: text.lines().last().map_or(0, |line| line.chars().count()) + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_expression() {
        assert_eq!(FragmentMode::detect("1 + 2"), FragmentMode::Expression);
        assert_eq!(FragmentMode::detect("return 1 + 2;"), FragmentMode::Expression);
        assert_eq!(FragmentMode::detect("  \"hello\"  "), FragmentMode::Expression);
    }

    #[test]
    fn test_detect_statements() {
        assert_eq!(FragmentMode::detect("var x = 1;"), FragmentMode::Statements);
        assert_eq!(FragmentMode::detect("{{{"), FragmentMode::Statements);
        assert_eq!(FragmentMode::detect("var a = 1; return a"), FragmentMode::Expression);
        assert_eq!(FragmentMode::detect("var a = 1; return a;"), FragmentMode::Statements);
        // returnValue 不是 return 关键字
        assert_eq!(FragmentMode::detect("returnValue;"), FragmentMode::Statements);
    }

    #[test]
    fn test_expression_body() {
        assert_eq!(fragment_body("1 + 2", FragmentMode::Expression), ("return 1 + 2;".into(), 7));
        assert_eq!(fragment_body("return 1 + 2;", FragmentMode::Expression), ("return 1 + 2;".into(), 0));
        assert_eq!(fragment_body("return;", FragmentMode::Expression).0, "return null;");
    }

    #[test]
    fn test_statements_body() {
        assert_eq!(
            fragment_body("var x = 1;", FragmentMode::Statements).0,
            "var x = 1;\nreturn null;"
        );
        assert_eq!(
            fragment_body("var x = 1; return x;", FragmentMode::Statements).0,
            "var x = 1; return x;"
        );
    }

    #[test]
    fn test_assemble_layout() {
        let imports = vec!["std".to_string(), "math".to_string()];
        let assembled = assemble("__fragment_1", &imports, "1 + 2", FragmentMode::Expression);
        assert_eq!(
            assembled.text,
            "import std;\nimport math;\nmodule __fragment_1 {\nfn run() {\nreturn 1 + 2;\n}\n}\n"
        );
        assert_eq!(assembled.line_offset, 4);
        assert_eq!(assembled.map_position(5, 12), (1, 5));
        assert_eq!(assembled.map_line(6), 1);
    }

    #[test]
    fn test_positions_past_user_input_clamp_to_end() {
        let assembled = assemble("__fragment_2", &[], "{{{", FragmentMode::Statements);
        assert_eq!(assembled.user_lines, 1);
        // 文件结尾位于生成的闭合花括号之后
        assert_eq!(assembled.map_position(5, 1), (1, 4));
        assert_eq!(assembled.map_position(3, 9), (1, 4));
        assert_eq!(assembled.map_line(5), 1);

        let multi = assemble("__fragment_3", &[], "var a = 1;
var b = (;", FragmentMode::Statements);
        assert_eq!(multi.map_position(4, 3), (2, 3));
        assert_eq!(multi.map_position(5, 1), (2, 11));
        assert_eq!(multi.map_line(3), 1);
    }
}
