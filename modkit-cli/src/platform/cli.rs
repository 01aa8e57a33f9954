//! CLI 格式化输出
//!
//! 提供命令行友好的诊断显示和源码上下文打印。

use modkit_api::Diagnostic;

/// 错误行前后显示的上下文行数
const CONTEXT_LINES: usize = 2;

/// 打印诊断并显示源代码上下文
pub fn print_diagnostic(diagnostic: &Diagnostic, source: &str) {
    eprintln!("{diagnostic}");
    if let (Some(line), Some(column)) = (diagnostic.line, diagnostic.column) {
        print_source_context(source, line, column);
    }
}

/// 打印源代码上下文（显示错误行前后几行）
pub fn print_source_context(source: &str, error_line: usize, error_col: usize) {
    if let Some(rendered) = render_source_context(source, error_line, error_col) {
        eprint!("{rendered}");
    }
}

/// 渲染带行号和列标记的源码片段，行号越界时返回 None
pub fn render_source_context(source: &str, error_line: usize, error_col: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    if error_line == 0 || error_line > lines.len() {
        return None;
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(lines.len());
    let width = end_line.to_string().len();
    let separator = "-".repeat(width + 1);

    let mut out = format!("{separator}|--\n");
    for line_no in start_line..=end_line {
        out.push_str(&format!("{line_no:>width$} | {}\n", lines[line_no - 1]));
        if line_no == error_line {
            let marker = " ".repeat(error_col.saturating_sub(1));
            out.push_str(&format!("{} | {marker}^\n", " ".repeat(width)));
        }
    }
    out.push_str(&format!("{separator}|--\n"));
    Some(out)
}
