//! 终端输出适配

pub mod cli;

pub use cli::print_diagnostic;
