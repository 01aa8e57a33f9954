//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。日志写到 stderr，stdout 只留给求值结果。

use modkit_config::{LogConfig, LogLevel, Phase};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    filter::Targets,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

pub fn to_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// 按阶段构建过滤规则
pub fn build_targets(log_config: &LogConfig) -> Targets {
    let global = to_level(log_config.global);
    [Phase::Lexer, Phase::Parser, Phase::Compiler, Phase::Vm]
        .into_iter()
        .fold(Targets::new().with_default(global), |targets, phase| {
            targets.with_target(phase.target(), to_level(log_config.level_for(phase)))
        })
        .with_target("modkit::cli", global)
}

/// 使用指定格式和日志配置初始化日志系统，可选同时追加到文件
pub fn init_with_file<P: AsRef<Path>>(
    log_config: &LogConfig,
    format: LogFormat,
    file: Option<P>,
) -> io::Result<()> {
    let targets = build_targets(log_config);

    let file_layer = match file {
        Some(path) => {
            let handle = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(create_format_layer(format, Mutex::new(handle)).with_filter(targets.clone()))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(create_format_layer(format, io::stderr).with_filter(targets))
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)
}

/// Create formatter layer based on format
fn create_format_layer<S, W>(format: LogFormat, make_writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}
