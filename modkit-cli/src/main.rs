//! Modkit CLI - Command line interface
//!
//! 宿主演示程序：求值与检查代码片段、交互式会话、按布局转储解析字段偏移。

use clap::{ArgAction, Parser, Subcommand};
use modkit_api::{Compiler, EvaluationResult, Evaluator};
use modkit_config::{LogLevel, SdkConfig};
use modkit_diag::Diagnostics;
use modkit_interop::{LayoutDump, NativeRuntime, OffsetResolver, UNRESOLVED};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

mod logging;
mod platform;

use crate::logging::{init_with_file, LogFormat};
use crate::platform::print_diagnostic;

#[derive(Debug, Parser)]
#[command(
    name = "modkit",
    about = "Modkit - sandboxed fragment evaluation for game mods",
    version
)]
struct Cli {
    /// SDK configuration file (JSON)
    #[arg(long, value_name = "JSON", global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    /// Also append logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Raise the global log level (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile and run a fragment, printing its value
    Eval {
        text: String,
        /// Print the generated bytecode before running
        #[arg(long)]
        dump_bytecode: bool,
    },
    /// Compile a fragment without running it
    Check {
        text: String,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive evaluation session
    Repl,
    /// Resolve field offsets from a host layout dump
    Offsets {
        dump: PathBuf,
        /// Class name, optionally namespace-qualified (Game.Character)
        class: String,
        #[arg(required = true)]
        fields: Vec<String>,
        /// Print offsets as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.verbose) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = init_with_file(&config.log, cli.log_format, cli.log_file.as_ref()) {
        eprintln!("Error: cannot initialize logging: {e}");
        process::exit(1);
    }

    match run(cli.command, &config) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// 读取配置文件（缺省使用默认配置），再叠加 `-v` 的日志级别
fn load_config(path: Option<&Path>, verbose: u8) -> Result<SdkConfig, String> {
    let mut config = match path {
        Some(path) => SdkConfig::load(path).map_err(|e| e.to_string())?,
        None => SdkConfig::default(),
    };
    match verbose {
        0 => {}
        1 => config.log.global = LogLevel::Debug,
        _ => config.log.global = LogLevel::Trace,
    }
    Ok(config)
}

/// 执行子命令，返回是否成功
fn run(command: Command, config: &SdkConfig) -> Result<bool, String> {
    let diagnostics = Diagnostics::new(config.diagnostics.clone());
    tracing::debug!(target: "modkit::cli", ?command, "dispatching");

    match command {
        Command::Eval {
            text,
            dump_bytecode,
        } => {
            let mut evaluator = Evaluator::from_config(config).with_diagnostics(diagnostics);
            if dump_bytecode {
                let compiled = evaluator.compiler().compile(&text);
                if let Some(unit) = &compiled.unit {
                    print!("{}", unit.unit().disassemble());
                }
            }
            Ok(print_evaluation(&evaluator.evaluate(&text)))
        }
        Command::Check { text, json } => {
            let compiler = Compiler::new(config.compiler.clone()).with_diagnostics(diagnostics);
            Ok(handle_check(&compiler, &text, json))
        }
        Command::Repl => {
            let mut evaluator = Evaluator::from_config(config).with_diagnostics(diagnostics);
            handle_repl(&mut evaluator).map_err(|e| e.to_string())?;
            Ok(true)
        }
        Command::Offsets {
            dump,
            class,
            fields,
            json,
        } => handle_offsets(config, diagnostics, &dump, &class, &fields, json),
        Command::Config => {
            println!("{}", config.to_json_pretty());
            Ok(true)
        }
    }
}

fn print_evaluation(result: &EvaluationResult) -> bool {
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    if result.success {
        println!("{}", result.display);
    } else {
        eprintln!("{}", result.display);
    }
    result.success
}

fn handle_check(compiler: &Compiler, text: &str, as_json: bool) -> bool {
    let result = compiler.compile(text);

    if as_json {
        let output = json!({
            "success": result.success,
            "name": result.generated_name,
            "errors": result.errors,
            "warnings": result.warnings,
        });
        println!("{output:#}");
    } else {
        for diagnostic in result.warnings.iter().chain(result.errors.iter()) {
            print_diagnostic(diagnostic, text);
        }
        if result.success {
            println!("ok ({})", result.generated_name);
        }
    }
    result.success
}

fn handle_repl(evaluator: &mut Evaluator) -> io::Result<()> {
    println!("modkit repl (:history, :clear, :quit)");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":clear" => evaluator.clear_history(),
            ":history" => {
                for (index, record) in evaluator.history().iter().enumerate() {
                    println!("{:>3}  {} => {}", index + 1, record.input, record.result.display);
                }
            }
            input => {
                print_evaluation(&evaluator.evaluate(input));
            }
        }
    }
    Ok(())
}

fn handle_offsets(
    config: &SdkConfig,
    diagnostics: Arc<Diagnostics>,
    dump_path: &Path,
    class: &str,
    fields: &[String],
    as_json: bool,
) -> Result<bool, String> {
    let dump = LayoutDump::load(dump_path).map_err(|e| e.to_string())?;
    tracing::info!(target: "modkit::cli", classes = dump.len(), "layout dump loaded");

    let runtime: Arc<dyn NativeRuntime> = Arc::new(dump);
    let resolver = OffsetResolver::new(runtime, diagnostics, config.interop.clone());
    let (namespace, name) = split_class_name(class);
    let handle = resolver.resolve_class("", namespace, name);
    if !handle.is_valid() {
        return Err(format!("class '{class}' not found in {}", dump_path.display()));
    }

    let offsets: Vec<(&str, u32)> = fields
        .iter()
        .map(|field| (field.as_str(), resolver.get_or_resolve(handle, field)))
        .collect();

    if as_json {
        let entries: serde_json::Map<String, serde_json::Value> = offsets
            .iter()
            .map(|(field, offset)| (field.to_string(), json!(offset)))
            .collect();
        println!("{:#}", json!({ "class": class, "offsets": entries }));
    } else {
        let width = fields.iter().map(String::len).max().unwrap_or(0);
        for (field, offset) in &offsets {
            if *offset == UNRESOLVED {
                println!("{field:<width$}  unresolved");
            } else {
                println!("{field:<width$}  0x{offset:X}");
            }
        }
    }
    Ok(offsets.iter().all(|(_, offset)| *offset != UNRESOLVED))
}

/// `Game.Character` -> ("Game", "Character")；无命名空间时为空串
fn split_class_name(class: &str) -> (&str, &str) {
    class.rsplit_once('.').unwrap_or(("", class))
}
