//! Modkit Core - Fragment language (pure logic, no IO)
//!
//! Contains lexer, parser, bytecode compiler and virtual machine.
//! Only operates on in-memory data structures, no file IO or terminal output.
//!
//! Configuration is passed explicitly via parameters, not via global state.
//!
//! ```
//! use modkit_core::{compile, CompileOptions, ModuleRegistry, Value, VM};
//!
//! let output = compile("import math; return math.max(2, 5) * 2;", &ModuleRegistry::with_prelude(), &CompileOptions::default(), false).unwrap();
//! let result = VM::default().run_script(&output.unit).unwrap();
//! assert_eq!(result, Value::Int(10));
//! ```

pub mod compiler;
pub mod runtime;

use thiserror::Error;

pub use compiler::lexer::{Coordinate, LexError};
pub use compiler::parser::{ParserError, ParserErrorKind, Program};
pub use runtime::{
    compile_program, Arity, CompileError, CompileErrorKind, CompileFailure, CompileOptions,
    CompileOutput, CompileWarning, ExecutionLimits, InterruptHandle, ModuleRegistry, NativeFunction,
    NativeModule, RuntimeError, RuntimeErrorKind, Unit, Value, VM,
};

// Re-export config types from modkit-config
pub use modkit_config::{CompilerConfig, LimitConfig, Phase};

/// 源码到字节码的失败
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("{0}")]
    Parse(#[from] ParserError),

    #[error("{0}")]
    Compile(#[from] CompileFailure),
}

/// 解析并编译源码
pub fn compile(
    source: &str,
    registry: &ModuleRegistry,
    options: &CompileOptions,
    allow_unsafe: bool,
) -> Result<CompileOutput, BuildError> {
    let program = compiler::parser::parse_source(source, allow_unsafe)?;
    compile_program(&program, registry, options).map_err(BuildError::Compile)
}
