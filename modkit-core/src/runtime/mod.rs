//! 运行时：值、字节码、编译器、虚拟机与原生模块

pub mod bytecode;
pub mod compiler;
pub mod stdlib;
pub mod value;
pub mod vm;

pub use compiler::{
    compile_program, CompileError, CompileErrorKind, CompileFailure, CompileOptions, CompileOutput,
    CompileWarning, Unit, UnitModule,
};
pub use stdlib::{Arity, ModuleRegistry, NativeFunction, NativeModule};
pub use value::Value;
pub use vm::{ExecutionLimits, InterruptHandle, RuntimeError, RuntimeErrorKind, VM};
