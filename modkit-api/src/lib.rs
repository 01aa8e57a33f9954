//! Modkit API - Sandboxed fragment compilation and evaluation
//!
//! Provides:
//! - Fragment mode detection and assembly into a generated module
//! - A substring security gate applied before any compilation
//! - Structured compilation results (`CompilationResult`, `Diagnostic`)
//! - A session evaluator with history
//!
//! ```
//! use modkit_api::{Compiler, Evaluator};
//! use std::sync::Arc;
//!
//! let mut evaluator = Evaluator::new(Arc::new(Compiler::default()));
//! let result = evaluator.evaluate("1 + 2");
//! assert_eq!(result.display, "3");
//! assert_eq!(evaluator.history().len(), 1);
//! ```

pub mod compiler;
pub mod diagnostic;
pub mod evaluator;
pub mod fragment;
pub mod outcome;
pub mod references;
pub mod result;
pub mod security;

pub use compiler::{Compiler, COMPILER_MOD};
pub use diagnostic::{Diagnostic, DiagnosticCategory, DiagnosticSeverity};
pub use evaluator::{Evaluator, EVALUATOR_MOD};
pub use fragment::{assemble, AssembledSource, FragmentMode, ENTRY_FUNCTION, FRAGMENT_PREFIX};
pub use outcome::{FailureReason, Outcome};
pub use references::{HostReferences, ReferenceProvider};
pub use result::{display_value, CompilationResult, EvaluationRecord, EvaluationResult, LoadedUnit};
pub use security::{SecurityPolicy, SecurityRule, SecurityViolation};

// Re-export core types
pub use modkit_core::{ExecutionLimits, InterruptHandle, Value, VM};
