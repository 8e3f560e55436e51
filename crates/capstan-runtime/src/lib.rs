//! Evaluator for the Capstan capability machine.
//!
//! The machine executes a validated [`capstan_ir::Program`] tree:
//! unforgeable capabilities, seal-based encapsulation, bounds-checked
//! records and vectors, first-class procedures, and scoped lifetimes.
//! Execution is single-threaded and strictly sequential; the kernel
//! drives guest code from an explicit control stack, so guest recursion
//! depth is independent of the native stack.
//!
//! ```
//! use capstan_ir::builders::*;
//!
//! let program = program(vec![ret(constant(42))], vec![]);
//! let result = capstan_runtime::evaluate(&program).unwrap();
//! assert_eq!(result, capstan_runtime::Value::Word(42));
//! ```

mod context;
mod heap;
mod kernel;
mod sealing;
mod value;

pub use kernel::Machine;
pub use value::{Capability, ObjectId, ProcId, SealId, Sealed, Target, Value};

use capstan_ir::{Program, Word};

/// Evaluates a program's top-level block to its return value.
pub fn evaluate(program: &Program) -> Result<Value, EvalError> {
    Machine::new(program).run()
}

/// A trap. Every variant is fatal to the run: the machine aborts, nothing
/// is retried, and presentation is the driver's responsibility.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Wrong-seal unseal, access through a revoked or null capability,
    /// resealing under a mismatched seal, or reading an unset field.
    #[error("capability violation in {operation}: {detail}")]
    CapabilityViolation {
        operation: &'static str,
        detail: String,
    },

    /// Vector index or record field name outside the declared shape.
    #[error("bounds violation in {operation}: {detail}")]
    BoundsViolation {
        operation: &'static str,
        detail: String,
    },

    /// Overflow on checked `compute`.
    #[error("arithmetic overflow computing {lhs} {op} {rhs}")]
    Arithmetic {
        op: &'static str,
        lhs: Word,
        rhs: Word,
    },

    /// Reference to a name never bound in the active frame.
    #[error("unbound name {name} in {operation}")]
    UnboundName {
        operation: &'static str,
        name: String,
    },

    /// Sealed/unsealed mismatch at a call boundary, or a wrong value
    /// kind for an operation or slot.
    #[error("type mismatch in {operation}: {detail}")]
    TypeMismatch {
        operation: &'static str,
        detail: String,
    },

    /// A body exhausted its statements without `return`. Validation
    /// rejects such trees statically; the machine still refuses to run
    /// past the boundary.
    #[error("{procedure} completed without returning")]
    MissingReturn { procedure: String },
}
