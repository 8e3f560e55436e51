//! S-expression IR types and validation for the Capstan capability
//! machine.
//!
//! The IR is the boundary between front-ends and the evaluator: a
//! front-end produces a validated [`Program`] tree; `capstan-runtime`
//! consumes it. Textual parsing lives outside this workspace.

pub mod builders;
mod schema;
pub mod validation;

#[cfg(test)]
mod tests;

pub use schema::{
    BinaryOp, Condition, DataType, FieldSpec, Name, Operand, Parameter, Procedure, Program,
    RelationOp, Statement, Test, Word,
};
pub use validation::{ValidationError, validate};
