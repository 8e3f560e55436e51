//! Structural validation of program trees.
//!
//! The runtime assumes trees it is handed have passed this check. It
//! still traps dynamically on everything reachable through indirect
//! calls, which static validation cannot see.

use crate::{Operand, Procedure, Program, Statement};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("duplicate procedure name: {0}")]
    DuplicateProcedure(String),

    #[error("duplicate parameter name {name} in procedure {procedure}")]
    DuplicateParameter { procedure: String, name: String },

    #[error("procedure {0} declares more than one sealed parameter")]
    MultipleSealedParameters(String),

    #[error("sealed parameter {name} of procedure {procedure} must have capability type")]
    SealedWordParameter { procedure: String, name: String },

    #[error("unknown procedure reference: {0}")]
    UnknownProcedure(String),

    #[error("call to {procedure} passes {got} arguments, declared {expected}")]
    ArityMismatch {
        procedure: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate field name {0} in record shape")]
    DuplicateField(String),

    #[error("a control path through {0} reaches the end without returning")]
    MissingReturn(String),
}

/// Validates a program tree.
///
/// Rejects duplicate procedure/parameter/field names, dangling direct
/// procedure references, direct-call arity mismatches, procedures with
/// more than one sealed parameter or a sealed word parameter, and bodies
/// with a control path that can fall off the end without `return`.
pub fn validate(program: &Program) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for procedure in &program.procedures {
        if !names.insert(procedure.name.as_str()) {
            return Err(ValidationError::DuplicateProcedure(procedure.name.clone()));
        }
    }

    validate_block(&program.body, program)?;
    if !always_returns(&program.body) {
        return Err(ValidationError::MissingReturn("the top-level block".into()));
    }

    for procedure in &program.procedures {
        validate_procedure(procedure, program)?;
    }

    Ok(())
}

fn validate_procedure(procedure: &Procedure, program: &Program) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    let mut sealed = 0usize;
    for parameter in &procedure.parameters {
        if !names.insert(parameter.name.as_str()) {
            return Err(ValidationError::DuplicateParameter {
                procedure: procedure.name.clone(),
                name: parameter.name.clone(),
            });
        }
        if parameter.sealed {
            sealed += 1;
            if sealed > 1 {
                return Err(ValidationError::MultipleSealedParameters(
                    procedure.name.clone(),
                ));
            }
            if parameter.data_type == crate::DataType::Word {
                return Err(ValidationError::SealedWordParameter {
                    procedure: procedure.name.clone(),
                    name: parameter.name.clone(),
                });
            }
        }
    }

    validate_block(&procedure.body, program)?;
    if !always_returns(&procedure.body) {
        return Err(ValidationError::MissingReturn(format!(
            "procedure {}",
            procedure.name
        )));
    }

    Ok(())
}

fn validate_block(statements: &[Statement], program: &Program) -> Result<(), ValidationError> {
    for statement in statements {
        validate_statement(statement, program)?;
    }
    Ok(())
}

fn validate_statement(statement: &Statement, program: &Program) -> Result<(), ValidationError> {
    match statement {
        Statement::Block(body) => validate_block(body, program),

        Statement::Set { value, .. } => validate_operand(value, program),

        Statement::Compute { lhs, rhs, .. } => {
            validate_operand(lhs, program)?;
            validate_operand(rhs, program)
        }

        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            validate_block(&condition.setup, program)?;
            if let crate::Test::Relation { lhs, rhs, .. } = &condition.test {
                validate_operand(lhs, program)?;
                validate_operand(rhs, program)?;
            }
            validate_block(then_branch, program)?;
            validate_block(else_branch, program)
        }

        Statement::Call {
            target, arguments, ..
        } => {
            validate_operand(target, program)?;
            for argument in arguments {
                validate_operand(argument, program)?;
            }
            // Direct calls can be arity-checked statically.
            if let Operand::Procedure(name) = target {
                let procedure = program
                    .procedure(name)
                    .ok_or_else(|| ValidationError::UnknownProcedure(name.clone()))?;
                if procedure.parameters.len() != arguments.len() {
                    return Err(ValidationError::ArityMismatch {
                        procedure: name.clone(),
                        expected: procedure.parameters.len(),
                        got: arguments.len(),
                    });
                }
            }
            Ok(())
        }

        Statement::Return { value } => validate_operand(value, program),

        Statement::CreateRecord { fields, .. } => {
            let mut names = HashSet::new();
            for field in fields {
                if !names.insert(field.name.as_str()) {
                    return Err(ValidationError::DuplicateField(field.name.clone()));
                }
            }
            Ok(())
        }

        Statement::SetField { value, .. } => validate_operand(value, program),

        Statement::GetElement { index, .. } => validate_operand(index, program),

        Statement::SetElement { index, value, .. } => {
            validate_operand(index, program)?;
            validate_operand(value, program)
        }

        Statement::DestroyScoped { capability } => validate_operand(capability, program),

        Statement::CreateSeal { .. }
        | Statement::Seal { .. }
        | Statement::GetField { .. }
        | Statement::CreateVector { .. } => Ok(()),
    }
}

fn validate_operand(operand: &Operand, program: &Program) -> Result<(), ValidationError> {
    if let Operand::Procedure(name) = operand {
        if program.procedure(name).is_none() {
            return Err(ValidationError::UnknownProcedure(name.clone()));
        }
    }
    Ok(())
}

/// Whether every control path through the block ends in `return`.
///
/// Conservative: a call is not assumed to diverge, and a condition's
/// setup block is not credited with returning.
fn always_returns(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Return { .. } => true,
        Statement::Block(body) => always_returns(body),
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => always_returns(then_branch) && always_returns(else_branch),
        _ => false,
    })
}
