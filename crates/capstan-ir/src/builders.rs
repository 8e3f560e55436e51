//! Ergonomic program-tree constructors.
//!
//! Flat builder functions mirroring the machine's surface forms, used by
//! tests and demo programs. Front-ends producing trees programmatically
//! should prefer these over spelling out the enum variants.

use crate::{
    BinaryOp, Condition, DataType, FieldSpec, Name, Operand, Parameter, Procedure, Program,
    RelationOp, Statement, Test, Word,
};

/// `constant(v)`: a word literal.
pub fn constant(value: Word) -> Operand {
    Operand::Constant(value)
}

/// `location(name)`: the value bound to a name.
pub fn location(name: impl Into<Name>) -> Operand {
    Operand::Location(name.into())
}

/// `procedure(name)` as an operand: a capability for a named procedure.
pub fn proc_ref(name: impl Into<Name>) -> Operand {
    Operand::Procedure(name.into())
}

/// `do(stmt*)`.
pub fn block(body: Vec<Statement>) -> Statement {
    Statement::Block(body)
}

/// `set(name, to: value)`.
pub fn set(name: impl Into<Name>, value: Operand) -> Statement {
    Statement::Set {
        name: name.into(),
        value,
    }
}

/// `compute(lhs, op, rhs, to: name)`.
pub fn compute(to: impl Into<Name>, lhs: Operand, op: BinaryOp, rhs: Operand) -> Statement {
    Statement::Compute {
        to: to.into(),
        lhs,
        op,
        rhs,
    }
}

/// `relation(lhs, op, rhs)`.
pub fn relation(lhs: Operand, op: RelationOp, rhs: Operand) -> Test {
    Test::Relation { lhs, op, rhs }
}

/// `do(setup*, then: test)`: a conditional's cond-block.
pub fn cond(setup: Vec<Statement>, test: Test) -> Condition {
    Condition { setup, test }
}

/// `if(condition, then:, else:)`.
pub fn if_else(
    condition: Condition,
    then_branch: Vec<Statement>,
    else_branch: Vec<Statement>,
) -> Statement {
    Statement::If {
        condition,
        then_branch,
        else_branch,
    }
}

/// `call(target, args…, result:)`.
pub fn call(target: Operand, arguments: Vec<Operand>, result: impl Into<Name>) -> Statement {
    Statement::Call {
        target,
        arguments,
        result: result.into(),
    }
}

/// `return(value)`.
pub fn ret(value: Operand) -> Statement {
    Statement::Return { value }
}

/// `createSeal(in: name)`.
pub fn create_seal(into: impl Into<Name>) -> Statement {
    Statement::CreateSeal { into: into.into() }
}

/// `seal(into:, source:, seal:)`.
pub fn seal(into: impl Into<Name>, source: impl Into<Name>, seal: impl Into<Name>) -> Statement {
    Statement::Seal {
        into: into.into(),
        source: source.into(),
        seal: seal.into(),
    }
}

/// A named field of a record shape.
pub fn field(name: impl Into<Name>, data_type: DataType) -> FieldSpec {
    FieldSpec {
        name: name.into(),
        data_type,
    }
}

/// `createRecord(fields, capability:, scoped:)`.
pub fn create_record(fields: Vec<FieldSpec>, capability: impl Into<Name>, scoped: bool) -> Statement {
    Statement::CreateRecord {
        fields,
        capability: capability.into(),
        scoped,
    }
}

/// `getField(field, of:, to:)`.
pub fn get_field(
    field: impl Into<Name>,
    record: impl Into<Name>,
    to: impl Into<Name>,
) -> Statement {
    Statement::GetField {
        field: field.into(),
        record: record.into(),
        to: to.into(),
    }
}

/// `setField(field, of:, to:)`.
pub fn set_field(field: impl Into<Name>, record: impl Into<Name>, value: Operand) -> Statement {
    Statement::SetField {
        field: field.into(),
        record: record.into(),
        value,
    }
}

/// `createVector(elemType, count:, capability:, scoped:)`.
pub fn create_vector(
    element_type: DataType,
    count: usize,
    capability: impl Into<Name>,
    scoped: bool,
) -> Statement {
    Statement::CreateVector {
        element_type,
        count,
        capability: capability.into(),
        scoped,
    }
}

/// `getElement(of:, index:, to:)`.
pub fn get_element(vector: impl Into<Name>, index: Operand, to: impl Into<Name>) -> Statement {
    Statement::GetElement {
        vector: vector.into(),
        index,
        to: to.into(),
    }
}

/// `setElement(of:, index:, to:)`.
pub fn set_element(vector: impl Into<Name>, index: Operand, value: Operand) -> Statement {
    Statement::SetElement {
        vector: vector.into(),
        index,
        value,
    }
}

/// `destroyScopedValue(capability:)`.
pub fn destroy_scoped(capability: Operand) -> Statement {
    Statement::DestroyScoped { capability }
}

/// An unsealed parameter.
pub fn param(name: impl Into<Name>, data_type: DataType) -> Parameter {
    Parameter {
        name: name.into(),
        data_type,
        sealed: false,
    }
}

/// A sealed capability parameter, unsealed at the call boundary.
pub fn sealed_param(name: impl Into<Name>) -> Parameter {
    Parameter {
        name: name.into(),
        data_type: DataType::Capability,
        sealed: true,
    }
}

/// A named procedure.
pub fn procedure(
    name: impl Into<Name>,
    parameters: Vec<Parameter>,
    body: Vec<Statement>,
) -> Procedure {
    Procedure {
        name: name.into(),
        parameters,
        body,
    }
}

/// A complete program.
pub fn program(body: Vec<Statement>, procedures: Vec<Procedure>) -> Program {
    Program { body, procedures }
}
