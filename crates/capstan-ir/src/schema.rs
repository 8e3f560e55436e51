//! Program-tree types for the Capstan IR.
//!
//! A program arrives here already parsed and name-disambiguated by a
//! front-end; names like `x$1` are opaque, unique identifiers. The types
//! carry serde derives so drivers can load program trees from JSON.

use serde::{Deserialize, Serialize};

/// A binding or procedure name. Already unique per binding site.
pub type Name = String;

/// The machine word: a fixed-width signed integer.
pub type Word = i32;

/// Kind of datum a field, element, or parameter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    /// A machine word.
    Word,
    /// A capability: record, vector, procedure, seal, or a sealed wrapping
    /// of one of those.
    Capability,
}

/// A side-effect-free value source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operand {
    /// A word literal.
    Constant(Word),
    /// The value bound to a name in the active frame.
    Location(Name),
    /// A capability for the named procedure.
    Procedure(Name),
}

/// Binary operator over words.
///
/// `Add` and `Sub` trap on overflow; the shifts mask their right operand
/// to 5 bits; the bitwise operators cannot trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
    ShiftRightArithmetic,
}

/// Relation between two values, decided by a conditional.
///
/// `Eq` and `Ne` are identity predicates and accept any value kind;
/// the ordering relations are defined on words only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The test at the end of a conditional's cond-block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Test {
    /// A constant predicate.
    Constant(bool),
    /// Holds iff `lhs op rhs`.
    Relation {
        lhs: Operand,
        op: RelationOp,
        rhs: Operand,
    },
}

/// A conditional's condition: a block of setup statements followed by a
/// test, i.e. the `do(…, then: relation(…))` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Statements executed before the test, in the enclosing frame.
    #[serde(default)]
    pub setup: Vec<Statement>,
    /// The predicate deciding which branch runs.
    pub test: Test,
}

/// A named record field and the kind of datum it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: Name,
    pub data_type: DataType,
}

/// One statement of the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Statement {
    /// `do(stmt*)`: sequential execution in the current frame.
    Block(Vec<Statement>),

    /// Binds the value of `value` to `name`.
    Set { name: Name, value: Operand },

    /// Computes `lhs op rhs` and binds the result to `to`.
    Compute {
        to: Name,
        lhs: Operand,
        op: BinaryOp,
        rhs: Operand,
    },

    /// Evaluates the condition, then exactly one branch.
    If {
        condition: Condition,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },

    /// Invokes `target` with `arguments`; the callee's return value is
    /// bound to `result` in this frame.
    ///
    /// `target` is a direct procedure reference or evaluates to a
    /// procedure capability, possibly sealed.
    Call {
        target: Operand,
        arguments: Vec<Operand>,
        result: Name,
    },

    /// Returns `value` to the caller, short-circuiting every enclosing
    /// block up to the procedure boundary.
    Return { value: Operand },

    /// Allocates a fresh, process-unique seal and binds it to `into`.
    CreateSeal { into: Name },

    /// Seals the capability bound to `source` under the seal bound to
    /// `seal` and binds the sealed value to `into`.
    Seal {
        into: Name,
        source: Name,
        seal: Name,
    },

    /// Allocates a record with exactly the given fields, all unset, and
    /// binds a capability for it to `capability`.
    CreateRecord {
        fields: Vec<FieldSpec>,
        capability: Name,
        scoped: bool,
    },

    /// Reads the named field of the record behind `record` into `to`.
    GetField {
        field: Name,
        record: Name,
        to: Name,
    },

    /// Writes `value` to the named field of the record behind `record`.
    SetField {
        field: Name,
        record: Name,
        value: Operand,
    },

    /// Allocates a vector of `count` zero-initialized elements and binds
    /// a capability for it to `capability`.
    CreateVector {
        element_type: DataType,
        count: usize,
        capability: Name,
        scoped: bool,
    },

    /// Reads the element at `index` of the vector behind `vector` into
    /// `to`. Bounds-checked against `[0, count)`.
    GetElement {
        vector: Name,
        index: Operand,
        to: Name,
    },

    /// Writes `value` to the element at `index` of the vector behind
    /// `vector`. Bounds-checked against `[0, count)`.
    SetElement {
        vector: Name,
        index: Operand,
        value: Operand,
    },

    /// Destroys the scoped allocation behind `capability` ahead of the
    /// owning frame's return. The allocation must be owned by the
    /// current frame.
    DestroyScoped { capability: Operand },
}

/// A declared procedure parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: Name,
    pub data_type: DataType,
    /// Whether the matching argument is sealed, to be unsealed by the
    /// sealed invocation. At most one parameter per procedure.
    #[serde(default)]
    pub sealed: bool,
}

/// A named procedure with an ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: Name,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Statement>,
}

/// A complete program: a top-level block plus its procedures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

impl Program {
    /// Looks up a procedure by name.
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }
}
