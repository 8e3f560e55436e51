//! Run-time value representation.
//!
//! Values are an explicit tagged variant; every operation dispatches on
//! the shape it requires. Records and vectors are not inline values:
//! they live in the [heap](crate::heap) and are reached through
//! capabilities, so aliasing has reference semantics.

use capstan_ir::Word;
use std::fmt;

/// Index of a heap object. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub(crate) usize);

/// Index of a procedure in the program's flat procedure table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcId(pub(crate) usize);

/// A process-unique sealing authority, compared only by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SealId(pub(crate) u64);

/// What a capability addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The zero-initialized capability; every use traps.
    Null,
    /// A record or vector in the heap.
    Object(ObjectId),
    /// A procedure. Procedure capabilities are never revoked.
    Procedure(ProcId),
}

/// An unforgeable reference to one memory object or procedure.
///
/// Identity is the target; two capabilities to the same object alias it,
/// and mutation through either is visible through both. Validity of
/// object capabilities is a revocation tag on the heap entry, so exiting
/// the owning scope revokes every alias at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub target: Target,
}

impl Capability {
    pub fn object(id: ObjectId) -> Self {
        Capability {
            target: Target::Object(id),
        }
    }

    pub fn procedure(id: ProcId) -> Self {
        Capability {
            target: Target::Procedure(id),
        }
    }

    /// The cleared-tag capability vectors are initialized with.
    pub fn null() -> Self {
        Capability {
            target: Target::Null,
        }
    }
}

/// A machine value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A machine word.
    Word(Word),
    /// A sealing authority. Sealable like any capability.
    Seal(SealId),
    /// An unsealed capability.
    Capability(Capability),
    /// A (seal, wrapped capability) pair. Unwrapping requires presenting
    /// the identical seal and yields exactly the wrapped value.
    Sealed(Sealed),
}

/// A sealed capability or seal.
///
/// Equality is the pair (seal identity, wrapped identity): sealing one
/// capability under two different seals yields two distinct sealed
/// values aliasing the same object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub seal: SealId,
    pub inner: Box<Value>,
}

impl Value {
    /// Short shape name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Word(_) => "word",
            Value::Seal(_) => "seal",
            Value::Capability(_) => "capability",
            Value::Sealed(_) => "sealed capability",
        }
    }

    /// Whether the value may occupy a capability-typed slot.
    pub fn is_capability_kind(&self) -> bool {
        !matches!(self, Value::Word(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Word(w) => write!(f, "{w}"),
            Value::Seal(SealId(id)) => write!(f, "seal#{id}"),
            Value::Capability(c) => match c.target {
                Target::Null => write!(f, "cap(null)"),
                Target::Object(ObjectId(id)) => write!(f, "cap(object#{id})"),
                Target::Procedure(ProcId(id)) => write!(f, "cap(procedure#{id})"),
            },
            Value::Sealed(s) => write!(f, "sealed[seal#{}]({})", s.seal.0, s.inner),
        }
    }
}
