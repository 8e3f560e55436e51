//! Object heap: records, vectors, seal allocation, and revocation.
//!
//! Objects are created once and mutated in place, never replaced. Every
//! entry carries a revocation tag; revoking an object invalidates every
//! capability aliasing it at once. Entries are never reused within a
//! run, which keeps object identity stable and leaves room to attach a
//! collector later.

use crate::EvalError;
use crate::value::{Capability, ObjectId, SealId, Value};
use capstan_ir::{DataType, FieldSpec, Word};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide seal counter: distinct `createSeal` executions never
/// yield equal seals, even across machines.
static NEXT_SEAL: AtomicU64 = AtomicU64::new(0);

struct FieldSlot {
    data_type: DataType,
    /// Unset until first written; reading an unset field traps.
    value: Option<Value>,
}

enum ObjectKind {
    Record { fields: HashMap<String, FieldSlot> },
    Vector {
        element_type: DataType,
        elements: Vec<Value>,
    },
}

struct Object {
    kind: ObjectKind,
    scoped: bool,
    revoked: bool,
}

/// The machine's object heap.
pub struct Heap {
    objects: Vec<Object>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: Vec::new(),
        }
    }

    /// Allocates a fresh, unforgeable seal.
    pub fn create_seal(&mut self) -> SealId {
        SealId(NEXT_SEAL.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocates a record with the given shape, all fields unset.
    pub fn allocate_record(&mut self, shape: &[FieldSpec], scoped: bool) -> ObjectId {
        let fields = shape
            .iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    FieldSlot {
                        data_type: spec.data_type,
                        value: None,
                    },
                )
            })
            .collect();
        self.push(ObjectKind::Record { fields }, scoped)
    }

    /// Allocates a vector of `count` zero-initialized elements.
    pub fn allocate_vector(
        &mut self,
        element_type: DataType,
        count: usize,
        scoped: bool,
    ) -> ObjectId {
        let zero = match element_type {
            DataType::Word => Value::Word(0),
            DataType::Capability => Value::Capability(Capability::null()),
        };
        self.push(
            ObjectKind::Vector {
                element_type,
                elements: vec![zero; count],
            },
            scoped,
        )
    }

    fn push(&mut self, kind: ObjectKind, scoped: bool) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(Object {
            kind,
            scoped,
            revoked: false,
        });
        id
    }

    /// Clears the validity tag of every capability addressing `id`.
    pub fn revoke(&mut self, id: ObjectId) {
        self.objects[id.0].revoked = true;
    }

    /// Whether the allocation was created with `scoped: true`.
    pub fn is_scoped(&self, id: ObjectId) -> bool {
        self.objects[id.0].scoped
    }

    /// Reads a record field. Traps on revoked capabilities, non-records,
    /// unknown field names, and unset fields.
    pub fn record_field(
        &self,
        id: ObjectId,
        field: &str,
        of: &str,
    ) -> Result<Value, EvalError> {
        let object = self.resolve(id, "getField", of)?;
        let ObjectKind::Record { fields } = &object.kind else {
            return Err(EvalError::TypeMismatch {
                operation: "getField",
                detail: format!("{of} is not a record"),
            });
        };
        let slot = fields.get(field).ok_or_else(|| EvalError::BoundsViolation {
            operation: "getField",
            detail: format!("{field} is not a field of {of}"),
        })?;
        slot.value.clone().ok_or_else(|| EvalError::CapabilityViolation {
            operation: "getField",
            detail: format!("field {field} of {of} read before first write"),
        })
    }

    /// Writes a record field, checking the declared field type.
    pub fn set_record_field(
        &mut self,
        id: ObjectId,
        field: &str,
        value: Value,
        of: &str,
    ) -> Result<(), EvalError> {
        self.resolve(id, "setField", of)?;
        let ObjectKind::Record { fields } = &mut self.objects[id.0].kind else {
            return Err(EvalError::TypeMismatch {
                operation: "setField",
                detail: format!("{of} is not a record"),
            });
        };
        let slot = fields
            .get_mut(field)
            .ok_or_else(|| EvalError::BoundsViolation {
                operation: "setField",
                detail: format!("{field} is not a field of {of}"),
            })?;
        check_slot_type(slot.data_type, &value, "setField", field)?;
        slot.value = Some(value);
        Ok(())
    }

    /// Reads a vector element. Bounds-checked against `[0, count)`.
    pub fn vector_element(&self, id: ObjectId, index: Word, of: &str) -> Result<Value, EvalError> {
        let object = self.resolve(id, "getElement", of)?;
        let ObjectKind::Vector { elements, .. } = &object.kind else {
            return Err(EvalError::TypeMismatch {
                operation: "getElement",
                detail: format!("{of} is not a vector"),
            });
        };
        let position = checked_index(index, elements.len(), "getElement", of)?;
        Ok(elements[position].clone())
    }

    /// Writes a vector element, checking bounds and the element type.
    pub fn set_vector_element(
        &mut self,
        id: ObjectId,
        index: Word,
        value: Value,
        of: &str,
    ) -> Result<(), EvalError> {
        self.resolve(id, "setElement", of)?;
        let ObjectKind::Vector {
            element_type,
            elements,
        } = &mut self.objects[id.0].kind
        else {
            return Err(EvalError::TypeMismatch {
                operation: "setElement",
                detail: format!("{of} is not a vector"),
            });
        };
        let position = checked_index(index, elements.len(), "setElement", of)?;
        check_slot_type(*element_type, &value, "setElement", of)?;
        elements[position] = value;
        Ok(())
    }

    fn resolve(
        &self,
        id: ObjectId,
        operation: &'static str,
        of: &str,
    ) -> Result<&Object, EvalError> {
        let object = &self.objects[id.0];
        if object.revoked {
            return Err(EvalError::CapabilityViolation {
                operation,
                detail: format!("{of} refers to a revoked allocation"),
            });
        }
        Ok(object)
    }
}

fn checked_index(
    index: Word,
    count: usize,
    operation: &'static str,
    of: &str,
) -> Result<usize, EvalError> {
    let position = usize::try_from(index).ok();
    match position {
        Some(position) if position < count => Ok(position),
        _ => Err(EvalError::BoundsViolation {
            operation,
            detail: format!("index {index} is outside [0, {count}) for {of}"),
        }),
    }
}

fn check_slot_type(
    expected: DataType,
    value: &Value,
    operation: &'static str,
    slot: &str,
) -> Result<(), EvalError> {
    let ok = match expected {
        DataType::Word => matches!(value, Value::Word(_)),
        DataType::Capability => value.is_capability_kind(),
    };
    if ok {
        Ok(())
    } else {
        Err(EvalError::TypeMismatch {
            operation,
            detail: format!("{slot} holds {expected:?}, got {}", value.kind()),
        })
    }
}
