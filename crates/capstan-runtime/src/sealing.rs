//! Sealing and the call-boundary unseal protocol.
//!
//! Any capability (or seal) is sealable under any seal; safety comes
//! from the identity match at unseal time. The implicit unseal of sealed
//! arguments is implemented here as an explicit step of the call
//! protocol rather than folded into generic argument binding.

use crate::EvalError;
use crate::value::{Capability, SealId, Sealed, Value};
use capstan_ir::{DataType, Parameter};

/// Wraps `source` under `seal`.
///
/// Words are not sealable. Resealing under the identical seal is the
/// identity; resealing under a different seal traps.
pub(crate) fn seal_value(
    source: Value,
    seal: &Value,
    source_name: &str,
    seal_name: &str,
) -> Result<Value, EvalError> {
    let Value::Seal(seal_id) = seal else {
        return Err(EvalError::TypeMismatch {
            operation: "seal",
            detail: format!("{seal_name} is not a seal, got {}", seal.kind()),
        });
    };
    match source {
        Value::Word(_) => Err(EvalError::TypeMismatch {
            operation: "seal",
            detail: format!("{source_name} is not a capability"),
        }),
        Value::Sealed(sealed) if sealed.seal == *seal_id => Ok(Value::Sealed(sealed)),
        Value::Sealed(_) => Err(EvalError::CapabilityViolation {
            operation: "seal",
            detail: format!("{source_name} is already sealed under a different seal"),
        }),
        inner => Ok(Value::Sealed(Sealed {
            seal: *seal_id,
            inner: Box::new(inner),
        })),
    }
}

/// Splits a call target into its invocation seal (if any) and the
/// underlying capability. The capability must still be checked to
/// address a procedure.
pub(crate) fn split_target(target: Value) -> Result<(Option<SealId>, Capability), EvalError> {
    match target {
        Value::Capability(capability) => Ok((None, capability)),
        Value::Sealed(sealed) => match *sealed.inner {
            Value::Capability(capability) => Ok((Some(sealed.seal), capability)),
            other => Err(EvalError::TypeMismatch {
                operation: "call",
                detail: format!("sealed target wraps {}, not a procedure", other.kind()),
            }),
        },
        other => Err(EvalError::TypeMismatch {
            operation: "call",
            detail: format!("target is {}, not callable", other.kind()),
        }),
    }
}

/// Binds one argument to its declared parameter, performing the unseal
/// step for sealed parameters.
///
/// A sealed parameter demands a sealed argument carrying exactly the
/// invocation seal; the callee receives the unwrapped value. An unsealed
/// parameter refuses sealed arguments. Either way the result must match
/// the parameter's declared data type.
pub(crate) fn bind_argument(
    parameter: &Parameter,
    argument: Value,
    invocation_seal: Option<SealId>,
) -> Result<Value, EvalError> {
    let value = if parameter.sealed {
        let Value::Sealed(sealed) = argument else {
            return Err(EvalError::TypeMismatch {
                operation: "call",
                detail: format!(
                    "parameter {} is sealed, got an unsealed {}",
                    parameter.name,
                    argument.kind()
                ),
            });
        };
        let Some(seal) = invocation_seal else {
            return Err(EvalError::TypeMismatch {
                operation: "call",
                detail: format!(
                    "parameter {} is sealed but the invocation target is not",
                    parameter.name
                ),
            });
        };
        if sealed.seal != seal {
            return Err(EvalError::CapabilityViolation {
                operation: "call",
                detail: format!(
                    "argument for {} is sealed under a foreign seal",
                    parameter.name
                ),
            });
        }
        *sealed.inner
    } else {
        if matches!(argument, Value::Sealed(_)) {
            return Err(EvalError::TypeMismatch {
                operation: "call",
                detail: format!(
                    "parameter {} is unsealed, got a sealed capability",
                    parameter.name
                ),
            });
        }
        argument
    };

    let type_ok = match parameter.data_type {
        DataType::Word => matches!(value, Value::Word(_)),
        DataType::Capability => value.is_capability_kind(),
    };
    if !type_ok {
        return Err(EvalError::TypeMismatch {
            operation: "call",
            detail: format!(
                "parameter {} holds {:?}, got {}",
                parameter.name,
                parameter.data_type,
                value.kind()
            ),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectId;
    use capstan_ir::builders::{param, sealed_param};

    fn cap(id: usize) -> Value {
        Value::Capability(Capability::object(ObjectId(id)))
    }

    #[test]
    fn unseal_after_seal_is_the_identity() {
        let sealed = seal_value(cap(7), &Value::Seal(SealId(1)), "c", "s").unwrap();
        let back = bind_argument(&sealed_param("self"), sealed, Some(SealId(1))).unwrap();
        assert_eq!(back, cap(7));
    }

    #[test]
    fn foreign_seal_never_unseals() {
        let sealed = seal_value(cap(7), &Value::Seal(SealId(1)), "c", "s").unwrap();
        let err = bind_argument(&sealed_param("self"), sealed, Some(SealId(2))).unwrap_err();
        assert!(matches!(err, EvalError::CapabilityViolation { .. }));
    }

    #[test]
    fn unsealed_argument_for_sealed_parameter_is_rejected() {
        let err = bind_argument(&sealed_param("self"), cap(7), Some(SealId(1))).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn sealed_argument_for_unsealed_parameter_is_rejected() {
        let sealed = seal_value(cap(7), &Value::Seal(SealId(1)), "c", "s").unwrap();
        let err =
            bind_argument(&param("x", DataType::Capability), sealed, Some(SealId(1))).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn words_are_not_sealable() {
        let err = seal_value(Value::Word(3), &Value::Seal(SealId(1)), "w", "s").unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn sealing_requires_a_seal_value() {
        let err = seal_value(cap(7), &Value::Word(0), "c", "s").unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn resealing_under_the_same_seal_is_identity() {
        let once = seal_value(cap(7), &Value::Seal(SealId(1)), "c", "s").unwrap();
        let twice = seal_value(once.clone(), &Value::Seal(SealId(1)), "c", "s").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn resealing_under_a_different_seal_traps() {
        let once = seal_value(cap(7), &Value::Seal(SealId(1)), "c", "s").unwrap();
        let err = seal_value(once, &Value::Seal(SealId(2)), "c", "s").unwrap_err();
        assert!(matches!(err, EvalError::CapabilityViolation { .. }));
    }

    #[test]
    fn seals_are_themselves_sealable() {
        let sealed = seal_value(Value::Seal(SealId(5)), &Value::Seal(SealId(1)), "a", "s").unwrap();
        let back = bind_argument(&sealed_param("auth"), sealed, Some(SealId(1))).unwrap();
        assert_eq!(back, Value::Seal(SealId(5)));
    }

    #[test]
    fn dual_sealing_yields_distinct_values_aliasing_one_object() {
        let under_one = seal_value(cap(7), &Value::Seal(SealId(1)), "c", "s1").unwrap();
        let under_two = seal_value(cap(7), &Value::Seal(SealId(2)), "c", "s2").unwrap();
        assert_ne!(under_one, under_two);
        let a = bind_argument(&sealed_param("x"), under_one, Some(SealId(1))).unwrap();
        let b = bind_argument(&sealed_param("x"), under_two, Some(SealId(2))).unwrap();
        assert_eq!(a, b);
    }
}
