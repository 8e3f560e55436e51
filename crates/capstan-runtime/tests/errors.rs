//! Trap paths reachable from guest programs.

use capstan_ir::builders::*;
use capstan_ir::{BinaryOp, DataType, Program, validate};
use capstan_runtime::{EvalError, evaluate};

#[test]
fn overflow_traps_instead_of_wrapping() {
    let p = program(
        vec![
            set("big", constant(i32::MAX)),
            compute("worse", location("big"), BinaryOp::Add, constant(1)),
            ret(location("worse")),
        ],
        vec![],
    );
    validate(&p).unwrap();
    let err = evaluate(&p).unwrap_err();
    assert!(matches!(err, EvalError::Arithmetic { op: "add", .. }));
    assert_eq!(
        err.to_string(),
        "arithmetic overflow computing 2147483647 add 1"
    );
}

#[test]
fn unbound_names_trap() {
    let p = program(vec![ret(location("ghost"))], vec![]);
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::UnboundName { operation: "return", .. }
    ));
}

/// Bindings are frame-local: a callee cannot observe the caller's names.
#[test]
fn caller_bindings_are_invisible_to_the_callee() {
    let p = program(
        vec![
            set("secret", constant(9)),
            call(proc_ref("spy"), vec![], "result"),
            ret(location("result")),
        ],
        vec![procedure("spy", vec![], vec![ret(location("secret"))])],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::UnboundName { .. }
    ));
}

#[test]
fn out_of_bounds_element_access_traps() {
    let p = program(
        vec![
            create_vector(DataType::Word, 4, "v", false),
            get_element("v", constant(4), "x"),
            ret(location("x")),
        ],
        vec![],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::BoundsViolation { operation: "getElement", .. }
    ));
}

#[test]
fn negative_element_index_traps() {
    let p = program(
        vec![
            create_vector(DataType::Word, 4, "v", false),
            set_element("v", constant(-1), constant(0)),
            ret(constant(0)),
        ],
        vec![],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::BoundsViolation { operation: "setElement", .. }
    ));
}

#[test]
fn reading_an_unset_field_traps() {
    let p = program(
        vec![
            create_record(vec![field("value", DataType::Word)], "cell", false),
            get_field("value", "cell", "x"),
            ret(location("x")),
        ],
        vec![],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::CapabilityViolation { operation: "getField", .. }
    ));
}

#[test]
fn calling_a_record_capability_traps() {
    let p = program(
        vec![
            create_record(vec![field("value", DataType::Word)], "cell", false),
            call(location("cell"), vec![], "result"),
            ret(location("result")),
        ],
        vec![],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::TypeMismatch { operation: "call", .. }
    ));
}

#[test]
fn calling_a_word_traps() {
    let p = program(
        vec![
            set("w", constant(5)),
            call(location("w"), vec![], "result"),
            ret(location("result")),
        ],
        vec![],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::TypeMismatch { operation: "call", .. }
    ));
}

/// Indirect calls are resolved at run time, so arity is only checkable
/// then; validation accepts the program and the machine traps.
#[test]
fn indirect_call_arity_is_checked_at_run_time() {
    let p = program(
        vec![
            set("f", proc_ref("wants_one")),
            call(location("f"), vec![], "result"),
            ret(location("result")),
        ],
        vec![procedure(
            "wants_one",
            vec![param("x", DataType::Word)],
            vec![ret(location("x"))],
        )],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::TypeMismatch { operation: "call", .. }
    ));
}

#[test]
fn word_argument_for_capability_parameter_traps() {
    let p = program(
        vec![
            set("w", constant(5)),
            call(proc_ref("wants_cap"), vec![location("w")], "result"),
            ret(location("result")),
        ],
        vec![procedure(
            "wants_cap",
            vec![param("c", DataType::Capability)],
            vec![ret(constant(0))],
        )],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::TypeMismatch { operation: "call", .. }
    ));
}

#[test]
fn field_access_on_a_word_traps() {
    let p = program(
        vec![
            set("w", constant(5)),
            get_field("value", "w", "x"),
            ret(location("x")),
        ],
        vec![],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::TypeMismatch { operation: "getField", .. }
    ));
}

#[test]
fn ordering_relations_are_word_only() {
    use capstan_ir::RelationOp;
    let p = program(
        vec![
            create_record(vec![field("value", DataType::Word)], "cell", false),
            if_else(
                cond(
                    vec![],
                    relation(location("cell"), RelationOp::Lt, constant(0)),
                ),
                vec![ret(constant(1))],
                vec![ret(constant(0))],
            ),
        ],
        vec![],
    );
    validate(&p).unwrap();
    assert!(matches!(
        evaluate(&p).unwrap_err(),
        EvalError::TypeMismatch { operation: "relation", .. }
    ));
}

/// Validation rejects bodies that can fall off the end; a tree built
/// outside the validator still traps rather than returning garbage.
#[test]
fn unvalidated_fallthrough_traps_at_run_time() {
    let p: Program = program(vec![set("x", constant(1))], vec![]);
    assert!(validate(&p).is_err());
    let err = evaluate(&p).unwrap_err();
    assert!(matches!(err, EvalError::MissingReturn { .. }));
    assert_eq!(err.to_string(), "the top-level block completed without returning");
}
