use crate::builders::*;
use crate::validation::ValidationError;
use crate::{BinaryOp, DataType, Program, RelationOp, validate};

fn returning(body: Vec<crate::Statement>) -> Vec<crate::Statement> {
    let mut body = body;
    body.push(ret(constant(0)));
    body
}

#[test]
fn validate_minimal_program() {
    let p = program(vec![ret(constant(42))], vec![]);
    assert!(validate(&p).is_ok());
}

#[test]
fn validate_direct_call() {
    let p = program(
        vec![
            set("arg", constant(1)),
            call(proc_ref("id"), vec![location("arg")], "out"),
            ret(location("out")),
        ],
        vec![procedure(
            "id",
            vec![param("x", DataType::Word)],
            vec![ret(location("x"))],
        )],
    );
    assert!(validate(&p).is_ok());
}

#[test]
fn reject_duplicate_procedure() {
    let p = program(
        vec![ret(constant(0))],
        vec![
            procedure("f", vec![], vec![ret(constant(1))]),
            procedure("f", vec![], vec![ret(constant(2))]),
        ],
    );
    assert!(matches!(
        validate(&p),
        Err(ValidationError::DuplicateProcedure(name)) if name == "f"
    ));
}

#[test]
fn reject_unknown_call_target() {
    let p = program(vec![call(proc_ref("nowhere"), vec![], "out"), ret(constant(0))], vec![]);
    assert!(matches!(
        validate(&p),
        Err(ValidationError::UnknownProcedure(name)) if name == "nowhere"
    ));
}

#[test]
fn reject_direct_call_arity_mismatch() {
    let p = program(
        vec![call(proc_ref("id"), vec![], "out"), ret(constant(0))],
        vec![procedure(
            "id",
            vec![param("x", DataType::Word)],
            vec![ret(location("x"))],
        )],
    );
    assert!(matches!(
        validate(&p),
        Err(ValidationError::ArityMismatch { expected: 1, got: 0, .. })
    ));
}

#[test]
fn reject_two_sealed_parameters() {
    let p = program(
        vec![ret(constant(0))],
        vec![procedure(
            "m",
            vec![sealed_param("a"), sealed_param("b")],
            vec![ret(constant(0))],
        )],
    );
    assert!(matches!(
        validate(&p),
        Err(ValidationError::MultipleSealedParameters(name)) if name == "m"
    ));
}

#[test]
fn reject_sealed_word_parameter() {
    let p = program(
        vec![ret(constant(0))],
        vec![procedure(
            "m",
            vec![crate::Parameter {
                name: "w".into(),
                data_type: DataType::Word,
                sealed: true,
            }],
            vec![ret(constant(0))],
        )],
    );
    assert!(matches!(
        validate(&p),
        Err(ValidationError::SealedWordParameter { .. })
    ));
}

#[test]
fn reject_duplicate_record_field() {
    let p = program(
        returning(vec![create_record(
            vec![field("x", DataType::Word), field("x", DataType::Word)],
            "r",
            false,
        )]),
        vec![],
    );
    assert!(matches!(
        validate(&p),
        Err(ValidationError::DuplicateField(name)) if name == "x"
    ));
}

#[test]
fn reject_body_that_can_fall_off_the_end() {
    let p = program(
        vec![ret(constant(0))],
        vec![procedure(
            "maybe",
            vec![param("x", DataType::Word)],
            vec![if_else(
                cond(vec![], relation(location("x"), RelationOp::Le, constant(0))),
                vec![ret(constant(0))],
                vec![set("y", constant(1))],
            )],
        )],
    );
    assert!(matches!(
        validate(&p),
        Err(ValidationError::MissingReturn(which)) if which.contains("maybe")
    ));
}

#[test]
fn nested_blocks_count_as_returning() {
    let p = program(
        vec![ret(constant(0))],
        vec![procedure(
            "nested",
            vec![],
            vec![block(vec![block(vec![ret(constant(7))])])],
        )],
    );
    assert!(validate(&p).is_ok());
}

#[test]
fn program_round_trips_through_json() {
    let p = program(
        vec![
            set("lhs", constant(20)),
            set("rhs", constant(22)),
            compute("sum", location("lhs"), BinaryOp::Add, location("rhs")),
            ret(location("sum")),
        ],
        vec![],
    );
    let json = serde_json::to_string(&p).unwrap();
    let back: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
}

#[test]
fn program_loads_from_handwritten_json() {
    let json = r#"{
        "body": [
            { "set": { "name": "x", "value": { "constant": 41 } } },
            { "compute": {
                "to": "y",
                "lhs": { "location": "x" },
                "op": "add",
                "rhs": { "constant": 1 }
            } },
            { "return": { "value": { "location": "y" } } }
        ],
        "procedures": []
    }"#;
    let p: Program = serde_json::from_str(json).unwrap();
    assert!(validate(&p).is_ok());
    assert_eq!(p.body.len(), 3);
}
