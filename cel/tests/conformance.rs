//! End-to-end scenarios exercising the compile → plan → evaluate
//! pipeline as a host embedding the crate would.

use cel::common::value::{MapKey, ValueMap};
use cel::interpreter::activation::{MapActivation, PartialActivation};
use cel::interpreter::unknown::AttributePattern;
use cel::unparse::unparse;
use cel::{CelType, EvalOptions, Environment, Source, Value};
use std::sync::Arc;

fn value_map(entries: Vec<(&str, Value)>) -> Value {
    let mut map = ValueMap::new();
    for (key, value) in entries {
        map.insert(MapKey::String(key.into()), value);
    }
    Value::Map(Arc::new(map))
}

#[test]
fn hello_world_on_an_empty_environment() {
    let env = Environment::builder().build();
    let program = env.compile(&Source::from("\"Hello, World!\"")).unwrap();
    let activation = MapActivation::new();
    assert_eq!(program.eval(&activation), Value::String("Hello, World!".into()));
}

fn request_env() -> Environment {
    Environment::builder().add_variable("request", CelType::Dyn).build()
}

fn request_with_group(group: Option<&str>) -> Value {
    let mut claims = Vec::new();
    if let Some(g) = group {
        claims.push(("group", Value::String(g.into())));
    }
    value_map(vec![
        (
            "auth",
            value_map(vec![
                ("principal", Value::String("user:me@acme.co".into())),
                ("claims", value_map(claims)),
            ]),
        ),
        ("time", Value::Int(0)),
    ])
}

#[test]
fn nested_field_equality_on_a_populated_claim() {
    let env = request_env();
    let program = env.compile(&Source::from("request.auth.claims.group == \"admin\"")).unwrap();
    let activation = MapActivation::new().bind("request", request_with_group(Some("admin")));
    assert_eq!(program.eval(&activation), Value::Bool(true));
}

#[test]
fn missing_claim_key_surfaces_as_an_error() {
    let env = request_env();
    let program = env.compile(&Source::from("request.auth.claims.group == \"admin\"")).unwrap();
    let activation = MapActivation::new().bind("request", request_with_group(None));
    let result = program.eval(&activation);
    assert!(result.is_error(), "expected an error value, got {result:?}");
}

#[test]
fn short_circuit_absorbs_the_missing_key_error() {
    let env = request_env();
    let program = env
        .compile(&Source::from(
            "request.auth.claims.group == \"admin\" || request.auth.principal == \"user:me@acme.co\"",
        ))
        .unwrap();
    let activation = MapActivation::new().bind("request", request_with_group(None));
    assert_eq!(program.eval(&activation), Value::Bool(true));
}

#[test]
fn in_list_and_uint_type_check_both_true() {
    let env = Environment::builder()
        .add_variable("x", CelType::Int)
        .add_variable("y", CelType::UInt)
        .build();
    let program = env.compile(&Source::from("x in [1, 2, 3, 4, 5] && type(y) == uint")).unwrap();
    let activation = MapActivation::new().bind("x", 4i64).bind("y", 2u64);
    assert_eq!(program.eval(&activation), Value::Bool(true));
}

#[test]
fn exhaustive_eval_still_short_circuits_but_records_both_sides() {
    let env = Environment::builder()
        .add_variable("x", CelType::Int)
        .add_variable("y", CelType::UInt)
        .eval_options(EvalOptions::EXHAUSTIVE_EVAL | EvalOptions::TRACK_STATE)
        .build();
    let program = env.compile(&Source::from("x in [1, 2, 3, 4, 5] && type(y) == uint")).unwrap();
    let activation = MapActivation::new().bind("x", 6i64).bind("y", 2u64);
    let (value, details) = program.eval_with_details(&activation);
    assert_eq!(value, Value::Bool(false));
    let root_id = program.checked_ast().ast.root.id;
    assert!(details.state.get(root_id).is_some());
}

#[test]
fn partial_eval_residualizes_the_unresolved_half() {
    let env = Environment::builder()
        .add_variable("x", CelType::Int)
        .add_variable("y", CelType::UInt)
        .eval_options(EvalOptions::PARTIAL_EVAL)
        .build();
    let program = env.compile(&Source::from("x in [1, 2, 3, 4, 5] && type(y) == uint")).unwrap();
    let base = MapActivation::new().bind("x", 3i64);
    let activation = PartialActivation::new(&base, vec![AttributePattern::new("y")]);
    let (value, details) = program.eval_with_details(&activation);
    assert!(value.is_unknown(), "expected an unknown value, got {value:?}");

    let residual = env.residual_ast(program.checked_ast(), &details.state);
    assert_eq!(unparse(&residual), "(type(y) == uint)");
}

#[test]
fn comprehension_over_nested_claim_lists() {
    let env = Environment::builder()
        .add_variable("jwt", CelType::Dyn)
        .add_overload(
            "startsWith",
            cel::common::functions::OverloadDecl::new("string_starts_with", vec![CelType::String, CelType::String], CelType::Bool, true)
                .with_implementation(|args| match (&args[0], &args[1]) {
                    (Value::String(s), Value::String(prefix)) => Value::Bool(s.starts_with(prefix.as_ref())),
                    _ => Value::no_such_overload("startsWith"),
                }),
        )
        .add_overload(
            "endsWith",
            cel::common::functions::OverloadDecl::new("string_ends_with", vec![CelType::String, CelType::String], CelType::Bool, true)
                .with_implementation(|args| match (&args[0], &args[1]) {
                    (Value::String(s), Value::String(suffix)) => Value::Bool(s.ends_with(suffix.as_ref())),
                    _ => Value::no_such_overload("endsWith"),
                }),
        )
        .build();

    let program = env
        .compile(&Source::from(
            "jwt.extra_claims.exists(c, c.startsWith(\"group\")) && \
             jwt.extra_claims.filter(c, c.startsWith(\"group\")).all(c, jwt.extra_claims[c].all(g, g.endsWith(\"@acme.co\")))",
        ))
        .unwrap();

    let extra_claims = value_map(vec![
        (
            "group1",
            Value::List(Arc::new(vec![Value::String("admin@acme.co".into()), Value::String("analyst@acme.co".into())])),
        ),
        (
            "labels",
            Value::List(Arc::new(vec![Value::String("metadata".into()), Value::String("prod".into()), Value::String("pii".into())])),
        ),
        ("groupN", Value::List(Arc::new(vec![Value::String("forever@acme.co".into())]))),
    ]);
    let jwt = value_map(vec![("extra_claims", extra_claims)]);
    let activation = MapActivation::new().bind("jwt", jwt);
    assert_eq!(program.eval(&activation), Value::Bool(true));
}

#[test]
fn compile_error_rejects_undeclared_variables() {
    let env = Environment::builder().build();
    let result = env.compile(&Source::from("undeclared_name + 1"));
    assert!(result.is_err());
}

#[test]
fn container_qualified_variable_resolves_through_progressively_shorter_prefixes() {
    let env = Environment::builder()
        .container("a.b.c")
        .add_variable("a.b.Flag", CelType::Bool)
        .build();
    let program = env.compile(&Source::from("Flag")).unwrap();
    // The checker resolves the bare identifier `Flag` to the declared,
    // fully qualified `a.b.Flag`, so the activation binds that name.
    let activation = MapActivation::new().bind("a.b.Flag", true);
    assert_eq!(program.eval(&activation), Value::Bool(true));
}
