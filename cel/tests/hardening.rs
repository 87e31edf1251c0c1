//! Resource-bound and error-path guarantees from §5/§7: no panics, no
//! unbounded recursion, host function misuse degrades to an error value.

use cel::interpreter::activation::MapActivation;
use cel::{CelType, Environment, Source, Value};

#[test]
fn deeply_nested_parens_are_rejected_without_overflowing_the_stack() {
    let mut source = String::new();
    for _ in 0..10_000 {
        source.push('(');
    }
    source.push('1');
    for _ in 0..10_000 {
        source.push(')');
    }
    let env = Environment::builder().build();
    let result = env.compile(&Source::from(source.as_str()));
    assert!(result.is_err(), "pathologically nested input must be rejected, not overflow the stack");
}

#[test]
fn undeclared_type_in_message_construction_is_a_diagnostic_not_a_panic() {
    let env = Environment::builder().build();
    let result = env.compile(&Source::from("my.pkg.Undeclared{field: 1}"));
    assert!(result.is_err());
}

#[test]
fn comprehension_bounded_by_a_large_but_finite_list_completes() {
    let env = Environment::builder().add_variable("xs", CelType::list(CelType::Int)).build();
    let program = env.compile(&Source::from("xs.exists(x, x == 9999)")).unwrap();
    let xs: Vec<Value> = (0..10_000).map(Value::Int).collect();
    let activation = MapActivation::new().bind("xs", Value::List(std::sync::Arc::new(xs)));
    assert_eq!(program.eval(&activation), Value::Bool(true));
}

#[test]
fn division_by_zero_is_an_error_value_not_a_panic() {
    let env = Environment::builder().add_variable("x", CelType::Int).build();
    let program = env.compile(&Source::from("10 / x")).unwrap();
    let activation = MapActivation::new().bind("x", 0i64);
    assert!(program.eval(&activation).is_error());
}

#[test]
fn out_of_range_list_index_is_an_error_value() {
    let env = Environment::builder().build();
    let program = env.compile(&Source::from("[1, 2, 3][10]")).unwrap();
    let activation = MapActivation::new();
    assert!(program.eval(&activation).is_error());
}
