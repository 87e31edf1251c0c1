//! The standard function/operator catalog (spec §5). Every entry here
//! is both a [`FunctionDecl`] (consulted by the checker for overload
//! resolution) and, for operators that are not dispatched through the
//! [`crate::common::value::Value`] operator traits directly, a runtime
//! [`OverloadDecl::implementation`].
//!
//! Binary/unary *operators* (`_+_`, `_==_`, `!_`, `_[_]`, ...) are
//! registered here purely so the checker accepts them; the interpreter
//! dispatches them natively against `Value`'s `std::ops` impls and
//! capability traits rather than calling through `implementation`,
//! which keeps the hot path allocation-free. String extensions, regex,
//! and other non-core functions are out of scope (see SPEC_FULL.md §1)
//! and are not registered here; hosts add them via [`crate::env::EnvBuilder::add_function`].

use crate::checker::scope::DeclEnv;
use crate::common::functions::{FunctionDecl, OverloadDecl};
use crate::common::value::{Sizer, Value};
use crate::types::CelType;

fn op(name: &str, arg_types: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::new(name, arg_types, result, false)
}

fn member_op(name: &str, arg_types: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::new(name, arg_types, result, true)
}

fn t_param(name: &str) -> CelType {
    CelType::TypeParam(name.into())
}

/// Registers every standard declaration into a fresh top-level scope.
/// Called once by [`crate::env::EnvBuilder::build`].
pub fn install_standard_declarations(env: &mut DeclEnv) {
    for decl in standard_function_decls() {
        env.declare_function(decl).expect("standard declarations never overlap");
    }
}

fn standard_function_decls() -> Vec<FunctionDecl> {
    use CelType::*;
    let numeric = [Int, UInt, Double];

    let mut decls = Vec::new();

    macro_rules! decl {
        ($name:expr, $overloads:expr) => {
            decls.push(FunctionDecl::new($name, $overloads))
        };
    }

    // Arithmetic: same-width numeric pairs, plus the documented
    // heterogeneous `+` overloads (string/bytes concat, list concat,
    // duration/timestamp arithmetic).
    let mut add_overloads: Vec<OverloadDecl> = numeric
        .iter()
        .map(|t| op("_+_", vec![t.clone(), t.clone()], t.clone()))
        .collect();
    add_overloads.push(op("add_string", vec![String, String], String));
    add_overloads.push(op("add_bytes", vec![Bytes, Bytes], Bytes));
    add_overloads.push(op("add_list", vec![CelType::list(t_param("T")), CelType::list(t_param("T"))], CelType::list(t_param("T"))));
    add_overloads.push(op("add_duration_duration", vec![Duration, Duration], Duration));
    add_overloads.push(op("add_timestamp_duration", vec![Timestamp, Duration], Timestamp));
    add_overloads.push(op("add_duration_timestamp", vec![Duration, Timestamp], Timestamp));
    decl!("_+_", add_overloads);

    let mut sub_overloads: Vec<OverloadDecl> = numeric
        .iter()
        .map(|t| op("_-_", vec![t.clone(), t.clone()], t.clone()))
        .collect();
    sub_overloads.push(op("subtract_duration_duration", vec![Duration, Duration], Duration));
    sub_overloads.push(op("subtract_timestamp_duration", vec![Timestamp, Duration], Timestamp));
    sub_overloads.push(op("subtract_timestamp_timestamp", vec![Timestamp, Timestamp], Duration));
    decl!("_-_", sub_overloads);

    decl!(
        "_*_",
        numeric.iter().map(|t| op("_*_", vec![t.clone(), t.clone()], t.clone())).collect::<Vec<_>>()
    );
    decl!(
        "_/_",
        numeric.iter().map(|t| op("_/_", vec![t.clone(), t.clone()], t.clone())).collect::<Vec<_>>()
    );
    decl!(
        "_%_",
        vec![Int, UInt].into_iter().map(|t| op("_%_", vec![t.clone(), t.clone()], t)).collect::<Vec<_>>()
    );
    decl!(
        "-_",
        vec![Int, Double].into_iter().map(|t| op("negate", vec![t.clone()], t)).collect::<Vec<_>>()
    );

    // Logical.
    decl!("!_", vec![op("logical_not", vec![Bool], Bool)]);
    decl!("_&&_", vec![op("logical_and", vec![Bool, Bool], Bool)]);
    decl!("_||_", vec![op("logical_or", vec![Bool, Bool], Bool)]);
    decl!("_?_:_", vec![op("conditional", vec![Bool, t_param("T"), t_param("T")], t_param("T"))]);

    // Equality: generic over any pair (structural_eq/cel_eq handle the
    // cross-type promotions and the "disjoint types compare false" rule).
    decl!("_==_", vec![op("equals", vec![Dyn, Dyn], Bool)]);
    decl!("_!=_", vec![op("not_equals", vec![Dyn, Dyn], Bool)]);

    // Ordering: same-type pairs plus the three cross-numeric promotions.
    let cmp_pairs: Vec<(CelType, CelType)> = vec![
        (Int, Int),
        (UInt, UInt),
        (Double, Double),
        (String, String),
        (Bytes, Bytes),
        (Bool, Bool),
        (Timestamp, Timestamp),
        (Duration, Duration),
        (Int, Double),
        (Double, Int),
        (UInt, Double),
        (Double, UInt),
        (Int, UInt),
        (UInt, Int),
    ];
    for (name, overload_prefix) in [("_<_", "less"), ("_<=_", "less_equals"), ("_>_", "greater"), ("_>=_", "greater_equals")] {
        let overloads = cmp_pairs
            .iter()
            .map(|(a, b)| op(&format!("{overload_prefix}_{a}_{b}"), vec![a.clone(), b.clone()], Bool))
            .collect::<Vec<_>>();
        decl!(name, overloads);
    }

    // Indexing and membership.
    decl!(
        "_[_]",
        vec![
            op("index_list", vec![CelType::list(t_param("T")), Int], t_param("T")),
            op("index_list_uint", vec![CelType::list(t_param("T")), UInt], t_param("T")),
            op("index_map", vec![CelType::map(t_param("K"), t_param("V")), t_param("K")], t_param("V")),
        ]
    );
    decl!(
        "@in",
        vec![
            op("in_list", vec![t_param("T"), CelType::list(t_param("T"))], Bool),
            op("in_map", vec![t_param("K"), CelType::map(t_param("K"), t_param("V"))], Bool),
        ]
    );

    // size(): both the global form `size(x)` and the member form `x.size()`.
    let size_targets = [String, Bytes, CelType::list(Dyn), CelType::map(Dyn, Dyn)];
    let size_overloads = size_targets
        .iter()
        .map(|t| op("size", vec![t.clone()], Int))
        .chain(size_targets.iter().map(|t| member_op("size", vec![t.clone()], Int)))
        .collect::<Vec<_>>();
    decl!("size", size_overloads);

    // type(x) — reified type value, generic over everything.
    decl!("type", vec![op("type", vec![Dyn], CelType::type_of(Dyn))]);

    // Conversions. Faithful to the commonly supported subset; see
    // DESIGN.md for what was left out (bytes<->string charset edge
    // cases, proto Any unpacking).
    decl!(
        "int",
        vec![
            op("int64_to_int64", vec![Int], Int),
            op("uint64_to_int64", vec![UInt], Int),
            op("double_to_int64", vec![Double], Int),
            op("string_to_int64", vec![String], Int),
            op("timestamp_to_int64", vec![Timestamp], Int),
        ]
    );
    decl!(
        "uint",
        vec![
            op("uint64_to_uint64", vec![UInt], UInt),
            op("int64_to_uint64", vec![Int], UInt),
            op("double_to_uint64", vec![Double], UInt),
            op("string_to_uint64", vec![String], UInt),
        ]
    );
    decl!(
        "double",
        vec![
            op("double_to_double", vec![Double], Double),
            op("int64_to_double", vec![Int], Double),
            op("uint64_to_double", vec![UInt], Double),
            op("string_to_double", vec![String], Double),
        ]
    );
    decl!(
        "string",
        vec![
            op("string_to_string", vec![String], String),
            op("int64_to_string", vec![Int], String),
            op("uint64_to_string", vec![UInt], String),
            op("double_to_string", vec![Double], String),
            op("bytes_to_string", vec![Bytes], String),
            op("bool_to_string", vec![Bool], String),
            op("timestamp_to_string", vec![Timestamp], String),
            op("duration_to_string", vec![Duration], String),
        ]
    );
    decl!(
        "bytes",
        vec![op("bytes_to_bytes", vec![Bytes], Bytes), op("string_to_bytes", vec![String], Bytes)]
    );
    decl!("bool", vec![op("string_to_bool", vec![String], Bool), op("bool_to_bool", vec![Bool], Bool)]);
    decl!("dyn", vec![op("to_dyn", vec![Dyn], Dyn)]);
    decl!(
        "timestamp",
        vec![op("string_to_timestamp", vec![String], Timestamp), op("int64_to_timestamp", vec![Int], Timestamp)]
    );
    decl!("duration", vec![op("string_to_duration", vec![String], Duration)]);

    decls
}

/// Native evaluation for the conversion/size/type builtins (the
/// operators proper are dispatched directly against `Value` by the
/// interpreter). Called with the already-evaluated argument list in
/// declaration order (receiver first for member-style calls).
pub fn call_builtin(function: &str, _overload_id: &str, args: &[Value]) -> Option<Value> {
    match function {
        "size" => Some(args[0].cel_size()),
        "type" => Some(Value::Type(args[0].cel_type())),
        "int" => Some(convert_int(&args[0])),
        "uint" => Some(convert_uint(&args[0])),
        "double" => Some(convert_double(&args[0])),
        "string" => Some(convert_string(&args[0])),
        "bytes" => Some(convert_bytes(&args[0])),
        "bool" => Some(convert_bool(&args[0])),
        "dyn" => Some(args[0].clone()),
        #[cfg(feature = "chrono")]
        "timestamp" => Some(convert_timestamp(&args[0])),
        #[cfg(feature = "chrono")]
        "duration" => Some(convert_duration(&args[0])),
        _ => None,
    }
}

fn convert_int(v: &Value) -> Value {
    match v {
        Value::Int(i) => Value::Int(*i),
        Value::UInt(u) => i64::try_from(*u).map(Value::Int).unwrap_or_else(|_| Value::error("range error: uint out of int range")),
        Value::Double(d) => {
            if d.is_finite() && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                Value::Int(*d as i64)
            } else {
                Value::error("range error: double out of int range")
            }
        }
        Value::String(s) => s.parse::<i64>().map(Value::Int).unwrap_or_else(|_| Value::error(format!("invalid format: '{s}' is not an int"))),
        #[cfg(feature = "chrono")]
        Value::Timestamp(t) => Value::Int(t.timestamp()),
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("int"),
    }
}

fn convert_uint(v: &Value) -> Value {
    match v {
        Value::UInt(u) => Value::UInt(*u),
        Value::Int(i) => u64::try_from(*i).map(Value::UInt).unwrap_or_else(|_| Value::error("range error: int out of uint range")),
        Value::Double(d) => {
            if d.is_finite() && *d >= 0.0 && *d <= u64::MAX as f64 {
                Value::UInt(*d as u64)
            } else {
                Value::error("range error: double out of uint range")
            }
        }
        Value::String(s) => s.parse::<u64>().map(Value::UInt).unwrap_or_else(|_| Value::error(format!("invalid format: '{s}' is not a uint"))),
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("uint"),
    }
}

fn convert_double(v: &Value) -> Value {
    match v {
        Value::Double(d) => Value::Double(*d),
        Value::Int(i) => Value::Double(*i as f64),
        Value::UInt(u) => Value::Double(*u as f64),
        Value::String(s) => s.parse::<f64>().map(Value::Double).unwrap_or_else(|_| Value::error(format!("invalid format: '{s}' is not a double"))),
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("double"),
    }
}

fn convert_string(v: &Value) -> Value {
    match v {
        Value::String(s) => Value::String(s.clone()),
        Value::Int(i) => Value::String(i.to_string().into()),
        Value::UInt(u) => Value::String(u.to_string().into()),
        Value::Double(d) => Value::String(d.to_string().into()),
        Value::Bool(b) => Value::String(b.to_string().into()),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.into()),
            Err(_) => Value::error("invalid format: bytes are not valid UTF-8"),
        },
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("string"),
    }
}

fn convert_bytes(v: &Value) -> Value {
    match v {
        Value::Bytes(b) => Value::Bytes(b.clone()),
        Value::String(s) => Value::Bytes(s.as_bytes().to_vec().into()),
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("bytes"),
    }
}

fn convert_bool(v: &Value) -> Value {
    match v {
        Value::Bool(b) => Value::Bool(*b),
        Value::String(s) => match s.as_ref() {
            "true" | "True" | "TRUE" | "1" => Value::Bool(true),
            "false" | "False" | "FALSE" | "0" => Value::Bool(false),
            _ => Value::error(format!("invalid format: '{s}' is not a bool")),
        },
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("bool"),
    }
}

#[cfg(feature = "chrono")]
fn convert_timestamp(v: &Value) -> Value {
    match v {
        Value::Timestamp(t) => Value::Timestamp(*t),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(Value::Timestamp)
            .unwrap_or_else(|_| Value::error(format!("invalid format: '{s}' is not RFC 3339"))),
        Value::Int(i) => chrono::DateTime::from_timestamp(*i, 0)
            .map(|t| Value::Timestamp(t.fixed_offset()))
            .unwrap_or_else(|| Value::error("range error: int out of timestamp range")),
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("timestamp"),
    }
}

#[cfg(feature = "chrono")]
fn convert_duration(v: &Value) -> Value {
    match v {
        Value::Duration(d) => Value::Duration(*d),
        Value::String(s) => parse_duration_literal(s).map(Value::Duration).unwrap_or_else(|| Value::error(format!("invalid format: '{s}' is not a duration"))),
        Value::Error(_) | Value::Unknown(_) => v.clone(),
        _ => Value::no_such_overload("duration"),
    }
}

/// Parses `"72h3m0.5s"`-style duration literals (the subset of units
/// CEL defines: `h`, `m`, `s`, `ms`, `us`, `ns`).
#[cfg(feature = "chrono")]
fn parse_duration_literal(s: &str) -> Option<chrono::Duration> {
    let mut rest = s;
    let negative = if let Some(r) = rest.strip_prefix('-') {
        rest = r;
        true
    } else {
        false
    };
    if rest.is_empty() {
        return None;
    }
    let mut total = chrono::Duration::zero();
    while !rest.is_empty() {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(rest.len());
        if digits_end == 0 {
            return None;
        }
        let (num, tail) = rest.split_at(digits_end);
        let unit_end = tail.find(|c: char| c.is_ascii_digit()).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let value: f64 = num.parse().ok()?;
        let nanos = match unit {
            "h" => value * 3_600_000_000_000.0,
            "m" => value * 60_000_000_000.0,
            "s" => value * 1_000_000_000.0,
            "ms" => value * 1_000_000.0,
            "us" => value * 1_000.0,
            "ns" => value,
            _ => return None,
        };
        total += chrono::Duration::nanoseconds(nanos as i64);
        rest = tail;
    }
    Some(if negative { -total } else { total })
}
