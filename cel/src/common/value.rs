//! The runtime value system.
//!
//! CEL values are represented as a closed tagged sum rather than a
//! trait-object hierarchy: [`Value`] is the single concrete type that
//! flows through planning and evaluation, and the "capability" traits
//! described by the spec ([`Sizer`], [`Container`], [`Indexer`],
//! [`Comparer`], [`Iterable`]) are implemented directly on `Value`,
//! each returning a `no such overload` error for variants that do not
//! support the operation. Arithmetic is exposed through the standard
//! `std::ops` traits on `&Value`, which is the idiomatic Rust shape for
//! "these two values combine via `+`" and keeps call sites looking like
//! ordinary operator expressions.
//!
//! A value is exactly one of concrete, error, or unknown, and once
//! constructed it never mutates; every operation below produces a new
//! `Value`.

use crate::ast::NodeId;
use crate::registry::CelStruct;
use crate::types::CelType;
use std::cmp::Ordering;
use std::fmt;
use std::ops;
use std::sync::Arc;

#[cfg(feature = "chrono")]
pub type CelTimestamp = chrono::DateTime<chrono::FixedOffset>;
#[cfg(not(feature = "chrono"))]
pub type CelTimestamp = i64; // seconds since epoch

#[cfg(feature = "chrono")]
pub type CelDuration = chrono::Duration;
#[cfg(not(feature = "chrono"))]
pub type CelDuration = i64; // nanoseconds

/// The in-language error value. Distinct from [`crate::common::error`],
/// which covers Rust-level host misuse; this is CEL data that
/// propagates through operators exactly like any other [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub struct CelErrorValue {
    pub message: Arc<str>,
}

impl CelErrorValue {
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        CelErrorValue {
            message: message.into(),
        }
    }
}

impl fmt::Display for CelErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// An ordered set of node ids responsible for an [`Value::Unknown`],
/// ordered by first occurrence so that residual reconstruction and
/// unknown equality are both deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownSet(Vec<NodeId>);

impl UnknownSet {
    pub fn single(id: NodeId) -> Self {
        UnknownSet(vec![id])
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.0
    }

    pub fn union(&self, other: &UnknownSet) -> UnknownSet {
        let mut out = self.0.clone();
        for id in &other.0 {
            if !out.contains(id) {
                out.push(*id);
            }
        }
        UnknownSet(out)
    }
}

/// A map key. CEL map keys are bool, int, uint, or string; int/uint
/// lookups cross-convert when the other width represents the same
/// value (see [`ValueMap::get`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    UInt(u64),
    String(Arc<str>),
}

impl MapKey {
    pub fn into_value(self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(b),
            MapKey::Int(i) => Value::Int(i),
            MapKey::UInt(u) => Value::UInt(u),
            MapKey::String(s) => Value::String(s),
        }
    }

    fn from_value(v: &Value) -> Option<MapKey> {
        match v {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::UInt(u) => Some(MapKey::UInt(*u)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{b}"),
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::UInt(u) => write!(f, "{u}"),
            MapKey::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// A CEL map. Preserves insertion order for iteration (comprehensions
/// iterate map keys in the order the map was built).
#[derive(Debug, Clone)]
pub struct ValueMap {
    entries: hashbrown::HashMap<MapKey, Value>,
    order: Vec<MapKey>,
}

impl ValueMap {
    pub fn new() -> Self {
        ValueMap {
            entries: hashbrown::HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: MapKey, value: Value) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.order.iter()
    }

    /// Looks up `key`, implicitly converting between int and uint
    /// representations of the same key when an exact-type match misses.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        let mk = MapKey::from_value(key)?;
        if let Some(v) = self.entries.get(&mk) {
            return Some(v);
        }
        match mk {
            MapKey::Int(i) => u64::try_from(i).ok().and_then(|u| self.entries.get(&MapKey::UInt(u))),
            MapKey::UInt(u) => i64::try_from(u).ok().and_then(|i| self.entries.get(&MapKey::Int(i))),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }
}

impl Default for ValueMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.order.iter().all(|k| {
            let a = self.entries.get(k);
            let b = other.entries.get(k);
            matches!((a, b), (Some(a), Some(b)) if matches!(a.cel_eq(b), Value::Bool(true)))
        })
    }
}

impl FromIterator<(MapKey, Value)> for ValueMap {
    fn from_iter<T: IntoIterator<Item = (MapKey, Value)>>(iter: T) -> Self {
        let mut m = ValueMap::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

/// The runtime value. See the module docs for the capability-trait
/// design rationale.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    List(Arc<Vec<Value>>),
    Map(Arc<ValueMap>),
    Duration(CelDuration),
    Timestamp(CelTimestamp),
    /// A reified type, the result of `type(x)` or a bare type identifier.
    Type(CelType),
    Struct(Arc<dyn CelStruct>),
    Optional(Option<Box<Value>>),
    Error(Arc<CelErrorValue>),
    Unknown(UnknownSet),
}

impl Value {
    pub fn error(message: impl Into<Arc<str>>) -> Value {
        Value::Error(Arc::new(CelErrorValue::new(message)))
    }

    pub fn no_such_attribute(name: &str) -> Value {
        Value::error(format!("no such attribute: {name}"))
    }

    pub fn no_such_overload(function: &str) -> Value {
        Value::error(format!("no such overload: {function}"))
    }

    pub fn no_such_key(key: &Value) -> Value {
        Value::error(format!("no such key: {}", display_key(key)))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    pub fn unknown_set(&self) -> Option<&UnknownSet> {
        match self {
            Value::Unknown(u) => Some(u),
            _ => None,
        }
    }

    /// True/false only for a concrete `Value::Bool`; everything else
    /// (including error and unknown) is neither.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn cel_type(&self) -> CelType {
        match self {
            Value::Null => CelType::Null,
            Value::Bool(_) => CelType::Bool,
            Value::Int(_) => CelType::Int,
            Value::UInt(_) => CelType::UInt,
            Value::Double(_) => CelType::Double,
            Value::String(_) => CelType::String,
            Value::Bytes(_) => CelType::Bytes,
            Value::List(l) => CelType::list(l.first().map(Value::cel_type).unwrap_or(CelType::Dyn)),
            Value::Map(_) => CelType::map(CelType::Dyn, CelType::Dyn),
            Value::Duration(_) => CelType::Duration,
            Value::Timestamp(_) => CelType::Timestamp,
            Value::Type(t) => CelType::type_of(t.clone()),
            Value::Struct(s) => CelType::Object(s.type_name().into()),
            Value::Optional(inner) => inner
                .as_ref()
                .map(|v| CelType::Wrapper(Box::new(v.cel_type())))
                .unwrap_or(CelType::Wrapper(Box::new(CelType::Dyn))),
            Value::Error(_) => CelType::Error,
            Value::Unknown(_) => CelType::Dyn,
        }
    }

    /// Structural equality per spec §4.5: disjoint primitive types
    /// compare unequal (not an error) except the documented int/double
    /// and uint/double promotions; errors and unknowns propagate.
    pub fn cel_eq(&self, other: &Value) -> Value {
        if let Some(v) = propagate(&[self, other]) {
            return v;
        }
        Value::Bool(structural_eq(self, other))
    }

    pub fn cel_ne(&self, other: &Value) -> Value {
        match self.cel_eq(other) {
            Value::Bool(b) => Value::Bool(!b),
            other => other,
        }
    }
}

fn display_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => format!("{v:?}"),
    }
}

/// If any operand is an error, returns that error (first one found); if
/// none are errors but any is unknown, returns the union of unknown
/// id-sets. Otherwise `None`, meaning the caller should proceed with
/// concrete evaluation. This is the generic (non-short-circuit)
/// propagation rule; short-circuit operators implement their own logic
/// instead of calling this.
pub fn propagate(operands: &[&Value]) -> Option<Value> {
    for v in operands {
        if v.is_error() {
            return Some((*v).clone());
        }
    }
    let mut unknown: Option<UnknownSet> = None;
    for v in operands {
        if let Value::Unknown(u) = v {
            unknown = Some(match unknown {
                Some(acc) => acc.union(u),
                None => u.clone(),
            });
        }
    }
    unknown.map(Value::Unknown)
}

fn structural_eq(a: &Value, b: &Value) -> bool {
    use Value::*;
    match (a, b) {
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (UInt(x), UInt(y)) => x == y,
        (Double(x), Double(y)) => x == y,
        (String(x), String(y)) => x == y,
        (Bytes(x), Bytes(y)) => x == y,
        (Duration(x), Duration(y)) => x == y,
        (Timestamp(x), Timestamp(y)) => x == y,
        (Type(x), Type(y)) => x == y,
        (Optional(x), Optional(y)) => match (x, y) {
            (Some(x), Some(y)) => structural_eq(x, y),
            (None, None) => true,
            _ => false,
        },
        (List(x), List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| matches!(a.cel_eq(b), Bool(true)))
        }
        (Map(x), Map(y)) => x == y,
        (Struct(x), Struct(y)) => x.type_name() == y.type_name() && x.eq_struct(y.as_ref()),
        // documented numeric promotions
        (Int(x), Double(y)) | (Double(y), Int(x)) => (*x as f64) == *y,
        (UInt(x), Double(y)) | (Double(y), UInt(x)) => (*x as f64) == *y,
        (Int(x), UInt(y)) | (UInt(y), Int(x)) => i64::try_from(*y).map(|y| *x == y).unwrap_or(false),
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.cel_eq(other), Value::Bool(true))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}u"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, k) in m.keys().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {}", m.get(&k.clone().into_value()).unwrap())?;
                }
                write!(f, "}}")
            }
            Value::Duration(_) => write!(f, "duration"),
            Value::Timestamp(_) => write!(f, "timestamp"),
            Value::Type(t) => write!(f, "type({t})"),
            Value::Struct(s) => write!(f, "{s:?}"),
            Value::Optional(Some(v)) => write!(f, "optional({v})"),
            Value::Optional(None) => write!(f, "optional.none()"),
            Value::Error(e) => write!(f, "error: {e}"),
            Value::Unknown(u) => write!(f, "unknown{:?}", u.ids()),
        }
    }
}

/// Ordering for `< <= > >=`. `None` means "no such overload" (the
/// caller maps that back to an error value); cross-numeric comparisons
/// between int/uint/double are defined (see DESIGN.md), everything else
/// requires matching types.
pub trait Comparer {
    fn cel_cmp(&self, other: &Value) -> Option<Ordering>;
}

impl Comparer for Value {
    fn cel_cmp(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a.partial_cmp(b),
            (UInt(a), UInt(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Int(a), Double(b)) => (*a as f64).partial_cmp(b),
            (Double(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (UInt(a), Double(b)) => (*a as f64).partial_cmp(b),
            (Double(a), UInt(b)) => a.partial_cmp(&(*b as f64)),
            (Int(a), UInt(b)) => i64::try_from(*b).ok().and_then(|b| a.partial_cmp(&b)),
            (UInt(a), Int(b)) => i64::try_from(*a).ok().and_then(|a| a.partial_cmp(b)),
            (String(a), String(b)) => Some(a.as_ref().cmp(b.as_ref())),
            (Bytes(a), Bytes(b)) => Some(a.as_ref().cmp(b.as_ref())),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
            (Duration(a), Duration(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// `size()` — defined on string (code points), bytes, list, and map.
pub trait Sizer {
    fn cel_size(&self) -> Value;
}

impl Sizer for Value {
    fn cel_size(&self) -> Value {
        match self {
            Value::String(s) => Value::Int(s.chars().count() as i64),
            Value::Bytes(b) => Value::Int(b.len() as i64),
            Value::List(l) => Value::Int(l.len() as i64),
            Value::Map(m) => Value::Int(m.len() as i64),
            Value::Error(_) | Value::Unknown(_) => self.clone(),
            _ => Value::no_such_overload("size"),
        }
    }
}

/// The `in` test — membership in a list or map.
pub trait Container {
    fn cel_contains(&self, item: &Value) -> Value;
}

impl Container for Value {
    fn cel_contains(&self, item: &Value) -> Value {
        if let Some(v) = propagate(&[self, item]) {
            return v;
        }
        match self {
            Value::List(l) => Value::Bool(l.iter().any(|e| matches!(e.cel_eq(item), Value::Bool(true)))),
            Value::Map(m) => Value::Bool(m.contains_key(item)),
            Value::String(s) => {
                if let Value::String(sub) = item {
                    Value::Bool(s.contains(sub.as_ref()))
                } else {
                    Value::no_such_overload("in")
                }
            }
            _ => Value::no_such_overload("in"),
        }
    }
}

/// Index access: `list[int]`, `map[key]`.
pub trait Indexer {
    fn cel_index(&self, key: &Value) -> Value;
}

impl Indexer for Value {
    fn cel_index(&self, key: &Value) -> Value {
        if let Some(v) = propagate(&[self, key]) {
            return v;
        }
        match (self, key) {
            (Value::List(l), Value::Int(i)) => {
                if *i < 0 || *i as usize >= l.len() {
                    Value::error(format!("index out of bounds: {i}"))
                } else {
                    l[*i as usize].clone()
                }
            }
            (Value::List(l), Value::UInt(i)) => {
                if *i as usize >= l.len() {
                    Value::error(format!("index out of bounds: {i}"))
                } else {
                    l[*i as usize].clone()
                }
            }
            (Value::Map(m), key) => m.get(key).cloned().unwrap_or_else(|| Value::no_such_key(key)),
            (Value::Struct(s), Value::String(name)) => {
                s.field(name).unwrap_or_else(|| Value::no_such_key(key))
            }
            _ => Value::no_such_overload("_[_]"),
        }
    }
}

/// Iteration for comprehensions: lists iterate elements, maps iterate
/// keys.
pub trait Iterable {
    fn cel_iter(&self) -> Option<Vec<Value>>;
}

impl Iterable for Value {
    fn cel_iter(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(l) => Some(l.as_ref().clone()),
            Value::Map(m) => Some(m.keys().cloned().map(MapKey::into_value).collect()),
            _ => None,
        }
    }
}

impl ops::Sub for &Value {
    type Output = Value;

    fn sub(self, rhs: &Value) -> Value {
        if let Some(v) = propagate(&[self, rhs]) {
            return v;
        }
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .unwrap_or_else(|| Value::error("integer overflow in _-_")),
            (Value::UInt(a), Value::UInt(b)) => a
                .checked_sub(*b)
                .map(Value::UInt)
                .unwrap_or_else(|| Value::error("integer overflow in _-_")),
            (Value::Double(a), Value::Double(b)) => Value::Double(a - b),
            #[cfg(feature = "chrono")]
            (Value::Duration(a), Value::Duration(b)) => Value::Duration(*a - *b),
            #[cfg(feature = "chrono")]
            (Value::Timestamp(a), Value::Duration(b)) => Value::Timestamp(*a - *b),
            #[cfg(feature = "chrono")]
            (Value::Timestamp(a), Value::Timestamp(b)) => Value::Duration(*a - *b),
            _ => Value::no_such_overload("_-_"),
        }
    }
}

impl ops::Mul for &Value {
    type Output = Value;

    fn mul(self, rhs: &Value) -> Value {
        if let Some(v) = propagate(&[self, rhs]) {
            return v;
        }
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .unwrap_or_else(|| Value::error("integer overflow in _*_")),
            (Value::UInt(a), Value::UInt(b)) => a
                .checked_mul(*b)
                .map(Value::UInt)
                .unwrap_or_else(|| Value::error("integer overflow in _*_")),
            (Value::Double(a), Value::Double(b)) => Value::Double(a * b),
            _ => Value::no_such_overload("_*_"),
        }
    }
}

impl ops::Add for &Value {
    type Output = Value;

    fn add(self, rhs: &Value) -> Value {
        if let Some(v) = propagate(&[self, rhs]) {
            return v;
        }
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .unwrap_or_else(|| Value::error("integer overflow in _+_")),
            (Value::UInt(a), Value::UInt(b)) => a
                .checked_add(*b)
                .map(Value::UInt)
                .unwrap_or_else(|| Value::error("integer overflow in _+_")),
            (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
            (Value::String(a), Value::String(b)) => {
                Value::String(Arc::from(format!("{a}{b}")))
            }
            (Value::Bytes(a), Value::Bytes(b)) => {
                let mut v = a.to_vec();
                v.extend_from_slice(b);
                Value::Bytes(Arc::from(v))
            }
            (Value::List(a), Value::List(b)) => {
                let mut v = a.as_ref().clone();
                v.extend(b.as_ref().clone());
                Value::List(Arc::new(v))
            }
            #[cfg(feature = "chrono")]
            (Value::Duration(a), Value::Duration(b)) => Value::Duration(*a + *b),
            #[cfg(feature = "chrono")]
            (Value::Timestamp(a), Value::Duration(b)) => Value::Timestamp(*a + *b),
            #[cfg(feature = "chrono")]
            (Value::Duration(a), Value::Timestamp(b)) => Value::Timestamp(*b + *a),
            _ => Value::no_such_overload("_+_"),
        }
    }
}

impl ops::Div for &Value {
    type Output = Value;

    fn div(self, rhs: &Value) -> Value {
        if let Some(v) = propagate(&[self, rhs]) {
            return v;
        }
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Value::error("divide by zero"),
            (Value::Int(a), Value::Int(b)) => match a.checked_div(*b) {
                Some(v) => Value::Int(v),
                None => Value::error("integer overflow in _/_"),
            },
            (Value::UInt(_), Value::UInt(0)) => Value::error("divide by zero"),
            (Value::UInt(a), Value::UInt(b)) => Value::UInt(a / b),
            (Value::Double(a), Value::Double(b)) => Value::Double(a / b),
            _ => Value::no_such_overload("_/_"),
        }
    }
}

impl ops::Rem for &Value {
    type Output = Value;

    fn rem(self, rhs: &Value) -> Value {
        if let Some(v) = propagate(&[self, rhs]) {
            return v;
        }
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Value::error("modulus by zero"),
            (Value::Int(a), Value::Int(b)) => match a.checked_rem(*b) {
                Some(v) => Value::Int(v),
                None => Value::error("integer overflow in _%_"),
            },
            (Value::UInt(_), Value::UInt(0)) => Value::error("modulus by zero"),
            (Value::UInt(a), Value::UInt(b)) => Value::UInt(a % b),
            _ => Value::no_such_overload("_%_"),
        }
    }
}

impl ops::Neg for &Value {
    type Output = Value;

    fn neg(self) -> Value {
        if self.is_error() || self.is_unknown() {
            return self.clone();
        }
        match self {
            Value::Int(a) => a
                .checked_neg()
                .map(Value::Int)
                .unwrap_or_else(|| Value::error("integer overflow in -_")),
            Value::Double(a) => Value::Double(-a),
            _ => Value::no_such_overload("-_"),
        }
    }
}

impl ops::Not for &Value {
    type Output = Value;

    fn not(self) -> Value {
        match self {
            Value::Bool(b) => Value::Bool(!b),
            Value::Error(_) | Value::Unknown(_) => self.clone(),
            _ => Value::no_such_overload("!_"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Arc::from(v))
    }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(Arc::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_add_overflow_errors() {
        let a = Value::Int(i64::MAX);
        let b = Value::Int(1);
        assert!((&a + &b).is_error());
    }

    #[test]
    fn mixed_width_add_is_no_such_overload() {
        let a = Value::Int(1);
        let b = Value::UInt(1);
        assert!((&a + &b).is_error());
    }

    #[test]
    fn int_division_truncates_toward_zero() {
        assert_eq!(&Value::Int(-7) / &Value::Int(2), Value::Int(-3));
    }

    #[test]
    fn modulo_follows_dividend_sign() {
        assert_eq!(&Value::Int(-7) % &Value::Int(2), Value::Int(-1));
    }

    #[test]
    fn division_by_zero_errors() {
        assert!((&Value::Int(1) / &Value::Int(0)).is_error());
    }

    #[test]
    fn equality_promotes_int_and_double() {
        assert_eq!(Value::Int(3).cel_eq(&Value::Double(3.0)), Value::Bool(true));
    }

    #[test]
    fn equality_disjoint_types_is_false_not_error() {
        assert_eq!(Value::Int(3).cel_eq(&Value::String("3".into())), Value::Bool(false));
    }

    #[test]
    fn error_propagates_through_arithmetic() {
        let err = Value::error("boom");
        let v = &err + &Value::Int(1);
        assert!(v.is_error());
    }

    #[test]
    fn unknown_unions_through_arithmetic() {
        let a = Value::Unknown(UnknownSet::single(1));
        let b = Value::Unknown(UnknownSet::single(2));
        let sum = &a + &b;
        assert_eq!(sum.unknown_set().unwrap().ids(), &[1, 2]);
    }

    #[test]
    fn map_get_converts_between_int_and_uint_keys() {
        let mut m = ValueMap::new();
        m.insert(MapKey::UInt(5), Value::String("five".into()));
        assert_eq!(m.get(&Value::Int(5)), Some(&Value::String("five".into())));
    }
}
