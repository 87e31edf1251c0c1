//! The type registry: the adapter between host-native values (Rust
//! structs, `serde_json::Value`) and CEL values, and the source of
//! object-type descriptors the checker consults when it sees a
//! qualified type name.

use crate::common::value::Value;
use crate::types::CelType;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::trace;

/// A host-supplied structured message. Implementations expose their
/// fields by name; `Arc<dyn CelStruct>` is the safe trait-object
/// stand-in for the upstream project's unsafe Arc-vtable `ObjectValue`
/// (see DESIGN.md for why the unsafe form was not carried forward).
pub trait CelStruct: Debug + Send + Sync {
    fn type_name(&self) -> &str;
    fn field(&self, name: &str) -> Option<Value>;
    fn field_names(&self) -> Vec<&str>;
    fn eq_struct(&self, other: &dyn CelStruct) -> bool {
        self.type_name() == other.type_name()
            && self
                .field_names()
                .into_iter()
                .all(|name| self.field(name) == other.field(name))
    }
}

/// The [`CelStruct`] produced by evaluating a message-construction
/// expression (`pkg.Msg{field: value}`) against a registered
/// [`TypeDescriptor`). Field values not supplied in the literal default
/// to their declared type's zero value is out of scope here: CEL
/// construction requires every referenced field to be given explicitly
/// or simply absent (read back as "no such field" rather than a zero
/// value), matching proto3's "unset means absent" semantics for the
/// subset this crate implements without full proto reflection.
#[derive(Debug, Clone)]
pub struct DynStruct {
    type_name: Arc<str>,
    fields: Arc<hashbrown::HashMap<Arc<str>, Value>>,
}

impl DynStruct {
    pub fn new(type_name: impl Into<Arc<str>>, fields: hashbrown::HashMap<Arc<str>, Value>) -> Self {
        DynStruct {
            type_name: type_name.into(),
            fields: Arc::new(fields),
        }
    }
}

impl CelStruct for DynStruct {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(|k| k.as_ref()).collect()
    }
}

/// One field on a registered message type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: Arc<str>,
    pub number: i32,
    pub cel_type: CelType,
    pub presence_supported: bool,
    pub is_wrapper: bool,
}

/// A descriptor for a host-registered message type, mirroring the wire
/// shape of the standard CEL type protocol (kind + shape-specific
/// fields, per §6).
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub qualified_name: Arc<str>,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name.as_ref() == name)
    }
}

/// The per-environment registry. Registration happens up front at
/// environment construction; after that it is read-only and freely
/// shared across threads (§5).
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: Arc<hashbrown::HashMap<Arc<str>, TypeDescriptor>>,
    enums: Arc<hashbrown::HashMap<Arc<str>, i64>>,
}

#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    types: hashbrown::HashMap<Arc<str>, TypeDescriptor>,
    enums: hashbrown::HashMap<Arc<str>, i64>,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        trace!(type_name = %descriptor.qualified_name, "registering message type");
        self.types.insert(descriptor.qualified_name.clone(), descriptor);
        self
    }

    pub fn register_enum_value(&mut self, qualified_name: impl Into<Arc<str>>, value: i64) -> &mut Self {
        self.enums.insert(qualified_name.into(), value);
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            types: Arc::new(self.types),
            enums: Arc::new(self.enums),
        }
    }
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::new()
    }

    pub fn lookup_type(&self, qualified_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(qualified_name)
    }

    pub fn lookup_enum(&self, qualified_name: &str) -> Option<i64> {
        self.enums.get(qualified_name).copied()
    }
}

/// Converts a `serde_json::Value` into a [`Value`]: objects become CEL
/// maps, arrays become CEL lists, scalars map directly. Behind the
/// `json` feature, per §4.5A.
#[cfg(feature = "json")]
pub fn json_to_value(json: &serde_json::Value) -> Value {
    use crate::common::value::{MapKey, ValueMap};
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Double(f)
            } else {
                Value::error("invalid format: unrepresentable JSON number")
            }
        }
        serde_json::Value::String(s) => Value::String(Arc::from(s.as_str())),
        serde_json::Value::Array(arr) => Value::List(Arc::new(arr.iter().map(json_to_value).collect())),
        serde_json::Value::Object(obj) => {
            let mut m = ValueMap::new();
            for (k, v) in obj {
                m.insert(MapKey::String(Arc::from(k.as_str())), json_to_value(v));
            }
            Value::Map(Arc::new(m))
        }
    }
}

/// The inverse of [`json_to_value`]. Bytes round-trip as base64 text,
/// matching proto3 JSON's bytes encoding (the only lossless text
/// representation for arbitrary byte strings).
#[cfg(feature = "json")]
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, String> {
    use base64::Engine;
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Int(i) => Ok(serde_json::Value::Number((*i).into())),
        Value::UInt(u) => Ok(serde_json::Value::Number((*u).into())),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .ok_or_else(|| "range error: non-finite double has no JSON representation".to_string()),
        Value::String(s) => Ok(serde_json::Value::String(s.to_string())),
        Value::Bytes(b) => Ok(serde_json::Value::String(
            base64::engine::general_purpose::STANDARD.encode(b.as_ref()),
        )),
        Value::List(l) => l
            .iter()
            .map(value_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array),
        Value::Map(m) => {
            let mut obj = serde_json::Map::new();
            for k in m.keys() {
                let v = m.get(&k.clone().into_value()).unwrap();
                obj.insert(k.to_string(), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(obj))
        }
        Value::Optional(Some(inner)) => value_to_json(inner),
        Value::Optional(None) => Ok(serde_json::Value::Null),
        Value::Error(e) => Err(e.to_string()),
        other => Err(format!("no JSON representation for {other}")),
    }
}
