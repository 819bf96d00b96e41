//! Typed values produced by schema parsing

use distance_core::{Error, Quat, Result, Vec3};

/// A parsed field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent (optional field read as its sentinel, or a skipped branch)
    None,
    Bool(bool),
    /// Signed integer of any width
    Int(i64),
    /// Unsigned integer of any width
    UInt(u64),
    F32(f32),
    F64(f64),
    Str(String),
    /// Opaque bytes (remainders, fixed blobs)
    Bytes(Vec<u8>),
    Vec3(Vec3),
    Quat(Quat),
    /// Array of values
    List(Vec<Value>),
    /// Nested struct
    Record(Record),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Integer view across signed and unsigned storage
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Whether the value is truthy, for field conditions
    pub fn is_true(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::UInt(v) => *v != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            _ => true,
        }
    }

    /// Short type name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Vec3(_) => "vec3",
            Value::Quat(_) => "quat",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::json!(*v),
            Value::UInt(v) => serde_json::json!(*v),
            Value::F32(v) => serde_json::json!(*v),
            Value::F64(v) => serde_json::json!(*v),
            Value::Str(v) => serde_json::Value::String(v.clone()),
            Value::Bytes(v) => {
                let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
                serde_json::Value::String(hex)
            }
            Value::Vec3(v) => serde_json::json!([v.x, v.y, v.z]),
            Value::Quat(q) => serde_json::json!([q.x, q.y, q.z, q.w]),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(r) => r.to_json(),
        }
    }
}

/// Ordered named fields of a struct
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(&'static str, Value)>,
    /// Index of the first field that was filled from its default because the
    /// section ended; such trailing fields are not emitted until one is set
    pub(crate) truncated_at: Option<usize>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push(&mut self, name: &'static str, value: Value) {
        self.fields.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Typed read of a field
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get(name)
            .ok_or_else(|| Error::schema(name, "no such field"))?;
        T::from_value(value).map_err(|e| match e {
            Error::Schema { message, .. } => Error::schema(name, message),
            other => other,
        })
    }

    /// Replace an existing field; returns whether the value changed
    pub fn set(&mut self, name: &str, value: Value) -> Result<bool> {
        let index = self
            .fields
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| Error::schema(name, "no such field"))?;
        if self.fields[index].1 == value {
            return Ok(false);
        }
        self.fields[index].1 = value;
        // Any explicit write makes the whole record emitted
        self.truncated_at = None;
        Ok(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(n, _)| *n)
    }

    /// Whether trailing default-filled fields are withheld from emission
    pub fn is_truncated(&self) -> bool {
        self.truncated_at.is_some()
    }

    /// Convert to a JSON object, in field order
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Conversion out of a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

/// Conversion into a [`Value`]
pub trait IntoValue {
    fn into_value(self) -> Value;
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::schema("", format!("expected {expected}, found {}", value.kind()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(_) | Value::UInt(_) => Ok(value.as_u64().unwrap_or(1) != 0),
            _ => Err(mismatch("bool", value)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

macro_rules! int_value {
    ($variant:ident, $via:ident: $($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let out_of_range = || Error::ValueOutOfRange {
                        codec: stringify!($ty),
                        value: format!("{value:?}"),
                    };
                    match value {
                        Value::Int(_) | Value::UInt(_) | Value::Bool(_) => {
                            let wide = value.$via().ok_or_else(out_of_range)?;
                            <$ty>::try_from(wide).map_err(|_| out_of_range())
                        }
                        _ => Err(mismatch(stringify!($ty), value)),
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self.into())
                }
            }
        )*
    };
}

int_value!(UInt, as_u64: u8, u16, u32, u64);
int_value!(Int, as_i64: i8, i16, i32, i64);

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::F32(v) => Ok(*v),
            _ => value.as_f64().map(|v| v as f32).ok_or_else(|| mismatch("f32", value)),
        }
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::F32(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::F64(self)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_str().map(str::to_owned).ok_or_else(|| mismatch("str", value))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl FromValue for Vec3 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Vec3(v) => Ok(*v),
            _ => Err(mismatch("vec3", value)),
        }
    }
}

impl IntoValue for Vec3 {
    fn into_value(self) -> Value {
        Value::Vec3(self)
    }
}

impl FromValue for Quat {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Quat(q) => Ok(*q),
            _ => Err(mismatch("quat", value)),
        }
    }
}

impl IntoValue for Quat {
    fn into_value(self) -> Value {
        Value::Quat(self)
    }
}

impl FromValue for Record {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_record().cloned().ok_or_else(|| mismatch("record", value))
    }
}

impl IntoValue for Record {
    fn into_value(self) -> Value {
        Value::Record(self)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => Err(mismatch("list", value)),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}
