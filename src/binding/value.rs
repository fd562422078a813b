//! Typed parameter values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::dispatch::HandlerError;

/// Declared type of an endpoint parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// UTF-8 text, taken verbatim after percent decoding.
    Str,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// High-precision decimal.
    Decimal,
    /// A type only a parse-value hook knows how to produce.
    Custom(&'static str),
}

impl ParamKind {
    /// Human-readable type name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Str => "string",
            ParamKind::Int => "int",
            ParamKind::Long => "long",
            ParamKind::Float => "float",
            ParamKind::Double => "double",
            ParamKind::Decimal => "decimal",
            ParamKind::Custom(name) => name,
        }
    }

    /// Whether `value` can stand in for an argument of this kind, with the
    /// same widening the typed accessors apply. `Null` always can.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ParamKind::Str, Value::Str(_))
                | (ParamKind::Int, Value::Int(_))
                | (ParamKind::Long, Value::Int(_) | Value::Long(_))
                | (ParamKind::Float, Value::Float(_))
                | (ParamKind::Double, Value::Float(_) | Value::Double(_))
                | (ParamKind::Decimal, Value::Decimal(_))
                | (ParamKind::Custom(_), Value::Custom(_))
        )
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bound argument value.
#[derive(Clone)]
pub enum Value {
    /// Absent value of an optional parameter.
    Null,
    Str(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    /// Value supplied by a parse-value hook for a custom parameter type.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary value produced by a parse-value hook.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Value::Custom(Arc::new(value))
    }

    /// Type name of the held value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Custom(_) => "custom",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Long(v) => f.debug_tuple("Long").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Value::Decimal(v) => f.debug_tuple("Decimal").field(v).finish(),
            Value::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

/// Conversion out of a bound [`Value`].
///
/// Widening is allowed (`int` reads as `i64`, `float` as `f64`); narrowing is not.
pub trait FromValue: Sized {
    /// Rust type name reported when the conversion fails.
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "long";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "double";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for Decimal {
    const EXPECTED: &'static str = "decimal";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Decimal(v) => Some(*v),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Arguments bound for one endpoint invocation, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    /// Raw value of the named argument.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value)
    }

    /// Typed value of the named argument.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, HandlerError> {
        let value = self.value(name).ok_or_else(|| HandlerError::MissingArgument {
            name: name.to_string(),
        })?;
        T::from_value(value).ok_or_else(|| HandlerError::ArgumentType {
            name: name.to_string(),
            expected: T::EXPECTED,
            found: value.type_name(),
        })
    }

    /// Value produced by a parse-value hook for a custom parameter.
    pub fn custom<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, HandlerError> {
        let value = self.value(name).ok_or_else(|| HandlerError::MissingArgument {
            name: name.to_string(),
        })?;
        let mismatch = || HandlerError::ArgumentType {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
            found: value.type_name(),
        };
        match value {
            Value::Custom(inner) => Arc::clone(inner).downcast::<T>().map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Arguments {
        let mut args = Arguments::new();
        args.push("count", Value::Int(3));
        args.push("name", Value::from("widget"));
        args.push("page", Value::Null);
        args.push("tag", Value::custom(vec![1u8, 2, 3]));
        args
    }

    #[test]
    fn test_typed_access() {
        let args = sample();
        assert_eq!(args.get::<i32>("count").unwrap(), 3);
        assert_eq!(args.get::<i64>("count").unwrap(), 3);
        assert_eq!(args.get::<String>("name").unwrap(), "widget");
        assert_eq!(args.get::<Option<i32>>("page").unwrap(), None);
        assert_eq!(args.get::<Option<i32>>("count").unwrap(), Some(3));
    }

    #[test]
    fn test_type_mismatch_reported() {
        let args = sample();
        match args.get::<i32>("name") {
            Err(HandlerError::ArgumentType { name, expected, found }) => {
                assert_eq!(name, "name");
                assert_eq!(expected, "int");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            args.get::<i32>("missing"),
            Err(HandlerError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_custom_downcast() {
        let args = sample();
        assert_eq!(*args.custom::<Vec<u8>>("tag").unwrap(), vec![1, 2, 3]);
        assert!(args.custom::<String>("tag").is_err());
        assert!(args.custom::<String>("name").is_err());
    }

    #[test]
    fn test_declaration_order_preserved() {
        let args = sample();
        let names: Vec<&str> = args.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["count", "name", "page", "tag"]);
    }
}
