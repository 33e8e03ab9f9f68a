//! The value model used by expression evaluation.
//!
//! The output model knows booleans, numbers, strings, lists and
//! order-preserving objects. On top of those, evaluation needs two states
//! that plain HCL values cannot express:
//!
//! - [`Value::Null`]: an absent value that still remembers the type it was
//!   requested at, so downstream checks can keep going.
//! - [`Value::Unknown`]: a value that cannot be determined at generation
//!   time. Unknowns are placeholders for runtime references (and for scope
//!   roots that already produced an error); operations on them propagate the
//!   unknown-ness along with the best known result type, which is what the
//!   type checker relies on and what keeps one bad reference from producing
//!   a cascade of follow-on errors.

use std::fmt;

use indexmap::IndexMap;

/// The type of a [`Value`]. `Any` is the fully-unconstrained type, used where
/// no better information exists.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Any,
    Bool,
    Number,
    String,
    List(Box<ValueType>),
    Object(IndexMap<String, ValueType>),
}

impl ValueType {
    pub fn list_of(element: ValueType) -> ValueType {
        ValueType::List(Box::new(element))
    }

    /// The common type of two types: their shared type if they agree, `Any`
    /// otherwise.
    pub fn unify(a: &ValueType, b: &ValueType) -> ValueType {
        if a == b {
            a.clone()
        } else {
            ValueType::Any
        }
    }

    /// The element type obtained by indexing into a value of this type.
    pub fn element_type(&self) -> ValueType {
        match self {
            ValueType::List(element) => (**element).clone(),
            _ => ValueType::Any,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Number => write!(f, "number"),
            ValueType::String => write!(f, "string"),
            ValueType::List(element) => write!(f, "list of {}", element),
            ValueType::Object(_) => write!(f, "object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(hcl::Number),
    String(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// An absent value of a particular type.
    Null(ValueType),
    /// A value that is not known at generation time, of a particular type.
    Unknown(ValueType),
}

impl Value {
    pub fn null() -> Value {
        Value::Null(ValueType::Any)
    }

    pub fn unknown() -> Value {
        Value::Unknown(ValueType::Any)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Value::Unknown(_))
    }

    pub fn ty(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::List(elems) => {
                let element = elems
                    .iter()
                    .map(Value::ty)
                    .reduce(|a, b| ValueType::unify(&a, &b))
                    .unwrap_or(ValueType::Any);
                ValueType::list_of(element)
            }
            Value::Object(fields) => ValueType::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.ty()))
                    .collect(),
            ),
            Value::Null(ty) | Value::Unknown(ty) => ty.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Converts the value to the requested type, applying the conversions the
    /// source language permits: number/bool to string, string to number or
    /// bool, and element-wise list and object conversion. Null and unknown
    /// values convert to null and unknown of the requested type.
    pub fn convert(self, ty: &ValueType) -> Result<Value, String> {
        if *ty == ValueType::Any {
            return Ok(self);
        }
        match self {
            Value::Null(_) => Ok(Value::Null(ty.clone())),
            Value::Unknown(_) => Ok(Value::Unknown(ty.clone())),
            Value::Bool(b) => match ty {
                ValueType::Bool => Ok(Value::Bool(b)),
                ValueType::String => Ok(Value::String(b.to_string())),
                _ => Err(format!("bool value cannot be converted to {}", ty)),
            },
            Value::Number(n) => match ty {
                ValueType::Number => Ok(Value::Number(n)),
                ValueType::String => Ok(Value::String(n.to_string())),
                _ => Err(format!("number value cannot be converted to {}", ty)),
            },
            Value::String(s) => match ty {
                ValueType::String => Ok(Value::String(s)),
                ValueType::Number => parse_number(&s)
                    .map(Value::Number)
                    .ok_or_else(|| format!("string {:?} cannot be parsed as a number", s)),
                ValueType::Bool => match s.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(format!("string {:?} cannot be parsed as a bool", s)),
                },
                _ => Err(format!("string value cannot be converted to {}", ty)),
            },
            Value::List(elems) => match ty {
                ValueType::List(element) => {
                    let converted: Result<Vec<Value>, String> =
                        elems.into_iter().map(|v| v.convert(element)).collect();
                    Ok(Value::List(converted?))
                }
                _ => Err(format!("list value cannot be converted to {}", ty)),
            },
            Value::Object(mut fields) => match ty {
                ValueType::Object(field_types) => {
                    let mut converted = IndexMap::new();
                    for (name, field_ty) in field_types {
                        let value = fields
                            .shift_remove(name)
                            .ok_or_else(|| format!("object is missing attribute {:?}", name))?;
                        converted.insert(name.clone(), value.convert(field_ty)?);
                    }
                    Ok(Value::Object(converted))
                }
                _ => Err(format!("object value cannot be converted to {}", ty)),
            },
        }
    }

    /// The JSON encoding of a known value. Unknown values have no JSON
    /// representation; one reaching this point is a bug in the caller.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::to_value(n).expect("number is JSON-representable"),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(elems) => {
                serde_json::Value::Array(elems.iter().map(Value::to_json).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Unknown(_) => panic!("unknown value has no JSON representation"),
        }
    }
}

fn parse_number(s: &str) -> Option<hcl::Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(hcl::Number::from(i));
    }
    s.parse::<f64>().ok().and_then(hcl::Number::from_f64)
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(hcl::Number::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        Value::Number(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Self {
        match value {
            hcl::Value::Null => Value::Null(ValueType::Any),
            hcl::Value::Bool(b) => Value::Bool(b),
            hcl::Value::Number(n) => Value::Number(n),
            hcl::Value::String(s) => Value::String(s),
            hcl::Value::Array(elems) => {
                Value::List(elems.into_iter().map(Value::from).collect())
            }
            hcl::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(name, value)| (name, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_number_to_string() {
        let v = Value::from(42i64).convert(&ValueType::String).unwrap();
        assert_eq!(v, Value::from("42"));
    }

    #[test]
    fn convert_string_to_number() {
        let v = Value::from("7").convert(&ValueType::Number).unwrap();
        assert_eq!(v, Value::from(7i64));
        assert!(Value::from("seven").convert(&ValueType::Number).is_err());
    }

    #[test]
    fn convert_list_elementwise() {
        let v = Value::from(vec![1i64, 2, 3])
            .convert(&ValueType::list_of(ValueType::String))
            .unwrap();
        assert_eq!(v, Value::from(vec!["1", "2", "3"]));
    }

    #[test]
    fn null_and_unknown_retype() {
        let null = Value::null().convert(&ValueType::String).unwrap();
        assert_eq!(null, Value::Null(ValueType::String));
        let unknown = Value::unknown().convert(&ValueType::Number).unwrap();
        assert_eq!(unknown, Value::Unknown(ValueType::Number));
    }

    #[test]
    fn list_type_unifies_elements() {
        let homogeneous = Value::from(vec![1i64, 2]);
        assert_eq!(homogeneous.ty(), ValueType::list_of(ValueType::Number));
        let mixed = Value::List(vec![Value::from(1i64), Value::from("x")]);
        assert_eq!(mixed.ty(), ValueType::list_of(ValueType::Any));
    }

    #[test]
    #[should_panic(expected = "unknown value has no JSON representation")]
    fn unknown_to_json_is_a_programmer_error() {
        Value::unknown().to_json();
    }
}
