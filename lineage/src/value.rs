//! Dynamic values passed through dispatched calls
//!
//! Method bodies take and return [`Value`]s so that one method table can hold
//! implementations from every level of a hierarchy. A [`Signature`] records
//! the value kinds a method accepts and returns; two implementations override
//! each other only when their signatures are identical.

use serde::Serialize;
use std::fmt;

use crate::error::{ClassError, Result};

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value
    Unit,
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Kind of this value
    pub fn kind(&self) -> Kind {
        match self {
            Value::Unit => Kind::Unit,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::Str,
            Value::List(_) => Kind::List,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a Rust type, `None` if the kinds don't line up.
    pub fn get<T: FromValue>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Convert to a Rust type, falling back to its default on mismatch.
    pub fn get_or_default<T: FromValue + Default>(&self) -> T {
        self.get().unwrap_or_default()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Conversion out of a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for () {
    fn from_value(value: &Value) -> Option<Self> {
        matches!(value, Value::Unit).then_some(())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list().map(<[Value]>::to_vec)
    }
}

/// Kind of a parameter or result in a [`Signature`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    List,
    /// Accepts any value
    Any,
}

impl Kind {
    /// Whether a value may be passed where this kind is declared
    pub fn accepts(self, value: &Value) -> bool {
        self == Kind::Any || value.kind() == self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Unit => "()",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Str => "str",
            Kind::List => "list",
            Kind::Any => "any",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call signature of a method: parameter kinds and result kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Signature {
    params: Vec<Kind>,
    ret: Kind,
}

impl Signature {
    pub fn new(params: impl Into<Vec<Kind>>, ret: Kind) -> Self {
        Signature {
            params: params.into(),
            ret,
        }
    }

    /// Signature with no parameters
    pub fn returning(ret: Kind) -> Self {
        Signature::new(Vec::new(), ret)
    }

    pub fn params(&self) -> &[Kind] {
        &self.params
    }

    pub fn ret(&self) -> Kind {
        self.ret
    }

    /// Check call arguments against the declared parameters
    pub fn check_args(&self, method: &str, args: &[Value]) -> Result<()> {
        let fits = args.len() == self.params.len()
            && self.params.iter().zip(args).all(|(k, v)| k.accepts(v));
        if fits {
            Ok(())
        } else {
            let got: Vec<&str> = args.iter().map(|v| v.kind().as_str()).collect();
            Err(ClassError::argument_mismatch(
                method,
                self.to_string(),
                got.join(", "),
            ))
        }
    }

    /// Check a returned value against the declared result kind
    pub fn check_result(&self, method: &str, result: &Value) -> Result<()> {
        if self.ret.accepts(result) {
            Ok(())
        } else {
            Err(ClassError::result_mismatch(
                method,
                self.ret.as_str(),
                result.kind().as_str(),
            ))
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, k) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Unit.to_string(), "()");
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn test_get_matching_kind() {
        assert_eq!(Value::Int(7).get::<i64>(), Some(7));
        assert_eq!(Value::from("x").get::<String>(), Some("x".to_string()));
        assert_eq!(Value::Int(2).get::<f64>(), Some(2.0));
        assert_eq!(Value::Unit.get::<()>(), Some(()));
    }

    #[test]
    fn test_get_mismatch() {
        assert_eq!(Value::from("7").get::<i64>(), None);
        assert_eq!(Value::Float(1.5).get::<i64>(), None);
        assert_eq!(Value::Int(0).get::<bool>(), None);
    }

    #[test]
    fn test_get_or_default() {
        assert_eq!(Value::from("7").get_or_default::<i64>(), 0);
        assert_eq!(Value::Int(3).get_or_default::<String>(), "");
        assert!(Value::Bool(true).get_or_default::<bool>());
    }

    #[test]
    fn test_kind_accepts() {
        assert!(Kind::Int.accepts(&Value::Int(1)));
        assert!(!Kind::Int.accepts(&Value::Float(1.0)));
        assert!(Kind::Any.accepts(&Value::Unit));
        assert!(Kind::Any.accepts(&Value::List(vec![])));
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature::new([Kind::Int, Kind::Str], Kind::Bool);
        assert_eq!(sig.to_string(), "fn(int, str) -> bool");
        assert_eq!(Signature::returning(Kind::Unit).to_string(), "fn() -> ()");
    }

    #[test]
    fn test_signature_equality_is_exact() {
        let a = Signature::new([Kind::Int], Kind::Int);
        let b = Signature::new([Kind::Int], Kind::Int);
        let c = Signature::new([Kind::Any], Kind::Int);
        let d = Signature::new([Kind::Int, Kind::Int], Kind::Int);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_check_args() {
        let sig = Signature::new([Kind::Int, Kind::Any], Kind::Unit);
        assert!(sig.check_args("f", &[Value::Int(1), Value::from("x")]).is_ok());

        let err = sig.check_args("f", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ClassError::ArgumentMismatch { .. }));

        let err = sig
            .check_args("f", &[Value::from("1"), Value::Unit])
            .unwrap_err();
        assert_eq!(err.to_string(), "f expects fn(int, any) -> (), got (str, ())");
    }

    #[test]
    fn test_check_result() {
        let sig = Signature::returning(Kind::Str);
        assert!(sig.check_result("g", &Value::from("ok")).is_ok());
        let err = sig.check_result("g", &Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "g must return str, returned int");
    }
}
