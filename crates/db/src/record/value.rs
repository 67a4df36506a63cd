//! Bound query values.

use hserp_core::types::Timestamp;
use sqlx::QueryBuilder;

use crate::Driver;

/// A dynamically typed SQL parameter.
///
/// Entities describe their writable columns as `(name, Value)` pairs, and
/// chained predicates carry their arguments as values. Values are always
/// bound as parameters, never spliced into SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(Timestamp),
    /// Expands to `(?, ?, ...)`; used with `IN ?`.
    List(Vec<Value>),
}

impl Value {
    /// Whether this is the zero value of its type.
    ///
    /// Partial updates skip zero-valued fields, so `0`, `false`, `""` and
    /// `NULL` cannot be written by a default `update`.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Timestamp(_) => false,
            Value::List(items) => items.is_empty(),
        }
    }

    pub(crate) fn push_bind(self, qb: &mut QueryBuilder<'static, Driver>) {
        match self {
            Value::Null => {
                qb.push("NULL");
            }
            Value::Bool(b) => {
                qb.push_bind(b);
            }
            Value::Int(i) => {
                qb.push_bind(i);
            }
            Value::Float(f) => {
                qb.push_bind(f);
            }
            Value::Text(s) => {
                qb.push_bind(s);
            }
            Value::Timestamp(t) => {
                qb.push_bind(t);
            }
            Value::List(items) if items.is_empty() => {
                qb.push("(NULL)");
            }
            Value::List(items) => {
                qb.push("(");
                for (i, item) in items.into_iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    item.push_bind(qb);
                }
                qb.push(")");
            }
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

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Arguments for the `?` placeholders of one SQL fragment.
///
/// Implemented for `()`, tuples of up to four values, and `Vec<Value>`.
/// A `Vec` inside a tuple is a single list argument: `("id IN ?", (ids,))`.
pub trait Params {
    fn into_values(self) -> Vec<Value>;
}

impl Params for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

impl Params for Vec<Value> {
    fn into_values(self) -> Vec<Value> {
        self
    }
}

macro_rules! tuple_params {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> Params for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_params!(A);
tuple_params!(A, B);
tuple_params!(A, B, C);
tuple_params!(A, B, C, D);
