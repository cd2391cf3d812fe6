//! Generated values.
//!
//! Generators are looked up by type at runtime, so the values they produce are
//! dynamically typed. Predicates pull concrete Rust values back out with the
//! `as_*` accessors, which report a [`EngineError::TypeMismatch`] instead of
//! panicking when a value has the wrong shape.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Char(char),
    Str(String),
    Seq(Vec<Value>),
    Tuple(Vec<Value>),
    Opt(Option<Box<Value>>),
    /// A tagged constructor application, e.g. one model command call.
    Record { tag: String, fields: Vec<Value> },
    /// The result of model step `n`, before the step has been executed.
    Symbolic(usize),
}

impl Value {
    pub fn record(tag: impl Into<String>, fields: Vec<Value>) -> Self {
        Value::Record {
            tag: tag.into(),
            fields,
        }
    }

    /// Short name of the variant, used in mismatch reports
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Char(_) => "char",
            Value::Str(_) => "str",
            Value::Seq(_) => "sequence",
            Value::Tuple(_) => "tuple",
            Value::Opt(_) => "option",
            Value::Record { .. } => "record",
            Value::Symbolic(_) => "symbolic",
        }
    }

    fn mismatch(&self, expected: &'static str) -> EngineError {
        EngineError::TypeMismatch {
            expected,
            found: self.to_string(),
        }
    }

    pub fn as_bool(&self) -> EngineResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_int(&self) -> EngineResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_char(&self) -> EngineResult<char> {
        match self {
            Value::Char(c) => Ok(*c),
            other => Err(other.mismatch("char")),
        }
    }

    pub fn as_str(&self) -> EngineResult<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("str")),
        }
    }

    pub fn as_seq(&self) -> EngineResult<&[Value]> {
        match self {
            Value::Seq(items) => Ok(items),
            other => Err(other.mismatch("sequence")),
        }
    }

    pub fn as_tuple(&self) -> EngineResult<&[Value]> {
        match self {
            Value::Tuple(items) => Ok(items),
            other => Err(other.mismatch("tuple")),
        }
    }

    pub fn as_opt(&self) -> EngineResult<Option<&Value>> {
        match self {
            Value::Opt(inner) => Ok(inner.as_deref()),
            other => Err(other.mismatch("option")),
        }
    }

    pub fn as_record(&self) -> EngineResult<(&str, &[Value])> {
        match self {
            Value::Record { tag, fields } => Ok((tag, fields)),
            other => Err(other.mismatch("record")),
        }
    }

    /// Unpacks a sequence of integers
    pub fn ints(&self) -> EngineResult<Vec<i64>> {
        self.as_seq()?.iter().map(Value::as_int).collect()
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Seq(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Opt(None) => write!(f, "None"),
            Value::Opt(Some(inner)) => write!(f, "Some({})", inner),
            Value::Record { tag, fields } => {
                write!(f, "{}(", tag)?;
                write_joined(f, fields)?;
                write!(f, ")")
            }
            Value::Symbolic(step) => write!(f, "${}", step),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
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

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        Value::Opt(opt.map(|v| Box::new(v.into())))
    }
}
