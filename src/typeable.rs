//! Type descriptors and their resolver.
//!
//! A type is described at the call site with a [`TypeExpr`], either built from
//! parts or written as text (`"List[Tuple[int, bool]]"`). The [`Resolver`]
//! normalizes it into an interned [`TypeDescriptor`]: applied types decompose into
//! an origin constructor plus ordered parameter descriptors, everything else is a
//! leaf. Structurally equal expressions resolve to the same `Arc`.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A type expression as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Text in the `ident[arg, ...]` grammar, parsed on resolution.
    Source(String),
    /// An opaque name, taken verbatim.
    Named(String),
    /// A constructor applied to parameters.
    Apply(Box<TypeExpr>, Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn apply(origin: impl Into<TypeExpr>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Apply(Box::new(origin.into()), args)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Source(text) => write!(f, "{}", text.trim()),
            TypeExpr::Named(name) => write!(f, "{}", name),
            TypeExpr::Apply(origin, args) => {
                write!(f, "{}[", origin)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for TypeExpr {
    fn from(text: &str) -> Self {
        TypeExpr::Source(text.to_string())
    }
}

impl From<String> for TypeExpr {
    fn from(text: String) -> Self {
        TypeExpr::Source(text)
    }
}

impl From<&TypeExpr> for TypeExpr {
    fn from(expr: &TypeExpr) -> Self {
        expr.clone()
    }
}

/// Number of parameters a type constructor takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    Fixed(usize),
    /// One or more.
    Variadic,
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => n == count,
            Arity::Variadic => count >= 1,
        }
    }

    fn params(self) -> usize {
        match self {
            Arity::Fixed(n) => n,
            Arity::Variadic => 1,
        }
    }
}

/// Canonical, interned description of a type.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    identity: String,
    origin: Option<Arc<TypeDescriptor>>,
    args: Vec<Arc<TypeDescriptor>>,
    arity: usize,
}

impl TypeDescriptor {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn origin(&self) -> Option<&Arc<TypeDescriptor>> {
        self.origin.as_ref()
    }

    pub fn args(&self) -> &[Arc<TypeDescriptor>] {
        &self.args
    }

    /// Parameters still expected; zero for every concrete type
    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity)
    }
}

/// Turns type expressions into interned descriptors.
#[derive(Debug)]
pub struct Resolver {
    constructors: RwLock<HashMap<String, Arity>>,
    // Kept apart: a leaf may be named like an applied type.
    leaves: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
    applied: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
    sources: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Resolver knowing the `List`, `Option` and `Tuple` constructors
    pub fn new() -> Self {
        let resolver = Self {
            constructors: RwLock::new(HashMap::new()),
            leaves: RwLock::new(HashMap::new()),
            applied: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
        };
        resolver.declare("List", Arity::Fixed(1));
        resolver.declare("Option", Arity::Fixed(1));
        resolver.declare("Tuple", Arity::Variadic);
        resolver
    }

    /// Declares `name` as a type constructor.
    pub fn declare(&self, name: &str, arity: Arity) {
        write_lock(&self.constructors).insert(name.to_string(), arity);
        // A cached leaf under this name may carry a stale arity.
        write_lock(&self.leaves).remove(name);
    }

    pub fn is_constructor(&self, name: &str) -> bool {
        read_lock(&self.constructors).contains_key(name)
    }

    pub fn resolve(&self, expr: &TypeExpr) -> EngineResult<Arc<TypeDescriptor>> {
        match expr {
            TypeExpr::Source(text) => {
                if let Some(desc) = read_lock(&self.sources).get(text) {
                    return Ok(desc.clone());
                }
                let parsed = parse(text)?;
                let desc = self.resolve(&parsed)?;
                write_lock(&self.sources).insert(text.clone(), desc.clone());
                Ok(desc)
            }
            TypeExpr::Named(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(EngineError::UnrecognizedType(String::new()));
                }
                Ok(self.leaf(name))
            }
            TypeExpr::Apply(origin, args) => {
                let origin = self.resolve(origin)?;
                let arity = match read_lock(&self.constructors).get(origin.identity()) {
                    Some(arity) if origin.origin().is_none() => *arity,
                    _ => return Err(EngineError::UnrecognizedType(expr.to_string())),
                };
                if !arity.accepts(args.len()) {
                    return Err(EngineError::UnrecognizedType(expr.to_string()));
                }
                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    let arg = self.resolve(arg)?;
                    if arg.arity() != 0 {
                        return Err(EngineError::UnrecognizedType(expr.to_string()));
                    }
                    resolved.push(arg);
                }
                let identity = format!(
                    "{}[{}]",
                    origin.identity(),
                    resolved
                        .iter()
                        .map(|a| a.identity())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                Ok(intern(
                    &self.applied,
                    TypeDescriptor {
                        identity,
                        origin: Some(origin),
                        args: resolved,
                        arity: 0,
                    },
                ))
            }
        }
    }

    /// Leaf descriptor for a plain name, never fails.
    pub(crate) fn leaf(&self, name: &str) -> Arc<TypeDescriptor> {
        if let Some(desc) = read_lock(&self.leaves).get(name) {
            return desc.clone();
        }
        let arity = read_lock(&self.constructors)
            .get(name)
            .map(|a| a.params())
            .unwrap_or(0);
        intern(
            &self.leaves,
            TypeDescriptor {
                identity: name.to_string(),
                origin: None,
                args: Vec::new(),
                arity,
            },
        )
    }
}

fn intern(table: &RwLock<HashMap<String, Arc<TypeDescriptor>>>, desc: TypeDescriptor) -> Arc<TypeDescriptor> {
    write_lock(table)
        .entry(desc.identity.clone())
        .or_insert_with(|| Arc::new(desc))
        .clone()
}

/// Parses `ident ('[' type (',' type)* ']')?`.
pub fn parse(text: &str) -> EngineResult<TypeExpr> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let parsed = parser.parse_type();
    parser.skip_whitespace();
    match parsed {
        Some(expr) if parser.pos == parser.chars.len() => Ok(expr),
        _ => Err(EngineError::UnrecognizedType(text.to_string())),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.chars.get(self.pos) == Some(&c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<String> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            // '-' and '>' admit implied names such as `positive->int`
            if c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '-' | '>') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            None
        } else {
            Some(self.chars[start..self.pos].iter().collect())
        }
    }

    fn parse_type(&mut self) -> Option<TypeExpr> {
        let name = self.ident()?;
        if !self.eat('[') {
            return Some(TypeExpr::Named(name));
        }
        let mut args = vec![self.parse_type()?];
        while self.eat(',') {
            args.push(self.parse_type()?);
        }
        if !self.eat(']') {
            return None;
        }
        Some(TypeExpr::apply(TypeExpr::Named(name), args))
    }
}
