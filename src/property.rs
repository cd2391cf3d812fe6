//! Property trees.
//!
//! A property quantifies a predicate over argument types. Predicates return a
//! [`PredicateResult`]: a plain verdict, or another property to evaluate in its
//! place, which is how quantifiers nest.

use crate::error::EngineResult;
use crate::typeable::TypeExpr;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    ForAll,
    Exists,
    /// Quantifies over nothing and never holds.
    Empty,
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::ForAll => write!(f, "FORALL"),
            Quantifier::Exists => write!(f, "EXISTS"),
            Quantifier::Empty => write!(f, "EMPTY"),
        }
    }
}

pub enum PredicateResult {
    Bool(bool),
    Nested(Property),
}

impl From<bool> for PredicateResult {
    fn from(b: bool) -> Self {
        PredicateResult::Bool(b)
    }
}

impl From<Property> for PredicateResult {
    fn from(p: Property) -> Self {
        PredicateResult::Nested(p)
    }
}

pub type Predicate = Arc<dyn Fn(&[Value]) -> EngineResult<PredicateResult> + Send + Sync>;

const UNNAMED: &str = "<unknown_property>";

#[derive(Clone)]
pub struct Property {
    quantifier: Quantifier,
    types: Vec<TypeExpr>,
    predicate: Predicate,
    name: String,
}

impl Property {
    fn quantify<T, F, R>(quantifier: Quantifier, types: impl IntoIterator<Item = T>, f: F) -> Self
    where
        T: Into<TypeExpr>,
        F: Fn(&[Value]) -> EngineResult<R> + Send + Sync + 'static,
        R: Into<PredicateResult>,
    {
        let predicate: Predicate =
            Arc::new(move |args: &[Value]| -> EngineResult<PredicateResult> { f(args).map(Into::into) });
        Self {
            quantifier,
            types: types.into_iter().map(Into::into).collect(),
            predicate,
            name: UNNAMED.to_string(),
        }
    }

    /// Holds when `f` holds for every argument tuple.
    pub fn forall<T, F, R>(types: impl IntoIterator<Item = T>, f: F) -> Self
    where
        T: Into<TypeExpr>,
        F: Fn(&[Value]) -> EngineResult<R> + Send + Sync + 'static,
        R: Into<PredicateResult>,
    {
        Self::quantify(Quantifier::ForAll, types, f)
    }

    /// Holds when `f` holds for some argument tuple.
    pub fn exists<T, F, R>(types: impl IntoIterator<Item = T>, f: F) -> Self
    where
        T: Into<TypeExpr>,
        F: Fn(&[Value]) -> EngineResult<R> + Send + Sync + 'static,
        R: Into<PredicateResult>,
    {
        Self::quantify(Quantifier::Exists, types, f)
    }

    pub fn empty() -> Self {
        Self::quantify(Quantifier::Empty, Vec::<TypeExpr>::new(), |_| Ok(false))
    }

    /// The trivially true property.
    pub fn unit() -> Self {
        Self::forall(Vec::<TypeExpr>::new(), |_| Ok(true))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantifier(&self) -> Quantifier {
        self.quantifier
    }

    pub fn types(&self) -> &[TypeExpr] {
        &self.types
    }

    pub(crate) fn call(&self, args: &[Value]) -> EngineResult<PredicateResult> {
        (self.predicate)(args)
    }
}

/// `name:FORALL(List[int])`
impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}(", self.name, self.quantifier)?;
        for (i, ty) in self.types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("quantifier", &self.quantifier)
            .field("types", &self.types)
            .finish()
    }
}

pub fn forall<T, F, R>(types: impl IntoIterator<Item = T>, f: F) -> Property
where
    T: Into<TypeExpr>,
    F: Fn(&[Value]) -> EngineResult<R> + Send + Sync + 'static,
    R: Into<PredicateResult>,
{
    Property::forall(types, f)
}

pub fn exists<T, F, R>(types: impl IntoIterator<Item = T>, f: F) -> Property
where
    T: Into<TypeExpr>,
    F: Fn(&[Value]) -> EngineResult<R> + Send + Sync + 'static,
    R: Into<PredicateResult>,
{
    Property::exists(types, f)
}

/// Properties checked together, in order.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    name: String,
    properties: Vec<Property>,
}

impl PropertySet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn push(&mut self, property: Property) {
        self.properties.push(property);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_types() {
        let p = forall(["List[int]", "bool"], |_| Ok(true)).named("prop_sorted");
        assert_eq!(p.to_string(), "prop_sorted:FORALL(List[int], bool)");
        assert_eq!(Property::empty().to_string(), "<unknown_property>:EMPTY()");
    }

    #[test]
    fn test_predicate_results() {
        let p = exists(["int"], |args| Ok(args[0].as_int()? > 0));
        assert!(matches!(p.call(&[Value::Int(1)]), Ok(PredicateResult::Bool(true))));
        assert!(p.call(&[Value::Bool(true)]).is_err());

        let nested = forall(["int"], |_| Ok(Property::unit()));
        assert!(matches!(nested.call(&[Value::Int(0)]), Ok(PredicateResult::Nested(_))));
    }

    #[test]
    fn test_property_set_keeps_order() {
        let set = PropertySet::new("ints")
            .with(Property::unit().named("a"))
            .with(Property::empty().named("b"));
        let names: Vec<_> = set.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(set.len(), 2);
    }
}
