//! Strategy registry and type-directed dispatch.
//!
//! Strategies are keyed by descriptor identity. Looking up an applied type that
//! has no entry of its own composes the origin's strategy with the parameter
//! descriptors and caches the result under the applied identity, so a handful of
//! constructor strategies (`List`, `Option`, `Tuple`) cover every type built from
//! them.

use crate::defaults;
use crate::error::{EngineError, EngineResult};
use crate::strategy::{Composed, Filtered, FromFn, Gen, Mapped, Strategy};
use crate::tuples::Tuples;
use crate::typeable::{read_lock, write_lock, Resolver, TypeDescriptor, TypeExpr};
use crate::value::Value;
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct Registry {
    resolver: Resolver,
    strategies: RwLock<HashMap<String, Arc<dyn Strategy>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Registry {
    /// Registry without any strategies
    pub fn new() -> Self {
        Self {
            resolver: Resolver::new(),
            strategies: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the default generators installed
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        defaults::install(&registry);
        registry
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn resolve(&self, ty: &TypeExpr) -> EngineResult<Arc<TypeDescriptor>> {
        self.resolver.resolve(ty)
    }

    /// Binds `strategy` to `ty`. With `replace` unset an occupied identity is
    /// an error.
    pub fn register<S>(
        &self,
        ty: impl Into<TypeExpr>,
        strategy: S,
        replace: bool,
    ) -> EngineResult<Arc<TypeDescriptor>>
    where
        S: Strategy + 'static,
    {
        let desc = self.resolve(&ty.into())?;
        let mut strategies = write_lock(&self.strategies);
        if !replace && strategies.contains_key(desc.identity()) {
            return Err(EngineError::DuplicateStrategy(desc.identity().to_string()));
        }
        strategies.insert(desc.identity().to_string(), Arc::new(strategy));
        Ok(desc)
    }

    /// Binds a leaf name without going through resolution.
    pub(crate) fn insert(&self, name: &str, strategy: Arc<dyn Strategy>) {
        let desc = self.resolver.leaf(name);
        write_lock(&self.strategies).insert(desc.identity().to_string(), strategy);
    }

    /// Whether values of `ty` can be generated.
    pub fn contains(&self, ty: impl Into<TypeExpr>) -> bool {
        self.resolve(&ty.into())
            .and_then(|desc| self.lookup(&desc))
            .is_ok()
    }

    pub fn lookup(&self, ty: &TypeDescriptor) -> EngineResult<Arc<dyn Strategy>> {
        if let Some(strategy) = read_lock(&self.strategies).get(ty.identity()) {
            return Ok(strategy.clone());
        }

        let origin = ty
            .origin()
            .ok_or_else(|| EngineError::MissingStrategy(ty.identity().to_string()))?;
        let origin_strategy = self.lookup(origin)?;
        for param in ty.args() {
            self.lookup(param)?;
        }

        let composed: Arc<dyn Strategy> =
            Arc::new(Composed::new(origin_strategy, ty.args().to_vec()));
        debug!("synthesized {} for {}", composed.name(), ty.identity());
        Ok(write_lock(&self.strategies)
            .entry(ty.identity().to_string())
            .or_insert(composed)
            .clone())
    }

    /// All values of `ty` at `depth`, in generation order.
    pub fn values(&self, ty: impl Into<TypeExpr>, depth: usize) -> EngineResult<Vec<Value>> {
        Gen::new(self, depth).draw(ty)?.collect()
    }

    /// Ordered argument tuples for `types` at `depth`. A type without a
    /// strategy occupies its coordinate with a `MissingStrategy` draw.
    pub fn value_args(
        &self,
        types: &[TypeExpr],
        depth: usize,
    ) -> EngineResult<Tuples<'_, EngineResult<Value>>> {
        let gen = Gen::new(self, depth);
        let mut sources = Vec::with_capacity(types.len());
        for ty in types {
            sources.push(gen.slots(&self.resolve(ty)?));
        }
        Ok(Tuples::new(sources))
    }

    /// Registers the values of `base` satisfying `predicate` as a new type
    /// named `label->base`, and returns it.
    ///
    /// The name parses back as a leaf when `base` is a plain name, so
    /// `List[positive->int]` works as text. For applied bases such as
    /// `List[int]` use the returned expression instead of its text.
    pub fn implies<F>(&self, label: &str, predicate: F, base: impl Into<TypeExpr>) -> EngineResult<TypeExpr>
    where
        F: Fn(&Value) -> EngineResult<bool> + Send + Sync + 'static,
    {
        let base = self.resolve(&base.into())?;
        let name = format!("{}->{}", label, base.identity());
        let ty = TypeExpr::named(name.clone());
        self.register(&ty, Filtered::new(name, base, Arc::new(predicate)), true)?;
        Ok(ty)
    }

    /// Registers a type whose values are the expansions of each value of `source`.
    pub fn map<F>(&self, name: &str, source: impl Into<TypeExpr>, f: F) -> EngineResult<TypeExpr>
    where
        F: Fn(usize, &Value) -> Vec<Value> + Send + Sync + 'static,
    {
        let source = self.resolve(&source.into())?;
        let ty = TypeExpr::named(name);
        self.register(&ty, Mapped::new(name.to_string(), source, Arc::new(f)), true)?;
        Ok(ty)
    }

    /// Registers a leaf type generated from the depth alone.
    pub fn from_fn<F, I>(&self, name: &str, f: F) -> EngineResult<TypeExpr>
    where
        F: Fn(usize) -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        let ty = TypeExpr::named(name);
        self.register(&ty, FromFn::new(name, f), true)?;
        Ok(ty)
    }
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::with_defaults);

/// The process-wide registry, created with the defaults on first use.
pub fn global() -> &'static Registry {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: Vec<Value>) -> Vec<i64> {
        values.iter().map(|v| v.as_int().unwrap()).collect()
    }

    #[test]
    fn test_composed_strategy_is_cached() {
        let registry = Registry::with_defaults();
        let desc = registry.resolve(&"List[bool]".into()).unwrap();
        let first = registry.lookup(&desc).unwrap();
        let second = registry.lookup(&desc).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "List[bool]");
    }

    #[test]
    fn test_missing_parameter_strategy() {
        let registry = Registry::with_defaults();
        let desc = registry.resolve(&"List[Widget]".into()).unwrap();
        match registry.lookup(&desc) {
            Err(EngineError::MissingStrategy(ty)) => assert_eq!(ty, "Widget"),
            other => panic!("unexpected {:?}", other.map(|s| s.name())),
        }
        assert!(!registry.contains("Widget"));
        assert!(registry.contains("Option[List[int]]"));
    }

    #[test]
    fn test_register_respects_replace_flag() {
        let registry = Registry::new();
        registry
            .register("unit", FromFn::new("unit", |_: usize| vec![Value::Unit]), false)
            .unwrap();
        let again = registry.register("unit", FromFn::new("unit", |_: usize| Vec::<Value>::new()), false);
        assert_eq!(again.unwrap_err(), EngineError::DuplicateStrategy("unit".to_string()));
        registry
            .register("unit", FromFn::new("unit", |_: usize| Vec::<Value>::new()), true)
            .unwrap();
        assert!(registry.values("unit", 3).unwrap().is_empty());
    }

    #[test]
    fn test_explicit_entry_beats_composition() {
        let registry = Registry::with_defaults();
        registry
            .register("List[int]", FromFn::new("fixed", |_: usize| vec![Value::from(vec![7i64])]), true)
            .unwrap();
        assert_eq!(registry.values("List[int]", 3).unwrap(), vec![Value::from(vec![7i64])]);
    }

    #[test]
    fn test_implies_is_a_separate_type() {
        let registry = Registry::with_defaults();
        let positive = registry.implies("positive", |v| Ok(v.as_int()? > 0), "int").unwrap();
        assert_eq!(positive.to_string(), "positive->int");
        assert_eq!(ints(registry.values(&positive, 2).unwrap()), vec![1, 2]);
        assert_eq!(ints(registry.values("int", 2).unwrap()), vec![0, -1, 1, -2, 2]);
    }

    #[test]
    fn test_map_interleaves_expansions() {
        let registry = Registry::with_defaults();
        let ty = registry
            .map("pairs", "nat", |_, v| {
                let n = v.as_int().unwrap_or(0);
                vec![Value::Int(n * 10), Value::Int(n * 10 + 1)]
            })
            .unwrap();
        assert_eq!(ints(registry.values(ty, 2).unwrap()), vec![0, 1, 10, 11]);
    }

    #[test]
    fn test_mapped_types_are_layered() {
        let registry = Registry::with_defaults();
        registry
            .map("spread", "nat", |depth, v| {
                let n = v.as_int().unwrap_or(0);
                (0..=depth as i64).map(|k| Value::Int(n * 10 + k)).collect()
            })
            .unwrap();
        assert_eq!(ints(registry.values("spread", 1).unwrap()), vec![0]);
        assert_eq!(ints(registry.values("spread", 2).unwrap()), vec![0, 1, 10, 11]);
        for ty in ["spread", "List[spread]"] {
            for depth in 1..4 {
                let shallow = registry.values(ty, depth).unwrap();
                let deep = registry.values(ty, depth + 1).unwrap();
                assert_eq!(&deep[..shallow.len()], &shallow[..], "{} at {}", ty, depth);
                let mut unique = deep.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), deep.len(), "{} repeats at {}", ty, depth + 1);
            }
        }
    }

    #[test]
    fn test_implied_type_as_parameter_text() {
        let registry = Registry::with_defaults();
        registry
            .implies("positive", |v| Ok(v.as_int()? > 0), "int")
            .unwrap();
        let lists: Vec<String> = registry
            .values("List[positive->int]", 2)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(lists, ["[]", "[1]", "[2]"]);
    }

    #[test]
    fn test_leaf_resolution_does_not_shadow_applied_type() {
        let registry = Registry::with_defaults();
        registry.resolve(&TypeExpr::named("List[bool]")).unwrap();
        let lists: Vec<String> = registry
            .values("List[bool]", 2)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(lists, ["[]", "[false]", "[true]"]);
    }

    #[test]
    fn test_value_args_keeps_sentinels() {
        let registry = Registry::with_defaults();
        let tuples: Vec<_> = registry
            .value_args(&["bool".into(), "Widget".into()], 1)
            .unwrap()
            .collect();
        assert_eq!(tuples.len(), 2);
        for tuple in tuples {
            assert!(tuple[0].is_ok());
            assert_eq!(tuple[1], Err(EngineError::MissingStrategy("Widget".to_string())));
        }
        assert!(registry.value_args(&["List[".into()], 1).is_err());
    }

    #[test]
    fn test_global_registry_has_defaults() {
        assert!(global().contains("int"));
        assert!(global().contains("Tuple[int, str]"));
    }
}
