//! Depth-bounded generators.
//!
//! A [`Strategy`] produces, for a depth budget carried by a [`Gen`], a lazy and
//! restartable stream of values ordered from structurally simplest to most
//! complex. Calling `generate` again re-derives the same stream.
//!
//! Draws are `EngineResult<Value>`. Two error kinds are part of the protocol:
//! `FailedAssumption` discards the draw (the [`Values`] wrapper swallows and
//! counts it), and `MissingStrategy` travels as a sentinel coordinate through
//! tuple streams.

use crate::error::{EngineError, EngineResult};
use crate::registry::Registry;
use crate::typeable::{TypeDescriptor, TypeExpr};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::iter;
use std::rc::Rc;
use std::sync::Arc;

/// A lazy stream of draws, borrowing at most the registry.
pub type Draws<'r> = Box<dyn Iterator<Item = EngineResult<Value>> + 'r>;

/// A generator for one type constructor or concrete type.
pub trait Strategy: Send + Sync {
    fn name(&self) -> String;

    /// Streams values within `gen.depth()`. `params` are the descriptors of the
    /// type parameters, empty for concrete types.
    fn generate<'r>(&self, gen: &Gen<'r>, params: &[Arc<TypeDescriptor>]) -> Draws<'r>;
}

/// A stream consisting of one error.
pub fn failing<'r>(error: EngineError) -> Draws<'r> {
    Box::new(iter::once(Err(error)))
}

/// Counters shared by everything generated under one root [`Gen`].
#[derive(Debug, Default)]
pub struct Tally {
    calls: Cell<usize>,
    assumptions_failed: Cell<usize>,
    rejected: RefCell<BTreeMap<String, usize>>,
}

impl Tally {
    pub fn call(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    /// Counts one discarded value, attributed to `source`.
    pub fn reject(&self, source: &str) {
        self.assumptions_failed.set(self.assumptions_failed.get() + 1);
        *self.rejected.borrow_mut().entry(source.to_string()).or_insert(0) += 1;
    }

    pub fn stats(&self) -> Stats {
        Stats {
            calls: self.calls.get(),
            assumptions_failed: self.assumptions_failed.get(),
            rejected_by_source: self.rejected.borrow().clone(),
        }
    }
}

/// Snapshot of a [`Tally`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Predicate invocations
    pub calls: usize,
    /// Values and argument tuples discarded by assumptions
    pub assumptions_failed: usize,
    pub rejected_by_source: BTreeMap<String, usize>,
}

impl Stats {
    pub fn merge(&mut self, other: &Stats) {
        self.calls += other.calls;
        self.assumptions_failed += other.assumptions_failed;
        for (source, count) in &other.rejected_by_source {
            *self.rejected_by_source.entry(source.clone()).or_insert(0) += count;
        }
    }

    pub fn rejected(&self, source: &str) -> usize {
        self.rejected_by_source.get(source).copied().unwrap_or(0)
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} call(s)", self.calls)?;
        if self.assumptions_failed > 0 {
            write!(f, " ({} did not meet implication)", self.assumptions_failed)?;
        }
        Ok(())
    }
}

/// Generation context: registry, depth budget and shared bookkeeping.
#[derive(Clone)]
pub struct Gen<'r> {
    registry: &'r Registry,
    depth: usize,
    tally: Rc<Tally>,
    sizes: Rc<RefCell<HashMap<(String, usize), usize>>>,
}

impl<'r> Gen<'r> {
    pub fn new(registry: &'r Registry, depth: usize) -> Self {
        Self {
            registry,
            depth,
            tally: Rc::new(Tally::default()),
            sizes: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn stats(&self) -> Stats {
        self.tally.stats()
    }

    /// Same context at another depth.
    pub fn at(&self, depth: usize) -> Gen<'r> {
        Gen {
            depth,
            ..self.clone()
        }
    }

    /// Same context with its own counters, for passes that must not be observed.
    fn detached(&self) -> Gen<'r> {
        Gen {
            tally: Rc::new(Tally::default()),
            ..self.clone()
        }
    }

    /// Values of `ty` at this depth.
    pub fn values(&self, ty: &Arc<TypeDescriptor>) -> EngineResult<Values<'r>> {
        let strategy = self.registry.lookup(ty)?;
        let draws: Draws<'r> = if self.depth == 0 {
            Box::new(iter::empty())
        } else {
            strategy.generate(self, ty.args())
        };
        Ok(Values {
            source: ty.identity().to_string(),
            draws,
            tally: self.tally.clone(),
        })
    }

    /// Resolves `ty` and streams its values.
    pub fn draw(&self, ty: impl Into<TypeExpr>) -> EngineResult<Values<'r>> {
        let desc = self.registry.resolve(&ty.into())?;
        self.values(&desc)
    }

    /// Like [`values`](Self::values), but a lookup failure becomes a single
    /// error draw so the stream can serve as a tuple coordinate.
    pub fn slots(&self, ty: &Arc<TypeDescriptor>) -> Draws<'r> {
        match self.values(ty) {
            Ok(values) => Box::new(values),
            Err(e) => failing(e),
        }
    }

    /// Number of draws of `ty` at `depth`, memoized per root context.
    pub fn count_slots(&self, ty: &Arc<TypeDescriptor>, depth: usize) -> usize {
        let key = ty.identity().to_string();
        let ty = ty.clone();
        self.count_with(&key, depth, move |gen| gen.slots(&ty))
    }

    /// Number of items `stream` yields at `depth`, memoized under `key`.
    pub fn count_with<F>(&self, key: &str, depth: usize, stream: F) -> usize
    where
        F: FnOnce(&Gen<'r>) -> Draws<'r>,
    {
        let memo_key = (key.to_string(), depth);
        if let Some(&n) = self.sizes.borrow().get(&memo_key) {
            return n;
        }
        let n = stream(&self.detached().at(depth)).count();
        self.sizes.borrow_mut().insert(memo_key, n);
        n
    }
}

/// The stream of one type, with assumption failures filtered out and counted.
pub struct Values<'r> {
    source: String,
    draws: Draws<'r>,
    tally: Rc<Tally>,
}

impl<'r> Iterator for Values<'r> {
    type Item = EngineResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.draws.next()? {
                Err(EngineError::FailedAssumption) => self.tally.reject(&self.source),
                draw => return Some(draw),
            }
        }
    }
}

/// An origin strategy with its type parameters bound.
pub struct Composed {
    origin: Arc<dyn Strategy>,
    params: Vec<Arc<TypeDescriptor>>,
}

impl Composed {
    pub fn new(origin: Arc<dyn Strategy>, params: Vec<Arc<TypeDescriptor>>) -> Self {
        Self { origin, params }
    }
}

impl Strategy for Composed {
    fn name(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.identity()).collect();
        format!("{}[{}]", self.origin.name(), params.join(", "))
    }

    /// The bound parameters replace whatever the caller passes; they are the
    /// applied type's own arguments.
    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        self.origin.generate(gen, &self.params)
    }
}

/// A leaf strategy computed from the depth alone.
pub struct FromFn<F> {
    name: String,
    f: F,
}

impl<F> FromFn<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, I> Strategy for FromFn<F>
where
    F: Fn(usize) -> I + Send + Sync,
    I: IntoIterator<Item = Value>,
    I::IntoIter: 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        Box::new((self.f)(gen.depth()).into_iter().map(Ok))
    }
}

pub(crate) type Guard = Arc<dyn Fn(&Value) -> EngineResult<bool> + Send + Sync>;

/// Values of `base` that satisfy a predicate.
///
/// Registered under its own identity, so the unfiltered type keeps its entry.
/// Each rejected value is drawn as `FailedAssumption` and counted once under
/// the filtered type.
pub struct Filtered {
    name: String,
    base: Arc<TypeDescriptor>,
    predicate: Guard,
}

impl Filtered {
    pub(crate) fn new(name: String, base: Arc<TypeDescriptor>, predicate: Guard) -> Self {
        Self {
            name,
            base,
            predicate,
        }
    }
}

impl Strategy for Filtered {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        let predicate = self.predicate.clone();
        Box::new(gen.slots(&self.base).map(move |draw| {
            let value = draw?;
            match predicate(&value) {
                Ok(true) => Ok(value),
                Ok(false) => Err(EngineError::FailedAssumption),
                Err(e) if e.is_rejection() => Err(EngineError::FailedAssumption),
                Err(e) => Err(e),
            }
        }))
    }
}

pub(crate) type Expansion = Arc<dyn Fn(usize, &Value) -> Vec<Value> + Send + Sync>;

/// Expands every value of `source` into zero or more values.
///
/// Output at depth `d` is built in layers `e = 1..=d`. Layer `e` expands the
/// source values at depth `e` with `f(e - 1, value)`, interleaved fairly: each
/// new source value adds an expansion to the rotation, and each output takes
/// one value from the next expansion in line. Values already emitted by an
/// earlier layer are skipped, so depth `d` extends depth `d - 1`.
pub struct Mapped {
    name: String,
    source: Arc<TypeDescriptor>,
    f: Expansion,
}

impl Mapped {
    pub(crate) fn new(name: String, source: Arc<TypeDescriptor>, f: Expansion) -> Self {
        Self { name, source, f }
    }
}

impl Strategy for Mapped {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        let depth = gen.depth();
        let root = gen.clone();
        let source = self.source.clone();
        let f = self.f.clone();
        let layers = (1..=depth).flat_map(move |e| {
            // Earlier layers repeat draws already counted at their own depth.
            let layer = if e < depth { root.detached().at(e) } else { root.at(e) };
            Interleave {
                source: Some(layer.slots(&source)),
                pending: VecDeque::new(),
                depth: e - 1,
                f: f.clone(),
            }
        });
        let mut seen = HashSet::new();
        Box::new(layers.filter(move |draw| match draw {
            Ok(value) => seen.insert(value.clone()),
            Err(_) => true,
        }))
    }
}

struct Interleave<'r> {
    source: Option<Draws<'r>>,
    pending: VecDeque<std::vec::IntoIter<Value>>,
    depth: usize,
    f: Expansion,
}

impl<'r> Iterator for Interleave<'r> {
    type Item = EngineResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(source) = self.source.as_mut() {
                match source.next() {
                    Some(Ok(value)) => self.pending.push_back((self.f)(self.depth, &value).into_iter()),
                    Some(Err(e)) => return Some(Err(e)),
                    None => self.source = None,
                }
            }
            match self.pending.pop_front() {
                Some(mut expansion) => {
                    if let Some(value) = expansion.next() {
                        self.pending.push_back(expansion);
                        return Some(Ok(value));
                    }
                }
                None if self.source.is_none() => return None,
                None => {}
            }
        }
    }
}
