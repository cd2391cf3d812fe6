//! # depthcheck
//!
//! Depth-bounded exhaustive property and model-based testing.
//!
//! Instead of sampling inputs at random, every generator enumerates all values
//! of its type up to a depth budget, simplest first. Properties are checked
//! against every argument tuple at depth 1, 2, ... so the first counterexample
//! found is also a smallest one. Stateful systems are checked by enumerating
//! valid command sequences of a [`Model`] and replaying them against the real
//! implementation.
//!
//! ```ignore
//! use depthcheck::{forall, ensure_that, Registry, Search, SearchConfig};
//!
//! let registry = Registry::with_defaults();
//! let prop = forall(["List[int]"], |args| {
//!     let mut xs = args[0].ints()?;
//!     xs.reverse();
//!     ensure_that("is_sorted", |v: &[i64]| v.windows(2).all(|w| w[0] <= w[1]), &xs[..])?;
//!     Ok(true)
//! });
//! let report = Search::new(&registry, SearchConfig::default()).check(&prop)?;
//! ```

pub mod asserts;
pub mod defaults;
pub mod error;
pub mod eval;
pub mod model;
pub mod property;
pub mod registry;
pub mod search;
pub mod strategy;
pub mod tuples;
pub mod typeable;
pub mod value;

// Re-export core types for easy access
pub use asserts::{assume, ensure, ensure_eq, ensure_ne, ensure_that};
pub use error::{EngineError, EngineResult};
pub use eval::{evaluate, Argument, Case, Evaluation, Failure, Pass, Reason, Verdict};
pub use model::{
    Command, CommandSequence, Divergence, DivergenceReason, Executed, Model, Replay, Step,
    ValidSequences,
};
pub use property::{exists, forall, PredicateResult, Property, PropertySet, Quantifier};
pub use registry::{global, Registry};
pub use search::{ModelReport, Report, Search, SearchConfig};
pub use strategy::{Draws, Gen, Stats, Strategy, Values};
pub use tuples::Tuples;
pub use typeable::{parse, Arity, TypeDescriptor, TypeExpr};
pub use value::Value;
