//! Property evaluation at a fixed depth.
//!
//! The argument types of a property are resolved, their value streams merged by
//! the tuple enumerator, and the predicate applied tuple by tuple until the
//! quantifier is decided:
//!
//! - `FORALL` fails on the first tuple that does not hold and passes once the
//!   stream is exhausted.
//! - `EXISTS` passes on the first tuple that holds and fails once the stream is
//!   exhausted.
//! - `EMPTY` always fails.
//!
//! A predicate returning a nested property is decided by evaluating that
//! property at the same depth. Failed assumptions skip the tuple and are
//! counted. A coordinate whose type has no strategy fails a `FORALL` outright
//! and is skipped by `EXISTS`.

use crate::error::{EngineError, EngineResult};
use crate::property::{PredicateResult, Property, Quantifier};
use crate::registry::Registry;
use crate::strategy::{Gen, Stats};
use crate::tuples::Tuples;
use crate::value::Value;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One argument of a reported case. `value` is `None` when its type had no
/// strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub ty: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reason {
    Returned(bool),
    Assertion(String),
    MissingStrategy(String),
    Nested(Box<Verdict>),
}

/// A decisive argument tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub property: String,
    pub quantifier: Quantifier,
    pub arguments: Vec<Argument>,
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pass {
    /// Every tuple held.
    Exhausted,
    Witness(Case),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Failure {
    Counterexample(Case),
    /// No tuple held.
    NoWitness { property: String },
    Empty { property: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Pass(Pass),
    Fail(Failure),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass(_))
    }

    pub fn is_fail(&self) -> bool {
        !self.is_pass()
    }

    pub fn counterexample(&self) -> Option<&Case> {
        match self {
            Verdict::Fail(Failure::Counterexample(case)) => Some(case),
            _ => None,
        }
    }

    pub fn witness(&self) -> Option<&Case> {
        match self {
            Verdict::Pass(Pass::Witness(case)) => Some(case),
            _ => None,
        }
    }
}

impl Case {
    /// Argument values, skipping coordinates without a strategy
    pub fn values(&self) -> Vec<&Value> {
        self.arguments.iter().filter_map(|a| a.value.as_ref()).collect()
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Returned(b) => write!(f, "returned {}", b),
            Reason::Assertion(message) => write!(f, "{}", message),
            Reason::MissingStrategy(ty) => write!(f, "no strategy for `{}`", ty),
            Reason::Nested(verdict) => write!(f, "{}", verdict),
        }
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{} ->", self.property, self.quantifier)?;
        for arg in &self.arguments {
            match &arg.value {
                Some(value) => writeln!(f, " {}={}", arg.ty, value)?,
                None => writeln!(f, " {}=<missing>", arg.ty)?,
            }
        }
        write!(f, "reason: {}", self.reason)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass(Pass::Exhausted) => write!(f, "OK"),
            Verdict::Pass(Pass::Witness(case)) => write!(f, "witness: {}", case),
            Verdict::Fail(Failure::Counterexample(case)) => write!(f, "counterexample: {}", case),
            Verdict::Fail(Failure::NoWitness { property }) => {
                write!(f, "no witness found for `{}`", property)
            }
            Verdict::Fail(Failure::Empty { property }) => write!(f, "`{}` is empty", property),
        }
    }
}

/// Verdict of one property at one depth, with the counters it accumulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub stats: Stats,
}

/// Evaluates `property` with every argument generated at `depth`.
pub fn evaluate(registry: &Registry, property: &Property, depth: usize) -> EngineResult<Evaluation> {
    let gen = Gen::new(registry, depth);
    let verdict = decide(&gen, property)?;
    Ok(Evaluation {
        verdict,
        stats: gen.stats(),
    })
}

fn decide(gen: &Gen<'_>, property: &Property) -> EngineResult<Verdict> {
    let quantifier = property.quantifier();
    if quantifier == Quantifier::Empty {
        return Ok(Verdict::Fail(Failure::Empty {
            property: property.name().to_string(),
        }));
    }

    let descriptors = property
        .types()
        .iter()
        .map(|ty| gen.registry().resolve(ty))
        .collect::<EngineResult<Vec<_>>>()?;
    debug!("evaluating {} at depth {}", property, gen.depth());

    let sources = descriptors.iter().map(|desc| gen.slots(desc)).collect();
    for tuple in Tuples::new(sources) {
        let mut arguments = Vec::with_capacity(tuple.len());
        let mut missing = None;
        for (desc, slot) in descriptors.iter().zip(tuple) {
            let value = match slot {
                Ok(value) => Some(value),
                Err(EngineError::MissingStrategy(ty)) => {
                    missing.get_or_insert(ty);
                    None
                }
                Err(e) => return Err(e),
            };
            arguments.push(Argument {
                ty: desc.identity().to_string(),
                value,
            });
        }

        let case = |arguments, reason| Case {
            property: property.name().to_string(),
            quantifier,
            arguments,
            reason,
        };

        if let Some(ty) = missing {
            if quantifier == Quantifier::ForAll {
                return Ok(Verdict::Fail(Failure::Counterexample(case(
                    arguments,
                    Reason::MissingStrategy(ty),
                ))));
            }
            continue;
        }

        let values: Vec<Value> = arguments.iter().filter_map(|a| a.value.clone()).collect();
        gen.tally().call();
        let (holds, reason) = match property.call(&values) {
            Ok(PredicateResult::Bool(b)) => (b, Reason::Returned(b)),
            Ok(PredicateResult::Nested(inner)) => {
                let verdict = decide(gen, &inner)?;
                (verdict.is_pass(), Reason::Nested(Box::new(verdict)))
            }
            Err(EngineError::FailedAssumption) => {
                gen.tally().reject(property.name());
                continue;
            }
            Err(EngineError::Assertion(message)) => (false, Reason::Assertion(message)),
            Err(e) => {
                return Err(EngineError::PredicateFault {
                    property: property.name().to_string(),
                    arguments: render(&values),
                    message: e.to_string(),
                })
            }
        };

        match (quantifier, holds) {
            (Quantifier::ForAll, false) => {
                return Ok(Verdict::Fail(Failure::Counterexample(case(arguments, reason))))
            }
            (Quantifier::Exists, true) => {
                return Ok(Verdict::Pass(Pass::Witness(case(arguments, reason))))
            }
            _ => {}
        }
    }

    Ok(match quantifier {
        Quantifier::Exists => Verdict::Fail(Failure::NoWitness {
            property: property.name().to_string(),
        }),
        _ => Verdict::Pass(Pass::Exhausted),
    })
}

fn render(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
