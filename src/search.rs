//! Iterative deepening over properties and models.

use crate::error::{EngineError, EngineResult};
use crate::eval::{evaluate, Verdict};
use crate::model::{Divergence, Model, Replay};
use crate::property::{Property, PropertySet, Quantifier};
use crate::registry::Registry;
use crate::strategy::{Gen, Stats};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Depth range of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// First depth evaluated
    pub min_depth: usize,

    /// Last depth evaluated
    pub max_depth: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_depth: 1,
            max_depth: 5,
        }
    }
}

impl SearchConfig {
    pub fn with_min_depth(mut self, depth: usize) -> Self {
        self.min_depth = depth;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn depths(&self) -> EngineResult<RangeInclusive<usize>> {
        if self.min_depth > self.max_depth {
            return Err(EngineError::fault(format!(
                "empty depth range {}..={}",
                self.min_depth, self.max_depth
            )));
        }
        Ok(self.min_depth..=self.max_depth)
    }
}

/// Outcome of checking one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub property: String,
    /// Depth of the final verdict
    pub depth: usize,
    pub verdict: Verdict,
    /// Counters summed over every depth evaluated
    pub stats: Stats,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.verdict.is_pass()
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::fault(e.to_string()))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} at depth {}: {}", self.property, self.depth, self.verdict)?;
        write!(f, "After {}", self.stats)
    }
}

/// Outcome of searching a model for a diverging command sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: String,
    pub depth: usize,
    pub divergence: Option<Divergence>,
    /// Sequences replayed over every depth, repeats included
    pub sequences_run: usize,
    pub stats: Stats,
}

impl ModelReport {
    pub fn passed(&self) -> bool {
        self.divergence.is_none()
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::fault(e.to_string()))
    }
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.divergence {
            Some(divergence) => writeln!(f, "{}", divergence)?,
            None => writeln!(f, "{} at depth {}: OK", self.model, self.depth)?,
        }
        write!(f, "After {} sequence(s), {}", self.sequences_run, self.stats)
    }
}

pub struct Search<'r> {
    registry: &'r Registry,
    config: SearchConfig,
}

impl<'r> Search<'r> {
    pub fn new(registry: &'r Registry, config: SearchConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Evaluates `property` at increasing depths until the verdict is decided:
    /// a `FORALL` fails, an `EXISTS` holds, or the last depth is reached.
    pub fn check(&self, property: &Property) -> EngineResult<Report> {
        let mut stats = Stats::default();
        let mut last = None;
        for depth in self.config.depths()? {
            let evaluation = evaluate(self.registry, property, depth)?;
            info!(
                "{} at depth {}: {} ({})",
                property.name(),
                depth,
                evaluation.verdict,
                evaluation.stats
            );
            stats.merge(&evaluation.stats);
            let decided = match property.quantifier() {
                Quantifier::ForAll => evaluation.verdict.is_fail(),
                Quantifier::Exists => evaluation.verdict.is_pass(),
                Quantifier::Empty => true,
            };
            last = Some((depth, evaluation.verdict));
            if decided {
                break;
            }
        }
        let (depth, verdict) = last.ok_or_else(|| EngineError::fault("no depth evaluated"))?;
        Ok(Report {
            property: property.name().to_string(),
            depth,
            verdict,
            stats,
        })
    }

    /// Checks the properties in order, stopping after the first failure.
    pub fn check_all(&self, set: &PropertySet) -> EngineResult<Vec<Report>> {
        let mut reports = Vec::with_capacity(set.len());
        for property in set.iter() {
            let report = self.check(property)?;
            let failed = !report.passed();
            reports.push(report);
            if failed {
                debug!("{} stopped at {}", set.name(), property.name());
                break;
            }
        }
        Ok(reports)
    }

    /// Replays every valid sequence of `model`, depth by depth, until one
    /// diverges.
    pub fn check_model<S, Sut>(&self, model: &Model<S, Sut>) -> EngineResult<ModelReport>
    where
        S: Clone + Send + Sync + 'static,
        Sut: 'static,
    {
        let mut stats = Stats::default();
        let mut sequences_run = 0;
        let mut reached = None;
        for depth in self.config.depths()? {
            reached = Some(depth);
            let gen = Gen::new(self.registry, depth);
            let mut divergence = None;
            for sequence in model.valid_sequences(&gen) {
                let sequence = sequence?;
                sequences_run += 1;
                gen.tally().call();
                if let Replay::Diverged(found) = model.run(&sequence)? {
                    divergence = Some(found);
                    break;
                }
            }
            stats.merge(&gen.stats());
            info!("{} at depth {}: {} sequence(s) so far", model.name(), depth, sequences_run);
            if divergence.is_some() {
                return Ok(ModelReport {
                    model: model.name().to_string(),
                    depth,
                    divergence,
                    sequences_run,
                    stats,
                });
            }
        }
        Ok(ModelReport {
            model: model.name().to_string(),
            depth: reached.ok_or_else(|| EngineError::fault("no depth evaluated"))?,
            divergence: None,
            sequences_run,
            stats,
        })
    }
}
