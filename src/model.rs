//! Model-based testing of stateful systems.
//!
//! A [`Model`] pairs an abstract state `S` with a factory for the real system
//! under test `Sut`, and declares the commands that drive both. Each
//! [`Command`] has an action run against the system, plus optional hooks on the
//! abstract side: a precondition deciding when the command applies, a
//! postcondition checking the action's result, and a transition computing the
//! next abstract state.
//!
//! At depth `d` the model generates every valid sequence of at most `d - 1`
//! commands, breadth first, with arguments drawn at depth `d - 1`. A sequence is
//! valid when each precondition holds in the state reached by its prefix.
//! Results are not known while generating, so transitions receive
//! [`Value::Symbolic`] placeholders; during [`Model::run`] they receive the
//! actual results.
//!
//! A command that declares a return type with [`Command::returns`] makes its
//! results available as arguments. A parameter of that type with no strategy
//! of its own is filled with `$i`, the symbolic result of each earlier step `i`
//! producing it, and replay substitutes the value step `i` actually returned.

use crate::error::{EngineError, EngineResult};
use crate::property::Property;
use crate::registry::Registry;
use crate::strategy::{Draws, Gen, Strategy};
use crate::tuples::Tuples;
use crate::typeable::{TypeDescriptor, TypeExpr};
use crate::value::Value;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

/// One command call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub command: String,
    pub args: Vec<Value>,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::record(self.command.clone(), self.args.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandSequence {
    steps: Vec<Step>,
}

impl CommandSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// This sequence followed by one more call.
    pub fn then(&self, command: impl Into<String>, args: Vec<Value>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step {
            command: command.into(),
            args,
        });
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Encodes the sequence as a list of records, one per call.
    pub fn to_value(&self) -> Value {
        Value::Seq(
            self.steps
                .iter()
                .map(|s| Value::record(s.command.clone(), s.args.clone()))
                .collect(),
        )
    }

    pub fn from_value(value: &Value) -> EngineResult<Self> {
        let steps = value
            .as_seq()?
            .iter()
            .map(|call| {
                let (tag, fields) = call.as_record()?;
                Ok(Step {
                    command: tag.to_string(),
                    args: fields.to_vec(),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self { steps })
    }
}

impl fmt::Display for CommandSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

type Pre<S> = Arc<dyn Fn(&S, &[Value]) -> EngineResult<bool> + Send + Sync>;
type Action<Sut> = Arc<dyn Fn(&mut Sut, &[Value]) -> EngineResult<Value> + Send + Sync>;
type Post<S> = Arc<dyn Fn(&S, &[Value], &Value) -> EngineResult<bool> + Send + Sync>;
type Next<S> = Arc<dyn Fn(&S, &[Value], &Value) -> S + Send + Sync>;

pub struct Command<S, Sut> {
    name: String,
    params: Vec<TypeExpr>,
    returns: Option<TypeExpr>,
    pre: Option<Pre<S>>,
    action: Action<Sut>,
    post: Option<Post<S>>,
    next: Option<Next<S>>,
}

impl<S, Sut> Clone for Command<S, Sut> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            returns: self.returns.clone(),
            pre: self.pre.clone(),
            action: self.action.clone(),
            post: self.post.clone(),
            next: self.next.clone(),
        }
    }
}

impl<S, Sut> Command<S, Sut> {
    pub fn new<T, F>(name: impl Into<String>, params: impl IntoIterator<Item = T>, action: F) -> Self
    where
        T: Into<TypeExpr>,
        F: Fn(&mut Sut, &[Value]) -> EngineResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            returns: None,
            pre: None,
            action: Arc::new(action),
            post: None,
            next: None,
        }
    }

    /// Declares the type of the action's result. Later calls may take it as an
    /// argument wherever a parameter of this type has no strategy.
    pub fn returns(mut self, ty: impl Into<TypeExpr>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    /// Precondition; an `Err` means the command does not apply.
    pub fn pre<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &[Value]) -> EngineResult<bool> + Send + Sync + 'static,
    {
        self.pre = Some(Arc::new(f));
        self
    }

    /// Postcondition over the state before the call and the call's result.
    pub fn post<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &[Value], &Value) -> EngineResult<bool> + Send + Sync + 'static,
    {
        self.post = Some(Arc::new(f));
        self
    }

    /// Transition to the state after the call. Without one the state is kept.
    pub fn next<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &[Value], &Value) -> S + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeExpr] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&TypeExpr> {
        self.returns.as_ref()
    }

    fn applicable(&self, state: &S, args: &[Value]) -> bool {
        match &self.pre {
            Some(pre) => matches!(pre(state, args), Ok(true)),
            None => true,
        }
    }
}

impl<S: Clone, Sut> Command<S, Sut> {
    fn advance(&self, state: &S, args: &[Value], result: &Value) -> S {
        match &self.next {
            Some(next) => next(state, args, result),
            None => state.clone(),
        }
    }
}

/// A completed call and what it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executed {
    pub step: Step,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DivergenceReason {
    /// The postcondition returned false, or failed with the message.
    Postcondition(Option<String>),
    ActionFailed(String),
}

/// The first call at which the system disagreed with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub model: String,
    pub prefix: Vec<Executed>,
    pub index: usize,
    pub step: Step,
    pub result: Option<Value>,
    pub reason: DivergenceReason,
}

impl Divergence {
    /// The calls up to and including the diverging one
    pub fn sequence(&self) -> CommandSequence {
        CommandSequence {
            steps: self
                .prefix
                .iter()
                .map(|e| e.step.clone())
                .chain(std::iter::once(self.step.clone()))
                .collect(),
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} diverged at step {}:", self.model, self.index)?;
        for executed in &self.prefix {
            writeln!(f, "> {} -> {}", executed.step, executed.result)?;
        }
        match &self.result {
            Some(result) => writeln!(f, "> {} -> {}", self.step, result)?,
            None => writeln!(f, "> {}", self.step)?,
        }
        match &self.reason {
            DivergenceReason::Postcondition(Some(message)) => write!(f, "reason: {}", message),
            DivergenceReason::Postcondition(None) => {
                write!(f, "reason: postcondition of `{}` does not hold", self.step.command)
            }
            DivergenceReason::ActionFailed(message) => write!(f, "reason: action failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Replay {
    Consistent { steps: usize },
    Diverged(Divergence),
}

pub struct Model<S, Sut> {
    name: String,
    initial: S,
    setup: Arc<dyn Fn() -> Sut + Send + Sync>,
    commands: Vec<Command<S, Sut>>,
}

impl<S: Clone, Sut> Clone for Model<S, Sut> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            initial: self.initial.clone(),
            setup: self.setup.clone(),
            commands: self.commands.clone(),
        }
    }
}

impl<S, Sut> Model<S, Sut>
where
    S: Clone + Send + Sync + 'static,
    Sut: 'static,
{
    /// `setup` builds a fresh system for every replay.
    pub fn new<F>(name: impl Into<String>, initial: S, setup: F) -> Self
    where
        F: Fn() -> Sut + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            initial,
            setup: Arc::new(setup),
            commands: Vec::new(),
        }
    }

    pub fn command(mut self, command: Command<S, Sut>) -> Self {
        self.commands.push(command);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command<S, Sut>] {
        &self.commands
    }

    /// The type of this model's valid command sequences.
    pub fn commands_type(&self) -> TypeExpr {
        TypeExpr::named(format!("{}.Commands", self.name))
    }

    fn find(&self, name: &str) -> EngineResult<&Command<S, Sut>> {
        self.commands
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| EngineError::UnknownCommand(name.to_string()))
    }

    /// Valid sequences within `gen.depth()`, shortest first.
    pub fn valid_sequences<'r>(&self, gen: &Gen<'r>) -> ValidSequences<'r, S, Sut> {
        let registry = gen.registry();
        let mut error = None;
        let mut produces = HashMap::new();
        for command in &self.commands {
            if let Some(ty) = &command.returns {
                match registry.resolve(ty) {
                    Ok(desc) => {
                        produces.insert(command.name.clone(), desc.identity().to_string());
                    }
                    Err(e) => {
                        error.get_or_insert(e);
                    }
                }
            }
        }

        let mut resolved = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let mut params = Vec::with_capacity(command.params.len());
            for ty in &command.params {
                let desc = match registry.resolve(ty) {
                    Ok(desc) => desc,
                    Err(e) => {
                        error.get_or_insert(e);
                        continue;
                    }
                };
                // A registered strategy wins over earlier results.
                let unregistered = matches!(registry.lookup(&desc), Err(e) if e.is_missing_strategy());
                if unregistered && produces.values().any(|id| id == desc.identity()) {
                    params.push(Param::Bound(desc.identity().to_string()));
                } else {
                    params.push(Param::Drawn(desc));
                }
            }
            resolved.push(params);
        }

        let depth = gen.depth();
        ValidSequences {
            model: self.clone(),
            source: self.commands_type().to_string(),
            args: gen.at(depth.saturating_sub(1)),
            max_len: depth.saturating_sub(1),
            resolved,
            produces,
            error,
            started: depth == 0,
            finished: depth == 0,
            level: Vec::new(),
            deeper: Vec::new(),
            pos: 0,
            command: 0,
            tuples: None,
        }
    }

    /// Checks every precondition along `sequence` without running anything.
    pub fn validate(&self, sequence: &CommandSequence) -> EngineResult<()> {
        let mut state = self.initial.clone();
        for (index, step) in sequence.steps().iter().enumerate() {
            let command = self.find(&step.command)?;
            let dangling = step
                .args
                .iter()
                .any(|arg| matches!(arg, Value::Symbolic(i) if *i >= index));
            if dangling || !command.applicable(&state, &step.args) {
                return Err(EngineError::InvalidSequence {
                    index,
                    command: step.command.clone(),
                });
            }
            state = command.advance(&state, &step.args, &Value::Symbolic(index));
        }
        Ok(())
    }

    /// Replays `sequence` against a fresh system and the model side by side.
    pub fn run(&self, sequence: &CommandSequence) -> EngineResult<Replay> {
        let mut sut = (self.setup)();
        let mut state = self.initial.clone();
        let mut prefix: Vec<Executed> = Vec::with_capacity(sequence.len());

        for (index, step) in sequence.steps().iter().enumerate() {
            let command = self.find(&step.command)?;
            let invalid = || EngineError::InvalidSequence {
                index,
                command: step.command.clone(),
            };
            let args = bind(&step.args, &prefix).ok_or_else(invalid)?;
            if !command.applicable(&state, &args) {
                return Err(invalid());
            }

            let diverged = |prefix, result, reason| {
                debug!("{} diverged at {}", self.name, step);
                Replay::Diverged(Divergence {
                    model: self.name.clone(),
                    prefix,
                    index,
                    step: step.clone(),
                    result,
                    reason,
                })
            };

            let result = match (command.action)(&mut sut, &args) {
                Ok(result) => result,
                Err(e) => {
                    return Ok(diverged(prefix, None, DivergenceReason::ActionFailed(e.to_string())))
                }
            };

            if let Some(post) = &command.post {
                let failed = match post(&state, &args, &result) {
                    Ok(true) => None,
                    Ok(false) | Err(EngineError::FailedAssumption) => Some(None),
                    Err(EngineError::Assertion(message)) => Some(Some(message)),
                    Err(e) => return Err(e),
                };
                if let Some(message) = failed {
                    return Ok(diverged(
                        prefix,
                        Some(result),
                        DivergenceReason::Postcondition(message),
                    ));
                }
            }

            state = command.advance(&state, &args, &result);
            prefix.push(Executed {
                step: step.clone(),
                result,
            });
        }

        Ok(Replay::Consistent {
            steps: prefix.len(),
        })
    }

    /// Registers the valid sequences under [`commands_type`](Self::commands_type).
    pub fn install(&self, registry: &Registry) -> EngineResult<TypeExpr> {
        let ty = self.commands_type();
        registry.register(&ty, ModelStrategy { model: self.clone() }, true)?;
        Ok(ty)
    }

    /// Holds when no valid sequence makes the system diverge. Needs
    /// [`install`](Self::install) on the registry it is evaluated with.
    pub fn property(&self) -> Property {
        let model = self.clone();
        Property::forall([self.commands_type()], move |args| {
            let encoded = args
                .first()
                .ok_or_else(|| EngineError::fault("missing command sequence"))?;
            match model.run(&CommandSequence::from_value(encoded)?)? {
                Replay::Consistent { .. } => Ok(true),
                Replay::Diverged(divergence) => Err(EngineError::Assertion(divergence.to_string())),
            }
        })
        .named(self.name.clone())
    }
}

/// Replaces symbolic results with what the earlier calls returned, or `None`
/// when one refers to a call not yet made.
fn bind(args: &[Value], prefix: &[Executed]) -> Option<Vec<Value>> {
    args.iter()
        .map(|arg| match arg {
            Value::Symbolic(i) => prefix.get(*i).map(|e| e.result.clone()),
            other => Some(other.clone()),
        })
        .collect()
}

/// Where a command argument comes from.
enum Param {
    Drawn(Arc<TypeDescriptor>),
    /// Results of earlier steps whose command returns this identity
    Bound(String),
}

/// Breadth-first enumeration of valid command sequences.
pub struct ValidSequences<'r, S, Sut> {
    model: Model<S, Sut>,
    source: String,
    args: Gen<'r>,
    max_len: usize,
    resolved: Vec<Vec<Param>>,
    /// Command name to the identity of the type it returns
    produces: HashMap<String, String>,
    error: Option<EngineError>,
    started: bool,
    finished: bool,
    /// Sequences being extended, all of one length, with their states
    level: Vec<(CommandSequence, S)>,
    deeper: Vec<(CommandSequence, S)>,
    pos: usize,
    command: usize,
    tuples: Option<Tuples<'r, EngineResult<Value>>>,
}

impl<'r, S: Clone, Sut> Iterator for ValidSequences<'r, S, Sut> {
    type Item = EngineResult<CommandSequence>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            if let Some(e) = self.error.take() {
                self.finished = true;
                return Some(Err(e));
            }
            self.level = vec![(CommandSequence::new(), self.model.initial.clone())];
            self.finished = self.max_len == 0;
            return Some(Ok(CommandSequence::new()));
        }

        loop {
            if self.finished {
                return None;
            }
            if self.pos >= self.level.len() {
                self.level = mem::take(&mut self.deeper);
                self.pos = 0;
                self.command = 0;
                self.tuples = None;
                self.finished = self.level.is_empty();
                continue;
            }
            if self.command >= self.model.commands.len() {
                self.pos += 1;
                self.command = 0;
                continue;
            }

            if self.tuples.is_none() {
                let steps = self.level[self.pos].0.steps();
                let sources = self.resolved[self.command]
                    .iter()
                    .map(|param| -> Draws<'r> {
                        match param {
                            Param::Drawn(desc) => self.args.slots(desc),
                            Param::Bound(identity) => {
                                let results: Vec<Value> = steps
                                    .iter()
                                    .enumerate()
                                    .filter(|(_, step)| self.produces.get(&step.command) == Some(identity))
                                    .map(|(i, _)| Value::Symbolic(i))
                                    .collect();
                                Box::new(results.into_iter().map(Ok))
                            }
                        }
                    })
                    .collect();
                self.tuples = Some(Tuples::new(sources));
            }
            let Some(tuple) = self.tuples.as_mut().and_then(Iterator::next) else {
                self.command += 1;
                self.tuples = None;
                continue;
            };

            let args = match tuple.into_iter().collect::<EngineResult<Vec<_>>>() {
                Ok(args) => args,
                Err(e) if e.is_missing_strategy() => {
                    self.args.tally().reject(&self.source);
                    continue;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let command = &self.model.commands[self.command];
            let (sequence, state) = &self.level[self.pos];
            if !command.applicable(state, &args) {
                self.args.tally().reject(&self.source);
                continue;
            }
            let next_state = command.advance(state, &args, &Value::Symbolic(sequence.len()));
            let extended = sequence.then(command.name.clone(), args);
            if extended.len() < self.max_len {
                self.deeper.push((extended.clone(), next_state));
            }
            return Some(Ok(extended));
        }
    }
}

/// Strategy producing a model's valid sequences as values.
struct ModelStrategy<S, Sut> {
    model: Model<S, Sut>,
}

impl<S, Sut> Strategy for ModelStrategy<S, Sut>
where
    S: Clone + Send + Sync + 'static,
    Sut: 'static,
{
    fn name(&self) -> String {
        format!("{}.Commands", self.model.name)
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        Box::new(
            self.model
                .valid_sequences(gen)
                .map(|sequence| sequence.map(|s| s.to_value())),
        )
    }
}
