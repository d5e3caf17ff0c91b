//! Ordered state pipeline
//!
//! A pipeline is a fixed list of steps run against a working copy of an object
//! and a read-only environment. Each step may be tied to a condition: success
//! records it true, failure records it false and halts the pipeline, leaving the
//! object in the lifecycle state the step asked for.

use chrono::{DateTime, Utc};
use std::fmt;

/// A halting step failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateError<S> {
    /// Machine-readable reason (used as the condition reason and event reason)
    pub reason: String,
    /// Human-readable message
    pub message: String,
    /// Lifecycle state the object is left in
    pub state: S,
}

impl<S> StateError<S> {
    pub fn new(state: S, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
            state,
        }
    }
}

impl<S: fmt::Debug> fmt::Display for StateError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.reason, self.state, self.message)
    }
}

pub type StateResult<S> = Result<(), StateError<S>>;

/// Object a pipeline can record outcomes on
pub trait StateTarget {
    type Condition: Copy + fmt::Debug;
    type State: Copy + fmt::Debug;

    /// A condition-bearing step succeeded
    fn record_success(&mut self, condition: Self::Condition, now: DateTime<Utc>);

    /// A step failed; `condition` is `None` for steps without one
    fn record_failure(
        &mut self,
        condition: Option<Self::Condition>,
        error: &StateError<Self::State>,
        now: DateTime<Utc>,
    );
}

/// One named step
pub struct Step<O: StateTarget, E> {
    pub name: &'static str,
    pub condition: Option<O::Condition>,
    pub run: fn(&mut O, &E) -> StateResult<O::State>,
}

/// Result of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome<C, S> {
    /// Every step succeeded
    Completed,
    /// A step failed and the remaining steps were skipped
    Halted {
        step: &'static str,
        condition: Option<C>,
        error: StateError<S>,
    },
}

impl<C, S> PipelineOutcome<C, S> {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed)
    }
}

pub struct StatePipeline<O: StateTarget, E> {
    steps: Vec<Step<O, E>>,
}

impl<O: StateTarget, E> StatePipeline<O, E> {
    pub fn new(steps: Vec<Step<O, E>>) -> Self {
        Self { steps }
    }

    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Run all steps in order, stopping at the first failure
    pub fn run(&self, object: &mut O, env: &E, now: DateTime<Utc>) -> PipelineOutcome<O::Condition, O::State> {
        for step in &self.steps {
            match (step.run)(object, env) {
                Ok(()) => {
                    if let Some(condition) = step.condition {
                        object.record_success(condition, now);
                    }
                }
                Err(error) => {
                    object.record_failure(step.condition, &error, now);
                    return PipelineOutcome::Halted {
                        step: step.name,
                        condition: step.condition,
                        error,
                    };
                }
            }
        }
        PipelineOutcome::Completed
    }
}
