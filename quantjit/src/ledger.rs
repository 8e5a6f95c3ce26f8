//! Bookkeeping that keeps each value from being rewritten more than once.
use std::collections::HashMap;

use crate::error::{PassError, Result};
use crate::graph::{NodeId, ValueId};

/// Rewrite state of one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteState {
    /// Wrap the value where it is produced; every consumer follows.
    ObservedForOutputRewrite,
    /// Wrap only the listed consumer edges.
    ObservedForInputRewrite(Vec<NodeId>),
    Rewritten,
}

#[derive(Debug, Default)]
pub struct RewriteLedger {
    states: HashMap<ValueId, RewriteState>,
    outputs: Vec<ValueId>,
    inputs: Vec<(ValueId, NodeId)>,
}

impl RewriteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, value: ValueId) -> Option<&RewriteState> {
        self.states.get(&value)
    }

    /// Schedule an output-side rewrite. False when the value is already known.
    pub fn mark_output(&mut self, value: ValueId) -> bool {
        if self.states.contains_key(&value) {
            return false;
        }
        self.states.insert(value, RewriteState::ObservedForOutputRewrite);
        self.outputs.push(value);
        true
    }

    /// Schedule an input-side rewrite of the `value -> consumer` edge.
    ///
    /// False when the edge is already scheduled or the value is handled
    /// on the output side.
    pub fn mark_input(&mut self, value: ValueId, consumer: NodeId) -> bool {
        let consumers = match self
            .states
            .entry(value)
            .or_insert_with(|| RewriteState::ObservedForInputRewrite(Vec::new()))
        {
            RewriteState::ObservedForInputRewrite(consumers) => consumers,
            _ => return false,
        };
        if consumers.contains(&consumer) {
            return false;
        }
        consumers.push(consumer);
        self.inputs.push((value, consumer));
        true
    }

    /// Output-side candidates in the order they were marked.
    pub fn pending_outputs(&self) -> Vec<ValueId> {
        self.outputs
            .iter()
            .copied()
            .filter(|value| {
                matches!(
                    self.states.get(value),
                    Some(RewriteState::ObservedForOutputRewrite)
                )
            })
            .collect()
    }

    /// Input-side candidates in the order they were marked.
    pub fn pending_inputs(&self) -> Vec<(ValueId, NodeId)> {
        self.inputs
            .iter()
            .copied()
            .filter(|(value, consumer)| match self.states.get(value) {
                Some(RewriteState::ObservedForInputRewrite(consumers)) => {
                    consumers.contains(consumer)
                }
                _ => false,
            })
            .collect()
    }

    pub fn commit_output(&mut self, value: ValueId) -> Result<()> {
        if self.states.get(&value) != Some(&RewriteState::ObservedForOutputRewrite) {
            return Err(PassError::precondition(format!(
                "value {} is not pending an output rewrite (state {:?})",
                value,
                self.states.get(&value)
            )));
        }
        self.states.insert(value, RewriteState::Rewritten);
        Ok(())
    }

    /// Record one consumer edge as rewritten; the value becomes `Rewritten`
    /// once its last pending edge is committed.
    pub fn commit_input(&mut self, value: ValueId, consumer: NodeId) -> Result<()> {
        let remaining = match self.states.get_mut(&value) {
            Some(RewriteState::ObservedForInputRewrite(consumers))
                if consumers.contains(&consumer) =>
            {
                consumers.retain(|pending| *pending != consumer);
                consumers.len()
            }
            _ => {
                return Err(PassError::precondition(format!(
                    "edge {} -> {} is not pending an input rewrite (state {:?})",
                    value,
                    consumer,
                    self.states.get(&value)
                )))
            }
        };
        if remaining == 0 {
            self.states.insert(value, RewriteState::Rewritten);
        }
        Ok(())
    }

    pub fn rewritten_count(&self) -> usize {
        self.states
            .values()
            .filter(|state| matches!(state, RewriteState::Rewritten))
            .count()
    }
}
