use anyhow::{Context, Result};
use serde_json::Value;

use super::Graph;

pub struct GraphSerialize;

impl GraphSerialize {
    pub fn json(graph: &Graph) -> Result<Value> {
        Ok(serde_json::to_value(graph)?)
    }
}

pub struct GraphDeserialize;

impl GraphDeserialize {
    /// Decode a graph and reject it unless its handles and use lists agree.
    pub fn from_json(value: Value) -> Result<Graph> {
        let graph: Graph = serde_json::from_value(value)?;
        graph.validate().context("malformed graph")?;
        Ok(graph)
    }
}
