#![allow(dead_code)]

use anyhow::{anyhow, Result};
use quantjit::{BlockId, Graph, NodeId, ObserverTemplate, QuantizableOp, ValueId, ValueType};

pub const SIGMOID: &str = "aten::sigmoid(Tensor self) -> Tensor";
pub const TANH: &str = "aten::tanh(Tensor self) -> Tensor";
pub const ADD: &str = "aten::add(Tensor self, Tensor other, Scalar alpha=1) -> Tensor";
pub const SIZE: &str = "aten::size(Tensor self, int dim) -> int";
pub const LOOP: &str = "prim::Loop";
pub const OBSERVER: &str = "observers::record";

pub fn relu() -> &'static str {
    QuantizableOp::Relu.signature()
}

pub fn conv2d() -> &'static str {
    QuantizableOp::Conv2d.signature()
}

/// Append a single-output tensor op to `block` and name its output.
pub fn op(
    graph: &mut Graph,
    block: BlockId,
    kind: &str,
    inputs: &[ValueId],
    name: &str,
) -> Result<(NodeId, ValueId)> {
    op_typed(graph, block, kind, inputs, name, ValueType::tensor())
}

pub fn op_typed(
    graph: &mut Graph,
    block: BlockId,
    kind: &str,
    inputs: &[ValueId],
    name: &str,
    ty: ValueType,
) -> Result<(NodeId, ValueId)> {
    let node = graph.create(kind, 0)?;
    for input in inputs {
        graph.add_node_input(node, *input)?;
    }
    let output = graph.add_output(node, ty)?;
    graph.set_unique_name(output, name)?;
    graph.append(block, node)?;
    Ok((node, output))
}

/// Append a control-flow node owning one fresh sub-block.
pub fn loop_node(graph: &mut Graph, block: BlockId) -> Result<(NodeId, BlockId)> {
    let node = graph.create(LOOP, 0)?;
    let body = graph.add_sub_block(node)?;
    graph.append(block, node)?;
    Ok((node, body))
}

pub fn observer() -> Result<ObserverTemplate> {
    ObserverTemplate::new(OBSERVER)
}

/// Qualified kinds of the nodes placed in `block`, in order.
pub fn kinds(graph: &Graph, block: BlockId) -> Result<Vec<String>> {
    graph
        .block(block)?
        .nodes()
        .iter()
        .map(|node| Ok(graph.node(*node)?.kind().qualified_name().to_string()))
        .collect()
}

/// Placed nodes of the given qualified kind anywhere in the graph.
pub fn placed(graph: &Graph, qualified: &str) -> Vec<NodeId> {
    graph
        .nodes()
        .filter(|node| node.owner().is_some() && node.kind().is(qualified))
        .map(|node| node.id())
        .collect()
}

pub fn value(graph: &Graph, name: &str) -> Result<ValueId> {
    graph
        .find_value(name)
        .ok_or_else(|| anyhow!("no value named {}", name))
}

pub fn consumers(graph: &Graph, value: ValueId) -> Result<Vec<NodeId>> {
    Ok(graph
        .value(value)?
        .uses
        .iter()
        .filter_map(|used| match used.user {
            quantjit::graph::User::Node(node) => Some(node),
            quantjit::graph::User::BlockReturn(_) => None,
        })
        .collect())
}
