//! Observer insertion.
//!
//! Activation inputs and every tensor produced inside the graph get an
//! observer clone that reads the value and a constant holding its name.
//! Observers are side-band: an observed value keeps all of its consumers.
use std::collections::HashSet;

use anyhow::anyhow;

use crate::error::{PassError, Result};
use crate::graph::{
    describe_node, AttrValue, Graph, InsertPoint, Node, NodeId, OpAttrs, Symbol, ValueId,
    WalkEvent,
};
use crate::logging::trace_full_enabled;
use crate::module::{Function, Module};

/// Node prototype cloned for every observed value.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverTemplate {
    pub kind: Symbol,
    pub attrs: OpAttrs,
    pub scope: String,
}

impl ObserverTemplate {
    pub fn new(kind: &str) -> anyhow::Result<Self> {
        Ok(Self {
            kind: Symbol::parse(kind)?,
            attrs: OpAttrs::none(),
            scope: String::new(),
        })
    }

    pub fn with_attrs(mut self, attrs: OpAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Take kind, attributes and scope from an existing node.
    ///
    /// Nodes with inputs, outputs or nested blocks cannot serve as templates.
    pub fn from_node(graph: &Graph, node: NodeId) -> anyhow::Result<Self> {
        let node = graph.node(node)?;
        if !node.inputs().is_empty() || !node.outputs().is_empty() || !node.blocks().is_empty()
        {
            return Err(anyhow!(
                "observer template {} ({}) must have no inputs, outputs or blocks",
                node.id(),
                node.kind()
            ));
        }
        Ok(Self {
            kind: node.kind().clone(),
            attrs: node.attrs().clone(),
            scope: node.scope().to_string(),
        })
    }

    fn instantiate(&self, graph: &mut Graph) -> anyhow::Result<NodeId> {
        let node = graph.create_node(self.kind.clone(), 0);
        graph.set_attrs(node, self.attrs.clone())?;
        graph.set_scope(node, self.scope.clone())?;
        Ok(node)
    }
}

/// Build a detached observer for `value`, with its name constant placed at `site`.
fn add_observer_for(
    graph: &mut Graph,
    template: &ObserverTemplate,
    value: ValueId,
    site: InsertPoint,
) -> anyhow::Result<NodeId> {
    let name = graph.debug_name(value)?;
    let name_const = graph.insert_constant(AttrValue::Str(name.clone()), site)?;

    let observer = template.instantiate(graph)?;
    let ty = graph.value(value)?.ty.clone();
    let observed = graph.add_output(observer, ty)?;
    graph.set_unique_name(observed, &format!("{}.observed", name))?;

    graph.add_node_input(observer, value)?;
    graph.add_node_input(observer, name_const)?;
    Ok(observer)
}

fn outputs_need_observing(node: &Node) -> bool {
    !node.is_constant()
}

/// Instrument `graph` with clones of `template`.
///
/// The first `num_activation_inputs` graph inputs are treated as activations
/// (the rest are weights) and observed ahead of every other node. Returns the
/// created observers, input observers first.
///
/// Each observer copies only the template's kind, attributes and scope. It
/// always has exactly two inputs (the observed value and its name constant)
/// and one output, so a template taken from a node with inputs or outputs
/// of its own is refused by [`ObserverTemplate::from_node`].
pub fn insert_observers(
    graph: &mut Graph,
    template: &ObserverTemplate,
    num_activation_inputs: usize,
) -> Result<Vec<NodeId>> {
    let available = graph.inputs()?.len();
    if num_activation_inputs > available {
        return Err(PassError::precondition(format!(
            "{} activation inputs requested but the graph has only {} inputs",
            num_activation_inputs, available
        )));
    }

    let root = graph.root();
    let input_site = match graph.block(root)?.nodes().first() {
        Some(first) => InsertPoint::Before(*first),
        None => InsertPoint::End(root),
    };

    let mut input_observers: HashSet<NodeId> = HashSet::new();
    let mut created = Vec::new();
    let activations = graph.inputs()?[..num_activation_inputs].to_vec();
    for input in activations {
        if !graph.value(input)?.is_tensor() {
            continue;
        }
        let observer = add_observer_for(graph, template, input, input_site)?;
        graph.insert(observer, input_site)?;
        input_observers.insert(observer);
        created.push(observer);
    }

    let mut to_observe: Vec<ValueId> = Vec::new();
    for event in graph.walk() {
        let WalkEvent::Node(id) = event? else {
            continue;
        };
        let node = graph.node(id)?;
        if !outputs_need_observing(node) || input_observers.contains(&id) {
            continue;
        }
        to_observe.extend_from_slice(node.outputs());
    }

    for value in to_observe {
        if !graph.value(value)?.is_tensor() {
            continue;
        }
        let producer = graph
            .producer_node(value)?
            .ok_or_else(|| PassError::precondition(format!("value {} has no producer", value)))?;
        let observer = add_observer_for(graph, template, value, InsertPoint::Before(producer))?;
        graph.insert_after(observer, producer)?;
        created.push(observer);
    }

    crate::trace!(
        "insert_observers: {} observers ({} on activation inputs)",
        created.len(),
        input_observers.len()
    );
    if trace_full_enabled() {
        for observer in &created {
            crate::trace!("  {}", describe_node(graph, *observer)?);
        }
    }
    Ok(created)
}

/// Observe the graph of `module.method_name` using its declared input count.
pub fn insert_observers_for_method(
    module: &mut Module,
    method_name: &str,
    template: &ObserverTemplate,
) -> Result<Vec<NodeId>> {
    let method = module.method_mut(method_name)?;
    let num_inputs = method.num_inputs;
    insert_observers(&mut method.graph, template, num_inputs)
}

/// Observe the graph of a free function using its declared input count.
pub fn insert_observers_for_function(
    function: &mut Function,
    template: &ObserverTemplate,
) -> Result<Vec<NodeId>> {
    let num_inputs = function.num_inputs;
    insert_observers(&mut function.graph, template, num_inputs)
}
