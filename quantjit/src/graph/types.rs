//! Core graph data types.
//!
//! A graph is an arena of nodes, values and blocks addressed by small
//! integer handles. The top-level block is created with the graph; nested
//! blocks hang off control-flow nodes. Use edges are kept on both sides so
//! consumer redirection never leaves a dangling reference.
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::symbol::{self, Symbol};
use super::value::{Producer, Use, User, Value, ValueType};

macro_rules! handle {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

handle!(NodeId, "n");
handle!(ValueId, "%");
handle!(BlockId, "b");

/// Attribute value attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
}

impl AttrValue {
    /// Type of the value a constant holding this literal produces.
    pub fn value_type(&self) -> ValueType {
        match self {
            AttrValue::Float(_) => ValueType::Float,
            AttrValue::Int(_) => ValueType::Int,
            AttrValue::Bool(_) => ValueType::Bool,
            AttrValue::Str(_) => ValueType::Str,
            AttrValue::IntList(_) => ValueType::List(Box::new(ValueType::Int)),
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Float(value) => write!(f, "{:?}", value),
            AttrValue::Int(value) => write!(f, "{}", value),
            AttrValue::Bool(value) => write!(f, "{}", value),
            AttrValue::Str(value) => write!(f, "\"{}\"", value),
            AttrValue::IntList(values) => write!(f, "{:?}", values),
        }
    }
}

/// Named attribute of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpAttr {
    pub name: String,
    pub value: AttrValue,
}

/// Collection of node attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpAttrs {
    pub items: Vec<OpAttr>,
}

impl OpAttrs {
    /// Build an empty attribute set.
    pub fn none() -> Self {
        Self { items: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.items
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    /// Insert or overwrite an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.items.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value,
            None => self.items.push(OpAttr { name, value }),
        }
    }
}

/// A single operation instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) uuid: Uuid,
    pub(crate) kind: Symbol,
    pub(crate) attrs: OpAttrs,
    pub(crate) scope: String,
    pub(crate) inputs: Vec<ValueId>,
    pub(crate) outputs: Vec<ValueId>,
    pub(crate) blocks: Vec<BlockId>,
    pub(crate) owner: Option<BlockId>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kind(&self) -> &Symbol {
        &self.kind
    }

    pub fn attrs(&self) -> &OpAttrs {
        &self.attrs
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Nested blocks (loop or branch bodies).
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Block the node is placed in, `None` while detached.
    pub fn owner(&self) -> Option<BlockId> {
        self.owner
    }

    pub fn is_constant(&self) -> bool {
        self.kind.is(symbol::CONSTANT)
    }
}

/// Ordered region of nodes with parameters and designated outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) params: Vec<ValueId>,
    pub(crate) outputs: Vec<ValueId>,
    pub(crate) owner: Option<NodeId>,
}

impl Block {
    fn new(id: BlockId, owner: Option<NodeId>) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            params: Vec::new(),
            outputs: Vec::new(),
            owner,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Node this block is nested in, `None` for the top-level block.
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }
}

/// Cursor for node insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    Before(NodeId),
    After(NodeId),
    End(BlockId),
}

/// Dataflow graph with exactly one top-level block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    values: Vec<Value>,
    blocks: Vec<Block>,
    root: BlockId,
    names: HashMap<String, ValueId>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph holding only its top-level block.
    pub fn new() -> Self {
        let root = BlockId(0);
        Self {
            nodes: Vec::new(),
            values: Vec::new(),
            blocks: vec![Block::new(root, None)],
            root,
            names: HashMap::new(),
        }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Graph inputs, i.e. the parameters of the top-level block.
    pub fn inputs(&self) -> Result<&[ValueId]> {
        Ok(self.block(self.root)?.params())
    }

    pub fn outputs(&self) -> Result<&[ValueId]> {
        Ok(self.block(self.root)?.outputs())
    }

    /// All nodes ever created, placed or detached.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| anyhow!("missing node: {}", id))
    }

    pub fn value(&self, id: ValueId) -> Result<&Value> {
        self.values
            .get(id.0)
            .ok_or_else(|| anyhow!("missing value: {}", id))
    }

    pub fn block(&self, id: BlockId) -> Result<&Block> {
        self.blocks
            .get(id.0)
            .ok_or_else(|| anyhow!("missing block: {}", id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("missing node: {}", id))
    }

    fn value_mut(&mut self, id: ValueId) -> Result<&mut Value> {
        self.values
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("missing value: {}", id))
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        self.blocks
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("missing block: {}", id))
    }

    /// Producing node of a value, `None` for parameters.
    pub fn producer_node(&self, value: ValueId) -> Result<Option<NodeId>> {
        Ok(self.value(value)?.producer_node())
    }

    /// Add a graph input.
    pub fn add_input(&mut self, ty: ValueType, name: impl Into<String>) -> Result<ValueId> {
        let root = self.root;
        self.add_block_input(root, ty, name)
    }

    /// Add a parameter to a block (loop-carried or branch inputs).
    pub fn add_block_input(
        &mut self,
        block: BlockId,
        ty: ValueType,
        name: impl Into<String>,
    ) -> Result<ValueId> {
        let offset = self.block(block)?.params.len();
        let value = self.push_value(Value::new(Producer::BlockParam { block, offset }, ty));
        self.block_mut(block)?.params.push(value);
        let name = name.into();
        if !name.is_empty() {
            self.set_unique_name(value, &name)?;
        }
        Ok(value)
    }

    fn push_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.values.len());
        self.values.push(value);
        id
    }

    /// Create a detached node from a textual operator identity.
    pub fn create(&mut self, kind: &str, num_outputs: usize) -> Result<NodeId> {
        let kind = Symbol::parse(kind)?;
        Ok(self.create_node(kind, num_outputs))
    }

    /// Create a detached node with `num_outputs` tensor outputs.
    pub fn create_node(&mut self, kind: Symbol, num_outputs: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            uuid: Uuid::new_v4(),
            kind,
            attrs: OpAttrs::none(),
            scope: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            blocks: Vec::new(),
            owner: None,
        });
        for offset in 0..num_outputs {
            let value = self.push_value(Value::new(
                Producer::Node { node: id, offset },
                ValueType::tensor(),
            ));
            self.nodes[id.0].outputs.push(value);
        }
        id
    }

    /// Append a fresh output of type `ty` to a node.
    pub fn add_output(&mut self, node: NodeId, ty: ValueType) -> Result<ValueId> {
        let offset = self.node(node)?.outputs.len();
        let value = self.push_value(Value::new(Producer::Node { node, offset }, ty));
        self.node_mut(node)?.outputs.push(value);
        Ok(value)
    }

    pub fn set_type(&mut self, value: ValueId, ty: ValueType) -> Result<()> {
        self.value_mut(value)?.ty = ty;
        Ok(())
    }

    pub fn set_scope(&mut self, node: NodeId, scope: impl Into<String>) -> Result<()> {
        self.node_mut(node)?.scope = scope.into();
        Ok(())
    }

    pub fn set_attrs(&mut self, node: NodeId, attrs: OpAttrs) -> Result<()> {
        self.node_mut(node)?.attrs = attrs;
        Ok(())
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: AttrValue) -> Result<()> {
        self.node_mut(node)?.attrs.set(name, value);
        Ok(())
    }

    /// Attach a new nested block to a node.
    pub fn add_sub_block(&mut self, node: NodeId) -> Result<BlockId> {
        self.node(node)?;
        let block = BlockId(self.blocks.len());
        self.blocks.push(Block::new(block, Some(node)));
        self.node_mut(node)?.blocks.push(block);
        Ok(block)
    }

    /// Designate `value` as an output of `block`.
    pub fn register_output(&mut self, block: BlockId, value: ValueId) -> Result<()> {
        let offset = self.block(block)?.outputs.len();
        self.value_mut(value)?.uses.push(Use {
            user: User::BlockReturn(block),
            offset,
        });
        self.block_mut(block)?.outputs.push(value);
        Ok(())
    }

    pub fn add_node_input(&mut self, node: NodeId, value: ValueId) -> Result<()> {
        let offset = self.node(node)?.inputs.len();
        self.value_mut(value)?.uses.push(Use {
            user: User::Node(node),
            offset,
        });
        self.node_mut(node)?.inputs.push(value);
        Ok(())
    }

    /// Point every input slot of `node` that reads `old` at `new` instead.
    ///
    /// Other consumers of `old` are untouched. Returns the number of slots
    /// rewritten.
    pub fn replace_input_with(
        &mut self,
        node: NodeId,
        old: ValueId,
        new: ValueId,
    ) -> Result<usize> {
        self.value(new)?;
        let offsets: Vec<usize> = self
            .node(node)?
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| **input == old)
            .map(|(offset, _)| offset)
            .collect();
        for &offset in &offsets {
            let used = Use {
                user: User::Node(node),
                offset,
            };
            self.value_mut(old)?.uses.retain(|u| *u != used);
            self.value_mut(new)?.uses.push(used);
            self.node_mut(node)?.inputs[offset] = new;
        }
        Ok(offsets.len())
    }

    /// Redirect every consumer of `old`, node inputs and block outputs, to `new`.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) -> Result<()> {
        self.value(new)?;
        if old == new {
            return Ok(());
        }
        let uses = std::mem::take(&mut self.value_mut(old)?.uses);
        for used in &uses {
            let slot = match used.user {
                User::Node(node) => self.node_mut(node)?.inputs.get_mut(used.offset),
                User::BlockReturn(block) => self.block_mut(block)?.outputs.get_mut(used.offset),
            };
            *slot.ok_or_else(|| anyhow!("stale use of {}: {:?}", old, used))? = new;
        }
        self.value_mut(new)?.uses.extend(uses);
        Ok(())
    }

    /// Name a value, appending `.1`, `.2`, ... when the name is taken.
    ///
    /// Returns the name actually assigned. An empty name clears it.
    pub fn set_unique_name(&mut self, value: ValueId, name: &str) -> Result<String> {
        if !name.is_empty() && name.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(anyhow!("value names cannot be plain numbers: {}", name));
        }
        if let Some(old) = self.value_mut(value)?.name.take() {
            self.names.remove(&old);
        }
        if name.is_empty() {
            return Ok(String::new());
        }
        let mut candidate = name.to_string();
        let mut suffix = 1;
        while self.names.get(&candidate).is_some_and(|owner| *owner != value) {
            candidate = format!("{}.{}", name, suffix);
            suffix += 1;
        }
        self.names.insert(candidate.clone(), value);
        self.value_mut(value)?.name = Some(candidate.clone());
        Ok(candidate)
    }

    /// The value's name, or its numeric handle when unnamed.
    pub fn debug_name(&self, value: ValueId) -> Result<String> {
        Ok(self
            .value(value)?
            .name
            .clone()
            .unwrap_or_else(|| value.0.to_string()))
    }

    pub fn find_value(&self, name: &str) -> Option<ValueId> {
        self.names.get(name).copied()
    }

    /// Place a detached node at `at`.
    pub fn insert(&mut self, node: NodeId, at: InsertPoint) -> Result<()> {
        let (block, position) = match at {
            InsertPoint::Before(anchor) => self.position_of(anchor)?,
            InsertPoint::After(anchor) => {
                let (block, position) = self.position_of(anchor)?;
                (block, position + 1)
            }
            InsertPoint::End(block) => (block, self.block(block)?.nodes.len()),
        };
        self.place(node, block, position)
    }

    pub fn insert_before(&mut self, node: NodeId, anchor: NodeId) -> Result<()> {
        self.insert(node, InsertPoint::Before(anchor))
    }

    pub fn insert_after(&mut self, node: NodeId, anchor: NodeId) -> Result<()> {
        self.insert(node, InsertPoint::After(anchor))
    }

    pub fn append(&mut self, block: BlockId, node: NodeId) -> Result<()> {
        self.insert(node, InsertPoint::End(block))
    }

    pub fn prepend(&mut self, block: BlockId, node: NodeId) -> Result<()> {
        self.place(node, block, 0)
    }

    fn position_of(&self, anchor: NodeId) -> Result<(BlockId, usize)> {
        let block = self
            .node(anchor)?
            .owner
            .ok_or_else(|| anyhow!("insertion anchor {} is not placed in a block", anchor))?;
        let position = self
            .block(block)?
            .nodes
            .iter()
            .position(|node| *node == anchor)
            .ok_or_else(|| anyhow!("node {} missing from its block {}", anchor, block))?;
        Ok((block, position))
    }

    fn place(&mut self, node: NodeId, block: BlockId, position: usize) -> Result<()> {
        if let Some(owner) = self.node(node)?.owner {
            return Err(anyhow!("node {} is already placed in block {}", node, owner));
        }
        self.block_mut(block)?.nodes.insert(position, node);
        self.node_mut(node)?.owner = Some(block);
        Ok(())
    }

    /// Insert a literal constant at `at` and return its output.
    pub fn insert_constant(&mut self, literal: AttrValue, at: InsertPoint) -> Result<ValueId> {
        let node = self.create(symbol::CONSTANT, 0)?;
        let output = self.add_output(node, literal.value_type())?;
        self.set_attr(node, "value", literal)?;
        self.insert(node, at)?;
        Ok(output)
    }

    /// Check the structural invariants a deserialized graph must satisfy.
    ///
    /// Handles are in range and agree with their position, placement is
    /// mirrored on both sides, producers point back at their value, use lists
    /// match node inputs and block outputs exactly, and block nesting is
    /// acyclic.
    pub fn validate(&self) -> Result<()> {
        let root = self.block(self.root)?;
        if let Some(owner) = root.owner {
            return Err(anyhow!("top-level block {} is owned by node {}", root.id, owner));
        }

        let mut expected_uses: Vec<Vec<Use>> = vec![Vec::new(); self.values.len()];

        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.0 != index {
                return Err(anyhow!("node slot {} holds node {}", index, node.id));
            }
            if let Some(block) = node.owner {
                if !self.block(block)?.nodes.contains(&node.id) {
                    return Err(anyhow!("node {} claims block {} but is not in it", node.id, block));
                }
            }
            for (offset, input) in node.inputs.iter().enumerate() {
                self.value(*input)?;
                expected_uses[input.0].push(Use {
                    user: User::Node(node.id),
                    offset,
                });
            }
            for (offset, output) in node.outputs.iter().enumerate() {
                let producer = Producer::Node {
                    node: node.id,
                    offset,
                };
                if self.value(*output)?.producer != producer {
                    return Err(anyhow!(
                        "output {} of node {} has a foreign producer",
                        output,
                        node.id
                    ));
                }
            }
            for block in &node.blocks {
                if self.block(*block)?.owner != Some(node.id) {
                    return Err(anyhow!("block {} is not owned by node {}", block, node.id));
                }
            }
        }

        for (index, block) in self.blocks.iter().enumerate() {
            if block.id.0 != index {
                return Err(anyhow!("block slot {} holds block {}", index, block.id));
            }
            if block.id != self.root && block.owner.is_none() {
                return Err(anyhow!("nested block {} has no owner", block.id));
            }
            if let Some(owner) = block.owner {
                if !self.node(owner)?.blocks.contains(&block.id) {
                    return Err(anyhow!(
                        "block {} claims node {} but is not in it",
                        block.id,
                        owner
                    ));
                }
            }
            for node in &block.nodes {
                if self.node(*node)?.owner != Some(block.id) {
                    return Err(anyhow!(
                        "node {} is listed in block {} it does not belong to",
                        node,
                        block.id
                    ));
                }
            }
            for (offset, param) in block.params.iter().enumerate() {
                let producer = Producer::BlockParam {
                    block: block.id,
                    offset,
                };
                if self.value(*param)?.producer != producer {
                    return Err(anyhow!(
                        "parameter {} of block {} has a foreign producer",
                        param,
                        block.id
                    ));
                }
            }
            for (offset, output) in block.outputs.iter().enumerate() {
                self.value(*output)?;
                expected_uses[output.0].push(Use {
                    user: User::BlockReturn(block.id),
                    offset,
                });
            }
            self.check_nesting(block.id)?;
        }

        for (index, value) in self.values.iter().enumerate() {
            let id = ValueId(index);
            let listed = match value.producer {
                Producer::Node { node, offset } => self.node(node)?.outputs.get(offset).copied(),
                Producer::BlockParam { block, offset } => {
                    self.block(block)?.params.get(offset).copied()
                }
            };
            if listed != Some(id) {
                return Err(anyhow!("value {} is not listed by its producer", id));
            }
            let expected = &expected_uses[index];
            if value.uses.len() != expected.len()
                || expected.iter().any(|used| !value.uses.contains(used))
            {
                return Err(anyhow!("use list of value {} does not match its consumers", id));
            }
            if let Some(name) = &value.name {
                if self.names.get(name) != Some(&id) {
                    return Err(anyhow!("name {} of value {} is not registered", name, id));
                }
            }
        }

        for (name, value) in &self.names {
            if self.value(*value)?.name.as_deref() != Some(name.as_str()) {
                return Err(anyhow!(
                    "name {} is registered for value {} under another name",
                    name,
                    value
                ));
            }
        }
        Ok(())
    }

    /// Follow owner links from `block` outward; they must end without a cycle.
    fn check_nesting(&self, block: BlockId) -> Result<()> {
        let mut current = block;
        for _ in 0..=self.blocks.len() {
            let Some(owner) = self.block(current)?.owner else {
                return Ok(());
            };
            match self.node(owner)?.owner {
                Some(parent) => current = parent,
                None => return Ok(()),
            }
        }
        Err(anyhow!("block {} is nested inside itself", block))
    }

    /// Literal held by a constant node.
    pub fn constant_value(&self, node: NodeId) -> Result<&AttrValue> {
        let node = self.node(node)?;
        if !node.is_constant() {
            return Err(anyhow!("node {} ({}) is not a constant", node.id, node.kind));
        }
        node.attrs
            .get("value")
            .ok_or_else(|| anyhow!("constant {} has no value", node.id))
    }
}
