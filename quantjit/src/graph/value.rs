use serde::{Deserialize, Serialize};

use super::types::{BlockId, NodeId};

/// Element type carried by a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    F16,
    F32,
    F64,
    I8,
    U8,
    I32,
    I64,
    QInt8,
    QUInt8,
}

/// Static type tag of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Tensor {
        dtype: Option<ScalarType>,
        rank: Option<usize>,
    },
    Int,
    Float,
    Bool,
    Str,
    NoneType,
    List(Box<ValueType>),
    Optional(Box<ValueType>),
}

impl ValueType {
    /// Tensor of unknown dtype and rank.
    pub fn tensor() -> Self {
        ValueType::Tensor {
            dtype: None,
            rank: None,
        }
    }

    pub fn tensor_of(dtype: ScalarType, rank: usize) -> Self {
        ValueType::Tensor {
            dtype: Some(dtype),
            rank: Some(rank),
        }
    }

    /// True when this type is a subtype of the generic tensor type.
    ///
    /// Containers of tensors are not tensors themselves.
    pub fn is_tensor(&self) -> bool {
        matches!(self, ValueType::Tensor { .. })
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Tensor { dtype, rank } => match (dtype, rank) {
                (Some(dtype), Some(rank)) => write!(f, "Tensor<{:?}, {}>", dtype, rank),
                (Some(dtype), None) => write!(f, "Tensor<{:?}>", dtype),
                _ => write!(f, "Tensor"),
            },
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Str => write!(f, "str"),
            ValueType::NoneType => write!(f, "None"),
            ValueType::List(elem) => write!(f, "{}[]", elem),
            ValueType::Optional(elem) => write!(f, "{}?", elem),
        }
    }
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Producer {
    Node { node: NodeId, offset: usize },
    BlockParam { block: BlockId, offset: usize },
}

/// The consumer side of a use edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum User {
    Node(NodeId),
    BlockReturn(BlockId),
}

/// One consumer reference: `user` reads the value at input slot `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Use {
    pub user: User,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub producer: Producer,
    pub ty: ValueType,
    pub name: Option<String>,
    pub uses: Vec<Use>,
}

impl Value {
    pub(crate) fn new(producer: Producer, ty: ValueType) -> Self {
        Self {
            producer,
            ty,
            name: None,
            uses: Vec::new(),
        }
    }

    /// Producing node, or `None` for block and graph parameters.
    pub fn producer_node(&self) -> Option<NodeId> {
        match self.producer {
            Producer::Node { node, .. } => Some(node),
            Producer::BlockParam { .. } => None,
        }
    }

    pub fn is_tensor(&self) -> bool {
        self.ty.is_tensor()
    }
}
