//! Quantizable-operator lookup.
use std::collections::HashSet;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::graph::{Graph, NodeId, Symbol};

/// Operators quantized out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantizableOp {
    Conv2d,
    Convolution,
    Relu,
}

impl QuantizableOp {
    pub const ALL: [QuantizableOp; 3] = [
        QuantizableOp::Conv2d,
        QuantizableOp::Convolution,
        QuantizableOp::Relu,
    ];

    /// Full operator signature matched against node kinds.
    pub fn signature(self) -> &'static str {
        match self {
            QuantizableOp::Conv2d => {
                "aten::conv2d(Tensor input, Tensor weight, Tensor? bias=None, int[2] stride=1, \
                 int[2] padding=0, int[2] dilation=1, int groups=1) -> Tensor"
            }
            QuantizableOp::Convolution => {
                "aten::_convolution(Tensor input, Tensor weight, Tensor? bias, int[] stride, \
                 int[] padding, int[] dilation, bool transposed, int[] output_padding, \
                 int groups, bool benchmark, bool deterministic, bool cudnn_enabled) -> Tensor"
            }
            QuantizableOp::Relu => "aten::relu(Tensor self) -> Tensor",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuantizableOp::Conv2d => "conv2d",
            QuantizableOp::Convolution => "_convolution",
            QuantizableOp::Relu => "relu",
        }
    }
}

impl std::fmt::Display for QuantizableOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QuantizableOp {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "conv2d" => Ok(QuantizableOp::Conv2d),
            "_convolution" => Ok(QuantizableOp::Convolution),
            "relu" => Ok(QuantizableOp::Relu),
            _ => Err(anyhow!("unsupported quantizable op {}", value)),
        }
    }
}

/// Set of full operator signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorSet {
    signatures: HashSet<Symbol>,
}

impl OperatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_signatures<'a>(signatures: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut set = Self::new();
        for signature in signatures {
            set.insert(signature)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, signature: &str) -> Result<bool> {
        let symbol = Symbol::parse(signature)?;
        if !symbol.has_signature() {
            return Err(anyhow!(
                "operator set entries need a full signature: {}",
                signature
            ));
        }
        Ok(self.signatures.insert(symbol))
    }

    pub fn contains(&self, kind: &Symbol) -> bool {
        self.signatures.contains(kind)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

static DEFAULT_QUANTIZABLE: Lazy<OperatorSet> = Lazy::new(|| {
    OperatorSet::from_signatures(QuantizableOp::ALL.iter().map(|op| op.signature()))
        .expect("failed to build default quantizable operator set")
});

/// Decides whether a node takes part in quantization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpClassifier {
    quantizable: OperatorSet,
}

impl Default for OpClassifier {
    fn default() -> Self {
        Self {
            quantizable: DEFAULT_QUANTIZABLE.clone(),
        }
    }
}

impl OpClassifier {
    pub fn new(quantizable: OperatorSet) -> Self {
        Self { quantizable }
    }

    pub fn operators(&self) -> &OperatorSet {
        &self.quantizable
    }

    /// Exact signature match against the allow-list.
    pub fn is_quantizable(&self, graph: &Graph, node: NodeId) -> bool {
        graph
            .node(node)
            .map(|node| self.quantizable.contains(node.kind()))
            .unwrap_or(false)
    }
}
