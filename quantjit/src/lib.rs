//! Graph rewriting passes that prepare a dataflow IR for reduced-precision
//! execution: observer instrumentation and quantize/dequantize insertion.

#[doc(hidden)]
pub mod logging;

pub mod classifier;
mod error;
pub mod graph;
pub mod ledger;
mod module;
pub mod passes;

pub use classifier::{OpClassifier, OperatorSet, QuantizableOp};
pub use error::{PassError, Result};
pub use graph::{
    describe_node, AttrValue, Block, BlockId, Graph, GraphDeserialize, GraphSerialize,
    InsertPoint, Node, NodeId, OpAttrs, ScalarType, Symbol, Value, ValueId, ValueType, WalkEvent,
};
pub use ledger::{RewriteLedger, RewriteState};
pub use module::{Function, Method, Module};
pub use passes::{
    fold_quant_nodes_into_inputs_outputs, insert_observers, insert_observers_for_function,
    insert_observers_for_method, insert_quant_dequant, propagate_quant_info, quant_linting,
    ObserverTemplate, QParams, QdqPair, QuantDequantPass, RewriteSite,
};
