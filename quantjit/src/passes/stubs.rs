//! Passes declared for the quantization flow but not written yet.
//!
//! Each fails before looking at the graph.
use crate::error::{PassError, Result};
use crate::graph::Graph;

fn not_implemented(pass: &'static str) -> Result<()> {
    crate::error!("{} invoked but not implemented", pass);
    Err(PassError::NotImplemented(pass))
}

/// Propagate quantization parameters along the graph.
pub fn propagate_quant_info(_graph: &mut Graph) -> Result<()> {
    not_implemented("propagate_quant_info")
}

/// Check a quantized graph for inconsistent quantize/dequantize placement.
pub fn quant_linting(_graph: &mut Graph) -> Result<()> {
    not_implemented("quant_linting")
}

/// Fold quantize/dequantize pairs into fixed-point kernel inputs and outputs.
pub fn fold_quant_nodes_into_inputs_outputs(_graph: &mut Graph) -> Result<()> {
    not_implemented("fold_quant_nodes_into_inputs_outputs")
}
