//! Quantize/dequantize insertion.
//!
//! One walk classifies every node-input edge and every block output, then
//! rewrites run in two batches: values produced by quantizable nodes are
//! wrapped once at their producer (all consumers follow), and edges feeding
//! a quantizable node from a non-quantizable producer are wrapped at that
//! consumer only.
use crate::classifier::OpClassifier;
use crate::error::{PassError, Result};
use crate::graph::{
    describe_node, symbol, AttrValue, Graph, InsertPoint, NodeId, ValueId, WalkEvent,
};
use crate::ledger::RewriteLedger;
use crate::logging::trace_full_enabled;

/// Quantization parameters installed on every quantize node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QParams {
    pub scale: f64,
    pub zero_point: i64,
}

impl Default for QParams {
    /// Placeholder until calibration data drives the parameters.
    fn default() -> Self {
        Self {
            scale: 1.0,
            zero_point: 0,
        }
    }
}

/// Where a quantize/dequantize pair was anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteSite {
    /// After the producer; every consumer reads the dequantized value.
    Output,
    /// Before this consumer; only its edge was redirected.
    Input(NodeId),
}

/// One inserted quantize/dequantize pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QdqPair {
    pub value: ValueId,
    pub quant: NodeId,
    pub dequant: NodeId,
    pub quantized: ValueId,
    pub dequantized: ValueId,
    pub site: RewriteSite,
}

#[derive(Debug, Clone, Default)]
pub struct QuantDequantPass {
    classifier: OpClassifier,
    qparams: QParams,
}

impl QuantDequantPass {
    pub fn new(classifier: OpClassifier) -> Self {
        Self {
            classifier,
            qparams: QParams::default(),
        }
    }

    pub fn with_qparams(mut self, qparams: QParams) -> Self {
        self.qparams = qparams;
        self
    }

    pub fn classifier(&self) -> &OpClassifier {
        &self.classifier
    }

    pub fn qparams(&self) -> QParams {
        self.qparams
    }

    fn produced_by_quantizable(&self, graph: &Graph, value: ValueId) -> Result<bool> {
        Ok(match graph.producer_node(value)? {
            Some(producer) => self.classifier.is_quantizable(graph, producer),
            None => false,
        })
    }

    /// Classify every edge without touching the graph.
    pub fn plan(&self, graph: &Graph) -> Result<RewriteLedger> {
        if self.classifier.operators().is_empty() {
            crate::warning!("insert_quant_dequant: classifier has no quantizable operators");
        }
        let mut ledger = RewriteLedger::new();
        for event in graph.walk() {
            match event? {
                WalkEvent::Node(node) => {
                    let consumer_quantizable = self.classifier.is_quantizable(graph, node);
                    for &value in graph.node(node)?.inputs() {
                        if !graph.value(value)?.is_tensor() {
                            continue;
                        }
                        if self.produced_by_quantizable(graph, value)? {
                            ledger.mark_output(value);
                        } else if consumer_quantizable {
                            ledger.mark_input(value, node);
                        }
                    }
                }
                // Block outputs are implicit consumers.
                WalkEvent::BlockEnd(block) => {
                    for &value in graph.block(block)?.outputs() {
                        if graph.value(value)?.is_tensor()
                            && self.produced_by_quantizable(graph, value)?
                        {
                            ledger.mark_output(value);
                        }
                    }
                }
            }
        }
        Ok(ledger)
    }

    /// Insert quantize/dequantize pairs; output-side pairs come first in the result.
    pub fn run(&self, graph: &mut Graph) -> Result<Vec<QdqPair>> {
        let mut ledger = self.plan(graph)?;
        let mut pairs = Vec::new();

        for value in ledger.pending_outputs() {
            pairs.push(self.wrap_output(graph, value)?);
            ledger.commit_output(value)?;
        }
        let output_side = pairs.len();
        for (value, consumer) in ledger.pending_inputs() {
            pairs.push(self.wrap_input(graph, value, consumer)?);
            ledger.commit_input(value, consumer)?;
        }

        crate::trace!(
            "insert_quant_dequant: {} output-side, {} input-side pairs",
            output_side,
            pairs.len() - output_side
        );
        if trace_full_enabled() {
            for pair in &pairs {
                crate::trace!("  {}", describe_node(graph, pair.quant)?);
                crate::trace!("  {}", describe_node(graph, pair.dequant)?);
            }
        }
        Ok(pairs)
    }

    fn create_pair(
        &self,
        graph: &mut Graph,
        value: ValueId,
        anchor: NodeId,
        site: RewriteSite,
    ) -> Result<QdqPair> {
        let name = graph.debug_name(value)?;
        let ty = graph.value(value)?.ty.clone();
        let scope = graph.node(anchor)?.scope().to_string();

        let quant = graph.create(symbol::QUANTIZE_LINEAR, 0)?;
        let quantized = graph.add_output(quant, ty.clone())?;
        graph.set_unique_name(quantized, &format!("{}.quant", name))?;

        let dequant = graph.create(symbol::DEQUANTIZE, 0)?;
        let dequantized = graph.add_output(dequant, ty)?;
        graph.set_unique_name(dequantized, &format!("{}.dequant", name))?;

        graph.set_scope(quant, scope.clone())?;
        graph.set_scope(dequant, scope)?;

        Ok(QdqPair {
            value,
            quant,
            dequant,
            quantized,
            dequantized,
            site,
        })
    }

    fn attach_inputs(&self, graph: &mut Graph, pair: &QdqPair) -> Result<()> {
        graph.add_node_input(pair.quant, pair.value)?;
        let at = InsertPoint::Before(pair.quant);
        let scale = graph.insert_constant(AttrValue::Float(self.qparams.scale), at)?;
        let zero_point = graph.insert_constant(AttrValue::Int(self.qparams.zero_point), at)?;
        graph.add_node_input(pair.quant, scale)?;
        graph.add_node_input(pair.quant, zero_point)?;
        graph.add_node_input(pair.dequant, pair.quantized)?;
        Ok(())
    }

    fn wrap_output(&self, graph: &mut Graph, value: ValueId) -> Result<QdqPair> {
        let producer = graph.producer_node(value)?.ok_or_else(|| {
            PassError::precondition(format!("value {} has no producing node", value))
        })?;
        let pair = self.create_pair(graph, value, producer, RewriteSite::Output)?;

        graph.insert_after(pair.quant, producer)?;
        graph.insert_after(pair.dequant, pair.quant)?;
        graph.replace_all_uses_with(value, pair.dequantized)?;

        self.attach_inputs(graph, &pair)?;
        Ok(pair)
    }

    fn wrap_input(&self, graph: &mut Graph, value: ValueId, consumer: NodeId) -> Result<QdqPair> {
        let pair = self.create_pair(graph, value, consumer, RewriteSite::Input(consumer))?;

        graph.insert_before(pair.dequant, consumer)?;
        graph.insert_before(pair.quant, pair.dequant)?;
        let replaced = graph.replace_input_with(consumer, value, pair.dequantized)?;
        if replaced == 0 {
            return Err(PassError::precondition(format!(
                "node {} no longer reads value {}",
                consumer, value
            )));
        }

        self.attach_inputs(graph, &pair)?;
        Ok(pair)
    }
}

/// Run the quant-dequant pass with the default operator allow-list and
/// placeholder parameters.
pub fn insert_quant_dequant(graph: &mut Graph) -> Result<Vec<QdqPair>> {
    QuantDequantPass::default().run(graph)
}
