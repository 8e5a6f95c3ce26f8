#[path = "common/mod.rs"]
mod common;

#[path = "graph/graph_ir.rs"]
mod graph_ir;
#[path = "graph/graph_walk.rs"]
mod graph_walk;
#[path = "graph/graph_serde.rs"]
mod graph_serde;

#[path = "passes/passes_classifier.rs"]
mod passes_classifier;
#[path = "passes/passes_ledger.rs"]
mod passes_ledger;
#[path = "passes/passes_observers.rs"]
mod passes_observers;
#[path = "passes/passes_quant_dequant.rs"]
mod passes_quant_dequant;
#[path = "passes/passes_stubs.rs"]
mod passes_stubs;
