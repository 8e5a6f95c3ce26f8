mod observers;
mod quant_dequant;
mod stubs;

pub use observers::{
    insert_observers, insert_observers_for_function, insert_observers_for_method,
    ObserverTemplate,
};
pub use quant_dequant::{insert_quant_dequant, QParams, QdqPair, QuantDequantPass, RewriteSite};
pub use stubs::{fold_quant_nodes_into_inputs_outputs, propagate_quant_info, quant_linting};
