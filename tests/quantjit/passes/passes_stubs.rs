use anyhow::Result;
use quantjit::{
    fold_quant_nodes_into_inputs_outputs, propagate_quant_info, quant_linting, Graph, PassError,
    ValueType,
};

use crate::common;

fn sample_graph() -> Result<Graph> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_input(ValueType::tensor(), "x")?;
    let (_, r) = common::op(&mut g, root, common::relu(), &[x], "r")?;
    g.register_output(root, r)?;
    Ok(g)
}

#[test]
fn unimplemented_passes_fail_without_mutation() -> Result<()> {
    let passes: [(&str, fn(&mut Graph) -> quantjit::Result<()>); 3] = [
        ("propagate_quant_info", propagate_quant_info),
        ("quant_linting", quant_linting),
        (
            "fold_quant_nodes_into_inputs_outputs",
            fold_quant_nodes_into_inputs_outputs,
        ),
    ];
    for (name, pass) in passes {
        let mut g = sample_graph()?;
        let before = g.dump()?;
        let nodes = g.node_count();

        let err = pass(&mut g).unwrap_err();
        assert!(err.is_not_implemented(), "{} returned {}", name, err);
        assert!(matches!(err, PassError::NotImplemented(pass) if pass == name));
        assert_eq!(g.node_count(), nodes);
        assert_eq!(g.dump()?, before);
    }
    Ok(())
}

#[test]
fn unimplemented_passes_fail_every_time() -> Result<()> {
    let mut g = sample_graph()?;
    for _ in 0..3 {
        assert!(propagate_quant_info(&mut g).is_err());
        assert!(quant_linting(&mut g).is_err());
        assert!(fold_quant_nodes_into_inputs_outputs(&mut g).is_err());
    }
    Ok(())
}
