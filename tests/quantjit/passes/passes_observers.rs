use anyhow::Result;
use quantjit::{
    insert_observers, insert_observers_for_function, insert_observers_for_method, AttrValue,
    Function, Graph, Method, Module, NodeId, ObserverTemplate, OpAttrs, PassError, ValueType,
};

use crate::common;

/// inputs: x (tensor), flag (int), w (tensor)
/// c = conv2d(x, w); n = size(c); r = relu(c); k = <tensor constant>
fn conv_graph() -> Result<Graph> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_input(ValueType::tensor(), "x")?;
    g.add_input(ValueType::Int, "flag")?;
    let w = g.add_input(ValueType::tensor(), "w")?;

    let constant = g.create(quantjit::graph::symbol::CONSTANT, 0)?;
    let k = g.add_output(constant, ValueType::tensor())?;
    g.set_unique_name(k, "k")?;
    g.append(root, constant)?;

    let (_, c) = common::op(&mut g, root, common::conv2d(), &[x, w], "c")?;
    common::op_typed(&mut g, root, common::SIZE, &[c], "n", ValueType::Int)?;
    let (_, r) = common::op(&mut g, root, common::relu(), &[c], "r")?;
    g.register_output(root, r)?;
    Ok(g)
}

fn observed_names(g: &Graph, observers: &[NodeId]) -> Result<Vec<String>> {
    observers
        .iter()
        .map(|node| g.debug_name(g.node(*node)?.outputs()[0]))
        .collect()
}

#[test]
fn observes_activation_inputs_and_intermediate_tensors() -> Result<()> {
    let mut g = conv_graph()?;
    let observers = insert_observers(&mut g, &common::observer()?, 2)?;

    // k = 1 tensor activation (x; flag is an int, w is a weight), j = 2 (c, r).
    assert_eq!(observers.len(), 3);
    assert_eq!(common::placed(&g, common::OBSERVER).len(), 3);
    assert_eq!(
        observed_names(&g, &observers)?,
        vec!["x.observed", "c.observed", "r.observed"]
    );
    for observer in &observers {
        let node = g.node(*observer)?;
        assert_eq!(node.outputs().len(), 1);
        let observed = node.inputs()[0];
        assert_eq!(g.value(node.outputs()[0])?.ty, g.value(observed)?.ty);
    }
    Ok(())
}

#[test]
fn observer_reads_value_and_name_constant() -> Result<()> {
    let mut g = conv_graph()?;
    let observers = insert_observers(&mut g, &common::observer()?, 1)?;
    let c = common::value(&g, "c")?;

    let observer = observers
        .iter()
        .copied()
        .find(|node| g.node(*node).map(|n| n.inputs()[0] == c).unwrap_or(false))
        .expect("c is observed");
    let inputs = g.node(observer)?.inputs().to_vec();
    assert_eq!(inputs.len(), 2);
    let name_node = g.producer_node(inputs[1])?.expect("name constant");
    assert_eq!(g.constant_value(name_node)?, &AttrValue::Str("c".to_string()));
    Ok(())
}

#[test]
fn observers_do_not_replace_uses() -> Result<()> {
    let mut g = conv_graph()?;
    insert_observers(&mut g, &common::observer()?, 2)?;

    let c = common::value(&g, "c")?;
    let r = common::value(&g, "r")?;
    let relu = g.producer_node(r)?.expect("relu");
    assert_eq!(g.node(relu)?.inputs(), &[c]);
    assert_eq!(g.outputs()?, &[r]);
    Ok(())
}

#[test]
fn input_observers_lead_the_block_and_intermediates_follow_producers() -> Result<()> {
    let mut g = conv_graph()?;
    insert_observers(&mut g, &common::observer()?, 3)?;

    assert_eq!(
        common::kinds(&g, g.root())?,
        vec![
            // x
            "prim::Constant",
            common::OBSERVER,
            // w
            "prim::Constant",
            common::OBSERVER,
            // k, then the name constant for c
            "prim::Constant",
            "prim::Constant",
            "aten::conv2d",
            common::OBSERVER,
            "aten::size",
            "prim::Constant",
            "aten::relu",
            common::OBSERVER,
        ]
    );
    Ok(())
}

#[test]
fn constants_and_non_tensors_are_never_observed() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let n = g.add_input(ValueType::Int, "n")?;
    let constant = g.create(quantjit::graph::symbol::CONSTANT, 1)?;
    g.append(root, constant)?;
    common::op_typed(&mut g, root, common::SIZE, &[n], "m", ValueType::Int)?;

    let observers = insert_observers(&mut g, &common::observer()?, 1)?;
    assert!(observers.is_empty());
    assert!(common::placed(&g, common::OBSERVER).is_empty());
    Ok(())
}

#[test]
fn values_inside_nested_blocks_are_observed_in_place() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_input(ValueType::tensor(), "x")?;
    let (_, outer) = common::loop_node(&mut g, root)?;
    let (_, inner) = common::loop_node(&mut g, outer)?;
    let (_, r) = common::op(&mut g, inner, common::relu(), &[x], "deep")?;

    let observers = insert_observers(&mut g, &common::observer()?, 0)?;
    assert_eq!(observers.len(), 1);
    let observer = g.node(observers[0])?;
    assert_eq!(observer.owner(), Some(inner));
    assert_eq!(observer.inputs()[0], r);
    assert_eq!(
        common::kinds(&g, inner)?,
        vec!["prim::Constant", "aten::relu", common::OBSERVER]
    );
    Ok(())
}

#[test]
fn empty_graph_appends_input_observers() -> Result<()> {
    let mut g = Graph::new();
    g.add_input(ValueType::tensor(), "a")?;
    g.add_input(ValueType::tensor(), "b")?;

    let observers = insert_observers(&mut g, &common::observer()?, 2)?;
    assert_eq!(observed_names(&g, &observers)?, vec!["a.observed", "b.observed"]);
    assert_eq!(
        common::kinds(&g, g.root())?,
        vec!["prim::Constant", common::OBSERVER, "prim::Constant", common::OBSERVER]
    );
    Ok(())
}

#[test]
fn too_many_activation_inputs_is_a_precondition_violation() -> Result<()> {
    let mut g = conv_graph()?;
    let before = g.node_count();

    let err = insert_observers(&mut g, &common::observer()?, 4).unwrap_err();
    assert!(matches!(err, PassError::PreconditionViolation(_)));
    assert_eq!(g.node_count(), before);
    Ok(())
}

#[test]
fn template_kind_attrs_and_scope_are_cloned() -> Result<()> {
    let mut g = conv_graph()?;
    let mut attrs = OpAttrs::none();
    attrs.set("histogram_bins", AttrValue::Int(256));
    let template = common::observer()?
        .with_attrs(attrs.clone())
        .with_scope("calibration");

    let observers = insert_observers(&mut g, &template, 0)?;
    assert!(!observers.is_empty());
    for observer in observers {
        let node = g.node(observer)?;
        assert_eq!(node.kind().as_str(), common::OBSERVER);
        assert_eq!(node.attrs(), &attrs);
        assert_eq!(node.scope(), "calibration");
    }
    Ok(())
}

#[test]
fn template_from_node_rejects_wired_nodes() -> Result<()> {
    let mut g = conv_graph()?;
    let free = g.create(common::OBSERVER, 0)?;
    g.set_scope(free, "obs")?;
    let template = ObserverTemplate::from_node(&g, free)?;
    assert_eq!(template.scope, "obs");

    let x = common::value(&g, "x")?;
    let wired = g.create(common::OBSERVER, 0)?;
    g.add_node_input(wired, x)?;
    assert!(ObserverTemplate::from_node(&g, wired).is_err());
    let with_output = g.create(common::OBSERVER, 1)?;
    assert!(ObserverTemplate::from_node(&g, with_output).is_err());
    assert!(ObserverTemplate::new("observer").is_err());
    Ok(())
}

#[test]
fn method_variant_uses_declared_input_count() -> Result<()> {
    let mut module = Module::new("net");
    let mut method = Method::new("forward", conv_graph()?);
    method.num_inputs = 1;
    module.add_method(method)?;

    let observers = insert_observers_for_method(&mut module, "forward", &common::observer()?)?;
    let graph = &module.method("forward")?.graph;
    assert_eq!(
        observed_names(graph, &observers)?,
        vec!["x.observed", "c.observed", "r.observed"]
    );

    let err = insert_observers_for_method(&mut module, "missing", &common::observer()?)
        .unwrap_err();
    assert!(matches!(err, PassError::PreconditionViolation(_)));
    Ok(())
}

#[test]
fn function_variant_checks_declared_input_count() -> Result<()> {
    let mut function = Function::new("f", conv_graph()?);
    assert_eq!(function.num_inputs, 3);
    let observers = insert_observers_for_function(&mut function, &common::observer()?)?;
    assert_eq!(observers.len(), 4);

    let mut broken = Function::new("g", conv_graph()?);
    broken.num_inputs = 7;
    let err = insert_observers_for_function(&mut broken, &common::observer()?).unwrap_err();
    assert!(matches!(err, PassError::PreconditionViolation(_)));
    Ok(())
}
