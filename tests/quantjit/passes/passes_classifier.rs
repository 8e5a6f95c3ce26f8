use anyhow::Result;
use quantjit::{Graph, OpClassifier, OperatorSet, QuantizableOp, ValueType};

use crate::common;

#[test]
fn default_allow_list_matches_exact_signatures() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_input(ValueType::tensor(), "x")?;
    let w = g.add_input(ValueType::tensor(), "w")?;
    let (relu, _) = common::op(&mut g, root, common::relu(), &[x], "r")?;
    let (conv, _) = common::op(&mut g, root, common::conv2d(), &[x, w], "c")?;
    let (convolution, _) = common::op(
        &mut g,
        root,
        QuantizableOp::Convolution.signature(),
        &[x, w],
        "cv",
    )?;
    let (bare, _) = common::op(&mut g, root, "aten::relu", &[x], "bare")?;
    let (inplace, _) = common::op(
        &mut g,
        root,
        "aten::relu_(Tensor(a!) self) -> Tensor(a!)",
        &[x],
        "ip",
    )?;
    let (sigmoid, _) = common::op(&mut g, root, common::SIGMOID, &[x], "s")?;

    let classifier = OpClassifier::default();
    assert!(classifier.is_quantizable(&g, relu));
    assert!(classifier.is_quantizable(&g, conv));
    assert!(classifier.is_quantizable(&g, convolution));
    assert!(!classifier.is_quantizable(&g, bare));
    assert!(!classifier.is_quantizable(&g, inplace));
    assert!(!classifier.is_quantizable(&g, sigmoid));
    assert_eq!(classifier.operators().len(), 3);
    Ok(())
}

#[test]
fn classification_is_stable_across_calls() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_input(ValueType::tensor(), "x")?;
    let (relu, _) = common::op(&mut g, root, common::relu(), &[x], "r")?;
    let (tanh, _) = common::op(&mut g, root, common::TANH, &[x], "t")?;

    let classifier = OpClassifier::default();
    for _ in 0..4 {
        assert!(classifier.is_quantizable(&g, relu));
        assert!(!classifier.is_quantizable(&g, tanh));
    }
    Ok(())
}

#[test]
fn signatures_compare_after_whitespace_normalization() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_input(ValueType::tensor(), "x")?;
    let w = g.add_input(ValueType::tensor(), "w")?;
    let spaced = "aten::conv2d(Tensor input,   Tensor weight, Tensor? bias=None,\n\
                  int[2] stride=1, int[2] padding=0, int[2] dilation=1, int groups=1)  -> Tensor";
    let (conv, _) = common::op(&mut g, root, spaced, &[x, w], "c")?;
    assert!(OpClassifier::default().is_quantizable(&g, conv));
    Ok(())
}

#[test]
fn custom_operator_set_replaces_defaults() -> Result<()> {
    let mut g = Graph::new();
    let root = g.root();
    let x = g.add_input(ValueType::tensor(), "x")?;
    let (relu, _) = common::op(&mut g, root, common::relu(), &[x], "r")?;
    let (sigmoid, _) = common::op(&mut g, root, common::SIGMOID, &[x], "s")?;

    let classifier = OpClassifier::new(OperatorSet::from_signatures([common::SIGMOID])?);
    assert!(classifier.is_quantizable(&g, sigmoid));
    assert!(!classifier.is_quantizable(&g, relu));
    Ok(())
}

#[test]
fn operator_set_requires_full_signatures() {
    let mut set = OperatorSet::new();
    assert!(set.insert("aten::relu").is_err());
    assert!(set.insert("relu(Tensor self) -> Tensor").is_err());
    assert!(set.is_empty());
}

#[test]
fn quantizable_op_names_roundtrip() -> Result<()> {
    for op in QuantizableOp::ALL {
        assert_eq!(op.as_str().parse::<QuantizableOp>()?, op);
    }
    assert!("sigmoid".parse::<QuantizableOp>().is_err());
    Ok(())
}

#[test]
fn default_allow_list_holds_every_quantizable_op() {
    let classifier = OpClassifier::default();
    assert_eq!(classifier.operators().len(), QuantizableOp::ALL.len());
    for op in QuantizableOp::ALL {
        let symbol = op.signature().parse().expect("well-formed signature");
        assert!(classifier.operators().contains(&symbol), "{} missing", op);
    }
}
