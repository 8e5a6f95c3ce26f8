use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Literal constant node kind.
pub const CONSTANT: &str = "prim::Constant";
/// Quantize node kind inserted by the quant-dequant pass.
pub const QUANTIZE_LINEAR: &str = "aten::quantize_linear";
/// Dequantize node kind inserted by the quant-dequant pass.
pub const DEQUANTIZE: &str = "aten::dequantize";

/// Operator identity of a node: `namespace::name`, optionally followed by
/// the full argument signature, e.g. `aten::relu(Tensor self) -> Tensor`.
///
/// Whitespace runs are collapsed on construction so two spellings of the
/// same signature compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(text: &str) -> Result<Self> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let qualified = match normalized.find('(') {
            Some(open) => {
                if !normalized[open..].contains(')') {
                    return Err(anyhow!("unterminated argument list in symbol {}", text));
                }
                normalized[..open].trim_end()
            }
            None => normalized.as_str(),
        };
        let (namespace, name) = qualified
            .split_once("::")
            .ok_or_else(|| anyhow!("symbol {} is not namespace-qualified", text))?;
        if !is_ident(namespace) || !is_ident(name) {
            return Err(anyhow!("malformed symbol {}", text));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `namespace::name` without the argument signature.
    pub fn qualified_name(&self) -> &str {
        match self.0.find('(') {
            Some(open) => self.0[..open].trim_end(),
            None => &self.0,
        }
    }

    pub fn namespace(&self) -> &str {
        self.qualified_name()
            .split_once("::")
            .map(|(namespace, _)| namespace)
            .unwrap_or_default()
    }

    pub fn has_signature(&self) -> bool {
        self.0.contains('(')
    }

    pub fn is(&self, qualified_name: &str) -> bool {
        self.qualified_name() == qualified_name
    }
}

fn is_ident(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Symbol {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Symbol::parse(value)
    }
}

impl TryFrom<String> for Symbol {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}
