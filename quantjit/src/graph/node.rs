use anyhow::Result;

use super::{BlockId, Graph, NodeId, ValueId};

/// One-line rendering of a node: `%y = aten::relu(%x)`.
pub fn describe_node(graph: &Graph, id: NodeId) -> Result<String> {
    let node = graph.node(id)?;
    let outputs = render_values(graph, node.outputs())?;
    let inputs = render_values(graph, node.inputs())?;
    let mut line = String::new();
    if !outputs.is_empty() {
        line.push_str(&outputs);
        line.push_str(" = ");
    }
    line.push_str(node.kind().qualified_name());
    if !node.attrs().items.is_empty() {
        let attrs = node
            .attrs()
            .items
            .iter()
            .map(|attr| format!("{}={}", attr.name, attr.value))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!("[{}]", attrs));
    }
    line.push_str(&format!("({})", inputs));
    if !node.scope().is_empty() {
        line.push_str(&format!(" # scope: {}", node.scope()));
    }
    Ok(line)
}

fn render_values(graph: &Graph, values: &[ValueId]) -> Result<String> {
    let rendered = values
        .iter()
        .map(|value| graph.debug_name(*value).map(|name| format!("%{}", name)))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(", "))
}

/// Pending work of `Graph::dump`: print `block` from node `cursor` on.
struct DumpFrame {
    block: BlockId,
    depth: usize,
    cursor: usize,
    /// Sub-block index, set until the block's header line is written.
    header: Option<usize>,
}

impl Graph {
    /// Multi-line rendering of the whole graph, nested blocks indented.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let inputs = render_values(self, self.inputs()?)?;
        out.push_str(&format!("graph({}):\n", inputs));

        let mut stack = vec![DumpFrame {
            block: self.root(),
            depth: 1,
            cursor: 0,
            header: None,
        }];
        while let Some(frame) = stack.pop() {
            let block = self.block(frame.block)?;
            let indent = "  ".repeat(frame.depth);
            if let Some(index) = frame.header {
                let params = render_values(self, block.params())?;
                let outer = "  ".repeat(frame.depth - 1);
                out.push_str(&format!("{}block{}({}):\n", outer, index, params));
            }
            let Some(node) = block.nodes().get(frame.cursor).copied() else {
                let outputs = render_values(self, block.outputs())?;
                out.push_str(&format!("{}-> ({})\n", indent, outputs));
                continue;
            };
            out.push_str(&indent);
            out.push_str(&describe_node(self, node)?);
            out.push('\n');

            stack.push(DumpFrame {
                cursor: frame.cursor + 1,
                header: None,
                ..frame
            });
            // Reversed so block0 is printed first.
            for (index, sub) in self.node(node)?.blocks().iter().enumerate().rev() {
                stack.push(DumpFrame {
                    block: *sub,
                    depth: frame.depth + 2,
                    cursor: 0,
                    header: Some(index),
                });
            }
        }
        Ok(out)
    }
}
