//! Worklist traversal over a block and every block nested under it.
//!
//! Blocks are kept on an explicit stack, so nesting depth never grows the
//! call stack. Sub-blocks are scheduled when their owning node is visited
//! and popped most-recent-first; no order is promised between a sub-block
//! and the later nodes of its parent.
use anyhow::Result;

use super::{BlockId, Graph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent {
    Node(NodeId),
    /// Every node of the block has been yielded.
    BlockEnd(BlockId),
}

/// Yields `Ok` events until the walk finishes, or one `Err` for a dangling
/// block or node handle after which the walk stops.
pub struct BlockWalk<'g> {
    graph: &'g Graph,
    stack: Vec<BlockId>,
    current: Option<(BlockId, Vec<NodeId>, usize)>,
}

impl<'g> BlockWalk<'g> {
    pub fn new(graph: &'g Graph, start: BlockId) -> Self {
        Self {
            graph,
            stack: vec![start],
            current: None,
        }
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<WalkEvent>> {
        self.stack.clear();
        self.current = None;
        Some(Err(err))
    }
}

impl Iterator for BlockWalk<'_> {
    type Item = Result<WalkEvent>;

    fn next(&mut self) -> Option<Result<WalkEvent>> {
        let graph = self.graph;
        loop {
            if let Some((block, nodes, cursor)) = self.current.as_mut() {
                if let Some(node) = nodes.get(*cursor).copied() {
                    *cursor += 1;
                    return match graph.node(node) {
                        Ok(found) => {
                            self.stack.extend(found.blocks().iter().copied());
                            Some(Ok(WalkEvent::Node(node)))
                        }
                        Err(err) => self.fail(err),
                    };
                }
                let block = *block;
                self.current = None;
                return Some(Ok(WalkEvent::BlockEnd(block)));
            }
            let block = self.stack.pop()?;
            // Snapshot: nodes inserted after this point are never visited.
            match graph.block(block) {
                Ok(found) => self.current = Some((block, found.nodes().to_vec(), 0)),
                Err(err) => return self.fail(err),
            }
        }
    }
}

impl Graph {
    /// Walk the whole graph from the top-level block.
    pub fn walk(&self) -> BlockWalk<'_> {
        BlockWalk::new(self, self.root())
    }

    pub fn walk_from(&self, block: BlockId) -> BlockWalk<'_> {
        BlockWalk::new(self, block)
    }
}
