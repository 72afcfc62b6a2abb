//! Compositor window tree and its traversal.

use serde::{Deserialize, Serialize};

/// One node of the tree returned by a `get_tree` query.
///
/// Only the fields the harness looks at are decoded; the rest of the
/// compositor's node description is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowNode {
    #[serde(default)]
    pub id: Option<i64>,
    /// Window title; `None` for split containers.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    /// Tiled children.
    #[serde(default)]
    pub nodes: Vec<WindowNode>,
    /// Floating children.
    #[serde(default)]
    pub floating_nodes: Vec<WindowNode>,
}

/// Named child groups of a [`WindowNode`], in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeGroup {
    Nodes,
    FloatingNodes,
}

impl NodeGroup {
    /// All groups in the order they are visited.
    pub const ALL: [Self; 2] = [Self::Nodes, Self::FloatingNodes];

    /// Returns the children of `node` in this group.
    #[must_use]
    pub fn children(self, node: &WindowNode) -> &[WindowNode] {
        match self {
            Self::Nodes => &node.nodes,
            Self::FloatingNodes => &node.floating_nodes,
        }
    }
}

impl WindowNode {
    /// Creates a leaf node with a title.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Pre-order, depth-first iterator over a window tree.
pub struct Walk<'a> {
    stack: Vec<&'a WindowNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a WindowNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for group in NodeGroup::ALL.iter().rev() {
            self.stack.extend(group.children(node).iter().rev());
        }
        Some(node)
    }
}

/// Visits `root`, then each child group in order, each child's subtree in sequence.
#[must_use]
pub fn walk(root: &WindowNode) -> Walk<'_> {
    Walk { stack: vec![root] }
}

/// Returns the titles of every titled node, in traversal order.
#[must_use]
pub fn window_names(root: &WindowNode) -> Vec<&str> {
    walk(root).filter_map(|node| node.name.as_deref()).collect()
}
