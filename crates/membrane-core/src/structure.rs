//! The membrane structure — a rooted tree of region nodes.
//!
//! Nodes live in a flat arena keyed by [`NodeId`]; parent/child links are
//! id-based edges, so dissolution's re-parenting is a plain edge-list update
//! with no dangling references. Ids come from an explicit [`NodeIdGen`] owned
//! by the construction context, increase monotonically and are never reused.

use std::collections::BTreeMap;

use crate::error::CoreError;

/// Identifier of a tree node and of its region.
pub type NodeId = u64;

// ─────────────────────────────────────────────
// Id generator
// ─────────────────────────────────────────────

/// Monotonic node-id source, scoped to one model construction.
#[derive(Debug, Clone, Default)]
pub struct NodeIdGen {
    next: NodeId,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start handing out ids at `first` (used when replaying a persisted
    /// structure next to already-built models).
    pub fn starting_at(first: NodeId) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

// ─────────────────────────────────────────────
// MembraneStructure
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct NodeLinks {
    parent:   Option<NodeId>,
    children: Vec<NodeId>,
}

/// Rooted tree over an id-indexed arena.
///
/// Invariants: exactly one node (the skin) has no parent; a node's children
/// list it as their parent.
#[derive(Debug, Clone)]
pub struct MembraneStructure {
    nodes: BTreeMap<NodeId, NodeLinks>,
    root:  NodeId,
}

impl MembraneStructure {
    /// Create a structure holding only its root (skin) node.
    pub fn new(gen: &mut NodeIdGen) -> Self {
        let root = gen.next_id();
        let mut nodes = BTreeMap::new();
        nodes.insert(root, NodeLinks::default());
        Self { nodes, root }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent_of(&self, id: NodeId) -> Result<Option<NodeId>, CoreError> {
        self.links(id).map(|l| l.parent)
    }

    pub fn children_of(&self, id: NodeId) -> Result<&[NodeId], CoreError> {
        self.links(id).map(|l| l.children.as_slice())
    }

    pub fn num_children(&self, id: NodeId) -> Result<usize, CoreError> {
        self.links(id).map(|l| l.children.len())
    }

    pub fn is_leaf(&self, id: NodeId) -> Result<bool, CoreError> {
        self.links(id).map(|l| l.children.is_empty())
    }

    /// Append a fresh child under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, gen: &mut NodeIdGen) -> Result<NodeId, CoreError> {
        let links = self
            .nodes
            .get_mut(&parent)
            .ok_or(CoreError::NodeNotFound(parent))?;
        let child = gen.next_id();
        links.children.push(child);
        self.nodes.insert(
            child,
            NodeLinks { parent: Some(parent), children: Vec::new() },
        );
        Ok(child)
    }

    /// Remove `id`, re-parenting its children to its parent.
    ///
    /// The removed node's children are appended after the parent's remaining
    /// children. Returns the parent id, or `Ok(None)` when `id` is the root
    /// (the skin is never removed).
    pub fn remove_node(&mut self, id: NodeId) -> Result<Option<NodeId>, CoreError> {
        if id == self.root {
            return Ok(None);
        }
        let links = self
            .nodes
            .remove(&id)
            .ok_or(CoreError::NodeNotFound(id))?;
        // Only the root has no parent link, and the root was handled above.
        let Some(parent) = links.parent else { return Ok(None) };

        for &child in &links.children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parent = Some(parent);
            }
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&c| c != id);
            p.children.extend(links.children);
        }
        Ok(Some(parent))
    }

    /// Guarded search-and-apply: depth-first from `from`, short-circuiting
    /// each branch at the first node matching `pred`. The transform runs on
    /// that node and its result is returned; descent does not continue below
    /// a match, and no further nodes are visited once one is found.
    pub fn search_apply<T>(
        &self,
        from: NodeId,
        pred: impl Fn(NodeId, &Self) -> bool + Copy,
        apply: impl FnOnce(NodeId, &Self) -> T,
    ) -> Option<T> {
        let found = self.search(from, pred)?;
        Some(apply(found, self))
    }

    fn search(&self, from: NodeId, pred: impl Fn(NodeId, &Self) -> bool + Copy) -> Option<NodeId> {
        if !self.contains(from) {
            return None;
        }
        if pred(from, self) {
            return Some(from);
        }
        let children = self.nodes[&from].children.clone();
        children.into_iter().find_map(|c| self.search(c, pred))
    }

    fn links(&self, id: NodeId) -> Result<&NodeLinks, CoreError> {
        self.nodes.get(&id).ok_or(CoreError::NodeNotFound(id))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
