//! The dependency graph - nodes wrapping inflated dependency contexts, with edges
//! pointing from a dependent to the nodes it requires as parents. A graph is built
//! once per resolution pass and is read-only afterwards; registering new bindings
//! rebuilds a fresh graph instead of mutating the live one.

pub mod builder;

use crate::context::ContextEntry;
use crate::error::CyclicComponentError;
use crate::key::ComponentKey;
use std::collections::VecDeque;

/// Index of a node within its [DependencyGraph].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
pub struct DependencyGraphNode {
    entry: ContextEntry,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
}

impl DependencyGraphNode {
    #[inline]
    pub fn entry(&self) -> &ContextEntry {
        &self.entry
    }

    /// Nodes this node requires - its dependencies.
    #[inline]
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Nodes which require this node - its dependents.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Default, Debug)]
pub struct DependencyGraph {
    nodes: Vec<DependencyGraphNode>,
    roots: Vec<NodeId>,
}

impl DependencyGraph {
    pub(crate) fn add_node(&mut self, entry: ContextEntry) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DependencyGraphNode {
            entry,
            parents: vec![],
            children: vec![],
        });

        id
    }

    pub(crate) fn add_root(&mut self, id: NodeId) {
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
    }

    pub(crate) fn add_edge(&mut self, child: NodeId, parent: NodeId) {
        if !self.nodes[child.0].parents.contains(&parent) {
            self.nodes[child.0].parents.push(parent);
            self.nodes[parent.0].children.push(child);
        }
    }

    pub fn node(&self, id: NodeId) -> &DependencyGraphNode {
        &self.nodes[id.0]
    }

    /// Entry points seeded during wiring, in deterministic insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DependencyGraphNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    /// All nodes answering for the given slot key.
    pub fn nodes_for_key(&self, key: &ComponentKey) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.entry.slot_key() == key)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Topological order with parents (dependencies) first, used for eager
    /// singleton warm-up. Nodes stuck behind unresolved parents indicate a cycle.
    pub fn resolution_order(&self) -> Result<Vec<NodeId>, CyclicComponentError> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|node| node.parents.len()).collect();
        let mut queue: VecDeque<NodeId> = self
            .nodes()
            .filter(|(_, node)| node.parents.is_empty())
            .map(|(id, _)| id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);

            for child in &self.nodes[id.0].children {
                remaining[child.0] -= 1;
                if remaining[child.0] == 0 {
                    queue.push_back(*child);
                }
            }
        }

        if order.len() == self.nodes.len() {
            return Ok(order);
        }

        let stuck: Vec<NodeId> = self
            .nodes()
            .filter(|(id, _)| remaining[id.0] > 0)
            .map(|(id, _)| id)
            .collect();
        let key = self.nodes[stuck[0].0].entry.slot_key().clone();
        let implicated = match stuck.len() {
            1 => Some(key.clone()),
            2 => Some(self.nodes[stuck[1].0].entry.slot_key().clone()),
            _ => None,
        };

        Err(CyclicComponentError { key, implicated })
    }
}
