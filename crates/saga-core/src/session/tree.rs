//! Branching tree of played turns.
//!
//! Nodes are linked by parent pointers only. A node's parent is fixed when it
//! is inserted, which keeps the structure acyclic. Siblings appear whenever a
//! turn is replayed or forked from the same parent, so tree order says
//! nothing about turn numbers.

use crate::error::{Result, SagaError};
use crate::scoring::GoalScore;
use crate::turn::AgentDecision;
use crate::world::WorldState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifier of a node inside one `SessionTree`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which half of a turn an in-flight node is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    CollectingActions,
    SynthesizingNarrative,
}

/// Transient fields filled while a node's turn is generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProgress {
    pub phase: ProgressPhase,
    pub headline: String,
    pub narration: String,
    /// (agent id, action) pairs in completion order
    pub agent_actions: Vec<(String, String)>,
}

impl Default for NodeProgress {
    fn default() -> Self {
        Self {
            phase: ProgressPhase::CollectingActions,
            headline: String::new(),
            narration: String::new(),
            agent_actions: Vec::new(),
        }
    }
}

/// One node of the session tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub world: WorldState,
    /// Player action text that produced this node, `None` for the root and
    /// for turns advanced without a declared action
    pub action: Option<String>,
    /// Actions written into agent histories by this node's turn
    #[serde(default)]
    pub applied_actions: Vec<AgentDecision>,
    /// Agent id to 0-100 score, filled after the turn completes
    #[serde(default)]
    pub agent_scores: Option<HashMap<String, u8>>,
    /// The player's progress toward their goal at this node
    #[serde(default)]
    pub goal_score: Option<GoalScore>,
    #[serde(default)]
    pub progress: Option<NodeProgress>,
}

impl SessionNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// True while the node is a placeholder for a running turn.
    pub fn is_generating(&self) -> bool {
        self.progress.is_some()
    }
}

/// Rooted tree of `SessionNode`s.
#[derive(Debug, Clone, Default)]
pub struct SessionTree {
    nodes: HashMap<NodeId, SessionNode>,
    /// Children per node, in insertion order
    children: HashMap<NodeId, Vec<NodeId>>,
    root: Option<NodeId>,
}

impl SessionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn node(&self, id: &NodeId) -> Option<&SessionNode> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's progress and score fields. `parent` must
    /// not be changed through it; child links are indexed at insertion.
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut SessionNode> {
        self.nodes.get_mut(id)
    }

    /// Inserts a node and returns its id.
    ///
    /// # Arguments
    ///
    /// * `parent` - `None` creates the root
    /// * `world` - World state held by the node
    /// * `action` - Action text that produced the node
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Validation` when a second root is added, or
    /// `SagaError::NotFound` when the parent does not exist.
    pub fn add_node(
        &mut self,
        parent: Option<&NodeId>,
        world: WorldState,
        action: Option<String>,
    ) -> Result<NodeId> {
        match parent {
            None if self.root.is_some() => {
                return Err(SagaError::validation("session tree already has a root"));
            }
            Some(parent_id) if !self.nodes.contains_key(parent_id) => {
                return Err(SagaError::not_found("session node", parent_id.as_str()));
            }
            _ => {}
        }

        let id = NodeId::generate();
        let node = SessionNode {
            id: id.clone(),
            parent: parent.cloned(),
            world,
            action,
            applied_actions: Vec::new(),
            agent_scores: None,
            goal_score: None,
            progress: None,
        };

        match parent {
            Some(parent_id) => self
                .children
                .entry(parent_id.clone())
                .or_default()
                .push(id.clone()),
            None => self.root = Some(id.clone()),
        }
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Removes a leaf. Used to discard the placeholder of a failed turn.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Validation` if the node has children.
    pub fn remove_leaf(&mut self, id: &NodeId) -> Result<SessionNode> {
        if self.children.get(id).is_some_and(|c| !c.is_empty()) {
            return Err(SagaError::validation(format!("node {id} has children")));
        }
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| SagaError::not_found("session node", id.as_str()))?;

        self.children.remove(id);
        match &node.parent {
            Some(parent) => {
                if let Some(siblings) = self.children.get_mut(parent) {
                    siblings.retain(|child| child != id);
                    if siblings.is_empty() {
                        self.children.remove(parent);
                    }
                }
            }
            None => self.root = None,
        }
        Ok(node)
    }

    /// Children of `id`, oldest first.
    pub fn children(&self, id: &NodeId) -> Vec<&SessionNode> {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.nodes.get(child))
            .collect()
    }

    /// Nodes from the root down to `id`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::NotFound` for an unknown id.
    pub fn get_path(&self, id: &NodeId) -> Result<Vec<&SessionNode>> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| SagaError::not_found("session node", current.as_str()))?;
            path.push(node);
            cursor = node.parent.as_ref();
        }
        path.reverse();
        Ok(path)
    }

    /// Nodes sharing `id`'s parent, excluding `id`. The root has none.
    pub fn get_siblings(&self, id: &NodeId) -> Vec<&SessionNode> {
        let Some(parent) = self.nodes.get(id).and_then(|n| n.parent.as_ref()) else {
            return Vec::new();
        };
        self.children(parent)
            .into_iter()
            .filter(|node| &node.id != id)
            .collect()
    }

    /// Follows first children down from `id` until reaching a leaf.
    pub fn get_latest_descendant(&self, id: &NodeId) -> NodeId {
        let mut current = id.clone();
        while let Some(first) = self.children.get(&current).and_then(|c| c.first()) {
            current = first.clone();
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(turn: u32) -> WorldState {
        let mut world = WorldState::new("ctx", Vec::new());
        world.turn = turn;
        world
    }

    #[test]
    fn test_path_of_root_is_root() {
        let mut tree = SessionTree::new();
        let root = tree.add_node(None, world(0), None).unwrap();
        let path = tree.get_path(&root).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].id, root);
        assert!(tree.get_siblings(&root).is_empty());
    }

    #[test]
    fn test_second_root_rejected() {
        let mut tree = SessionTree::new();
        tree.add_node(None, world(0), None).unwrap();
        assert!(tree.add_node(None, world(0), None).unwrap_err().is_validation());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut tree = SessionTree::new();
        let err = tree
            .add_node(Some(&NodeId::from("missing")), world(1), None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_siblings_are_symmetric() {
        let mut tree = SessionTree::new();
        let root = tree.add_node(None, world(0), None).unwrap();
        let a = tree.add_node(Some(&root), world(1), Some("a".into())).unwrap();
        let b = tree.add_node(Some(&root), world(1), Some("b".into())).unwrap();
        let c = tree.add_node(Some(&root), world(1), Some("c".into())).unwrap();

        for (me, others) in [(&a, [&b, &c]), (&b, [&a, &c]), (&c, [&a, &b])] {
            let siblings: Vec<&NodeId> = tree.get_siblings(me).iter().map(|n| &n.id).collect();
            assert_eq!(siblings.len(), 2);
            assert!(!siblings.contains(&me));
            for other in others {
                assert!(siblings.contains(&other));
            }
        }
    }

    #[test]
    fn test_latest_descendant_follows_first_child() {
        let mut tree = SessionTree::new();
        let root = tree.add_node(None, world(0), None).unwrap();
        let first = tree.add_node(Some(&root), world(1), None).unwrap();
        let _fork = tree.add_node(Some(&root), world(1), None).unwrap();
        let deep = tree.add_node(Some(&first), world(2), None).unwrap();

        assert_eq!(tree.get_latest_descendant(&root), deep);
        assert_eq!(tree.get_latest_descendant(&deep), deep);

        let path: Vec<u32> = tree
            .get_path(&deep)
            .unwrap()
            .iter()
            .map(|n| n.world.turn)
            .collect();
        assert_eq!(path, vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_leaf_restores_tree() {
        let mut tree = SessionTree::new();
        let root = tree.add_node(None, world(0), None).unwrap();
        let child = tree.add_node(Some(&root), world(1), None).unwrap();

        assert!(tree.remove_leaf(&root).unwrap_err().is_validation());
        tree.remove_leaf(&child).unwrap();

        assert_eq!(tree.len(), 1);
        assert!(tree.children(&root).is_empty());
        assert_eq!(tree.get_latest_descendant(&root), root);
    }
}
