//! In-memory directory tree.
//!
//! Nodes live in a flat map keyed by [`NodeId`]; directories hold ordered
//! child id lists and every non-root node points back at its parent. The tree
//! is persisted as one JSON snapshot:
//!
//! ```json
//! {"version": 1, "root": "<id>", "nodes": [{"id": "...", "type": "directory", ...}]}
//! ```
//!
//! Nodes are written in pre-order from the root, so snapshots of equal trees
//! are byte-identical apart from timestamps.

pub mod node;
pub mod path;

pub use node::{BlobId, DirEntry, DirectoryData, FileData, Node, NodeId, NodeInfo, NodeKind};
pub use path::{split_parent, split_path, validate_name};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Not found: {target}")]
    NotFound { target: String },

    #[error("Not a directory: {id}")]
    NotDirectory { id: NodeId },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("'{name}' already exists in directory {parent}")]
    AlreadyExists { name: String, parent: NodeId },

    #[error("Invalid move: {reason}")]
    InvalidMove { reason: String },

    #[error("Corrupt tree snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TreeError {
    fn not_found(target: impl ToString) -> Self {
        TreeError::NotFound {
            target: target.to_string(),
        }
    }
}

/// Aggregate counts over the whole tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub directories: usize,
    pub files: usize,
    pub total_size: u64,
    pub pages: usize,
    pub thumbnails: usize,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    root: &'a NodeId,
    nodes: Vec<&'a Node>,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    root: NodeId,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryTree {
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    /// A tree holding only an empty root directory.
    pub fn new() -> Self {
        let root = Node::new("", None, true);
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), root);
        Self {
            root: root_id,
            nodes,
        }
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root is never removed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id).ok_or_else(|| TreeError::not_found(id))
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(id).ok_or_else(|| TreeError::not_found(id))
    }

    fn directory(&self, id: &NodeId) -> Result<&Node, TreeError> {
        let node = self.node(id)?;
        if !node.is_dir() {
            return Err(TreeError::NotDirectory { id: id.clone() });
        }
        Ok(node)
    }

    pub fn children(&self, id: &NodeId) -> Result<Vec<&Node>, TreeError> {
        let dir = self.directory(id)?;
        Ok(dir
            .children()
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .collect())
    }

    pub fn find_child(&self, parent: &NodeId, name: &str) -> Option<&Node> {
        self.nodes
            .get(parent)?
            .children()
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .find(|child| child.name == name)
    }

    /// Walk `segments` down from `start`.
    pub fn resolve(&self, start: &NodeId, segments: &[&str]) -> Result<&Node, TreeError> {
        let mut current = self.node(start)?;
        for segment in segments {
            if !current.is_dir() {
                return Err(TreeError::NotDirectory {
                    id: current.id.clone(),
                });
            }
            current = self
                .find_child(&current.id, segment)
                .ok_or_else(|| TreeError::not_found(segment))?;
        }
        Ok(current)
    }

    /// Resolve an absolute slash-separated path from the root.
    pub fn resolve_path(&self, path: &str) -> Result<&Node, TreeError> {
        self.resolve(&self.root, &split_path(path)).map_err(|e| match e {
            TreeError::NotFound { .. } => TreeError::not_found(path),
            other => other,
        })
    }

    /// Absolute path of `id`, or `None` if it is not in the tree.
    pub fn path_of(&self, id: &NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.nodes.get(id)?;
        while let Some(parent) = &current.parent {
            names.push(current.name.as_str());
            current = self.nodes.get(parent)?;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    /// True when `ancestor` lies on the parent chain of `id`.
    pub fn is_ancestor(&self, ancestor: &NodeId, id: &NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(|n| n.parent.as_ref());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(|n| n.parent.as_ref());
        }
        false
    }

    pub fn create_child(
        &mut self,
        parent: &NodeId,
        is_dir: bool,
        name: &str,
    ) -> Result<&Node, TreeError> {
        validate_name(name)?;
        self.directory(parent)?;
        if self.find_child(parent, name).is_some() {
            return Err(TreeError::AlreadyExists {
                name: name.to_string(),
                parent: parent.clone(),
            });
        }

        let node = Node::new(name, Some(parent.clone()), is_dir);
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        self.attach(parent, &id)?;
        trace!(%id, %parent, name, is_dir, "Node created");
        self.node(&id)
    }

    pub fn move_node(&mut self, id: &NodeId, new_parent: &NodeId) -> Result<(), TreeError> {
        if *id == self.root {
            return Err(TreeError::InvalidMove {
                reason: "cannot move the root directory".to_string(),
            });
        }
        let node = self.node(id)?;
        let name = node.name.clone();
        let old_parent = node.parent.clone();
        self.directory(new_parent)?;

        if id == new_parent || self.is_ancestor(id, new_parent) {
            return Err(TreeError::InvalidMove {
                reason: format!("cannot move {id} into itself or one of its descendants"),
            });
        }
        if old_parent.as_ref() == Some(new_parent) {
            return Ok(());
        }
        if self.find_child(new_parent, &name).is_some() {
            return Err(TreeError::AlreadyExists {
                name,
                parent: new_parent.clone(),
            });
        }

        if let Some(old_parent) = &old_parent {
            self.detach(old_parent, id);
        }
        self.attach(new_parent, id)?;
        self.node_mut(id)?.parent = Some(new_parent.clone());
        debug!(%id, to = %new_parent, "Node moved");
        Ok(())
    }

    pub fn rename(&mut self, id: &NodeId, new_name: &str) -> Result<(), TreeError> {
        validate_name(new_name)?;
        let node = self.node(id)?;
        let Some(parent) = node.parent.clone() else {
            return Err(TreeError::InvalidMove {
                reason: "cannot rename the root directory".to_string(),
            });
        };
        if node.name == new_name {
            return Ok(());
        }
        if self.find_child(&parent, new_name).is_some() {
            return Err(TreeError::AlreadyExists {
                name: new_name.to_string(),
                parent,
            });
        }

        let node = self.node_mut(id)?;
        node.name = new_name.to_string();
        node.touch();
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.touch();
        }
        Ok(())
    }

    /// Remove `id` and its whole subtree, returning the removed nodes.
    ///
    /// Removing an id that is not in the tree returns an empty list.
    pub fn remove(&mut self, id: &NodeId) -> Result<Vec<Node>, TreeError> {
        if *id == self.root {
            return Err(TreeError::InvalidMove {
                reason: "cannot remove the root directory".to_string(),
            });
        }
        let Some(node) = self.nodes.get(id) else {
            return Ok(Vec::new());
        };
        if let Some(parent) = node.parent.clone() {
            self.detach(&parent, id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children().iter().cloned());
                removed.push(node);
            }
        }
        debug!(%id, count = removed.len(), "Subtree removed");
        Ok(removed)
    }

    pub fn listing(&self, id: &NodeId) -> Result<Vec<DirEntry>, TreeError> {
        Ok(self
            .children(id)?
            .into_iter()
            .map(DirEntry::from)
            .collect())
    }

    pub fn stats(&self) -> TreeStats {
        self.nodes
            .values()
            .fold(TreeStats::default(), |mut stats, node| {
                match node.as_file() {
                    Some(file) => {
                        stats.files += 1;
                        stats.total_size += file.size;
                        stats.pages += file.pages.len();
                        stats.thumbnails += usize::from(file.thumbnail.is_some());
                    }
                    None => stats.directories += 1,
                }
                stats
            })
    }

    fn attach(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), TreeError> {
        let parent_node = self.node_mut(parent)?;
        let dir = parent_node
            .as_dir_mut()
            .ok_or_else(|| TreeError::NotDirectory { id: parent.clone() })?;
        dir.children.push(child.clone());
        parent_node.touch();
        Ok(())
    }

    fn detach(&mut self, parent: &NodeId, child: &NodeId) {
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            if let Some(dir) = parent_node.as_dir_mut() {
                dir.children.retain(|c| c != child);
            }
            parent_node.touch();
        }
    }

    /// Nodes in pre-order from the root.
    fn preorder(&self) -> Vec<&Node> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![&self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                ordered.push(node);
                stack.extend(node.children().iter().rev());
            }
        }
        ordered
    }

    pub fn to_snapshot(&self) -> Result<Vec<u8>, TreeError> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            root: &self.root,
            nodes: self.preorder(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    /// Rebuild a tree from [`to_snapshot`](Self::to_snapshot) output.
    ///
    /// The parent/child links are checked in both directions and every node
    /// must be reachable from the root.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, TreeError> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TreeError::CorruptSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut nodes = HashMap::with_capacity(snapshot.nodes.len());
        for node in snapshot.nodes {
            let id = node.id.clone();
            if nodes.insert(id.clone(), node).is_some() {
                return Err(TreeError::CorruptSnapshot(format!("duplicate node id {id}")));
            }
        }

        let tree = Self {
            root: snapshot.root,
            nodes,
        };
        tree.validate()?;
        Ok(tree)
    }

    fn validate(&self) -> Result<(), TreeError> {
        let corrupt = |msg: String| Err(TreeError::CorruptSnapshot(msg));

        match self.nodes.get(&self.root) {
            None => return corrupt(format!("root {} is missing", self.root)),
            Some(root) if !root.is_dir() || root.parent.is_some() => {
                return corrupt("root must be a parentless directory".to_string());
            }
            Some(_) => {}
        }

        for node in self.nodes.values() {
            if node.id != self.root {
                let Some(parent) = node.parent.as_ref().and_then(|p| self.nodes.get(p)) else {
                    return corrupt(format!("node {} has no valid parent", node.id));
                };
                if !parent.children().contains(&node.id) {
                    return corrupt(format!("node {} is not listed by its parent", node.id));
                }
            }

            let mut names = HashSet::new();
            for child_id in node.children() {
                let Some(child) = self.nodes.get(child_id) else {
                    return corrupt(format!("node {} lists missing child {child_id}", node.id));
                };
                if child.parent.as_ref() != Some(&node.id) {
                    return corrupt(format!("child {child_id} does not point back at {}", node.id));
                }
                if !names.insert(child.name.as_str()) {
                    return corrupt(format!("duplicate name '{}' in {}", child.name, node.id));
                }
            }
        }

        let mut seen = HashSet::new();
        let mut stack = vec![&self.root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return corrupt(format!("node {id} is reachable twice"));
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children());
            }
        }
        if seen.len() != self.nodes.len() {
            return corrupt(format!(
                "{} nodes are unreachable from the root",
                self.nodes.len() - seen.len()
            ));
        }
        Ok(())
    }
}
