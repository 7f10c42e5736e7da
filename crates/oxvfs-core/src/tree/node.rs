use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a tree node. A UUID v4 in string form.
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
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store key of an encrypted blob (content page or thumbnail).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file or directory in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) parent: Option<NodeId>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
    #[serde(flatten)]
    pub(crate) kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Directory(DirectoryData),
    File(FileData),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryData {
    /// Child ids in insertion order.
    #[serde(default)]
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    pub size: u64,
    /// Page blob ids in content order. Every page but the last holds exactly
    /// one page-size worth of plaintext.
    #[serde(default)]
    pub pages: Vec<BlobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<BlobId>,
}

impl FileData {
    /// Forget the current content. The old page blobs are left in the store.
    pub(crate) fn truncate(&mut self) -> Vec<BlobId> {
        self.size = 0;
        std::mem::take(&mut self.pages)
    }
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, parent: Option<NodeId>, is_dir: bool) -> Self {
        let now = Utc::now();
        let kind = if is_dir {
            NodeKind::Directory(DirectoryData::default())
        } else {
            NodeKind::File(FileData::default())
        };
        Self {
            id: NodeId::generate(),
            name: name.into(),
            parent,
            created_at: now,
            modified_at: now,
            kind,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Plaintext size for files, zero for directories.
    pub fn size(&self) -> u64 {
        self.as_file().map_or(0, |f| f.size)
    }

    pub fn as_file(&self) -> Option<&FileData> {
        match &self.kind {
            NodeKind::File(f) => Some(f),
            NodeKind::Directory(_) => None,
        }
    }

    pub(crate) fn as_file_mut(&mut self) -> Option<&mut FileData> {
        match &mut self.kind {
            NodeKind::File(f) => Some(f),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&DirectoryData> {
        match &self.kind {
            NodeKind::Directory(d) => Some(d),
            NodeKind::File(_) => None,
        }
    }

    pub(crate) fn as_dir_mut(&mut self) -> Option<&mut DirectoryData> {
        match &mut self.kind {
            NodeKind::Directory(d) => Some(d),
            NodeKind::File(_) => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        self.as_dir()
            .map(|d| d.children.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Every blob this node references in the store.
    pub(crate) fn blob_ids(&self) -> impl Iterator<Item = &BlobId> {
        self.as_file()
            .into_iter()
            .flat_map(|f| f.pages.iter().chain(f.thumbnail.iter()))
    }
}

/// Owned metadata snapshot of a node, safe to hand out past a lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub is_dir: bool,
    pub size: u64,
    pub page_count: usize,
    pub child_count: usize,
    pub content_type: Option<String>,
    pub has_thumbnail: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<&Node> for NodeInfo {
    fn from(node: &Node) -> Self {
        let file = node.as_file();
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            parent: node.parent.clone(),
            is_dir: node.is_dir(),
            size: node.size(),
            page_count: file.map_or(0, |f| f.pages.len()),
            child_count: node.children().len(),
            content_type: file.and_then(|f| f.content_type.clone()),
            has_thumbnail: file.is_some_and(|f| f.thumbnail.is_some()),
            created_at: node.created_at,
            modified_at: node.modified_at,
        }
    }
}

/// One row of a directory listing.
///
/// This is also the element type of the JSON array streamed when a directory
/// handle is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntry {
    pub id: NodeId,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub modified_at: DateTime<Utc>,
}

impl From<&Node> for DirEntry {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            is_dir: node.is_dir(),
            size: node.size(),
            content_type: node.as_file().and_then(|f| f.content_type.clone()),
            modified_at: node.modified_at,
        }
    }
}
