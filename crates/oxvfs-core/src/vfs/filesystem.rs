//! The file system facade.
//!
//! A [`FileSystem`] owns the decrypted directory tree, the page key and a
//! handle to the blob store. It is cheap to clone; clones share all state.
//!
//! # Locking
//!
//! - The tree sits behind an `RwLock`.
//! - Structural changes (create, delete, move, rename) take the persist
//!   mutex and then the write lock, and hold both until the new snapshot is
//!   stored. If the snapshot cannot be written the previous tree is put
//!   back, so a failed call leaves nothing behind and can simply be retried.
//! - Write handles append pages under the write lock alone and persist when
//!   closed. That persist takes the mutex, then a read lock to snapshot the
//!   tree, and always writes the latest state.
//! - Write handles additionally hold a per-file [`WriterGuard`] from the
//!   writer registry.
//!
//! [`WriterGuard`]: super::lock::WriterGuard

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument, warn};

use super::VfsError;
use super::config::{
    CREDENTIAL_MARKER, FileSystemOptions, FsConfig, KEY_CONFIG, KEY_CREDENTIAL, KEY_TREE,
};
use super::flags::OpenFlags;
use super::handle::FileHandle;
use super::lock::WriterRegistry;
use crate::crypto::{PageKey, decrypt_page, encrypt_page};
use crate::store::{BlobStore, StoreOp};
use crate::tree::{
    BlobId, DirEntry, DirectoryTree, NodeId, NodeInfo, TreeStats, split_parent, split_path,
};

/// Result of [`FileSystem::create`].
#[derive(Debug)]
pub enum Created {
    /// A new empty file, already open for writing.
    File(FileHandle),
    Directory(NodeInfo),
}

impl Created {
    pub fn is_dir(&self) -> bool {
        matches!(self, Created::Directory(_))
    }

    pub fn into_file(self) -> Option<FileHandle> {
        match self {
            Created::File(handle) => Some(handle),
            Created::Directory(_) => None,
        }
    }
}

pub(super) struct FsInner {
    store: Arc<dyn BlobStore>,
    key: PageKey,
    config: FsConfig,
    tree: RwLock<DirectoryTree>,
    persist_lock: Mutex<()>,
    pub(super) writers: Arc<WriterRegistry>,
}

impl FsInner {
    pub(super) fn page_size(&self) -> usize {
        self.config.page_size
    }

    pub(super) fn read_tree(&self) -> Result<RwLockReadGuard<'_, DirectoryTree>, VfsError> {
        self.tree.read().map_err(|_| VfsError::LockPoisoned)
    }

    pub(super) fn write_tree(&self) -> Result<RwLockWriteGuard<'_, DirectoryTree>, VfsError> {
        self.tree.write().map_err(|_| VfsError::LockPoisoned)
    }

    /// Fetch and decrypt one page or thumbnail.
    pub(super) fn load_blob(&self, id: &BlobId) -> Result<Vec<u8>, VfsError> {
        let sealed = self
            .store
            .get(id.as_str())
            .map_err(|e| VfsError::storage(StoreOp::Get, id.as_str(), e))?;
        Ok(decrypt_page(&sealed, &self.key)?)
    }

    /// Encrypt and store one page or thumbnail.
    pub(super) fn store_blob(&self, id: &BlobId, plaintext: &[u8]) -> Result<(), VfsError> {
        write_sealed(self.store.as_ref(), id.as_str(), plaintext, &self.key)
    }

    /// Serialize, encrypt and store the tree.
    #[instrument(level = "debug", skip(self))]
    pub(super) fn persist(&self) -> Result<(), VfsError> {
        let _serialized = self.persist_lock.lock().map_err(|_| VfsError::LockPoisoned)?;
        let snapshot = self.read_tree()?.to_snapshot()?;
        write_sealed(self.store.as_ref(), KEY_TREE, &snapshot, &self.key)?;
        debug!(size = snapshot.len(), "Tree snapshot persisted");
        Ok(())
    }

    /// Apply `change` to the tree and persist it in one step.
    ///
    /// On any error, from `change` itself or from writing the snapshot, the
    /// tree is restored to its state before the call.
    pub(super) fn mutate<T>(
        &self,
        change: impl FnOnce(&mut DirectoryTree) -> Result<T, VfsError>,
    ) -> Result<T, VfsError> {
        let _serialized = self.persist_lock.lock().map_err(|_| VfsError::LockPoisoned)?;
        let mut tree = self.write_tree()?;
        let previous = tree.clone();

        let result = change(&mut *tree).and_then(|value| {
            let snapshot = tree.to_snapshot()?;
            write_sealed(self.store.as_ref(), KEY_TREE, &snapshot, &self.key)?;
            debug!(size = snapshot.len(), "Tree snapshot persisted");
            Ok(value)
        });
        if let Err(e) = &result {
            debug!(error = %e, "Tree change rolled back");
            *tree = previous;
        }
        result
    }
}

/// Encrypted virtual file system over a [`BlobStore`].
#[derive(Clone)]
pub struct FileSystem {
    pub(super) inner: Arc<FsInner>,
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("store", &self.inner.store)
            .field("page_size", &self.inner.config.page_size)
            .field("key", &self.inner.key)
            .finish_non_exhaustive()
    }
}

impl FileSystem {
    /// Open the file system in `store`, initializing it if the store is
    /// empty.
    pub fn open<S: BlobStore + 'static>(store: S, password: &str) -> Result<Self, VfsError> {
        Self::open_with(store, password, FileSystemOptions::default())
    }

    /// Like [`open`](Self::open), with options applied when the store gets
    /// initialized.
    ///
    /// For an existing store the password is checked against the credential
    /// blob before the tree is decrypted; a wrong password yields
    /// [`VfsError::Auth`] and leaves the store untouched.
    #[instrument(level = "info", skip_all)]
    pub fn open_with<S: BlobStore + 'static>(
        store: S,
        password: &str,
        options: FileSystemOptions,
    ) -> Result<Self, VfsError> {
        let store: Arc<dyn BlobStore> = Arc::new(store);

        let (config, key, tree) = match read_optional(store.as_ref(), KEY_CONFIG)? {
            Some(bytes) => {
                let config = FsConfig::from_bytes(&bytes)?;
                let key = config.kdf.derive(password)?;
                verify_credential(store.as_ref(), &key).inspect_err(|e| {
                    if matches!(e, VfsError::Auth) {
                        warn!("Password rejected by credential check");
                    }
                })?;
                let tree = load_tree(store.as_ref(), &key)?;
                info!(page_size = config.page_size, nodes = tree.len(), "Opened existing store");
                (config, key, tree)
            }
            None => {
                options.validate()?;
                let config = options.into_config();
                let key = config.kdf.derive(password)?;
                let tree = DirectoryTree::new();

                // Config last: its presence marks the store as initialized
                write_sealed(store.as_ref(), KEY_TREE, &tree.to_snapshot()?, &key)?;
                write_sealed(store.as_ref(), KEY_CREDENTIAL, CREDENTIAL_MARKER, &key)?;
                store
                    .put(KEY_CONFIG, &config.to_bytes()?)
                    .map_err(|e| VfsError::storage(StoreOp::Put, KEY_CONFIG, e))?;
                info!(page_size = config.page_size, "Initialized empty store");
                (config, key, tree)
            }
        };

        Ok(Self {
            inner: Arc::new(FsInner {
                store,
                key,
                config,
                tree: RwLock::new(tree),
                persist_lock: Mutex::new(()),
                writers: Arc::new(WriterRegistry::default()),
            }),
        })
    }

    pub fn root_id(&self) -> NodeId {
        // The root never changes, so a poisoned lock still holds the right id
        self.inner
            .tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .root_id()
            .clone()
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    pub fn config(&self) -> &FsConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> Result<TreeStats, VfsError> {
        Ok(self.inner.read_tree()?.stats())
    }

    /// Create a file or directory named `name` under `parent`.
    ///
    /// A new file comes back already open for writing. The tree is persisted
    /// before returning; if that fails the node is not created.
    #[instrument(level = "debug", skip(self), fields(parent = %parent))]
    pub fn create(&self, parent: &NodeId, is_dir: bool, name: &str) -> Result<Created, VfsError> {
        let info = self
            .inner
            .mutate(|tree| Ok(NodeInfo::from(tree.create_child(parent, is_dir, name)?)))?;

        if is_dir {
            return Ok(Created::Directory(info));
        }
        let guard = self.inner.writers.try_acquire(&info.id)?;
        Ok(Created::File(FileHandle::for_write(
            self.clone(),
            info.id,
            guard,
        )))
    }

    pub fn create_file(&self, parent: &NodeId, name: &str) -> Result<FileHandle, VfsError> {
        match self.create(parent, false, name)? {
            Created::File(handle) => Ok(handle),
            Created::Directory(info) => Err(VfsError::IsDirectory { id: info.id }),
        }
    }

    pub fn create_dir(&self, parent: &NodeId, name: &str) -> Result<NodeInfo, VfsError> {
        match self.create(parent, true, name)? {
            Created::Directory(info) => Ok(info),
            Created::File(handle) => Err(VfsError::NotDirectory {
                id: handle.id().clone(),
            }),
        }
    }

    /// [`create`](Self::create) addressed by absolute path. The parent must
    /// already exist.
    pub fn create_by_path(&self, path: &str, is_dir: bool) -> Result<Created, VfsError> {
        let (parents, name) = split_parent(path).ok_or_else(|| VfsError::AlreadyExists {
            name: "/".to_string(),
        })?;
        let parent = {
            let tree = self.inner.read_tree()?;
            tree.resolve(tree.root_id(), &parents)?.id().clone()
        };
        self.create(&parent, is_dir, name)
    }

    /// Create `path` and any missing parent directories.
    ///
    /// Existing directories along the way are reused; an existing file
    /// anywhere on the path is an error.
    #[instrument(level = "debug", skip(self))]
    pub fn create_dir_all(&self, path: &str) -> Result<NodeInfo, VfsError> {
        if let Ok(existing) = self.inner.read_tree()?.resolve_path(path)
            && existing.is_dir()
        {
            return Ok(NodeInfo::from(existing));
        }

        self.inner.mutate(|tree| {
            let mut current = tree.root_id().clone();
            for segment in split_path(path) {
                current = match tree.find_child(&current, segment) {
                    Some(child) if child.is_dir() => child.id().clone(),
                    Some(child) => {
                        return Err(VfsError::NotDirectory {
                            id: child.id().clone(),
                        });
                    }
                    None => tree.create_child(&current, true, segment)?.id().clone(),
                };
            }
            Ok(NodeInfo::from(tree.node(&current)?))
        })
    }

    /// Open an existing node.
    ///
    /// Directories can only be opened for reading; reading one yields its
    /// listing as JSON. At most one write handle may exist per file.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn open_node(&self, id: &NodeId, for_write: bool) -> Result<FileHandle, VfsError> {
        let is_dir = self.inner.read_tree()?.node(id)?.is_dir();
        if !for_write {
            return Ok(FileHandle::for_read(self.clone(), id.clone(), is_dir));
        }
        if is_dir {
            return Err(VfsError::IsDirectory { id: id.clone() });
        }
        let guard = self.inner.writers.try_acquire(id)?;
        Ok(FileHandle::for_write(self.clone(), id.clone(), guard))
    }

    pub fn open_by_path(&self, path: &str, for_write: bool) -> Result<FileHandle, VfsError> {
        let id = self.lookup(path)?;
        self.open_node(&id, for_write)
    }

    /// Open `path` according to `flags`, creating the file when `CREATE` is
    /// set and it does not exist yet.
    pub fn open_with_flags(&self, path: &str, flags: OpenFlags) -> Result<FileHandle, VfsError> {
        if flags.contains(OpenFlags::READ_ONLY)
            && (flags.contains(OpenFlags::WRITE_ONLY) || flags.contains(OpenFlags::CREATE))
        {
            return Err(VfsError::InvalidFlags(
                "READ_ONLY cannot be combined with WRITE_ONLY or CREATE",
            ));
        }

        match self.lookup(path) {
            Ok(id) => self.open_node(&id, flags.is_write()),
            Err(VfsError::NotFound { .. }) if flags.contains(OpenFlags::CREATE) => {
                match self.create_by_path(path, false)? {
                    Created::File(handle) => Ok(handle),
                    Created::Directory(info) => Err(VfsError::IsDirectory { id: info.id }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a node and its subtree. Removing a missing node succeeds.
    ///
    /// Page and thumbnail blobs of removed files stay in the store.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn delete(&self, id: &NodeId) -> Result<(), VfsError> {
        if !self.inner.read_tree()?.contains(id) {
            debug!("Node already absent");
            return Ok(());
        }
        let removed = self.inner.mutate(|tree| Ok(tree.remove(id)?))?;

        for node in removed.iter().filter(|n| self.inner.writers.is_held(n.id())) {
            warn!(id = %node.id(), "Deleted a file that is still open for writing");
        }
        let orphaned: usize = removed.iter().map(|n| n.blob_ids().count()).sum();
        debug!(nodes = removed.len(), orphaned_blobs = orphaned, "Subtree deleted");
        Ok(())
    }

    pub fn delete_by_path(&self, path: &str) -> Result<(), VfsError> {
        let id = self.lookup(path)?;
        self.delete(&id)
    }

    #[instrument(level = "debug", skip(self), fields(id = %id, to = %new_parent))]
    pub fn move_node(&self, id: &NodeId, new_parent: &NodeId) -> Result<(), VfsError> {
        self.inner.mutate(|tree| Ok(tree.move_node(id, new_parent)?))
    }

    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn rename(&self, id: &NodeId, new_name: &str) -> Result<(), VfsError> {
        self.inner.mutate(|tree| Ok(tree.rename(id, new_name)?))
    }

    /// Re-read the tree snapshot from the store, discarding in-memory state.
    ///
    /// Refused with [`VfsError::Busy`] while any write handle is open.
    pub fn reload(&self) -> Result<(), VfsError> {
        let mut tree = self.inner.write_tree()?;
        if let Some(id) = self.inner.writers.any_held() {
            return Err(VfsError::Busy { id });
        }
        *tree = load_tree(self.inner.store.as_ref(), &self.inner.key)?;
        debug!(nodes = tree.len(), "Tree reloaded");
        Ok(())
    }

    pub fn lookup(&self, path: &str) -> Result<NodeId, VfsError> {
        Ok(self.inner.read_tree()?.resolve_path(path)?.id().clone())
    }

    pub fn stat(&self, path: &str) -> Result<NodeInfo, VfsError> {
        Ok(NodeInfo::from(self.inner.read_tree()?.resolve_path(path)?))
    }

    pub fn stat_id(&self, id: &NodeId) -> Result<NodeInfo, VfsError> {
        Ok(NodeInfo::from(self.inner.read_tree()?.node(id)?))
    }

    pub fn path_of(&self, id: &NodeId) -> Result<String, VfsError> {
        self.inner
            .read_tree()?
            .path_of(id)
            .ok_or_else(|| VfsError::NotFound {
                target: id.to_string(),
            })
    }

    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>, VfsError> {
        let tree = self.inner.read_tree()?;
        let dir = tree.resolve_path(path)?;
        Ok(tree.listing(dir.id())?)
    }

    pub fn list_id(&self, id: &NodeId) -> Result<Vec<DirEntry>, VfsError> {
        Ok(self.inner.read_tree()?.listing(id)?)
    }
}

fn read_optional(store: &dyn BlobStore, key: &str) -> Result<Option<Vec<u8>>, VfsError> {
    match store.get(key) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(VfsError::storage(StoreOp::Get, key, e)),
    }
}

fn write_sealed(
    store: &dyn BlobStore,
    key: &str,
    plaintext: &[u8],
    page_key: &PageKey,
) -> Result<(), VfsError> {
    let sealed = encrypt_page(plaintext, page_key)?;
    store
        .put(key, &sealed)
        .map_err(|e| VfsError::storage(StoreOp::Put, key, e))
}

fn read_sealed(store: &dyn BlobStore, key: &str, page_key: &PageKey) -> Result<Vec<u8>, VfsError> {
    let sealed = read_optional(store, key)?
        .ok_or_else(|| VfsError::CorruptSnapshot(format!("required blob '{key}' is missing")))?;
    Ok(decrypt_page(&sealed, page_key)?)
}

fn verify_credential(store: &dyn BlobStore, key: &PageKey) -> Result<(), VfsError> {
    let marker = read_sealed(store, KEY_CREDENTIAL, key)?;
    if marker != CREDENTIAL_MARKER {
        return Err(VfsError::Auth);
    }
    Ok(())
}

fn load_tree(store: &dyn BlobStore, key: &PageKey) -> Result<DirectoryTree, VfsError> {
    let snapshot = read_sealed(store, KEY_TREE, key)?;
    Ok(DirectoryTree::from_snapshot(&snapshot)?)
}
