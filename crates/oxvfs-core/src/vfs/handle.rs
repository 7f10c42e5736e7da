//! File handles.
//!
//! A handle is either a reader or an append-only writer:
//!
//! - **Readers** decrypt one page at a time into a staging buffer and serve
//!   reads from it. They can seek anywhere in `0..=size`. Reading a directory
//!   handle yields its listing as a JSON array of [`DirEntry`].
//! - **Writers** accumulate input and seal each full page as soon as it is
//!   available. The first page written replaces the previous content of the
//!   file and fixes its content type if none is set. `close` seals the final
//!   partial page, records the size and persists the tree.
//!
//! Pages are always exactly one page size except the last, so a byte offset
//! maps to page `offset / page_size` at `offset % page_size`.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, instrument, trace, warn};

use super::filesystem::FileSystem;
use super::flags::OpenMode;
use super::lock::WriterGuard;
use super::sniff::detect_content_type;
use super::VfsError;
use crate::tree::{BlobId, DirEntry, DirectoryTree, FileData, NodeId, NodeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Open,
    Closed,
}

pub struct FileHandle {
    fs: FileSystem,
    id: NodeId,
    mode: OpenMode,
    is_dir: bool,
    state: HandleState,
    /// Plaintext position. For writers: bytes already sealed into pages.
    offset: u64,
    /// Readers: the current decrypted page. Writers: input not yet sealed.
    buf: Vec<u8>,
    buf_pos: usize,
    listing: Option<Vec<u8>>,
    guard: Option<WriterGuard>,
}

fn file_data<'a>(tree: &'a DirectoryTree, id: &NodeId) -> Result<&'a FileData, VfsError> {
    tree.node(id)?
        .as_file()
        .ok_or_else(|| VfsError::IsDirectory { id: id.clone() })
}

impl FileHandle {
    pub(super) fn for_read(fs: FileSystem, id: NodeId, is_dir: bool) -> Self {
        Self::new(fs, id, OpenMode::Read, is_dir, None)
    }

    pub(super) fn for_write(fs: FileSystem, id: NodeId, guard: WriterGuard) -> Self {
        Self::new(fs, id, OpenMode::Write, false, Some(guard))
    }

    fn new(
        fs: FileSystem,
        id: NodeId,
        mode: OpenMode,
        is_dir: bool,
        guard: Option<WriterGuard>,
    ) -> Self {
        trace!(%id, %mode, is_dir, "Handle opened");
        Self {
            fs,
            id,
            mode,
            is_dir,
            state: HandleState::Open,
            offset: 0,
            buf: Vec::new(),
            buf_pos: 0,
            listing: None,
            guard,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_closed(&self) -> bool {
        self.state == HandleState::Closed
    }

    fn ensure_open(&self) -> Result<(), VfsError> {
        match self.state {
            HandleState::Open => Ok(()),
            HandleState::Closed => Err(VfsError::Closed),
        }
    }

    fn require_mode(&self, mode: OpenMode, op: &'static str) -> Result<(), VfsError> {
        if self.mode != mode {
            return Err(VfsError::Permission {
                op,
                mode: self.mode,
            });
        }
        Ok(())
    }

    /// Current metadata of the node behind this handle.
    pub fn info(&self) -> Result<NodeInfo, VfsError> {
        self.ensure_open()?;
        self.fs.stat_id(&self.id)
    }

    /// Structured listing of a directory handle.
    pub fn read_dir(&self) -> Result<Vec<DirEntry>, VfsError> {
        self.ensure_open()?;
        if !self.is_dir {
            return Err(VfsError::NotDirectory {
                id: self.id.clone(),
            });
        }
        self.fs.list_id(&self.id)
    }

    fn read_into(&mut self, out: &mut [u8]) -> Result<usize, VfsError> {
        self.ensure_open()?;
        self.require_mode(OpenMode::Read, "read")?;
        if out.is_empty() {
            return Ok(0);
        }
        if self.is_dir {
            return self.read_listing(out);
        }

        let mut total = 0;
        while total < out.len() {
            match self.read_from_page(&mut out[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                // Hand back what we have; the error recurs on the next call
                Err(e) if total > 0 => {
                    debug!(id = %self.id, error = %e, "Short read before error");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn read_from_page(&mut self, out: &mut [u8]) -> Result<usize, VfsError> {
        if self.buf_pos >= self.buf.len() {
            let page_size = self.fs.page_size() as u64;
            let page_id = {
                let tree = self.fs.inner.read_tree()?;
                let file = file_data(&tree, &self.id)?;
                if self.offset >= file.size {
                    return Ok(0);
                }
                let index = (self.offset / page_size) as usize;
                file.pages.get(index).cloned().ok_or_else(|| {
                    VfsError::CorruptSnapshot(format!("file {} has no page {index}", self.id))
                })?
            };

            let page = self.fs.inner.load_blob(&page_id)?;
            let skip = (self.offset % page_size) as usize;
            if skip >= page.len() {
                return Err(VfsError::CorruptSnapshot(format!(
                    "page {page_id} holds {} bytes, expected more than {skip}",
                    page.len()
                )));
            }
            trace!(%page_id, skip, len = page.len(), "Page loaded");
            self.buf = page;
            self.buf_pos = skip;
        }

        let available = &self.buf[self.buf_pos..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.buf_pos += n;
        self.offset += n as u64;
        Ok(n)
    }

    fn read_listing(&mut self, out: &mut [u8]) -> Result<usize, VfsError> {
        if self.listing.is_none() {
            let entries = self.fs.list_id(&self.id)?;
            self.listing = Some(serde_json::to_vec(&entries)?);
        }
        let listing = self.listing.as_deref().unwrap_or_default();
        let start = usize::try_from(self.offset)
            .unwrap_or(usize::MAX)
            .min(listing.len());
        let n = out.len().min(listing.len() - start);
        out[..n].copy_from_slice(&listing[start..start + n]);
        self.offset += n as u64;
        Ok(n)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64, VfsError> {
        self.ensure_open()?;
        if self.is_dir {
            return Err(VfsError::InvalidOffset {
                reason: "directory handles are not seekable".to_string(),
            });
        }
        if self.mode == OpenMode::Write {
            return Err(VfsError::InvalidOffset {
                reason: "write handles are append-only".to_string(),
            });
        }

        let size = file_data(&*self.fs.inner.read_tree()?, &self.id)?.size;
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
        };
        if target < 0 || target > i128::from(size) {
            return Err(VfsError::InvalidOffset {
                reason: format!("{target} is outside 0..={size}"),
            });
        }

        self.offset = u64::try_from(target).map_err(|_| VfsError::InvalidOffset {
            reason: format!("{target} does not fit in u64"),
        })?;
        self.buf.clear();
        self.buf_pos = 0;
        Ok(self.offset)
    }

    /// Buffer `data` and seal any full pages.
    ///
    /// Once accepted, input is never rejected: a failure to seal is kept as
    /// backlog and retried on the next call. Only when a full page is still
    /// pending from an earlier failure is new input refused, with nothing
    /// taken from `data`.
    fn append(&mut self, data: &[u8]) -> Result<usize, VfsError> {
        self.ensure_open()?;
        self.require_mode(OpenMode::Write, "write")?;

        if self.buf.len() >= self.fs.page_size() {
            self.flush_pages(false).map_err(|e| VfsError::PartialWrite {
                pending: self.buf.len(),
                source: Box::new(e),
            })?;
        }

        self.buf.extend_from_slice(data);
        if let Err(e) = self.flush_pages(false) {
            debug!(error = %e, pending = self.buf.len(), "Sealing deferred");
        }
        Ok(data.len())
    }

    /// Seal buffered input into pages: every full page, plus the partial tail
    /// when `include_partial` is set. Sealed bytes leave the buffer even when
    /// a later page fails.
    #[instrument(level = "trace", skip(self), fields(id = %self.id, buffered = self.buf.len()))]
    fn flush_pages(&mut self, include_partial: bool) -> Result<(), VfsError> {
        let page_size = self.fs.page_size();
        let mut sealed = 0;
        let mut result = Ok(());
        while self.buf.len() - sealed >= page_size
            || (include_partial && sealed < self.buf.len())
        {
            let len = (self.buf.len() - sealed).min(page_size);
            if let Err(e) = self.seal_page(sealed, len) {
                result = Err(e);
                break;
            }
            sealed += len;
        }
        self.buf.drain(..sealed);
        result
    }

    fn seal_page(&mut self, start: usize, len: usize) -> Result<(), VfsError> {
        let page = &self.buf[start..start + len];
        let page_id = BlobId::generate();
        self.fs.inner.store_blob(&page_id, page)?;

        {
            let mut tree = self.fs.inner.write_tree()?;
            let node = tree.node_mut(&self.id)?;
            let sniffed = (self.offset == 0
                && node.as_file().is_some_and(|f| f.content_type.is_none()))
            .then(|| detect_content_type(node.name(), &self.buf[start..]))
            .flatten();
            let file = node
                .as_file_mut()
                .ok_or_else(|| VfsError::IsDirectory { id: self.id.clone() })?;
            if self.offset == 0 {
                let replaced = file.truncate();
                if let Some(mime) = sniffed {
                    file.content_type = Some(mime.to_string());
                }
                if !replaced.is_empty() {
                    debug!(orphaned_pages = replaced.len(), "Previous content replaced");
                }
            }
            file.pages.push(page_id);
            file.size = self.offset + len as u64;
            node.touch();
        }

        self.offset += len as u64;
        Ok(())
    }

    /// Close the handle.
    ///
    /// For writers this seals the remaining input, records the final size
    /// and persists the tree; only then is the writer lock released. If that
    /// fails the handle stays open and `close` may be retried.
    #[instrument(level = "debug", skip(self), fields(id = %self.id, mode = %self.mode))]
    pub fn close(&mut self) -> Result<(), VfsError> {
        self.ensure_open()?;
        if self.mode == OpenMode::Write {
            self.finish_write()?;
        }

        self.state = HandleState::Closed;
        self.guard = None;
        self.offset = 0;
        self.buf = Vec::new();
        self.buf_pos = 0;
        self.listing = None;
        Ok(())
    }

    fn finish_write(&mut self) -> Result<(), VfsError> {
        if !self.fs.inner.read_tree()?.contains(&self.id) {
            return Err(VfsError::NotFound {
                target: self.id.to_string(),
            });
        }
        self.flush_pages(true).map_err(|e| VfsError::PartialWrite {
            pending: self.buf.len(),
            source: Box::new(e),
        })?;

        // Nothing written: previous content stays as it was
        if self.offset > 0 {
            let mut tree = self.fs.inner.write_tree()?;
            let node = tree.node_mut(&self.id)?;
            let file = node
                .as_file_mut()
                .ok_or_else(|| VfsError::IsDirectory { id: self.id.clone() })?;
            file.size = self.offset;
            node.touch();
        }

        self.fs.inner.persist()?;
        debug!(size = self.offset, "Write handle closed");
        Ok(())
    }

    /// Store `data` as the thumbnail of this file, replacing any previous
    /// one. Persists the tree immediately.
    pub fn write_thumbnail(&self, data: &[u8]) -> Result<(), VfsError> {
        self.ensure_open()?;
        if self.is_dir {
            return Err(VfsError::IsDirectory {
                id: self.id.clone(),
            });
        }

        let existing = file_data(&*self.fs.inner.read_tree()?, &self.id)?
            .thumbnail
            .clone();
        let thumbnail_id = existing.unwrap_or_else(BlobId::generate);
        self.fs.inner.store_blob(&thumbnail_id, data)?;

        {
            let mut tree = self.fs.inner.write_tree()?;
            let file = tree
                .node_mut(&self.id)?
                .as_file_mut()
                .ok_or_else(|| VfsError::IsDirectory { id: self.id.clone() })?;
            file.thumbnail = Some(thumbnail_id);
        }
        self.fs.inner.persist()
    }

    pub fn read_thumbnail(&self) -> Result<Vec<u8>, VfsError> {
        self.ensure_open()?;
        if self.is_dir {
            return Err(VfsError::IsDirectory {
                id: self.id.clone(),
            });
        }

        let thumbnail_id = file_data(&*self.fs.inner.read_tree()?, &self.id)?
            .thumbnail
            .clone()
            .ok_or_else(|| VfsError::NotFound {
                target: format!("thumbnail of {}", self.id),
            })?;
        self.fs.inner.load_blob(&thumbnail_id)
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

/// Writes are buffered until a full page is available.
///
/// `write` either accepts all of its input or none of it. It fails with
/// [`VfsError::PartialWrite`] only while a full page from an earlier call is
/// still waiting to be stored, so retrying the same input is always safe.
/// `flush` retries that backlog; a partial page is only sealed at the end of
/// the file, so call [`FileHandle::close`] to finish.
impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.state == HandleState::Closed || self.mode != OpenMode::Write {
            return Ok(());
        }
        self.flush_pages(false).map_err(|e| VfsError::PartialWrite {
            pending: self.buf.len(),
            source: Box::new(e),
        })?;
        Ok(())
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("is_dir", &self.is_dir)
            .field("state", &self.state)
            .field("offset", &self.offset)
            .field("buffered", &self.buf.len())
            .finish_non_exhaustive()
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.state == HandleState::Open && self.mode == OpenMode::Write {
            warn!(
                id = %self.id,
                sealed = self.offset,
                discarded = self.buf.len(),
                "Write handle dropped without close(); size and tree were not persisted"
            );
        }
        // The writer guard releases the lock on its own drop
    }
}
