//! Single-writer registry.
//!
//! At most one write handle may exist per file. Holding a [`WriterGuard`]
//! is that right; dropping it gives the right back.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::trace;

use super::VfsError;
use crate::tree::NodeId;

#[derive(Debug, Default)]
pub(crate) struct WriterRegistry {
    held: DashSet<NodeId>,
}

impl WriterRegistry {
    pub(crate) fn try_acquire(self: &Arc<Self>, id: &NodeId) -> Result<WriterGuard, VfsError> {
        if !self.held.insert(id.clone()) {
            return Err(VfsError::Busy { id: id.clone() });
        }
        trace!(%id, "Writer lock acquired");
        Ok(WriterGuard {
            registry: Arc::clone(self),
            id: id.clone(),
        })
    }

    pub(crate) fn is_held(&self, id: &NodeId) -> bool {
        self.held.contains(id)
    }

    /// Any file currently held, for reporting.
    pub(crate) fn any_held(&self) -> Option<NodeId> {
        self.held.iter().next().map(|id| id.key().clone())
    }
}

#[derive(Debug)]
pub(crate) struct WriterGuard {
    registry: Arc<WriterRegistry>,
    id: NodeId,
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        self.registry.held.remove(&self.id);
        trace!(id = %self.id, "Writer lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let registry = Arc::new(WriterRegistry::default());
        let id = NodeId::from("file");
        let guard = registry.try_acquire(&id).unwrap();
        assert!(matches!(registry.try_acquire(&id), Err(VfsError::Busy { .. })));
        assert!(registry.is_held(&id));

        drop(guard);
        assert!(!registry.is_held(&id));
        assert!(registry.try_acquire(&id).is_ok());
    }

    #[test]
    fn test_distinct_files_do_not_conflict() {
        let registry = Arc::new(WriterRegistry::default());
        let _a = registry.try_acquire(&NodeId::from("a")).unwrap();
        let _b = registry.try_acquire(&NodeId::from("b")).unwrap();
        assert!(registry.any_held().is_some());
    }
}
