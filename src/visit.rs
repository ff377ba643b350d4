//! Device/inode bookkeeping for a single walk.

use std::collections::HashSet;
use std::fs::Metadata;

/// Identity of a physical file: the device it lives on and its inode there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

impl FileId {
    pub fn new(dev: u64, ino: u64) -> Self { FileId { dev, ino } }

    /// `None` where the platform has no notion of inodes.
    #[cfg(unix)]
    pub fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(FileId::new(meta.dev(), meta.ino()))
    }

    #[cfg(not(unix))]
    pub fn of(_meta: &Metadata) -> Option<Self> { None }
}

const INITIAL_CAPACITY: usize = 256;

/// Set of files already handed to a walk's callback. A pair is reported as
/// new exactly once.
#[derive(Debug)]
pub struct VisitSet {
    seen: HashSet<FileId>,
}

impl VisitSet {
    pub fn new() -> Self {
        VisitSet { seen: HashSet::with_capacity(INITIAL_CAPACITY) }
    }

    /// Records `(dev, ino)`. Returns `true` if it had been recorded before.
    pub fn mark(&mut self, dev: u64, ino: u64) -> bool {
        self.mark_id(FileId::new(dev, ino))
    }

    pub fn mark_id(&mut self, id: FileId) -> bool {
        !self.seen.insert(id)
    }

    pub fn contains(&self, id: FileId) -> bool { self.seen.contains(&id) }

    pub fn len(&self) -> usize { self.seen.len() }

    pub fn is_empty(&self) -> bool { self.seen.is_empty() }
}

impl Default for VisitSet {
    fn default() -> Self { VisitSet::new() }
}
