//! Logical directory traversal that reports every physical file once.
//!
//! Symbolic links are followed. Hard links, links back into an ancestor and
//! roots that overlap all lead to a file we have already seen; those are
//! recognised by device and inode and skipped, directories included, so a
//! symlink cycle is cut the first time it comes around.
//!
//! Enumeration order is whatever the filesystem gives us.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::{self, DirEntry, WalkDir};

use scan::is_elf_or_contains_elf;
use visit::{FileId, VisitSet};

#[derive(Debug, Fail)]
pub enum WalkError {
    #[fail(display = "failed to resolve {}", path)]
    PathResolution {
        path: String,
        #[cause]
        cause: io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Entries handed to the callback.
    pub reported: u64,
    /// Entries skipped because their file had already been seen.
    pub duplicates: u64,
    /// Entries that could not be examined.
    pub errors: u64,
}

/// Calls `callback` once for every file, directory and root reachable from
/// `roots`.
///
/// All roots are resolved before anything is visited; if one of them cannot
/// be, nothing is.
pub fn walk<P, F>(roots: &[P], mut callback: F) -> Result<WalkStats, WalkError>
    where P: AsRef<Path>, F: FnMut(&Path)
{
    walk_entries(roots, |entry| {
        callback(entry.path());
        true
    })
}

/// Like [`walk`], but only reports regular files that are ELF objects or `ar`
/// archives with at least one ELF member. The members themselves are never
/// reported.
pub fn walk_elfs<P, F>(roots: &[P], mut callback: F) -> Result<WalkStats, WalkError>
    where P: AsRef<Path>, F: FnMut(&Path)
{
    walk_classified(roots, |path, is_elf| {
        if is_elf {
            callback(path);
        }
    })
}

/// Calls `callback` for every newly seen entry, along with whether it is
/// something [`walk_elfs`] would report. `reported` in the result counts only
/// those.
pub fn walk_classified<P, F>(roots: &[P], mut callback: F) -> Result<WalkStats, WalkError>
    where P: AsRef<Path>, F: FnMut(&Path, bool)
{
    walk_entries(roots, |entry| {
        let is_elf = entry.file_type().is_file() && is_elf_or_contains_elf(entry.path());
        callback(entry.path(), is_elf);
        is_elf
    })
}

fn resolve_roots<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>, WalkError> {
    roots.iter()
        .map(|root| {
            let root = root.as_ref();
            fs::canonicalize(root).map_err(|cause| WalkError::PathResolution {
                path: root.display().to_string(),
                cause,
            })
        })
        .collect()
}

fn walk_entries<P, F>(roots: &[P], mut visit: F) -> Result<WalkStats, WalkError>
    where P: AsRef<Path>, F: FnMut(&DirEntry) -> bool
{
    let roots = resolve_roots(roots)?;
    let mut visited = VisitSet::new();
    let mut stats = WalkStats::default();

    for root in &roots {
        let mut entries = WalkDir::new(root).follow_links(true).into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    entry_error(&mut stats, &e);
                    continue;
                }
            };
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    entry_error(&mut stats, &e);
                    continue;
                }
            };
            if let Some(id) = FileId::of(&meta) {
                if visited.mark_id(id) {
                    if entry.file_type().is_dir() {
                        entries.skip_current_dir();
                    }
                    stats.duplicates += 1;
                    continue;
                }
            }
            if visit(&entry) {
                stats.reported += 1;
            }
        }
    }
    debug!("walk done: {} reported, {} duplicates, {} errors",
           stats.reported, stats.duplicates, stats.errors);
    Ok(stats)
}

fn entry_error(stats: &mut WalkStats, e: &walkdir::Error) {
    if e.loop_ancestor().is_some() {
        // Already marked on the way down.
        debug!("{}", e);
        stats.duplicates += 1;
    } else if e.io_error().map_or(false, |e| e.kind() == io::ErrorKind::NotFound) {
        debug!("{}", e);
        stats.errors += 1;
    } else {
        warn!("{}", e);
        stats.errors += 1;
    }
}
