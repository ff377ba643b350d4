//! Locate ELF objects in a directory tree, including ones buried in `ar`
//! archives, visiting every physical file once.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
extern crate memmap2;
extern crate walkdir;
#[cfg(test)]
extern crate tempfile;

use std::fmt;

use failure::Fail;

pub mod archive;
pub mod logger;
pub mod magic;
pub mod scan;
pub mod visit;
pub mod walk;

pub use archive::{Archive, ArchiveError, Member};
pub use magic::{has_archive_magic, has_elf_magic, is_archive, is_archive_path, is_elf, is_elf_path};
pub use scan::{contains_elf, contains_elf_file, is_elf_or_contains_elf};
pub use visit::{FileId, VisitSet};
pub use walk::{walk, walk_classified, walk_elfs, WalkError, WalkStats};

pub struct PrettyErr<'a>(&'a dyn Fail);
impl<'a> fmt::Display for PrettyErr<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)?;
        let mut x: &dyn Fail = self.0;
        while let Some(cause) = x.cause() {
            f.write_str(": ")?;
            fmt::Display::fmt(&cause, f)?;
            x = cause;
        }
        Ok(())
    }
}

pub trait ErrorExt {
    fn pretty(&self) -> PrettyErr;
}

impl ErrorExt for failure::Error {
    fn pretty(&self) -> PrettyErr { PrettyErr(self.as_fail()) }
}

impl ErrorExt for WalkError {
    fn pretty(&self) -> PrettyErr { PrettyErr(self) }
}

impl ErrorExt for ArchiveError {
    fn pretty(&self) -> PrettyErr { PrettyErr(self) }
}
