//! Detection of ELF objects stored inside `ar` archives.
//!
//! Members are never extracted: the archive is mapped read-only and the first
//! bytes of each member's data are compared against the ELF magic in place.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;

use archive::Archive;
use magic::{self, EI_NIDENT};

/// Whether the archive at `path` has at least one ELF member. Anything that
/// is not a readable archive yields `false`.
pub fn contains_elf<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    match File::open(path) {
        Ok(file) => contains_elf_file(&file, path.display().to_string()),
        Err(_) => false,
    }
}

/// Like [`contains_elf`], reading the archive from `file`'s current
/// position. The position is the same on return as on entry.
pub fn contains_elf_file<S: Into<String>>(file: &File, name: S) -> bool {
    let mut handle = file;
    let start = match handle.seek(SeekFrom::Current(0)) {
        Ok(pos) => pos,
        Err(_) => return false,
    };
    let found = scan_members(file, name.into());
    if let Err(e) = handle.seek(SeekFrom::Start(start)) {
        debug!("failed to restore file position: {}", e);
    }
    found
}

/// The combined predicate used to filter a walk.
pub fn is_elf_or_contains_elf<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    magic::is_elf_path(path) || contains_elf(path)
}

fn scan_members(file: &File, name: String) -> bool {
    let mut archive = match Archive::open(file, name, true) {
        Ok(archive) => archive,
        Err(_) => return false,
    };
    // SAFETY: the mapping is read-only and dropped before we return. Another
    // process truncating the file underneath us is the usual mmap caveat.
    let map = match unsafe { Mmap::map(file) } {
        Ok(map) => map,
        Err(e) => {
            debug!("{}: failed to map: {}", archive.name(), e);
            return false;
        }
    };

    for member in &mut archive {
        let member = match member {
            Ok(member) => member,
            Err(e) => {
                debug!("{}", e);
                return false;
            }
        };
        if member.data_len() < EI_NIDENT as u64 {
            continue;
        }
        let start = member.data_offset as usize;
        if map.get(start..).map_or(false, magic::has_elf_magic) {
            debug!("{}: ELF member", member.name);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn archive_with(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = b"!<arch>\n".to_vec();
        for &(name, data) in members {
            let header = format!("{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n", name, 0, 0, 0, "644", data.len());
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(data);
            if data.len() % 2 == 1 {
                out.push(b'\n');
            }
        }
        out
    }

    fn elf_object() -> Vec<u8> {
        let mut data = b"\x7fELF\x02\x01\x01".to_vec();
        data.resize(64, 0);
        data
    }

    fn temp_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn finds_elf_member() {
        let elf = elf_object();
        let file = temp_with(&archive_with(&[("notes.txt/", b"hello"), ("a.o/", &elf)]));
        assert!(contains_elf(file.path()));
        assert!(is_elf_or_contains_elf(file.path()));
    }

    #[test]
    fn no_elf_member() {
        let file = temp_with(&archive_with(&[("notes.txt/", b"hello"), ("data.bin/", &[0; 64])]));
        assert!(!contains_elf(file.path()));
        assert!(!is_elf_or_contains_elf(file.path()));
    }

    #[test]
    fn tiny_members_are_skipped() {
        let file = temp_with(&archive_with(&[("stub.o/", b"\x7fELF")]));
        assert!(!contains_elf(file.path()));
    }

    #[test]
    fn plain_elf_is_not_an_archive() {
        let file = temp_with(&elf_object());
        assert!(!contains_elf(file.path()));
        assert!(is_elf_or_contains_elf(file.path()));
    }

    #[test]
    fn handle_position_is_preserved() {
        let elf = elf_object();
        let mut bytes = b"prefix".to_vec();
        bytes.extend(archive_with(&[("a.o/", &elf)]));
        let tmp = temp_with(&bytes);

        let mut file = File::open(tmp.path()).unwrap();
        file.seek(SeekFrom::Start(6)).unwrap();
        assert!(contains_elf_file(&file, "embedded"));
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), 6);

        file.seek(SeekFrom::Start(0)).unwrap();
        assert!(!contains_elf_file(&file, "embedded"));
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), 0);
    }
}
