//! Format sniffing by leading magic bytes.
//!
//! Every predicate here answers "not this format" with `false`: a source that
//! cannot be opened, is too short, or fails to seek is indistinguishable from a
//! mismatch. Sniffing a seekable source never moves its position.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// `\x7fELF`
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
/// Size of the ELF identification block (`e_ident`).
pub const EI_NIDENT: usize = 16;
/// Global header of an `ar` container, without the trailing newline.
pub const AR_MAGIC: &[u8; 7] = b"!<arch>";

pub fn has_elf_magic(bytes: &[u8]) -> bool {
    bytes.len() >= ELF_MAGIC.len() && bytes[..ELF_MAGIC.len()] == ELF_MAGIC
}

pub fn has_archive_magic(bytes: &[u8]) -> bool {
    bytes.len() >= AR_MAGIC.len() && &bytes[..AR_MAGIC.len()] == &AR_MAGIC[..]
}

/// Whether `source` holds an ELF identification at its current position.
pub fn is_elf<R: Read + Seek>(source: &mut R) -> bool {
    let mut buf = [0; EI_NIDENT];
    match peek(source, &mut buf) {
        Ok(n) => has_elf_magic(&buf[..n]),
        Err(_) => false,
    }
}

/// Whether `source` holds the `ar` global header at its current position.
pub fn is_archive<R: Read + Seek>(source: &mut R) -> bool {
    let mut buf = [0; 7];
    match peek(source, &mut buf) {
        Ok(n) => has_archive_magic(&buf[..n]),
        Err(_) => false,
    }
}

pub fn is_elf_path<P: AsRef<Path>>(path: P) -> bool {
    match File::open(path) {
        Ok(mut file) => is_elf(&mut file),
        Err(_) => false,
    }
}

pub fn is_archive_path<P: AsRef<Path>>(path: P) -> bool {
    match File::open(path) {
        Ok(mut file) => is_archive(&mut file),
        Err(_) => false,
    }
}

/// Fills as much of `buf` as the source allows, then seeks back to where it
/// started. The position is restored even when the read fails.
fn peek<R: Read + Seek>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let start = source.seek(SeekFrom::Current(0))?;
    let read = read_full(source, buf);
    source.seek(SeekFrom::Start(start))?;
    read
}

/// Like `read_exact`, but reports how far it got instead of failing at EOF.
pub(crate) fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
