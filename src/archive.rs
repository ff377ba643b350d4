//! Sequential reader for `ar` containers.
//!
//! Handles the common dialects: plain 16-byte names terminated by `/`, GNU
//! long names stored in a `//` member and referenced as `/<offset>`, and BSD
//! inline names (`#1/<len>`) whose text precedes the member data.
//!
//! The reader never extracts anything. It hands out one [`Member`] per step,
//! recording where that member's data starts so callers can look at it in
//! place.

use std::convert::TryFrom;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::str;

use magic::{self, AR_MAGIC};

const HEADER_LEN: usize = 60;
const HEADER_MAGIC: &[u8; 2] = b"`\n";
/// Upper bound for `archive:member` display names.
pub const MAX_NAME_LEN: usize = 4096;

const GNU_NAME_TABLE: &[u8] = b"//";
const BSD_NAME_PREFIX: &[u8] = b"#1/";
const GNU_SYMBOL_TABLE: &[u8] = b"/";
const GNU_SYMBOL_TABLE_64: &[u8] = b"/SYM64/";

#[derive(Debug, Fail)]
pub enum ArchiveError {
    #[fail(display = "{}: not an ar archive", archive)]
    NotAnArchive { archive: String },
    #[fail(display = "{}: could not open", archive)]
    Open {
        archive: String,
        #[cause]
        cause: io::Error,
    },
    #[fail(display = "end of archive")]
    EndOfArchive,
    #[fail(display = "{}: corrupt archive: {}", archive, reason)]
    Corrupt { archive: String, reason: String },
    #[fail(display = "{}: GNU extended filename without special data section", archive)]
    MissingExtendedNameTable { archive: String },
}

/// One step of iteration. Owns its strings; nothing ties it to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// `<archive>:<member>`, at most [`MAX_NAME_LEN`] bytes.
    pub name: String,
    pub date: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    /// Size as declared by the header. For BSD inline names this includes the
    /// name bytes.
    pub size: u64,
    /// Absolute offset of the member's data in the archive.
    pub data_offset: u64,
    prefix_len: usize,
    inline_name_len: u64,
}

impl Member {
    /// The name inside the archive, without the `<archive>:` prefix.
    pub fn member_name(&self) -> &str {
        self.name.get(self.prefix_len..).unwrap_or("")
    }

    /// Bytes of actual content, not counting a BSD inline name.
    pub fn data_len(&self) -> u64 {
        self.size - self.inline_name_len
    }

    pub fn is_symbol_table(&self) -> bool {
        let name = self.member_name().as_bytes();
        name == GNU_SYMBOL_TABLE
            || name == GNU_SYMBOL_TABLE_64
            || name.starts_with(b"__.SYMDEF")
    }
}

/// Contents of the GNU `//` member. Names are separated by `\n`, which are
/// replaced by NUL so that a lookup ends at the name's own terminator.
#[derive(Debug)]
struct ExtendedNameTable {
    names: Vec<u8>,
}

impl ExtendedNameTable {
    fn new(mut names: Vec<u8>) -> Self {
        for byte in names.iter_mut() {
            if *byte == b'\n' {
                *byte = 0;
            }
        }
        names.push(0);
        ExtendedNameTable { names }
    }

    fn lookup(&self, offset: usize) -> Option<&[u8]> {
        let rest = self.names.get(offset..)?;
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let mut name = &rest[..end];
        if name.last() == Some(&b'/') {
            name = &name[..name.len() - 1];
        }
        Some(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Opened,
    Iterating,
    Exhausted,
    Corrupt,
    Closed,
}

/// An open `ar` container.
///
/// Once iteration ends, by reaching the end or by hitting an error, the
/// underlying source and name table are released and every further call to
/// [`Archive::next_member`] reports [`ArchiveError::EndOfArchive`].
pub struct Archive<R> {
    name: String,
    source: Option<R>,
    /// Length of the whole source, for telling a clean end from a short one.
    len: u64,
    skip: u64,
    names: Option<ExtendedNameTable>,
    verbose: bool,
    state: State,
}

impl Archive<File> {
    pub fn open_path<P: AsRef<Path>>(path: P, verbose: bool) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|cause| {
            if verbose {
                warn!("{}: could not open", name);
            }
            ArchiveError::Open { archive: name.clone(), cause }
        })?;
        Archive::open(file, name, verbose)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Reads the global header from the current position of `source`.
    ///
    /// `name` only serves as the prefix of member display names and in
    /// diagnostics.
    pub fn open<S: Into<String>>(mut source: R, name: S, verbose: bool) -> Result<Self, ArchiveError> {
        let name = name.into();
        let mut buf = [0; 7];
        match magic::read_full(&mut source, &mut buf) {
            Ok(n) if n == buf.len() && &buf == AR_MAGIC => {}
            Ok(_) => return Err(ArchiveError::NotAnArchive { archive: name }),
            Err(cause) => return Err(ArchiveError::Open { archive: name, cause }),
        }
        let len = match stream_len(&mut source) {
            Ok(len) => len,
            Err(cause) => return Err(ArchiveError::Open { archive: name, cause }),
        };
        Ok(Archive {
            name,
            source: Some(source),
            len,
            skip: 0,
            names: None,
            verbose,
            state: State::Opened,
        })
    }

    pub fn name(&self) -> &str { &self.name }

    /// Parses the next member header.
    ///
    /// The GNU `//` name table is consumed on the way and never returned.
    pub fn next_member(&mut self) -> Result<Member, ArchiveError> {
        match self.state {
            State::Opened | State::Iterating => {}
            State::Exhausted | State::Corrupt | State::Closed => return Err(ArchiveError::EndOfArchive),
        }
        self.state = State::Iterating;
        match self.read_member() {
            Ok(member) => Ok(member),
            Err(ArchiveError::EndOfArchive) => {
                self.release(State::Exhausted);
                Err(ArchiveError::EndOfArchive)
            }
            Err(e) => {
                self.release(State::Corrupt);
                Err(e)
            }
        }
    }

    /// Releases the source and the name table. Calling it again is a no-op.
    pub fn close(&mut self) {
        self.release(State::Closed);
    }

    fn release(&mut self, state: State) {
        self.source = None;
        self.names = None;
        if self.state != State::Closed {
            self.state = state;
        }
    }

    fn read_member(&mut self) -> Result<Member, ArchiveError> {
        loop {
            let header = self.read_header()?;

            if header[..16].starts_with(GNU_NAME_TABLE) {
                self.read_name_table(&header)?;
                continue;
            }

            let size = self.numeric_field("size", &header[48..58], 10);
            let (member_name, inline_name_len) = self.resolve_name(&header, size)?;
            let data_offset = self.position()?;
            let data_len = size - inline_name_len;
            if data_offset.checked_add(data_len).map_or(true, |end| end > self.len) {
                return Err(self.corrupt(format!(
                    "member data ({} bytes at offset {}) runs past end of archive", data_len, data_offset)));
            }

            let mut name = String::with_capacity(self.name.len() + 1 + member_name.len());
            name.push_str(&self.name);
            name.push(':');
            let prefix_len = name.len().min(MAX_NAME_LEN);
            name.push_str(&String::from_utf8_lossy(&member_name));
            truncate_at_boundary(&mut name, MAX_NAME_LEN);

            let member = Member {
                name,
                date: self.numeric_field("date", &header[16..28], 10),
                uid: self.numeric_field("uid", &header[28..34], 10) as u32,
                gid: self.numeric_field("gid", &header[34..40], 10) as u32,
                mode: self.numeric_field("mode", &header[40..48], 8) as u32,
                size,
                data_offset,
                prefix_len,
                inline_name_len,
            };
            self.skip = data_len;
            return Ok(member);
        }
    }

    /// Skips whatever is left of the previous member and reads the next
    /// 60-byte header, absorbing a leading alignment newline.
    fn read_header(&mut self) -> Result<[u8; HEADER_LEN], ArchiveError> {
        let skip = self.skip;
        self.skip = 0;
        if skip > 0 {
            let offset = i64::try_from(skip).map_err(|_| self.corrupt("member size out of range"))?;
            self.source()?
                .seek(SeekFrom::Current(offset))
                .map_err(|e| self.corrupt(format!("seek failed: {}", e)))?;
        }

        let mut header = [0; HEADER_LEN];
        let n = magic::read_full(self.source()?, &mut header)
            .map_err(|e| self.corrupt(format!("read failed: {}", e)))?;
        if n == 0 || (n == 1 && header[0] == b'\n') {
            return Err(ArchiveError::EndOfArchive);
        }
        if n < HEADER_LEN {
            return Err(self.corrupt("truncated member header"));
        }

        if header[0] == b'\n' {
            header.copy_within(1.., 0);
            let n = magic::read_full(self.source()?, &mut header[HEADER_LEN - 1..])
                .map_err(|e| self.corrupt(format!("read failed: {}", e)))?;
            if n != 1 {
                return Err(self.corrupt("truncated member header"));
            }
        }

        if &header[58..60] != HEADER_MAGIC {
            // Embedded toolchains ship all sorts of mangled archives, so only
            // complain when asked to.
            if self.verbose {
                warn!("{}: invalid ar entry", self.name);
            } else {
                debug!("{}: invalid ar entry", self.name);
            }
            return Err(self.corrupt("invalid member header magic"));
        }
        Ok(header)
    }

    fn read_name_table(&mut self, header: &[u8; HEADER_LEN]) -> Result<(), ArchiveError> {
        if self.names.is_some() {
            warn!("{}: Duplicate GNU extended filename section", self.name);
            return Err(self.corrupt("duplicate GNU extended filename section"));
        }
        let size = self.numeric_field("size", &header[48..58], 10);
        let names = self.read_bytes(size, "extended filename section")?;
        self.names = Some(ExtendedNameTable::new(names));
        Ok(())
    }

    /// Returns the member's own name and how many bytes of its data were
    /// consumed to find it.
    fn resolve_name(&mut self, header: &[u8; HEADER_LEN], size: u64) -> Result<(Vec<u8>, u64), ArchiveError> {
        let field = &header[..16];

        if field.starts_with(BSD_NAME_PREFIX) {
            let len = self.numeric_field("BSD filename length", &field[3..], 10);
            if len > size {
                return Err(self.corrupt(format!(
                    "BSD filename length ({}) exceeds member size ({})", len, size)));
            }
            let mut name = self.read_bytes(len, "BSD extended filename")?;
            while name.last() == Some(&0) {
                name.pop();
            }
            return Ok((name, len));
        }

        if field[0] == b'/' && field[1].is_ascii_digit() {
            let offset = self.numeric_field("GNU filename offset", &field[1..], 10);
            let name = match self.names {
                Some(ref names) => usize::try_from(offset).ok().and_then(|o| names.lookup(o)).map(|n| n.to_vec()),
                None => {
                    warn!("{}: GNU extended filename without special data section", self.name);
                    return Err(ArchiveError::MissingExtendedNameTable { archive: self.name.clone() });
                }
            };
            return match name {
                Some(name) => Ok((name, 0)),
                None => Err(self.corrupt(format!("GNU filename offset {} outside name table", offset))),
            };
        }

        let mut name = trim_trailing_spaces(field);
        if name != GNU_SYMBOL_TABLE && name != GNU_SYMBOL_TABLE_64 && name.last() == Some(&b'/') {
            name = &name[..name.len() - 1];
        }
        Ok((name.to_vec(), 0))
    }

    fn read_bytes(&mut self, len: u64, what: &str) -> Result<Vec<u8>, ArchiveError> {
        let len = usize::try_from(len).map_err(|_| self.corrupt(format!("{} too large", what)))?;
        let mut buf = Vec::new();
        let read = self.source()?
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(|e| self.corrupt(format!("failed to read {}: {}", what, e)))?;
        if read != len {
            return Err(self.corrupt(format!("truncated {}", what)));
        }
        Ok(buf)
    }

    /// Decodes a space-padded numeric header field. Garbage decodes as zero;
    /// that is reported but never fatal.
    fn numeric_field(&self, what: &str, bytes: &[u8], radix: u32) -> u64 {
        match parse_number(bytes, radix) {
            Some(value) => value,
            None => {
                let text = String::from_utf8_lossy(bytes);
                if self.verbose {
                    warn!("{}: malformed {} field {:?}, assuming 0", self.name, what, text);
                } else {
                    debug!("{}: malformed {} field {:?}, assuming 0", self.name, what, text);
                }
                0
            }
        }
    }

    fn position(&mut self) -> Result<u64, ArchiveError> {
        self.source()?
            .seek(SeekFrom::Current(0))
            .map_err(|e| self.corrupt(format!("seek failed: {}", e)))
    }

    fn source(&mut self) -> Result<&mut R, ArchiveError> {
        match self.source {
            Some(ref mut source) => Ok(source),
            None => Err(ArchiveError::EndOfArchive),
        }
    }

    fn corrupt<S: Into<String>>(&self, reason: S) -> ArchiveError {
        ArchiveError::Corrupt { archive: self.name.clone(), reason: reason.into() }
    }
}

impl<R: Read + Seek> Iterator for Archive<R> {
    type Item = Result<Member, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_member() {
            Err(ArchiveError::EndOfArchive) => None,
            x => Some(x),
        }
    }
}

impl<R> fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("skip", &self.skip)
            .field("has_name_table", &self.names.is_some())
            .finish()
    }
}

fn stream_len<S: Seek>(source: &mut S) -> io::Result<u64> {
    let pos = source.seek(SeekFrom::Current(0))?;
    let len = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(pos))?;
    Ok(len)
}

fn parse_number(bytes: &[u8], radix: u32) -> Option<u64> {
    let text = str::from_utf8(bytes).ok()?.trim_matches(|c| c == ' ' || c == '\0');
    if text.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(text, radix).ok()
}

fn trim_trailing_spaces(mut bytes: &[u8]) -> &[u8] {
    while bytes.last() == Some(&b' ') {
        bytes = &bytes[..bytes.len() - 1];
    }
    bytes
}

fn truncate_at_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
