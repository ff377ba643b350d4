//! Synthetic `ar` archives and ELF stubs for integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Builds an archive member by member. GNU long names are collected into a
/// `//` table that is emitted ahead of the members referencing it.
pub struct ArchiveBuilder {
    table: Vec<u8>,
    members: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        ArchiveBuilder { table: Vec::new(), members: Vec::new() }
    }

    /// A name short enough for the fixed field, terminated with `/`.
    pub fn short(mut self, name: &str, data: &[u8]) -> Self {
        assert!(name.len() < 16);
        self.members.push((format!("{}/", name), data.to_vec()));
        self
    }

    /// BSD inline long name: `#1/<len>` with the name leading the data.
    pub fn bsd(mut self, name: &str, data: &[u8]) -> Self {
        let mut body = name.as_bytes().to_vec();
        body.extend_from_slice(data);
        self.members.push((format!("#1/{}", name.len()), body));
        self
    }

    /// GNU long name, stored in the extended filename table.
    pub fn gnu(mut self, name: &str, data: &[u8]) -> Self {
        let offset = self.table.len();
        self.table.extend_from_slice(name.as_bytes());
        self.table.extend_from_slice(b"/\n");
        self.members.push((format!("/{}", offset), data.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = b"!<arch>\n".to_vec();
        if !self.table.is_empty() {
            push_member(&mut out, "//", &self.table);
        }
        for &(ref name, ref data) in &self.members {
            push_member(&mut out, name, data);
        }
        out
    }

    pub fn write_to(&self, path: &Path) {
        File::create(path).unwrap().write_all(&self.build()).unwrap();
    }
}

pub fn header(name: &str, size: usize) -> Vec<u8> {
    let h = format!("{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n", name, 1_500_000_000, 0, 0, "100644", size);
    assert_eq!(h.len(), 60);
    h.into_bytes()
}

fn push_member(out: &mut Vec<u8>, name: &str, data: &[u8]) {
    out.extend(header(name, data.len()));
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(b'\n');
    }
}

/// Just enough of an ELF header to satisfy a magic check.
pub fn elf_stub() -> Vec<u8> {
    let mut data = b"\x7fELF\x02\x01\x01".to_vec();
    data.resize(64, 0);
    data
}

pub fn write_file(path: &Path, data: &[u8]) {
    File::create(path).unwrap().write_all(data).unwrap();
}
