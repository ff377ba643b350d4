extern crate elfwalk;
extern crate tempfile;

mod common;

use std::fs;
use std::path::PathBuf;

use common::{elf_stub, write_file, ArchiveBuilder};
use tempfile::tempdir;

#[test]
fn reports_elf_files_and_archives_with_elf_members() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("lib/nested")).unwrap();

    write_file(&root.join("prog"), &elf_stub());
    write_file(&root.join("README"), b"not an object file");
    write_file(&root.join("stub"), b"\x7fEL");
    ArchiveBuilder::new()
        .short("notes.txt", b"text")
        .gnu("a_long_object_file_name.o", &elf_stub())
        .write_to(&root.join("lib/libfoo.a"));
    ArchiveBuilder::new()
        .short("data.bin", &[0; 32])
        .write_to(&root.join("lib/nested/libdata.a"));

    let mut found = Vec::new();
    let stats = elfwalk::walk_elfs(&[root], |p| found.push(p.to_owned())).unwrap();
    found.sort();

    let root = fs::canonicalize(root).unwrap();
    assert_eq!(found, vec![root.join("lib/libfoo.a"), root.join("prog")]);
    assert_eq!(stats.reported, 2);
}

#[test]
fn a_file_root_is_reported() {
    let dir = tempdir().unwrap();
    let prog = dir.path().join("prog");
    write_file(&prog, &elf_stub());

    let mut found = Vec::new();
    elfwalk::walk_elfs(&[&prog], |p| found.push(p.to_owned())).unwrap();
    assert_eq!(found, vec![fs::canonicalize(&prog).unwrap()]);
}

#[test]
fn missing_root_is_fatal() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("prog"), &elf_stub());
    let roots = vec![dir.path().to_owned(), PathBuf::from("/no/such/root")];

    let mut found = 0;
    let result = elfwalk::walk_elfs(&roots[..], |_| found += 1);
    assert!(result.is_err());
    assert_eq!(found, 0);
}

#[cfg(unix)]
#[test]
fn linked_elf_is_reported_once() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("a")).unwrap();
    fs::create_dir(root.join("b")).unwrap();
    write_file(&root.join("a/prog"), &elf_stub());
    fs::hard_link(root.join("a/prog"), root.join("b/prog-hardlink")).unwrap();
    symlink("../a/prog", root.join("b/prog-symlink")).unwrap();
    symlink("../b", root.join("a/to_b")).unwrap();
    symlink("../a", root.join("b/to_a")).unwrap();

    let mut found = Vec::new();
    elfwalk::walk_elfs(&[root, root], |p| found.push(p.to_owned())).unwrap();
    assert_eq!(found.len(), 1, "{:?}", found);
}
