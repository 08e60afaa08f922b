//! End-to-end: build an archive on disk, open it, and decode a dat file out of it.

use std::path::Path;
use std::sync::Arc;

use kalandra::common::hash::path_hash;
use kalandra::prelude::*;

const MAGIC: u64 = 0xBBBB_BBBB_BBBB_BBBB;

/// Wrap `payload` in a single-chunk container compressed with zstd.
fn container(payload: &[u8]) -> Vec<u8> {
    let chunk = zstd::encode_all(payload, 1).unwrap();

    let mut out = Vec::new();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&52u32.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&(chunk.len() as u64).to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 20]);
    assert_eq!(out.len(), 60);

    out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&chunk);
    out
}

/// Catalog bytecode: one shared "Data/" base, then the file names.
fn catalog(names: &[&str]) -> Vec<u8> {
    fn op(out: &mut Vec<u8>, command: i32, fragment: &str) {
        out.extend_from_slice(&command.to_le_bytes());
        out.extend_from_slice(fragment.as_bytes());
        out.push(0);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&0i32.to_le_bytes());
    op(&mut out, 1, "Data/");
    out.extend_from_slice(&0i32.to_le_bytes());
    for name in names {
        op(&mut out, 1, name);
    }
    out
}

/// Write an index and a single bundle holding `files` back to back.
fn write_archive(root: &Path, files: &[(&str, Vec<u8>)]) {
    let mut bundle = Vec::new();
    let mut records = Vec::new();
    for (name, data) in files {
        let path = format!("Data/{}", name);
        records.push((path_hash(&path), bundle.len() as u32, data.len() as u32));
        bundle.extend_from_slice(data);
    }

    let names: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
    let catalog = catalog(&names);

    let mut index = Vec::new();
    index.extend_from_slice(&1u32.to_le_bytes());
    index.extend_from_slice(&4u32.to_le_bytes());
    index.extend_from_slice(b"Main");
    index.extend_from_slice(&(bundle.len() as u32).to_le_bytes());

    index.extend_from_slice(&(records.len() as u32).to_le_bytes());
    for (hash, offset, size) in &records {
        index.extend_from_slice(&hash.to_le_bytes());
        index.extend_from_slice(&0u32.to_le_bytes());
        index.extend_from_slice(&offset.to_le_bytes());
        index.extend_from_slice(&size.to_le_bytes());
    }

    index.extend_from_slice(&1u32.to_le_bytes());
    for field in [0, 0, 0, catalog.len() as u32, 0] {
        index.extend_from_slice(&field.to_le_bytes());
    }
    index.extend_from_slice(&container(&catalog));

    std::fs::write(root.join("_.index.bin"), container(&index)).unwrap();
    std::fs::write(root.join("Main.bundle.bin"), container(&bundle)).unwrap();
}

/// Two rows of `{int Level, ref|string Name}` plus two trailing bytes each.
fn mods_dat() -> Vec<u8> {
    let mut out = 2u32.to_le_bytes().to_vec();
    for (level, pointer) in [(5i32, 8u32), (60, 16)] {
        out.extend_from_slice(&level.to_le_bytes());
        out.extend_from_slice(&pointer.to_le_bytes());
        out.extend_from_slice(&[0xAA, 0x01]);
    }
    out.extend_from_slice(&MAGIC.to_le_bytes());
    for text in ["Ab", "Xyz"] {
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out.extend_from_slice(&[0, 0, 0, 0]);
    }
    out
}

const SCHEMA: &str = r#"[
    {"name": "Mods.dat64", "fields": [
        {"id": "Level", "type": "int"},
        {"id": "Name", "type": "ref|string"}
    ]}
]"#;

#[test]
fn test_open_and_read() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(
        dir.path(),
        &[("Mods.dat64", mods_dat()), ("Readme.txt", b"hello".to_vec())],
    );

    let archive = Archive::open(dir.path(), Arc::new(ZstdDecompressor)).unwrap();
    assert_eq!(archive.file_count(), 2);
    assert_eq!(archive.index().catalog(), &["Data/Mods.dat64", "Data/Readme.txt"]);

    let readme = archive.get("Data/Readme.txt").unwrap();
    assert_eq!(archive.read(readme).unwrap(), b"hello");

    let found = archive.find_file(|p| p.ends_with(".dat64"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path(), "Data/Mods.dat64");
    assert!(archive.find("data/mods.DAT64").is_some());
}

#[test]
fn test_decode_dat_from_archive() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path(), &[("Mods.dat64", mods_dat())]);

    let archive = Archive::open(dir.path(), Arc::new(ZstdDecompressor)).unwrap();
    let decoder = RecordDecoder::new();
    let schemas = SchemaSet::from_json(SCHEMA, decoder.registry()).unwrap();

    let handle = archive.get("Data/Mods.dat64").unwrap();
    let dat = kalandra::decode_dat(&archive, handle, &schemas, &decoder).unwrap();

    assert_eq!(dat.row_count, 2);
    assert_eq!(dat.stride, 10);
    assert_eq!(dat.data_section_offset, 24);

    let levels: Vec<i32> = dat.records.iter().map(|r| r.get("Level").unwrap()).collect();
    let names: Vec<&str> = dat.records.iter().map(|r| r.get_str("Name").unwrap()).collect();
    assert_eq!(levels, [5, 60]);
    assert_eq!(names, ["Ab", "Xyz"]);

    for record in &dat.records {
        assert_eq!(record.remainder(), Some(&[0xAA, 0x01][..]));
        assert_eq!(record.get::<u8>("_RemainderByte").unwrap(), 0xAA);
    }
}

#[test]
fn test_decode_dat_without_schema() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path(), &[("Readme.txt", b"hello".to_vec())]);

    let archive = Archive::open(dir.path(), Arc::new(ZstdDecompressor)).unwrap();
    let decoder = RecordDecoder::new();
    let schemas = SchemaSet::from_json(SCHEMA, decoder.registry()).unwrap();

    let handle = archive.get("Data/Readme.txt").unwrap();
    let err = kalandra::decode_dat(&archive, handle, &schemas, &decoder).unwrap_err();
    assert!(matches!(err, kalandra::Error::NoSchema(path) if path == "Data/Readme.txt"));
}
