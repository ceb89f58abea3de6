//! Disposal: storage ownership, idempotence and the disposed state.

mod common;

use std::io::Read;
use std::sync::Arc;

use razip::{Archive, ArchiveMode, ArchiveOptions, Error, MemoryStorage};

use common::{CountingStorage, TestEntry, ZipBuilder, sample_text};

type Counted = CountingStorage<MemoryStorage>;

fn counted_archive(options: ArchiveOptions) -> (Arc<Counted>, Archive<Counted>) {
    let bytes = ZipBuilder::new()
        .entry(TestEntry::new("one.txt", &sample_text(1, 300)))
        .entry(TestEntry::stored("two.txt", b"second"))
        .build();
    let storage = Arc::new(CountingStorage::new(MemoryStorage::new(bytes)));
    let archive = Archive::open(Arc::clone(&storage), options).unwrap();
    (storage, archive)
}

#[test]
fn dispose_closes_owned_storage_once() {
    let (storage, archive) = counted_archive(ArchiveOptions::default());
    assert_eq!(storage.close_count(), 0);

    archive.dispose().unwrap();
    assert_eq!(storage.close_count(), 1);
    assert!(storage.inner().is_closed());

    archive.dispose().unwrap();
    archive.dispose().unwrap();
    assert_eq!(storage.close_count(), 1);
    assert!(archive.is_disposed());
}

#[test]
fn leave_open_keeps_storage_usable() {
    let (storage, archive) = counted_archive(ArchiveOptions::new().leave_open(true));
    archive.dispose().unwrap();
    drop(archive);

    assert_eq!(storage.close_count(), 0);
    assert!(!storage.inner().is_closed());

    // The same storage can back a fresh archive.
    let again = Archive::open(Arc::clone(&storage), ArchiveOptions::default()).unwrap();
    assert_eq!(again.len().unwrap(), 2);
}

#[test]
fn dropping_the_archive_disposes_it() {
    let (storage, archive) = counted_archive(ArchiveOptions::default());
    let entry = archive.entry("one.txt").unwrap().unwrap();
    drop(archive);

    assert_eq!(storage.close_count(), 1);
    assert!(matches!(entry.length(), Err(Error::Disposed)));
}

#[test]
fn archive_operations_fail_after_dispose() {
    let (_storage, archive) = counted_archive(ArchiveOptions::default());
    archive.dispose().unwrap();

    assert!(matches!(archive.entries(), Err(Error::Disposed)));
    assert!(matches!(archive.entry("one.txt"), Err(Error::Disposed)));
    assert!(matches!(archive.len(), Err(Error::Disposed)));
    assert!(matches!(archive.comment(), Err(Error::Disposed)));
}

#[test]
fn entry_handles_fail_after_dispose() {
    let (_storage, archive) = counted_archive(ArchiveOptions::default());
    let entry = archive.entry("two.txt").unwrap().unwrap();
    assert_eq!(entry.length().unwrap(), 6);

    archive.dispose().unwrap();

    assert!(matches!(entry.open(), Err(Error::Disposed)));
    assert!(matches!(entry.length(), Err(Error::Disposed)));
    assert!(matches!(entry.last_modified(), Err(Error::Disposed)));
    assert!(matches!(entry.is_encrypted(), Err(Error::Disposed)));
    assert!(matches!(entry.full_name(), Err(Error::Disposed)));
    assert!(matches!(entry.name(), Err(Error::Disposed)));
    assert!(matches!(entry.is_directory(), Err(Error::Disposed)));
}

#[test]
fn open_streams_fail_after_dispose() {
    let (_storage, archive) = counted_archive(ArchiveOptions::default());
    let entry = archive.entry("one.txt").unwrap().unwrap();
    let mut stream = entry.open().unwrap();

    let mut head = [0u8; 10];
    stream.read_exact(&mut head).unwrap();
    archive.dispose().unwrap();

    let err = stream.read(&mut head).unwrap_err();
    assert!(matches!(Error::from_io(&err), Some(Error::Disposed)));
    assert!(Error::Io(err).is_disposed());
}

#[test]
fn disposed_is_reported_before_mode_violations() {
    let (_storage, archive) = counted_archive(ArchiveOptions::default());
    let entry = archive.entry("one.txt").unwrap().unwrap();
    archive.dispose().unwrap();

    // Read mode forbids these anyway; the disposed state wins.
    assert!(matches!(archive.create_entry("new.txt"), Err(Error::Disposed)));
    assert!(matches!(entry.delete(), Err(Error::Disposed)));
    assert!(matches!(
        entry.set_last_modified(razip::DosDateTime::floor()),
        Err(Error::Disposed)
    ));
}

#[test]
fn read_mode_rejects_modifications() {
    let (_storage, archive) = counted_archive(ArchiveOptions::default());
    let entry = archive.entry("one.txt").unwrap().unwrap();

    assert!(matches!(archive.create_entry("new.txt"), Err(Error::NotSupported(_))));
    assert!(matches!(entry.delete(), Err(Error::NotSupported(_))));
    assert!(matches!(
        entry.set_last_modified(razip::DosDateTime::floor()),
        Err(Error::NotSupported(_))
    ));
    assert_eq!(archive.len().unwrap(), 2);
}

#[test]
fn writable_modes_need_writable_storage() {
    let bytes = ZipBuilder::new().entry(TestEntry::new("a", b"a")).build();
    for mode in [ArchiveMode::Create, ArchiveMode::Update] {
        let result = Archive::open(
            Arc::new(MemoryStorage::new(bytes.clone())),
            ArchiveOptions::new().mode(mode),
        );
        assert!(matches!(result, Err(Error::NotSupported(_))));
    }
}

#[test]
fn update_dispose_writes_then_closes() {
    let bytes = ZipBuilder::new().entry(TestEntry::new("a.txt", b"a")).build();
    let storage = Arc::new(CountingStorage::new(MemoryStorage::writable(bytes)));
    let archive = Archive::open(
        Arc::clone(&storage),
        ArchiveOptions::new().mode(ArchiveMode::Update),
    )
    .unwrap();
    archive.create_entry("b.txt").unwrap();
    archive.dispose().unwrap();
    archive.dispose().unwrap();

    assert_eq!(storage.close_count(), 1);
    let reopened = common::open_bytes(storage.inner().to_vec());
    assert_eq!(reopened.len().unwrap(), 2);
}
