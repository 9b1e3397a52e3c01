//! End-to-end tests driving the engine with the real ZIP codec.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use archive_engine::{
    ArchiveEngine, ArchiveKind, Config, EntryFilter, Event, SubmitOptions,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn engine() -> ArchiveEngine {
    ArchiveEngine::new(Config::default()).unwrap()
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

async fn await_completed(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
) -> (archive_engine::OperationId, bool) {
    loop {
        match tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap()
            .unwrap()
        {
            Event::Completed { id, success, .. } => return (id, success),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn compress_then_extract_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "notes.txt", b"round trip payload");
    let engine = engine();
    let mut events = engine.subscribe();

    let descriptor = engine
        .describe_compression(
            ArchiveKind::Zip,
            "trip",
            None,
            vec![input],
            dir.path().to_path_buf(),
        )
        .unwrap();
    let archive_path = descriptor.output_path();
    let handle = engine.submit(descriptor).unwrap();

    let (id, success) = await_completed(&mut events).await;
    assert_eq!(id, handle.id());
    assert!(success);
    assert!(archive_path.exists());

    let dest = dir.path().join("restored");
    let descriptor = engine
        .describe_extraction(ArchiveKind::Zip, archive_path, dest.clone())
        .unwrap();
    engine.submit(descriptor).unwrap();

    let (_, success) = await_completed(&mut events).await;
    assert!(success);
    assert_eq!(
        std::fs::read(dest.join("notes.txt")).unwrap(),
        b"round trip payload"
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn batch_submission_produces_distinct_archives() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_file(dir.path(), "one.txt", b"1"),
        write_file(dir.path(), "two.txt", b"2"),
        write_file(dir.path(), "three.txt", b"3"),
    ];
    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).unwrap();

    let engine = engine();
    let mut events = engine.subscribe();

    let descriptors = engine
        .describe_compressions(ArchiveKind::Zip, "part", None, inputs, out.clone())
        .unwrap();
    assert_eq!(descriptors.len(), 3);

    let expected: Vec<PathBuf> = descriptors.iter().map(|d| d.output_path()).collect();
    for descriptor in descriptors {
        engine.submit(descriptor).unwrap();
    }

    for _ in 0..3 {
        let (_, success) = await_completed(&mut events).await;
        assert!(success);
    }
    engine.wait_idle().await;

    for path in expected {
        assert!(path.exists(), "missing {}", path.display());
    }
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 3);

    engine.shutdown().await;
}

#[tokio::test]
async fn entry_filter_restricts_archive_contents() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mixed");
    std::fs::create_dir_all(&input).unwrap();
    write_file(&input, "keep.txt", b"keep");
    write_file(&input, "skip.log", b"skip");

    let engine = engine();
    let mut events = engine.subscribe();

    let descriptor = engine
        .describe_compression(
            ArchiveKind::Zip,
            "filtered",
            Some(9),
            vec![input],
            dir.path().to_path_buf(),
        )
        .unwrap();
    let archive_path = descriptor.output_path();
    engine
        .submit_with(
            descriptor,
            SubmitOptions {
                entry_filter: Some(EntryFilter::new(r"\.txt$").unwrap()),
                ..Default::default()
            },
        )
        .unwrap();

    let (_, success) = await_completed(&mut events).await;
    assert!(success);

    let file = std::fs::File::open(archive_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), 1);
    let mut content = String::new();
    archive
        .by_name("mixed/keep.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "keep");

    engine.shutdown().await;
}

#[tokio::test]
async fn existing_archive_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "data.txt", b"payload");
    write_file(dir.path(), "backup.zip", b"pre-existing");

    let engine = engine();
    let mut events = engine.subscribe();

    let descriptors = engine
        .describe_compressions(
            ArchiveKind::Zip,
            "backup",
            None,
            vec![input],
            dir.path().to_path_buf(),
        )
        .unwrap();
    assert_eq!(descriptors[0].archive_name(), "backup1.zip");
    engine.submit(descriptors.into_iter().next().unwrap()).unwrap();

    let (_, success) = await_completed(&mut events).await;
    assert!(success);

    assert_eq!(
        std::fs::read(dir.path().join("backup.zip")).unwrap(),
        b"pre-existing"
    );
    assert!(dir.path().join("backup1.zip").exists());

    engine.shutdown().await;
}

#[tokio::test]
async fn malformed_archive_completes_unsuccessfully() {
    let dir = tempfile::tempdir().unwrap();
    let junk = write_file(dir.path(), "junk.zip", b"definitely not a zip");

    let engine = engine();
    let mut events = engine.subscribe();

    let descriptor = engine
        .describe_extraction(ArchiveKind::Zip, junk, dir.path().join("out"))
        .unwrap();
    engine.submit(descriptor).unwrap();

    let (_, success) = await_completed(&mut events).await;
    assert!(!success, "a broken archive is recovered into a failed result");
    engine.wait_idle().await;
    assert!(engine.is_idle());

    engine.shutdown().await;
}
