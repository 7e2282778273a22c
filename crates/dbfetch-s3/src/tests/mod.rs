
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use ::zip::write::ZipWriter;
use flate2::write::GzEncoder;
use tempfile::{NamedTempFile, TempDir};

use crate::decompress::{self, Compression};
use crate::*;
use fake_store::{FakeStore, BUCKET};

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn keys(resolution: &Resolution) -> Vec<&str> {
    resolution.objects.iter().map(|o| o.key.as_str()).collect()
}

#[tokio::test]
async fn test_date_folders_scanned_newest_first() -> Result<()> {
    let store = FakeStore::new().with_objects([
        "2024-03-01/db/march.sql.gz",
        "2024-01-01/db/january.sql.gz",
        "2024-02-01/db/february.sql.gz",
        "README.md",
    ]);

    let resolution = Resolver::new(&store, BUCKET)
        .resolve(&FilterMode::DateFolders, 25)
        .await?;

    assert_eq!(
        store.listed_prefixes(),
        vec!["", "2024-03-01/db/", "2024-02-01/db/", "2024-01-01/db/"]
    );
    let root = &store.requests()[0];
    assert_eq!(root.delimiter.as_deref(), Some("/"));
    assert_eq!(root.max_keys, resolver::MAX_FOLDERS);

    assert_eq!(
        keys(&resolution),
        vec![
            "2024-03-01/db/march.sql.gz",
            "2024-02-01/db/february.sql.gz",
            "2024-01-01/db/january.sql.gz",
        ]
    );
    assert_eq!(resolution.folders_scanned, 3);
    assert_eq!(resolution.hidden(), 0);
    Ok(())
}

#[tokio::test]
async fn test_results_capped_across_folders() -> Result<()> {
    let store = FakeStore::new().with_objects([
        "2024-02-01/db/a1",
        "2024-02-01/db/a2",
        "2024-02-01/db/a3",
        "2024-01-01/db/b1",
        "2024-01-01/db/b2",
        "2024-01-01/db/b3",
        "2024-01-01/db/b4",
        "2023-12-01/db/c1",
    ]);

    let resolution = Resolver::new(&store, BUCKET)
        .resolve(&FilterMode::DateFolders, 5)
        .await?;

    assert_eq!(
        keys(&resolution),
        vec![
            "2024-02-01/db/a1",
            "2024-02-01/db/a2",
            "2024-02-01/db/a3",
            "2024-01-01/db/b1",
            "2024-01-01/db/b2",
        ]
    );
    assert_eq!(resolution.total_seen, 7);
    assert_eq!(resolution.hidden(), 2);
    // the older folder is never probed once the limit is reached
    assert_eq!(
        store.listed_prefixes(),
        vec!["", "2024-02-01/db/", "2024-01-01/db/"]
    );
    assert!(store.requests()[1..].iter().all(|r| r.max_keys == 5));
    Ok(())
}

#[tokio::test]
async fn test_empty_folders_and_other_paths_skipped() -> Result<()> {
    let store = FakeStore::new().with_objects([
        "2024-03-01/logs/app.log",
        "2024-02-01/db/dump.sql.gz",
        "2024-02-01/logs/app.log",
        "2024-1-15/db/ignored.sql.gz",
        "latest/db/ignored.sql.gz",
    ]);

    let resolution = Resolver::new(&store, BUCKET)
        .resolve(&FilterMode::DateFolders, 25)
        .await?;

    assert_eq!(keys(&resolution), vec!["2024-02-01/db/dump.sql.gz"]);
    assert_eq!(resolution.folders_scanned, 2);
    assert_eq!(resolution.total_seen, 1);
    Ok(())
}

#[tokio::test]
async fn test_nothing_found_is_not_an_error() -> Result<()> {
    let store = FakeStore::new().with_objects(["latest/db/dump.sql.gz", "2024-01-01/logs/a"]);

    let resolution = Resolver::new(&store, BUCKET)
        .resolve(&FilterMode::DateFolders, 25)
        .await?;

    assert!(resolution.is_empty());
    assert_eq!(resolution.total_seen, 0);
    Ok(())
}

#[tokio::test]
async fn test_zero_limit_makes_no_calls() -> Result<()> {
    let store = FakeStore::new().with_objects(["2024-01-01/db/a"]);
    let resolver = Resolver::new(&store, BUCKET);

    for mode in [FilterMode::DateFolders, FilterMode::db_artifacts(None)] {
        let resolution = resolver.resolve(&mode, 0).await?;
        assert!(resolution.is_empty());
    }
    assert!(store.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let store = FakeStore::new().offline();

    let err = Resolver::new(&store, BUCKET)
        .resolve(&FilterMode::DateFolders, 25)
        .await
        .unwrap_err();

    assert!(err.is_store(), "{err}");
}

#[tokio::test]
async fn test_filtered_listing_pages_until_limit() -> Result<()> {
    let mut store = FakeStore::new();
    for i in 0..6 {
        store = store
            .with_object(&format!("2024-01-05/db/dump{i}.sql.gz"), "x")
            .with_object(&format!("2024-01-05/logs/app{i}.log"), "x");
    }
    store = store.with_object("2024-01-06/db/other.sql.gz", "x");

    let resolution = Resolver::new(&store, BUCKET)
        .resolve(&FilterMode::db_artifacts(Some("2024-01-05/".into())), 4)
        .await?;

    assert_eq!(
        keys(&resolution),
        vec![
            "2024-01-05/db/dump0.sql.gz",
            "2024-01-05/db/dump1.sql.gz",
            "2024-01-05/db/dump2.sql.gz",
            "2024-01-05/db/dump3.sql.gz",
        ]
    );
    // the db/ keys sort before logs/, so the first page already fills the limit
    let requests = store.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prefix.as_deref(), Some("2024-01-05/"));
    assert_eq!(requests[0].delimiter, None);
    Ok(())
}

#[tokio::test]
async fn test_filtered_listing_follows_continuation() -> Result<()> {
    let store = FakeStore::new().with_objects([
        "a/logs/1",
        "a/logs/2",
        "a/logs/3",
        "b/db/1",
        "b/logs/1",
        "c/db/1",
    ]);

    let resolution = Resolver::new(&store, BUCKET)
        .resolve(&FilterMode::db_artifacts(None), 2)
        .await?;

    assert_eq!(keys(&resolution), vec!["b/db/1", "c/db/1"]);
    assert_eq!(resolution.total_seen, 2);
    assert_eq!(store.requests().len(), 3);
    assert_eq!(
        store.requests()[2].continuation_token.as_deref(),
        Some("4")
    );
    Ok(())
}

#[tokio::test]
async fn test_prefix_listing_keeps_everything() -> Result<()> {
    let store = FakeStore::new().with_objects(["2024-01-05/db/a", "2024-01-05/logs/b", "x"]);

    let resolution = Resolver::new(&store, BUCKET)
        .resolve(
            &FilterMode::Prefix {
                prefix: Some("2024-01-05/".into()),
            },
            25,
        )
        .await?;

    assert_eq!(keys(&resolution), vec!["2024-01-05/db/a", "2024-01-05/logs/b"]);
    Ok(())
}

#[tokio::test]
async fn test_list_buckets() -> Result<()> {
    let buckets = FakeStore::new().list_buckets().await?;
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].name, BUCKET);
    Ok(())
}

#[test]
fn test_calculate_md5() -> io::Result<()> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(b"Hello, World!")?;

    let mut file = temp_file.reopen()?;
    let md5 = calculate_md5(&mut file)?;

    assert_eq!(md5, "65a8e27d8879283831b664bd8b7f0ad4");
    Ok(())
}

#[tokio::test]
async fn test_download_creates_dir_and_names_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let download_dir = temp_dir.path().join("nested").join("downloads");
    let key = "2024-01-05/db/dump.sql";
    let store = FakeStore::new()
        .with_object(key, "select 1;")
        .with_e_tag(key, "\"ccb5b4481bced39454dca6d845601d54\"");

    let download = S3Downloader::new(&store, BUCKET, &download_dir)
        .download(key)
        .await?;

    assert_eq!(download.path, download_dir.join("dump.sql"));
    assert_eq!(download.bytes, 9);
    assert_eq!(fs::read_to_string(&download.path)?, "select 1;");
    assert_eq!(fs::read_dir(&download_dir)?.count(), 1, "no temp files left");
    Ok(())
}

#[tokio::test]
async fn test_download_missing_object() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FakeStore::new();

    let err = S3Downloader::new(&store, BUCKET, temp_dir.path())
        .download("2024-01-05/db/gone.sql")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ObjectNotFound { .. }), "{err}");
    assert!(err.is_store());
    Ok(())
}

#[tokio::test]
async fn test_download_rejects_folder_key() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FakeStore::new().with_object("2024-01-05/db/", "");

    let err = S3Downloader::new(&store, BUCKET, temp_dir.path())
        .download("2024-01-05/db/")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidKey(_)), "{err}");
    assert!(!err.is_store());
    Ok(())
}

#[tokio::test]
async fn test_interrupted_download_leaves_nothing_behind() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let key = "2024-01-05/db/dump.sql";
    let store = FakeStore::new()
        .with_object(key, vec![b'x'; 4096])
        .broken_after(1000);

    let err = S3Downloader::new(&store, BUCKET, temp_dir.path())
        .download(key)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)), "{err}");
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_short_body_fails_download() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let key = "2024-01-05/db/dump.sql";
    let store = FakeStore::new()
        .with_object(key, "select 1;")
        .with_content_length(key, 4096);

    let err = S3Downloader::new(&store, BUCKET, temp_dir.path())
        .download(key)
        .await
        .unwrap_err();

    match &err {
        Error::IncompleteBody {
            expected, received, ..
        } => assert_eq!((*expected, *received), (4096, 9)),
        other => panic!("unexpected error {other}"),
    }
    assert!(err.is_store());
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_detect_compression() -> io::Result<()> {
    let temp_dir = TempDir::new()?;
    let gz = temp_dir.path().join("a.gz");
    let plain = temp_dir.path().join("a.sql");
    let tiny = temp_dir.path().join("tiny");
    fs::write(&gz, gzip(b"data"))?;
    fs::write(&plain, b"select 1;")?;
    fs::write(&tiny, [0x1f])?;

    assert_eq!(decompress::detect(&gz)?, Compression::Gzip);
    assert_eq!(decompress::detect(&plain)?, Compression::None);
    assert_eq!(decompress::detect(&tiny)?, Compression::None);
    Ok(())
}

#[test]
fn test_gunzip_replaces_source() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("dump.sql.gz");
    let content = "insert into t values (1);\n".repeat(1000);
    fs::write(&source, gzip(content.as_bytes()))?;

    let result = decompress(&source, temp_dir.path())?;

    let target = temp_dir.path().join("dump.sql");
    assert_eq!(result, Decompressed::Gzip(target.clone()));
    assert_eq!(fs::read_to_string(&target)?, content);
    assert!(!source.exists());
    Ok(())
}

#[test]
fn test_gunzip_without_gz_suffix() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("dump");
    fs::write(&source, gzip(b"payload"))?;

    let target = decompress::gunzip(&source)?;

    assert_eq!(target, temp_dir.path().join("dump.out"));
    assert_eq!(fs::read(&target)?, b"payload");
    assert!(!source.exists());
    Ok(())
}

#[test]
fn test_truncated_gzip_keeps_source() -> io::Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("dump.sql.gz");
    let content: Vec<u8> = (0..200_000u32).flat_map(|i| i.to_le_bytes()).collect();
    let compressed = gzip(&content);
    let truncated = &compressed[..compressed.len() / 2];
    fs::write(&source, truncated)?;

    let err = decompress(&source, temp_dir.path()).unwrap_err();

    assert!(matches!(err, Error::Io(_)), "{err}");
    assert!(source.exists());
    assert_eq!(fs::read(&source)?, truncated);
    Ok(())
}

#[test]
fn test_uncompressed_file_untouched() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("dump.sql");
    fs::write(&source, b"select 1;")?;

    let result = decompress(&source, temp_dir.path())?;

    assert_eq!(result, Decompressed::Unchanged(source.clone()));
    assert_eq!(fs::read(&source)?, b"select 1;");
    Ok(())
}

fn write_zip(path: &Path, files: &[(&str, &str)]) -> io::Result<()> {
    let mut zip = ZipWriter::new(fs::File::create(path)?);
    for (name, content) in files {
        zip.start_file(*name, Default::default())?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

#[test]
fn test_zip_operations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let zip_path = temp_dir.path().join("dump.zip");
    write_zip(
        &zip_path,
        &[("test1.txt", "Test content 1"), ("test2.txt", "Test content 2")],
    )?;
    assert_eq!(decompress::detect(&zip_path)?, Compression::Zip);

    let extract_dir = temp_dir.path().join("extract");
    let result = decompress(&zip_path, &extract_dir)?;

    assert_eq!(
        result,
        Decompressed::Zip {
            dir: extract_dir.clone(),
            entries: 2
        }
    );
    assert_eq!(fs::read_to_string(extract_dir.join("test1.txt"))?, "Test content 1");
    assert_eq!(fs::read_to_string(extract_dir.join("test2.txt"))?, "Test content 2");
    assert!(!zip_path.exists());
    Ok(())
}

#[test]
fn test_zip_skips_extracted_entries() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let zip_path = temp_dir.path().join("dump.zip");
    write_zip(&zip_path, &[("dump.sql", "from archive")])?;
    fs::write(temp_dir.path().join("dump.sql"), "already here")?;

    let entries = decompress::fast_unzip_single(&zip_path, temp_dir.path())?;

    assert_eq!(entries, 1);
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("dump.sql"))?,
        "already here"
    );
    assert!(zip_path.exists());
    Ok(())
}

fn backup_store() -> FakeStore {
    FakeStore::new()
        .with_object("2024-01-05/db/dump.sql.gz", gzip(b"select 1;"))
        .with_object("2024-01-04/db/dump.sql.gz", gzip(b"select 0;"))
}

#[tokio::test]
async fn test_sync_invalid_selection_has_no_side_effects() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let download_dir = temp_dir.path().join("downloads");
    let store = backup_store();

    let err = BackupSync::new(&store, BUCKET, &download_dir)
        .decompress(true)
        .run(|resolution, index| {
            assert_eq!(resolution.objects.len(), 2);
            Ok(index.validate("99")?)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidSelection(_)), "{err}");
    assert!(!err.is_store());
    assert!(store.fetched().is_empty());
    assert!(!download_dir.exists());
    Ok(())
}

#[tokio::test]
async fn test_sync_gunzips_selected_backup() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = backup_store();

    let outcome = BackupSync::new(&store, BUCKET, temp_dir.path())
        .decompress(true)
        .run(|_, index| Ok(index.validate("1")?))
        .await?;

    let (key, download, decompressed) = match outcome {
        SyncOutcome::Fetched {
            key,
            download,
            decompressed,
        } => (key, download, decompressed),
        other => panic!("expected a download, got {other:?}"),
    };
    let output = temp_dir.path().join("dump.sql");
    assert_eq!(key, "2024-01-05/db/dump.sql.gz");
    assert_eq!(store.fetched(), vec![key]);
    assert_eq!(decompressed, Some(Decompressed::Gzip(output.clone())));
    assert!(!download.path.exists(), "compressed download is removed");
    assert_eq!(fs::read_to_string(&output)?, "select 1;");
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sync_keeps_download_without_decompress() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = backup_store();

    let outcome = BackupSync::new(&store, BUCKET, temp_dir.path())
        .run(|_, index| Ok(index.validate("2")?))
        .await?;

    match outcome {
        SyncOutcome::Fetched {
            download,
            decompressed: None,
            ..
        } => {
            assert_eq!(download.path, temp_dir.path().join("dump.sql.gz"));
            assert_eq!(fs::read(&download.path)?, gzip(b"select 0;"));
        }
        other => panic!("expected a plain download, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_sync_skip_and_nothing_found() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = backup_store();

    let outcome = BackupSync::new(&store, BUCKET, temp_dir.path())
        .run(|_, index| Ok(index.validate("")?))
        .await?;
    assert!(matches!(outcome, SyncOutcome::Skipped), "{outcome:?}");
    assert!(store.fetched().is_empty());

    let empty = FakeStore::new().with_objects(["2024-01-05/logs/app.log"]);
    let outcome = BackupSync::new(&empty, BUCKET, temp_dir.path())
        .run(|_, _| panic!("nothing to choose from"))
        .await?;
    assert!(matches!(outcome, SyncOutcome::NothingFound), "{outcome:?}");
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}
