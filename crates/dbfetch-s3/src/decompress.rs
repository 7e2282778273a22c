use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::Result;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
/// Appended to gzip files that don't end in `.gz`.
pub const GUNZIP_EXTENSION: &str = "out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zip,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decompressed {
    /// Inflated into this file, the `.gz` is gone.
    Gzip(PathBuf),
    /// Extracted into `dir`, the archive is gone.
    Zip { dir: PathBuf, entries: usize },
    /// Not compressed, left where it was.
    Unchanged(PathBuf),
}

/// Sniffs the leading magic bytes of `path`.
pub fn detect(path: &Path) -> io::Result<Compression> {
    let mut magic = Vec::with_capacity(ZIP_MAGIC.len());
    File::open(path)?
        .take(ZIP_MAGIC.len() as u64)
        .read_to_end(&mut magic)?;

    Ok(if magic.starts_with(&GZIP_MAGIC) {
        Compression::Gzip
    } else if magic.starts_with(&ZIP_MAGIC) {
        Compression::Zip
    } else {
        Compression::None
    })
}

/// `dump.sql.gz` becomes `dump.sql`, anything else gets `.out` appended.
pub fn gunzip_target(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".gz") {
        Some(stem) if !stem.is_empty() => path.with_file_name(stem),
        _ => path.with_file_name(format!("{name}.{GUNZIP_EXTENSION}")),
    }
}

/// Inflates `path` next to itself and removes it once the output is
/// complete. On error the compressed file stays, a partial output may too.
pub fn gunzip(path: &Path) -> Result<PathBuf> {
    let target = gunzip_target(path);
    {
        let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(path)?));
        let mut out = BufWriter::new(File::create(&target)?);
        let bytes = io::copy(&mut decoder, &mut out)?;
        out.flush()?;
        out.get_ref().sync_all()?;
        debug!(path = %target.display(), bytes, "inflated");
    }
    fs::remove_file(path)?;

    info!(from = %path.display(), to = %target.display(), "gunzipped");
    Ok(target)
}

/// Extracts the archive into `dir_name` unless every entry is already there.
/// Returns the number of entries in the archive.
pub fn fast_unzip_single(zip_path: &Path, dir_name: &Path) -> Result<usize> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let needs_extraction = archive
        .file_names()
        .any(|name| !dir_name.join(name).exists());

    if needs_extraction {
        archive.extract(dir_name)?;
    } else {
        debug!(archive = %zip_path.display(), "all entries already extracted");
    }

    Ok(archive.len())
}

/// Extracts `zip_path` into `dir_name` and removes the archive on success.
pub fn unzip(zip_path: &Path, dir_name: &Path) -> Result<usize> {
    if !dir_name.exists() {
        fs::create_dir_all(dir_name)?;
    }
    let entries = fast_unzip_single(zip_path, dir_name)?;
    fs::remove_file(zip_path)?;

    info!(
        archive = %zip_path.display(),
        dir = %dir_name.display(),
        entries,
        "unzipped"
    );
    Ok(entries)
}

/// Decompresses a downloaded file according to its magic bytes. Zip archives
/// are extracted into `dir_name`.
pub fn decompress(path: &Path, dir_name: &Path) -> Result<Decompressed> {
    match detect(path)? {
        Compression::Gzip => gunzip(path).map(Decompressed::Gzip),
        Compression::Zip => Ok(Decompressed::Zip {
            dir: dir_name.to_path_buf(),
            entries: unzip(path, dir_name)?,
        }),
        Compression::None => {
            debug!(path = %path.display(), "not compressed");
            Ok(Decompressed::Unchanged(path.to_path_buf()))
        }
    }
}
