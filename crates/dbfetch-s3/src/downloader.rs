use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::file_name_of;
use crate::store::ObjectStore;

/// Hex encoded MD5 of everything in `file`.
pub fn calculate_md5(file: &mut File) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// The MD5 an ETag stands for, if it is a plain single part upload ETag.
fn etag_md5(etag: &str) -> Option<&str> {
    let etag = etag.trim_matches('"');
    (etag.len() == 32 && etag.bytes().all(|b| b.is_ascii_hexdigit())).then_some(etag)
}

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Downloads objects from one bucket into a local directory.
pub struct S3Downloader<'a, S: ?Sized> {
    store: &'a S,
    bucket: String,
    dir_name: PathBuf,
}

impl<'a, S> S3Downloader<'a, S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: &'a S, bucket: impl Into<String>, dir_name: impl Into<PathBuf>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            dir_name: dir_name.into(),
        }
    }

    /// Directory downloads land in.
    pub fn dir_name(&self) -> &Path {
        &self.dir_name
    }

    /// Fetches `key` into the download directory, named after the last
    /// segment of the key.
    ///
    /// The body is written to a temporary file next to the target and only
    /// renamed into place once complete. A body shorter or longer than the
    /// announced content length fails the download.
    pub async fn download(&self, key: &str) -> Result<Download> {
        let file_name = file_name_of(key);
        if file_name.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }

        if !self.store.object_exists(&self.bucket, key).await? {
            return Err(Error::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            });
        }

        if !self.dir_name.exists() {
            fs::create_dir_all(&self.dir_name)?;
        }
        let target = self.dir_name.join(file_name);

        let mut body = self.store.get_object(&self.bucket, key).await?;
        let temp_file = NamedTempFile::new_in(&self.dir_name)?;
        let mut file = tokio::fs::File::from_std(temp_file.as_file().try_clone()?);
        let written = tokio::io::copy(&mut body.reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(expected) = body.content_length.filter(|&len| len != written) {
            return Err(Error::IncompleteBody {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                expected,
                received: written,
            });
        }

        if let Some(expected) = body.e_tag.as_deref().and_then(etag_md5) {
            let mut check = temp_file.reopen()?;
            let actual = calculate_md5(&mut check)?;
            if !actual.eq_ignore_ascii_case(expected) {
                warn!(key, expected, %actual, "checksum of downloaded file does not match etag");
            }
        }

        temp_file.persist(&target).map_err(|e| e.error)?;
        info!(
            bucket = %self.bucket,
            key,
            path = %target.display(),
            bytes = written,
            "downloaded object"
        );
        Ok(Download {
            path: target,
            bytes: written,
        })
    }
}
