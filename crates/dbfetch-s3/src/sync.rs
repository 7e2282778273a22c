use std::path::PathBuf;

use tracing::info;

use crate::decompress::{decompress, Decompressed};
use crate::downloader::{Download, S3Downloader};
use crate::error::Result;
use crate::resolver::{FilterMode, Resolution, Resolver};
use crate::selection::{Selection, SelectionIndex};
use crate::store::ObjectStore;

#[derive(Debug)]
pub enum SyncOutcome {
    /// No date folder held a backup.
    NothingFound,
    /// The caller picked nothing.
    Skipped,
    Fetched {
        key: String,
        download: Download,
        /// Set when decompression was asked for.
        decompressed: Option<Decompressed>,
    },
}

/// Picks one of the newest backups in a bucket and fetches it.
pub struct BackupSync<'a, S: ?Sized> {
    store: &'a S,
    bucket: &'a str,
    download_dir: PathBuf,
    limit: usize,
    decompress: bool,
}

impl<'a, S> BackupSync<'a, S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: &'a S, bucket: &'a str, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            bucket,
            download_dir: download_dir.into(),
            limit: 25,
            decompress: false,
        }
    }

    /// Number of backups offered for selection.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Decompress gzip and zip downloads in place.
    pub fn decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    /// Lists the newest backups and hands them to `choose`. Nothing is
    /// fetched or written unless `choose` returns a valid choice.
    pub async fn run<F>(&self, choose: F) -> Result<SyncOutcome>
    where
        F: FnOnce(&Resolution, &SelectionIndex) -> Result<Selection>,
    {
        let resolution = Resolver::new(self.store, self.bucket)
            .resolve(&FilterMode::DateFolders, self.limit)
            .await?;
        if resolution.is_empty() {
            return Ok(SyncOutcome::NothingFound);
        }

        let choices = SelectionIndex::new(&resolution.objects);
        let Selection::Choice { index, key } = choose(&resolution, &choices)? else {
            return Ok(SyncOutcome::Skipped);
        };
        info!(bucket = self.bucket, index, key = %key, "selected backup");

        let downloader = S3Downloader::new(self.store, self.bucket, &self.download_dir);
        let download = downloader.download(&key).await?;
        let decompressed = if self.decompress {
            Some(decompress(&download.path, downloader.dir_name())?)
        } else {
            None
        };

        Ok(SyncOutcome::Fetched {
            key,
            download,
            decompressed,
        })
    }
}
