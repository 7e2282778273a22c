//! Locating backup artifacts in a bucket.
//!
//! Backups are laid out as `YYYY-MM-DD/.../db/<file>`. The default mode probes
//! the newest date folders first and stops as soon as enough objects were
//! found, so a bucket with years of history costs a handful of calls.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{ListRequest, ObjectSummary};
use crate::store::ObjectStore;

/// Upper bound on the date folders fetched from the bucket root.
pub const MAX_FOLDERS: usize = 1000;
/// Largest page the store hands out per listing call.
const MAX_PAGE: usize = 1000;
/// Path segment the database dumps live under.
pub const DB_PATH: &str = "db/";

/// `YYYY-MM-DD`, digits and dashes only.
fn has_date_shape(s: &[u8]) -> bool {
    s.len() == 10
        && s.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Whether a common prefix names a date folder (`YYYY-MM-DD/`). The date
/// itself is not checked for calendar validity.
pub fn is_date_folder(prefix: &str) -> bool {
    let bytes = prefix.as_bytes();
    bytes.len() > 10 && bytes[10] == b'/' && has_date_shape(&bytes[..10])
}

/// Parses a strict `YYYY-MM-DD` calendar date.
pub fn validate_date(input: &str) -> Result<NaiveDate> {
    if !has_date_shape(input.as_bytes()) {
        return Err(Error::InvalidDate(input.to_string()));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| Error::InvalidDate(input.to_string()))
}

/// Keeps the date folders and orders them newest first.
pub fn date_folders<I>(prefixes: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut folders: Vec<String> = prefixes.into_iter().filter(|p| is_date_folder(p)).collect();
    folders.sort_unstable_by(|a, b| b.cmp(a));
    folders
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMode {
    /// Probe `<date>/db/` in every date folder, newest first.
    DateFolders,
    /// Everything under a server side prefix.
    Prefix { prefix: Option<String> },
    /// Keys under an optional server side prefix that contain `needle`.
    Filtered {
        prefix: Option<String>,
        needle: String,
    },
}

impl FilterMode {
    /// Keys containing `db/`, optionally narrowed by `prefix`.
    pub fn db_artifacts(prefix: Option<String>) -> Self {
        Self::Filtered {
            prefix,
            needle: DB_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub objects: Vec<ObjectSummary>,
    /// Matches seen before truncating to the limit.
    pub total_seen: usize,
    /// Date folders probed, zero outside [`FilterMode::DateFolders`].
    pub folders_scanned: usize,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// How many matches were dropped by the limit.
    pub fn hidden(&self) -> usize {
        self.total_seen.saturating_sub(self.objects.len())
    }
}

pub struct Resolver<'a, S: ?Sized> {
    store: &'a S,
    bucket: &'a str,
}

impl<'a, S> Resolver<'a, S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: &'a S, bucket: &'a str) -> Self {
        Self { store, bucket }
    }

    /// Returns at most `max_keys` objects matching `mode`.
    pub async fn resolve(&self, mode: &FilterMode, max_keys: usize) -> Result<Resolution> {
        if max_keys == 0 {
            return Ok(Resolution::default());
        }
        match mode {
            FilterMode::DateFolders => self.scan_date_folders(max_keys).await,
            FilterMode::Prefix { prefix } => {
                self.scan_prefix(prefix.as_deref(), None, max_keys).await
            }
            FilterMode::Filtered { prefix, needle } => {
                self.scan_prefix(prefix.as_deref(), Some(needle.as_str()), max_keys)
                    .await
            }
        }
    }

    async fn scan_date_folders(&self, max_keys: usize) -> Result<Resolution> {
        let root = self
            .store
            .list_objects(ListRequest::new(self.bucket, MAX_FOLDERS).delimiter("/"))
            .await?;
        let folders = date_folders(root.common_prefixes);
        debug!(bucket = self.bucket, count = folders.len(), "found date folders");

        let mut resolution = Resolution::default();
        for folder in folders {
            let request =
                ListRequest::new(self.bucket, max_keys).prefix(format!("{folder}{DB_PATH}"));
            let page = self.store.list_objects(request).await?;
            resolution.folders_scanned += 1;
            if page.objects.is_empty() {
                debug!(%folder, "no artifacts");
                continue;
            }

            resolution.total_seen += page.objects.len();
            resolution.objects.extend(page.objects);
            if resolution.objects.len() >= max_keys {
                resolution.objects.truncate(max_keys);
                break;
            }
        }

        info!(
            bucket = self.bucket,
            found = resolution.objects.len(),
            scanned = resolution.folders_scanned,
            "resolved date folders"
        );
        Ok(resolution)
    }

    async fn scan_prefix(
        &self,
        prefix: Option<&str>,
        needle: Option<&str>,
        max_keys: usize,
    ) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut token = None;
        loop {
            let mut request =
                ListRequest::new(self.bucket, max_keys.min(MAX_PAGE)).continuation_token(token);
            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            let page = self.store.list_objects(request).await?;

            let matches = page
                .objects
                .into_iter()
                .filter(|obj| needle.map_or(true, |needle| obj.key.contains(needle)));
            for obj in matches {
                resolution.total_seen += 1;
                resolution.objects.push(obj);
            }

            token = page.next_continuation_token;
            if resolution.objects.len() >= max_keys || token.is_none() {
                break;
            }
        }
        resolution.objects.truncate(max_keys);

        info!(
            bucket = self.bucket,
            prefix = prefix.unwrap_or(""),
            found = resolution.objects.len(),
            "resolved prefix listing"
        );
        Ok(resolution)
    }
}
