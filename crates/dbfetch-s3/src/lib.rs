mod client;
pub mod decompress;
mod downloader;
mod error;
pub mod format;
mod model;
pub mod resolver;
mod selection;
mod store;
mod sync;

#[cfg(test)]
mod tests;

pub use client::{create_s3_client, ClientConfig};
pub use decompress::{decompress, Decompressed};
pub use downloader::{calculate_md5, Download, S3Downloader};
pub use error::{Error, Result};
pub use format::{format_size, format_timestamp};
pub use model::{BucketSummary, ListPage, ListRequest, ObjectBody, ObjectSummary};
pub use resolver::{validate_date, FilterMode, Resolution, Resolver};
pub use selection::{InvalidSelection, Selection, SelectionIndex};
pub use store::ObjectStore;
pub use sync::{BackupSync, SyncOutcome};
