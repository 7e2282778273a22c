use std::path::PathBuf;

use clap::Args;
use dbfetch_s3::{
    create_s3_client, format_size, validate_date, BackupSync, ClientConfig, Decompressed,
    FilterMode, ObjectStore, Resolver, Result, SyncOutcome,
};
use tracing::info;

use crate::console;

/// Connection and bucket options shared by every command.
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// AWS region of the bucket.
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,
    /// Named profile from the AWS credentials file.
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,
    /// Credentials file to read --profile (or `default`) from.
    #[arg(long)]
    credentials_file: Option<PathBuf>,
    /// Endpoint of an S3 compatible service.
    #[arg(long, env = "S3_ENDPOINT")]
    endpoint: Option<String>,
    /// Bucket to look in. Lists all buckets when omitted.
    #[arg(long)]
    bucket: Option<String>,
    /// Maximum number of backups to show.
    #[arg(long, default_value_t = 25, allow_negative_numbers = true)]
    max_keys: i64,
}

impl StoreArgs {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            profile: self.profile.clone(),
            credentials_file: self.credentials_file.clone(),
        }
    }

    fn limit(&self) -> usize {
        usize::try_from(self.max_keys).unwrap_or(0)
    }
}

async fn show_buckets<S: ObjectStore + ?Sized>(store: &S) -> Result<()> {
    let buckets = store.list_buckets().await?;
    console::print_buckets(&buckets);
    Ok(())
}

#[derive(Args, Debug)]
pub struct DbList {
    #[command(flatten)]
    store: StoreArgs,
    /// Only list keys under this prefix. Relative to the date folder when
    /// --date is given.
    #[arg(long)]
    prefix: Option<String>,
    /// Only list the date folder for this day (YYYY-MM-DD).
    #[arg(long)]
    date: Option<String>,
    /// Don't probe date folders, filter db/ keys from the bucket root.
    #[arg(long, conflicts_with = "date")]
    no_date: bool,
    /// List every key, not only those under a db/ path.
    #[arg(long)]
    all: bool,
}

impl DbList {
    /// Fails on a malformed --date before anything touches the network.
    fn filter_mode(&self) -> Result<FilterMode> {
        let prefix = match (&self.date, &self.prefix) {
            (Some(date), prefix) => {
                validate_date(date)?;
                Some(format!("{date}/{}", prefix.as_deref().unwrap_or("")))
            }
            (None, prefix) => prefix.clone(),
        };

        Ok(if self.all {
            FilterMode::Prefix { prefix }
        } else if prefix.is_none() && !self.no_date {
            FilterMode::DateFolders
        } else {
            FilterMode::db_artifacts(prefix)
        })
    }

    pub async fn run(self) -> Result<()> {
        let mode = self.filter_mode()?;
        let client = create_s3_client(&self.store.client_config())?;
        let Some(bucket) = self.store.bucket.as_deref() else {
            return show_buckets(&client).await;
        };

        let resolution = Resolver::new(&client, bucket)
            .resolve(&mode, self.store.limit())
            .await?;
        if resolution.is_empty() {
            console::warning(&format!("No backups found in {bucket}."));
            return Ok(());
        }
        console::print_objects(&resolution);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DbSync {
    #[command(flatten)]
    store: StoreArgs,
    /// Where to save the backup, created if missing.
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,
    /// Decompress the backup after downloading (gzip or zip).
    #[arg(long)]
    gunzip: bool,
    /// Pick this entry instead of prompting.
    #[arg(long)]
    select: Option<usize>,
}

impl DbSync {
    pub async fn run(self) -> Result<()> {
        let client = create_s3_client(&self.store.client_config())?;
        let Some(bucket) = self.store.bucket.as_deref() else {
            return show_buckets(&client).await;
        };
        let outcome = BackupSync::new(&client, bucket, &self.download_dir)
            .limit(self.store.limit())
            .decompress(self.gunzip)
            .run(|resolution, index| {
                console::print_objects(resolution);
                match self.select {
                    Some(choice) => Ok(index.validate(&choice.to_string())?),
                    None => console::prompt_selection(index),
                }
            })
            .await?;

        match outcome {
            SyncOutcome::NothingFound => {
                console::warning(&format!("No backups found in {bucket}."));
            }
            SyncOutcome::Skipped => console::note("Nothing selected."),
            SyncOutcome::Fetched {
                download,
                decompressed,
                ..
            } => {
                console::success(&format!(
                    "Downloaded {} ({})",
                    download.path.display(),
                    format_size(download.bytes)
                ));
                report_decompressed(decompressed);
            }
        }
        Ok(())
    }
}

fn report_decompressed(decompressed: Option<Decompressed>) {
    match decompressed {
        Some(Decompressed::Gzip(out)) => {
            console::success(&format!("Decompressed to {}", out.display()));
        }
        Some(Decompressed::Zip { dir, entries }) => {
            console::success(&format!("Extracted {entries} entries into {}", dir.display()));
        }
        Some(Decompressed::Unchanged(path)) => {
            info!(path = %path.display(), "not compressed, nothing to do");
            console::note("File is not compressed.");
        }
        None => {}
    }
}
