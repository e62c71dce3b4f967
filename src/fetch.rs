//! Dataset Fetcher Module
//! Downloads the remote source CSVs into the local cache, one attempt per
//! entry, skipping anything already present. A failed download never aborts
//! the batch and never leaves a partial file behind.

use log::{info, warn};
use reqwest::blocking::Client;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::DatasetSource;

/// Bounded wait for a single download attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to write cache file: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome counts for one pass over the manifest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} cached, {} failed",
            self.downloaded, self.skipped, self.failed
        )
    }
}

/// Fetch every manifest entry in order. Entries whose cache file already
/// exists are skipped; failures are logged and counted, nothing more.
pub fn fetch_all(sources: &[DatasetSource]) -> FetchSummary {
    let client = Client::new();
    let mut summary = FetchSummary::default();

    for source in sources {
        if source.path.exists() {
            info!("{} already exists. Skipping download.", source.path.display());
            summary.skipped += 1;
            continue;
        }

        match fetch_one(&client, source) {
            Ok(()) => summary.downloaded += 1,
            Err(e) => {
                warn!("Failed to download {}: {e}", source.name);
                summary.failed += 1;
            }
        }
    }

    summary
}

fn fetch_one(client: &Client, source: &DatasetSource) -> Result<(), FetchError> {
    info!("Downloading {} dataset...", source.name);
    let response = client
        .get(&source.url)
        .timeout(REQUEST_TIMEOUT)
        .send()?
        .error_for_status()?;

    // Only touch the filesystem once the whole body has arrived, so a
    // failed transfer cannot leave a placeholder behind.
    let bytes = response.bytes()?;
    std::fs::write(&source.path, &bytes)?;
    info!("Downloaded {}.", source.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source(name: &str, url: &str, path: PathBuf) -> DatasetSource {
        DatasetSource {
            name: name.to_string(),
            url: url.to_string(),
            path,
        }
    }

    #[test]
    fn existing_cache_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cached = dir.path().join("cached.csv");
        std::fs::write(&cached, "location,date\n").expect("seed cache file");

        let summary = fetch_all(&[source("Cached", "http://127.0.0.1:9/unused", cached.clone())]);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.failed, 0);

        let contents = std::fs::read_to_string(&cached).expect("cache file still readable");
        assert_eq!(contents, "location,date\n", "Cached file must be left untouched");
    }

    #[test]
    fn failed_download_is_counted_and_leaves_no_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("unreachable.csv");

        // Nothing listens on the discard port, so the attempt fails fast.
        let summary = fetch_all(&[source(
            "Unreachable",
            "http://127.0.0.1:9/data.csv",
            missing.clone(),
        )]);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.downloaded, 0);
        assert!(!missing.exists(), "A failed download must not produce a placeholder file");
    }

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cached = dir.path().join("cached.csv");
        std::fs::write(&cached, "x\n").expect("seed cache file");

        let sources = [
            source("Unreachable", "http://127.0.0.1:9/a.csv", dir.path().join("a.csv")),
            source("Cached", "http://127.0.0.1:9/b.csv", cached),
        ];
        let summary = fetch_all(&sources);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1, "Entries after a failure must still be processed");
    }
}
