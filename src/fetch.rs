//! Idempotent GRIB2 fetch from the NOMADS grib filter.
//!
//! The local filename is derived deterministically from the request, so the
//! freshness check only has to stat one path: if the file exists and is
//! younger than `max_age`, the network is never touched. Downloads stream to
//! a `.partial` file and are renamed into place once complete.

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::config::ForecastRequest;
use crate::error::FetchError;

/// A downloaded (or still-fresh) GRIB2 file on disk.
///
/// Never mutated after the fetch stage completes.
#[derive(Debug, Clone)]
pub struct GribFile {
    pub path: PathBuf,
    /// False when the freshness check skipped the download.
    pub downloaded: bool,
}

/// Downloads forecast subsets into a data directory.
pub struct Fetcher {
    client: Client,
    data_dir: PathBuf,
    base_url: String,
}

impl Fetcher {
    pub fn new(data_dir: PathBuf, base_url: String) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            client,
            data_dir,
            base_url,
        })
    }

    /// Fetch the file described by `request`.
    ///
    /// Returns without any network I/O when a fresh copy already exists,
    /// unless `force` is set. One HTTP GET otherwise; no retries.
    #[instrument(skip(self, request), fields(file = %request.local_filename()))]
    pub async fn fetch(
        &self,
        request: &ForecastRequest,
        force: bool,
    ) -> Result<GribFile, FetchError> {
        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| FetchError::Io {
                path: self.data_dir.clone(),
                source,
            })?;

        let path = self.data_dir.join(request.local_filename());

        if !force {
            if let Some(age) = file_age(&path).await {
                if age <= request.max_age {
                    info!(
                        path = %path.display(),
                        age_secs = age.as_secs(),
                        "GRIB file is fresh, skipping download"
                    );
                    return Ok(GribFile {
                        path,
                        downloaded: false,
                    });
                }
                debug!(
                    path = %path.display(),
                    age_secs = age.as_secs(),
                    max_age_secs = request.max_age.as_secs(),
                    "GRIB file is stale, re-downloading"
                );
            }
        }

        let url = request.filter_url(&self.base_url);
        info!(url = %url, "Requesting GFS subset");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
                url,
            });
        }

        let partial = path.with_extension("grib2.partial");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&partial)
            .await
            .map_err(|source| FetchError::Io {
                path: partial.clone(),
                source,
            })?;

        let mut bytes = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| FetchError::Io {
                    path: partial.clone(),
                    source,
                })?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(|source| FetchError::Io {
            path: partial.clone(),
            source,
        })?;
        file.sync_all().await.map_err(|source| FetchError::Io {
            path: partial.clone(),
            source,
        })?;
        drop(file);

        fs::rename(&partial, &path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), bytes, "Download completed");
        Ok(GribFile {
            path,
            downloaded: true,
        })
    }
}

/// Age of a file by modification time, or `None` if it does not exist
/// (or its mtime is unreadable, which forces a re-download).
async fn file_age(path: &std::path::Path) -> Option<Duration> {
    let metadata = fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    std::time::SystemTime::now().duration_since(modified).ok()
}
