//! The fetch primitive used by the download orchestrator
//!
//! A [`Fetcher`] copies one URL to one local path and reports the number of
//! bytes written. [`HttpFetcher`] does this with reqwest, writing to a
//! `.part` file first so an interrupted transfer never leaves a truncated file
//! under the final name.

use crate::{Error, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Fetch `url` into `dest`, returning the number of bytes written
///
/// The destination directory already exists when this is called.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url, dest: &Path) -> impl Future<Output = Result<u64>> + Send;
}

/// reqwest-backed [`Fetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shares its connection pool)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn fetch_to(&self, url: &Url, dest: &Path) -> Result<u64> {
        let fetch_error = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };

        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_connect() {
                fetch_error(format!("cannot connect: {}", e))
            } else if e.is_timeout() {
                fetch_error("request timed out".to_string())
            } else {
                fetch_error(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status.as_u16())));
        }

        let part = part_path(dest);
        let mut file = fs::File::create(&part).await?;
        let mut written: u64 = 0;

        let copied: Result<()> = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        drop(file);

        if let Err(e) = copied {
            let _ = fs::remove_file(&part).await;
            return Err(fetch_error(e.to_string()));
        }

        fs::rename(&part, dest).await?;
        Ok(written)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url, dest: &Path) -> impl Future<Output = Result<u64>> + Send {
        self.fetch_to(url, dest)
    }
}

/// GET `url` and return the whole body, mapping failures to [`Error::Fetch`]
pub(crate) async fn get_bytes(client: &reqwest::Client, url: &Url) -> Result<Vec<u8>> {
    let fetch_error = |reason: String| Error::Fetch {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP {}", status.as_u16())));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_error(format!("failed to read response: {}", e)))?;
    Ok(body.to_vec())
}

/// GET `url` and decode the body as JSON
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
) -> Result<T> {
    let body = get_bytes(client, url).await?;
    serde_json::from_slice(&body).map_err(|e| Error::Fetch {
        url: url.to_string(),
        reason: format!("failed to parse response: {}", e),
    })
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
