//! Remote file access over HTTP(S) and FTP.
//!
//! FTP uses the blocking `suppaftp` client on the blocking thread pool; one
//! connection per call, anonymous login unless the URL carries credentials.

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use suppaftp::types::FileType;
use suppaftp::{FtpStream, Mode};
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// Source of remote bytes and directory listings.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve the whole body at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;

    /// Retrieve a directory listing as raw lines.
    ///
    /// FTP URLs issue `LIST`; HTTP URLs return the body split into lines.
    async fn list(&self, url: &str) -> Result<Vec<String>, FetchError>;
}

pub struct RemoteFetcher {
    http: reqwest::Client,
}

impl RemoteFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http })
    }

    async fn http_get(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Fetcher for RemoteFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let parsed = parse_url(url)?;
        let data = match parsed.scheme() {
            "http" | "https" => self.http_get(&parsed).await?.bytes().await?,
            "ftp" => {
                let target = FtpTarget::from_url(&parsed)?;
                run_blocking(move || target.retrieve()).await?
            }
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        };
        debug!(url, bytes = data.len(), "Fetched");
        Ok(data)
    }

    async fn list(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let parsed = parse_url(url)?;
        let lines = match parsed.scheme() {
            "http" | "https" => {
                let body = self.http_get(&parsed).await?.text().await?;
                body.lines().map(str::to_string).collect()
            }
            "ftp" => {
                let target = FtpTarget::from_url(&parsed)?;
                run_blocking(move || target.list()).await?
            }
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        };
        debug!(url, lines = lines.len(), "Listed");
        Ok(lines)
    }
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

async fn run_blocking<T, F>(f: F) -> Result<T, FetchError>
where
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FetchError::Task(e.to_string()))?
}

// ── FTP ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct FtpTarget {
    addr: String,
    user: String,
    password: String,
    path: String,
}

impl FtpTarget {
    fn from_url(url: &Url) -> Result<Self, FetchError> {
        let host = url.host_str().ok_or_else(|| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".into(),
        })?;
        let port = url.port_or_known_default().unwrap_or(21);
        let user = match url.username() {
            "" => ANONYMOUS_USER.to_string(),
            u => u.to_string(),
        };
        let password = url.password().unwrap_or(ANONYMOUS_PASSWORD).to_string();
        Ok(Self {
            addr: format!("{host}:{port}"),
            user,
            password,
            path: url.path().to_string(),
        })
    }

    fn connect(&self) -> Result<FtpStream, FetchError> {
        debug!(addr = %self.addr, user = %self.user, "Connecting to FTP server");
        let mut ftp = FtpStream::connect(&self.addr)?;
        ftp.set_mode(Mode::Passive);
        ftp.login(&self.user, &self.password)?;
        Ok(ftp)
    }

    fn retrieve(&self) -> Result<Bytes, FetchError> {
        let mut ftp = self.connect()?;
        ftp.transfer_type(FileType::Binary)?;
        let mut reader = ftp.retr_as_buffer(&self.path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        close(ftp);
        Ok(Bytes::from(data))
    }

    fn list(&self) -> Result<Vec<String>, FetchError> {
        let mut ftp = self.connect()?;
        let lines = ftp.list(Some(self.path.as_str()))?;
        close(ftp);
        Ok(lines)
    }
}

fn close(mut ftp: FtpStream) {
    if let Err(e) = ftp.quit() {
        warn!(error = %e, "Failed to quit FTP session gracefully");
    }
}
