//! Poll feed sources.
//!
//! A source hands back a race's raw feed text, or `None` when the race has no
//! published data. Two sources exist:
//!
//! - [`HttpFeed`]: fetches the race URL with a per-request timeout and a
//!   bounded number of retries on transient failures (404 is final)
//! - [`DirFeed`]: reads `<dir>/<race_id>.csv` for offline runs

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::domain::RaceInfo;
use crate::error::{AppError, PollError};

/// Network settings for [`HttpFeed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Anything that can produce a race's raw feed.
pub trait FeedSource: Sync {
    fn fetch(&self, race: &RaceInfo) -> Result<Option<String>, PollError>;
}

/// Outcome of one fetch attempt that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Worth retrying (timeouts, connection errors, 5xx).
    Transient(String),
    /// Retrying will not help.
    Fatal(String),
}

/// Run `op` until it succeeds, fails fatally, or `retries` extra attempts are spent.
pub fn with_retries<T>(
    retries: u32,
    backoff: Duration,
    mut op: impl FnMut(u32) -> Result<T, AttemptError>,
) -> Result<T, String> {
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(message)) => return Err(message),
            Err(AttemptError::Transient(message)) if attempt >= retries => {
                return Err(format!("{message} (gave up after {} attempts)", attempt + 1));
            }
            Err(AttemptError::Transient(message)) => {
                warn!(attempt = attempt + 1, %message, "transient fetch failure, retrying");
                attempt += 1;
                thread::sleep(backoff);
            }
        }
    }
}

pub struct HttpFeed {
    client: Client,
    config: FeedConfig,
}

impl HttpFeed {
    pub fn new(config: FeedConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::new(2, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn attempt(&self, url: &str) -> Result<Option<String>, AttemptError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| AttemptError::Transient(format!("request failed: {e}")))?;

        if !classify(resp.status())? {
            return Ok(None);
        }

        resp.text()
            .map(Some)
            .map_err(|e| AttemptError::Transient(format!("failed to read body: {e}")))
    }
}

/// Decide what a response status means: `Ok(true)` to read the body,
/// `Ok(false)` when the feed does not exist (404).
fn classify(status: StatusCode) -> Result<bool, AttemptError> {
    if status == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AttemptError::Transient(format!("status {status}")));
    }
    if !status.is_success() {
        return Err(AttemptError::Fatal(format!("status {status}")));
    }
    Ok(true)
}

impl FeedSource for HttpFeed {
    fn fetch(&self, race: &RaceInfo) -> Result<Option<String>, PollError> {
        let Some(url) = race.url.as_deref() else {
            info!(race = %race.race_id, "no feed configured, using assumption only");
            return Ok(None);
        };
        info!(race = %race.race_id, %url, "fetching polls");

        let body = with_retries(self.config.retries, self.config.backoff, |_| self.attempt(url)).map_err(
            |message| PollError::Feed {
                race_id: race.race_id.clone(),
                message,
            },
        )?;
        if body.is_none() {
            warn!(race = %race.race_id, %url, "feed not found");
        }
        Ok(body)
    }
}

pub struct DirFeed {
    dir: PathBuf,
}

impl DirFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FeedSource for DirFeed {
    fn fetch(&self, race: &RaceInfo) -> Result<Option<String>, PollError> {
        let path = self.dir.join(format!("{}.csv", race.race_id));
        if !path.exists() {
            info!(race = %race.race_id, path = %path.display(), "no local feed, using assumption only");
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| PollError::Feed {
                race_id: race.race_id.clone(),
                message: format!("failed to read '{}': {e}", path.display()),
            })
    }
}
