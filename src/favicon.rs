//! Favicon lookup as an owned side task.
//!
//! A `FaviconTask` is spawned when an item gets a URL and is owned by
//! whatever is editing that item. It runs under a child of the owner's
//! cancellation token, so cancelling the owner (or dropping the task)
//! stops the fetch. The result is collected with `wait()`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::errors::{PawError, Result};
use crate::item::Favicon;

/// Largest icon accepted from a source.
pub const MAX_ICON_BYTES: usize = 256 * 1024;

/// Fetches the icon for a host.
#[async_trait]
pub trait FaviconSource: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, host: &str) -> Result<Favicon>;
}

/// Host part of a URL as typed by a user.
///
/// Accepts full URLs and bare `host/path` forms. Returns `None` for
/// empty input.
pub fn host_from_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(host) = Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
    {
        return Some(host);
    }
    raw.split('/')
        .next()
        .filter(|first| !first.is_empty())
        .map(str::to_string)
}

/// A running favicon fetch.
#[derive(Debug)]
pub struct FaviconTask {
    host: String,
    token: CancellationToken,
    handle: Option<JoinHandle<Result<Option<Favicon>>>>,
}

impl FaviconTask {
    /// Start fetching the icon for `url`'s host. Returns `None` when the
    /// URL has no usable host.
    pub fn spawn(
        source: Arc<dyn FaviconSource>,
        url: &str,
        parent: &CancellationToken,
    ) -> Option<Self> {
        let host = host_from_url(url)?;
        let token = parent.child_token();

        let task_token = token.clone();
        let task_host = host.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    debug!(host = %task_host, "favicon fetch cancelled");
                    Ok(None)
                }
                fetched = source.fetch(&task_host) => fetched.map(Some),
            }
        });

        Some(Self {
            host,
            token,
            handle: Some(handle),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the fetch. `Ok(None)` means it was cancelled.
    pub async fn wait(mut self) -> Result<Option<Favicon>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        handle
            .await
            .map_err(|e| PawError::TaskPanicked(e.to_string()))?
    }

    /// Like `wait`, but gives up (and cancels the fetch) after `limit`.
    pub async fn wait_for(self, limit: Duration) -> Result<Option<Favicon>> {
        let token = self.token.clone();
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                token.cancel();
                Ok(None)
            }
        }
    }
}

impl Drop for FaviconTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Fetches `https://<host>/favicon.ico`.
#[cfg(feature = "favicon-http")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFaviconSource;

#[cfg(feature = "favicon-http")]
#[async_trait]
impl FaviconSource for HttpFaviconSource {
    async fn fetch(&self, host: &str) -> Result<Favicon> {
        let owned = host.to_string();
        let data = tokio::task::spawn_blocking(move || download_icon(&owned))
            .await
            .map_err(|e| PawError::TaskPanicked(e.to_string()))??;
        Ok(Favicon {
            host: host.to_string(),
            data,
        })
    }
}

#[cfg(feature = "favicon-http")]
fn download_icon(host: &str) -> Result<Vec<u8>> {
    let unavailable =
        |e: ureq::Error| PawError::RemoteUnavailable(format!("favicon for {host}: {e}"));

    let url = format!("https://{host}/favicon.ico");
    let agent = format!("pawkv/{}", env!("CARGO_PKG_VERSION"));
    let mut resp = ureq::get(url.as_str())
        .header("User-Agent", agent.as_str())
        .call()
        .map_err(unavailable)?;
    let data = resp.body_mut().read_to_vec().map_err(unavailable)?;

    if data.is_empty() || data.len() > MAX_ICON_BYTES {
        return Err(PawError::RemoteUnavailable(format!(
            "favicon for {host}: unusable size of {} bytes",
            data.len()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Returns a fixed icon after a delay and notes whether it finished.
    #[derive(Debug, Default)]
    struct SlowSource {
        delay_ms: u64,
        finished: AtomicBool,
    }

    #[async_trait]
    impl FaviconSource for SlowSource {
        async fn fetch(&self, host: &str) -> Result<Favicon> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(Favicon {
                host: host.to_string(),
                data: vec![0x89, b'P', b'N', b'G'],
            })
        }
    }

    #[test]
    fn host_extraction() {
        assert_eq!(
            host_from_url("https://mail.example.com/inbox").as_deref(),
            Some("mail.example.com")
        );
        assert_eq!(
            host_from_url("shop.example/login").as_deref(),
            Some("shop.example")
        );
        assert_eq!(host_from_url("  "), None);
        assert_eq!(host_from_url("/path-only"), None);
    }

    #[tokio::test]
    async fn wait_returns_icon() {
        let source = Arc::new(SlowSource::default());
        let task = FaviconTask::spawn(source, "https://a.example", &CancellationToken::new())
            .unwrap();
        assert_eq!(task.host(), "a.example");
        let icon = task.wait().await.unwrap().unwrap();
        assert_eq!(icon.host, "a.example");
    }

    #[tokio::test]
    async fn parent_cancellation_stops_fetch() {
        let source = Arc::new(SlowSource {
            delay_ms: 5_000,
            ..Default::default()
        });
        let parent = CancellationToken::new();
        let task = FaviconTask::spawn(
            Arc::clone(&source) as Arc<dyn FaviconSource>,
            "a.example",
            &parent,
        )
        .unwrap();

        parent.cancel();
        assert!(task.wait().await.unwrap().is_none());
        assert!(!source.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wait_for_gives_up() {
        let source = Arc::new(SlowSource {
            delay_ms: 5_000,
            ..Default::default()
        });
        let task = FaviconTask::spawn(source, "a.example", &CancellationToken::new()).unwrap();
        let outcome = task.wait_for(Duration::from_millis(20)).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn dropping_task_cancels_its_token_only() {
        let parent = CancellationToken::new();
        let task = FaviconTask::spawn(
            Arc::new(SlowSource::default()),
            "a.example",
            &parent,
        )
        .unwrap();
        let child = task.token.clone();
        drop(task);
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
