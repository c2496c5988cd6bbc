use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::cache::{CacheKey, ImageCache, WriteSink};
use crate::images::FetchError;

/// Downloads origin images into the cache.
///
/// One fetch per cache key at a time is the coordinator's job; the fetcher
/// itself only guarantees that a failed download leaves no entry behind.
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
    user_agent: String,
}

impl ImageFetcher {
    pub fn new(
        timeout_secs: u64,
        max_redirects: usize,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(Policy::limited(max_redirects))
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// Fetches `url` and stores the body as the cache entry for `key`.
    ///
    /// The body is streamed straight into the store's write sink. On any
    /// failure the staged write is discarded and a stale entry for the key
    /// is removed, so callers can retry the key later.
    pub async fn fetch(
        &self,
        url: &str,
        store: &ImageCache,
        key: &CacheKey,
    ) -> Result<(), FetchError> {
        let mut sink = store.open_write_sink(key).await?;
        match self.stream_to(url, &mut sink).await {
            Ok(()) => {
                sink.commit().await?;
                info!("fetched {} into cache entry {}", url, key);
                Ok(())
            }
            Err(err) => {
                warn!("fetch of {} failed: {}", url, err);
                sink.discard().await;
                store.remove(key).await;
                Err(err)
            }
        }
    }

    async fn stream_to(&self, url: &str, sink: &mut WriteSink) -> Result<(), FetchError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "image/*,*/*;q=0.8")
            .send()
            .await?
            .error_for_status()?;

        debug!("origin responded {} for {}", response.status(), url);

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
        }
        Ok(())
    }
}
