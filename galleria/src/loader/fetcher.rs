//! Image fetching abstraction for testability.

use std::future::Future;
use std::pin::Pin;

use reqwest::Url;

use super::error::LoadError;

/// Boxed future returned by dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches raw image bytes.
///
/// This abstraction allows the load queue and placeholder cache to be
/// driven by mock fetchers in tests.
pub trait ImageFetcher: Send + Sync {
    /// Fetch the body at `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, LoadError>>;
}

/// Real fetcher using an async reqwest client.
///
/// No request timeout is configured: slow loads are detected statistically
/// by the performance monitor instead.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl HttpImageFetcher {
    /// Create a fetcher that only accepts absolute URLs.
    pub fn new() -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LoadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Create a fetcher that resolves relative URLs against `base`.
    pub fn with_base_url(base: &str) -> Result<Self, LoadError> {
        let base_url = Url::parse(base).map_err(|e| LoadError::Client(format!("invalid base URL {}: {}", base, e)))?;
        let mut fetcher = Self::new()?;
        fetcher.base_url = Some(base_url);
        Ok(fetcher)
    }

    fn resolve(&self, url: &str) -> Result<Url, LoadError> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }

        let Some(base) = &self.base_url else {
            return Err(LoadError::Request {
                url: url.to_string(),
                reason: "relative URL without a base URL".to_string(),
            });
        };

        base.join(url).map_err(|e| LoadError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, LoadError>> {
        Box::pin(async move {
            let resolved = self.resolve(url)?;

            let response = self
                .client
                .get(resolved)
                .send()
                .await
                .map_err(|e| LoadError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            if !response.status().is_success() {
                return Err(LoadError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }

            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| LoadError::Request {
                    url: url.to_string(),
                    reason: format!("failed to read response: {}", e),
                })
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticFetcher;
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher_overrides() {
        let fetcher = StaticFetcher::ok(vec![1, 2, 3]).with_response(
            "/missing.webp",
            Err(LoadError::Status {
                url: "/missing.webp".to_string(),
                status: 404,
            }),
        );

        assert_eq!(fetcher.fetch("/a.webp").await.unwrap(), vec![1, 2, 3]);
        assert!(fetcher.fetch("/missing.webp").await.is_err());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_relative_url_without_base_is_rejected() {
        let fetcher = HttpImageFetcher::new().unwrap();
        let err = fetcher.fetch("/images/a.webp").await.unwrap_err();
        assert!(matches!(err, LoadError::Request { .. }));
    }

    #[test]
    fn test_relative_url_resolves_against_base() {
        let fetcher = HttpImageFetcher::with_base_url("https://example.com/gallery/").unwrap();
        let resolved = fetcher.resolve("images/a.webp").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/gallery/images/a.webp");

        let absolute = fetcher.resolve("https://cdn.example.com/b.webp").unwrap();
        assert_eq!(absolute.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpImageFetcher::with_base_url("not a url"),
            Err(LoadError::Client(_))
        ));
    }
}
