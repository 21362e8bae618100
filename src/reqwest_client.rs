use http_cache_reqwest::{CACacheManager, Cache, CacheMode, HttpCache, HttpCacheOptions};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;

use crate::{
    config::WikiOptions,
    errors::{Result, WikiError},
};

/// Wrapper around the middleware client so the rest of the crate never touches
/// reqwest directly.
#[derive(Debug, Clone)]
pub struct RustClient(pub ClientWithMiddleware);

impl RustClient {
    /// Create a new client from the wiki options.
    ///
    /// # Arguments
    /// - options -> user agent, extra headers and optional cache directory.
    ///
    /// # Returns
    /// - a new client object to use. When `cache_path` is set responses are
    ///   cached on disk following the HTTP cache headers the wiki sends.
    pub fn new(options: &WikiOptions) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(options.user_agent.as_str())
            .default_headers(build_headers(&options.headers)?)
            .build()?;

        let mut builder = reqwest_middleware::ClientBuilder::new(client);
        if let Some(ref path) = options.cache_path {
            log::debug!("Caching responses in {:?}", path);
            builder = builder.with(Cache(HttpCache {
                mode: CacheMode::Default,
                manager: CACacheManager::new(path.clone(), true),
                options: HttpCacheOptions::default(),
            }));
        }
        Ok(Self(builder.build()))
    }

    pub fn get<U>(&self, url: U) -> reqwest_middleware::RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.0.get(url)
    }
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| WikiError::transport(format!("invalid header name {:?}", name), e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| WikiError::transport(format!("invalid header value for {:?}", name), e))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_validated() {
        let ok = build_headers(&[("Cookie".into(), "a=b; c=d".into())]).unwrap();
        assert_eq!(ok.get("cookie").unwrap(), "a=b; c=d");

        let bad = build_headers(&[("Bad Header".into(), "x".into())]);
        assert!(bad.is_err());
    }

    #[test]
    fn client_builds_without_cache() {
        let client = RustClient::new(&WikiOptions::default());
        assert!(client.is_ok());
    }
}
