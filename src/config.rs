//! Client options.
//!
//! A `WikiOptions` value is built once per client (usually through
//! [`WikiOptionsBuilder`]) and then shared read-only behind an `Arc` by every
//! request the client makes. Nothing mutates it after `build()`.

use std::{env, path::PathBuf};

use derive_builder::Builder;
use dotenv::dotenv;
use url::Url;

use crate::errors::{Result, WikiError};

/// Default endpoint, English Wikipedia.
pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "wikipage/",
    env!("CARGO_PKG_VERSION"),
    " (MediaWiki client written in rust)"
);

/// Options for a single wiki client.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "WikiError"))]
pub struct WikiOptions {
    /// Full URL of the `api.php` endpoint.
    #[builder(setter(into), default = "DEFAULT_API_URL.to_string()")]
    pub api_url: String,
    /// Sent as `origin=` on every request when set.
    #[builder(setter(into, strip_option), default)]
    pub origin: Option<String>,
    /// Extra headers, e.g. cookies.
    #[builder(setter(each(name = "header", into)), default)]
    pub headers: Vec<(String, String)>,
    #[builder(setter(into), default = "DEFAULT_USER_AGENT.to_string()")]
    pub user_agent: String,
    /// Directory for the on-disk HTTP cache. No caching when `None`.
    #[builder(setter(into, strip_option), default)]
    pub cache_path: Option<PathBuf>,
}

impl WikiOptionsBuilder {
    fn validate(&self) -> Result<()> {
        if let Some(ref api_url) = self.api_url {
            let url = Url::parse(api_url)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(WikiError::Config {
                    msg: format!("api_url must be http(s), got {:?}", url.scheme()),
                });
            }
        }
        Ok(())
    }
}

impl Default for WikiOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            origin: None,
            headers: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_path: None,
        }
    }
}

impl WikiOptions {
    /// Build options from the environment (a `.env` file is honoured).
    ///
    /// # Variables
    /// - `WIKI_API_URL` -> endpoint, defaults to English Wikipedia.
    /// - `WIKI_USER_AGENT` -> user agent override.
    /// - `WIKI_ORIGIN` -> value for the `origin` parameter.
    /// - `WIKI_CACHE_PATH` -> enables the HTTP cache in that directory.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let mut builder = WikiOptionsBuilder::default();
        if let Ok(api_url) = env::var("WIKI_API_URL") {
            builder.api_url(api_url);
        }
        if let Ok(user_agent) = env::var("WIKI_USER_AGENT") {
            builder.user_agent(user_agent);
        }
        if let Ok(origin) = env::var("WIKI_ORIGIN") {
            builder.origin(origin);
        }
        if let Ok(cache_path) = env::var("WIKI_CACHE_PATH") {
            builder.cache_path(cache_path);
        }
        builder.build()
    }

    /// The parsed endpoint.
    pub fn endpoint(&self) -> Result<Url> {
        Ok(Url::parse(&self.api_url)?)
    }
}
