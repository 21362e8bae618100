//! The single capability everything else is built on: perform one MediaWiki
//! API call with a set of parameters and hand back the decoded JSON.
//!
//! [`Transport`] is the seam. [`HttpTransport`] is the real implementation;
//! tests substitute a scripted fake.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::{
    config::WikiOptions,
    errors::{Result, WikiError},
    reqwest_client::RustClient,
};

/// Request parameters, ordered so generated URLs are stable.
pub type Params = BTreeMap<String, String>;

/// Build a [`Params`] map from string pairs.
pub fn params<K, V, I>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

/// One API round trip.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single request. `params` may override `action` (defaults to
    /// `query`) and `format` (defaults to `json`).
    async fn perform_query(&self, params: &Params) -> Result<Value>;
}

/// Parameters every request carries unless the caller overrides them.
fn default_params() -> Params {
    params([("format", "json"), ("action", "query"), ("redirects", "")])
}

/// Merge caller parameters over the defaults and add `origin` when configured.
pub fn merge_params(options: &WikiOptions, extra: &Params) -> Params {
    let mut merged = default_params();
    merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    if let Some(ref origin) = options.origin {
        merged.insert("origin".to_string(), origin.clone());
    }
    merged
}

/// Build the full request URL for a set of parameters.
pub fn build_api_url(options: &WikiOptions, extra: &Params) -> Result<Url> {
    let mut url = options.endpoint()?;
    url.query_pairs_mut()
        .extend_pairs(merge_params(options, extra).iter())
        .finish();
    Ok(url)
}

/// Turn an `{"error": {...}}` answer into a [`WikiError::Api`].
pub fn check_api_error(response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("no details given");
        return Err(WikiError::api(code, info));
    }
    Ok(response)
}

/// The HTTP implementation of [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: RustClient,
    options: Arc<WikiOptions>,
}

impl HttpTransport {
    pub fn new(options: Arc<WikiOptions>) -> Result<Self> {
        let client = RustClient::new(&options)?;
        Ok(Self { client, options })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform_query(&self, params: &Params) -> Result<Value> {
        let url = build_api_url(&self.options, params)?;
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        check_api_error(response.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WikiOptionsBuilder;
    use serde_json::json;

    #[test]
    fn defaults_can_be_overridden() {
        let options = WikiOptions::default();
        let merged = merge_params(&options, &params([("action", "opensearch")]));
        assert_eq!(merged["action"], "opensearch");
        assert_eq!(merged["format"], "json");
        assert_eq!(merged["redirects"], "");
        assert!(!merged.contains_key("origin"));
    }

    #[test]
    fn url_carries_origin_and_params() {
        let options = WikiOptionsBuilder::default()
            .api_url("https://starwars.fandom.com/api.php")
            .origin("*")
            .build()
            .unwrap();
        let url = build_api_url(&options, &params([("titles", "Luke Skywalker")])).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("origin=*") || query.contains("origin=%2A"));
        assert!(query.contains("titles=Luke+Skywalker"));
        assert!(query.contains("action=query"));
        assert_eq!(url.path(), "/api.php");
    }

    #[test]
    fn api_errors_are_surfaced() {
        let err = check_api_error(json!({
            "error": {"code": "missingtitle", "info": "The page you specified doesn't exist."}
        }))
        .unwrap_err();
        match err {
            WikiError::Api { code, info } => {
                assert_eq!(code, "missingtitle");
                assert!(info.contains("doesn't exist"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_api_error(json!({"query": {}})).is_ok());
    }
}
