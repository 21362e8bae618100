//! Continuation-token pagination over the query API.
//!
//! [`paginate`] performs one request and returns a [`ResultBatch`]. When the
//! response carried a continuation marker the batch holds a [`Continuation`],
//! which owns everything needed for the following request. Fetching consumes
//! the continuation, so a chain can only be walked forward, once.
//!
//! [`aggregate_all`] walks a chain to the end in a loop and concatenates the
//! batches in arrival order.

use std::{fmt, future::Future, sync::Arc};

use futures::{Stream, stream};
use serde_json::{Map, Value};

use crate::{
    api::{Params, Transport},
    errors::{Result, WikiError},
};

/// Turns one raw response into the batch's results.
pub type ParseFn<T> = Arc<dyn Fn(&Value) -> Result<Vec<T>> + Send + Sync>;

/// Request parameters of a traversal plus the parameter the last continuation
/// marker told us to set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    pub params: Params,
    pub continuation_key: Option<String>,
}

/// A continuation marker pulled out of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueMarker {
    /// The parameter carrying the opaque token, e.g. `plcontinue`.
    pub key: String,
    /// Every parameter to merge into the next request (the token included).
    pub params: Params,
}

impl ContinueMarker {
    pub fn token(&self) -> Option<&str> {
        self.params.get(&self.key).map(String::as_str)
    }
}

/// Read the continuation marker of `response`, if any.
///
/// Both the current `continue` block and the legacy `query-continue` block
/// (one object per module) are understood. A marker without a token, or with a
/// token that is not a string or number, is a
/// [`WikiError::ContinuationProtocol`].
pub fn extract_continuation(response: &Value) -> Result<Option<ContinueMarker>> {
    if let Some(block) = response.get("continue") {
        let block = block
            .as_object()
            .ok_or_else(|| WikiError::continuation("'continue' is not an object"))?;
        return marker_from(block, "continue").map(Some);
    }
    if let Some(legacy) = response.get("query-continue") {
        let modules = legacy
            .as_object()
            .ok_or_else(|| WikiError::continuation("'query-continue' is not an object"))?;
        let mut flat = Map::new();
        for (module, entries) in modules {
            let entries = entries.as_object().ok_or_else(|| {
                WikiError::continuation(format!("'query-continue.{}' is not an object", module))
            })?;
            flat.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        return marker_from(&flat, "query-continue").map(Some);
    }
    Ok(None)
}

fn marker_from(block: &Map<String, Value>, origin: &str) -> Result<ContinueMarker> {
    let mut params = Params::new();
    for (key, value) in block {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(WikiError::continuation(format!(
                    "'{}.{}' has unusable token {}",
                    origin, key, other
                )));
            }
        };
        params.insert(key.clone(), value);
    }
    // `continue` itself is a generic marker, the token lives under the other key
    let key = block
        .keys()
        .find(|k| k.as_str() != "continue")
        .cloned()
        .ok_or_else(|| WikiError::continuation(format!("'{}' carries no token", origin)))?;
    Ok(ContinueMarker { key, params })
}

/// One page of results.
pub struct ResultBatch<T> {
    pub results: Vec<T>,
    /// The search term, for batches produced by a full-text search.
    pub query: Option<String>,
    /// Present iff the API said there is more.
    pub next: Option<Continuation<T>>,
}

impl<T> ResultBatch<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// This batch followed by every later one, fetched lazily as the stream is
    /// polled. The stream ends after the terminal batch or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<T>>>
    where
        T: Send + 'static,
    {
        enum Step<T> {
            Ready(ResultBatch<T>),
            Pending(Continuation<T>),
        }

        stream::try_unfold(Some(Step::Ready(self)), |step| async move {
            let batch = match step {
                None => return Ok::<_, WikiError>(None),
                Some(Step::Ready(batch)) => batch,
                Some(Step::Pending(next)) => next.fetch().await?,
            };
            let following = batch.next.map(Step::Pending);
            Ok::<_, WikiError>(Some((batch.results, following)))
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for ResultBatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultBatch")
            .field("results", &self.results)
            .field("query", &self.query)
            .field("next", &self.next)
            .finish()
    }
}

/// The single-use handle to the next batch of a chain.
pub struct Continuation<T> {
    transport: Arc<dyn Transport>,
    state: PaginationState,
    parse: ParseFn<T>,
}

impl<T> Continuation<T> {
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Perform the follow-up request.
    pub async fn fetch(self) -> Result<ResultBatch<T>> {
        log::debug!(
            "Following continuation {:?}",
            self.state.continuation_key.as_deref().unwrap_or_default()
        );
        fetch_batch(self.transport, self.state.params, self.parse).await
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Issue one request and wrap the answer as a [`ResultBatch`].
///
/// # Arguments
/// - transport -> performs the request.
/// - params -> request parameters of the first call.
/// - parse -> extracts the results from a response.
pub async fn paginate<T, F>(
    transport: Arc<dyn Transport>,
    params: Params,
    parse: F,
) -> Result<ResultBatch<T>>
where
    F: Fn(&Value) -> Result<Vec<T>> + Send + Sync + 'static,
{
    fetch_batch(transport, params, Arc::new(parse)).await
}

async fn fetch_batch<T>(
    transport: Arc<dyn Transport>,
    params: Params,
    parse: ParseFn<T>,
) -> Result<ResultBatch<T>> {
    let response = transport.perform_query(&params).await?;
    let results = parse(&response)?;
    let query = params.get("srsearch").cloned();

    let next = match extract_continuation(&response)? {
        Some(marker) => {
            let mut params = params;
            params.extend(marker.params);
            Some(Continuation {
                transport,
                state: PaginationState {
                    params,
                    continuation_key: Some(marker.key),
                },
                parse,
            })
        }
        None => None,
    };

    Ok(ResultBatch {
        results,
        query,
        next,
    })
}

/// Await `initial`, then follow continuations until the last batch, returning
/// every result in fetch order. Any error aborts the traversal.
pub async fn aggregate_all<T, F>(initial: F) -> Result<Vec<T>>
where
    F: Future<Output = Result<ResultBatch<T>>>,
{
    let mut batch = initial.await?;
    let mut results = Vec::new();
    let mut fetches = 1usize;
    loop {
        results.extend(batch.results);
        match batch.next {
            Some(next) => {
                batch = next.fetch().await?;
                fetches += 1;
            }
            None => {
                log::debug!("Aggregated {} results over {} requests", results.len(), fetches);
                return Ok(results);
            }
        }
    }
}

/// Relation listings either come fully aggregated or as the first batch.
#[derive(Debug)]
pub enum Relation<T> {
    Aggregated(Vec<T>),
    Paginated(ResultBatch<T>),
}

impl<T> Relation<T> {
    /// Run `first` and, when `aggregated`, walk the chain to the end.
    pub async fn collect<F>(first: F, aggregated: bool) -> Result<Self>
    where
        F: Future<Output = Result<ResultBatch<T>>>,
    {
        if aggregated {
            Ok(Relation::Aggregated(aggregate_all(first).await?))
        } else {
            Ok(Relation::Paginated(first.await?))
        }
    }

    /// Results held locally, without fetching anything.
    pub fn results(&self) -> &[T] {
        match self {
            Relation::Aggregated(all) => all,
            Relation::Paginated(batch) => &batch.results,
        }
    }

    /// Everything, following any remaining continuations.
    pub async fn into_all(self) -> Result<Vec<T>> {
        match self {
            Relation::Aggregated(all) => Ok(all),
            Relation::Paginated(batch) => aggregate_all(async { Ok(batch) }).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::params, testing::ScriptedTransport};
    use futures::TryStreamExt;
    use serde_json::json;

    fn titles(res: &Value) -> Result<Vec<String>> {
        let links = res["query"]["pages"]["1"]["links"]
            .as_array()
            .ok_or_else(|| WikiError::malformed("no links"))?;
        Ok(links
            .iter()
            .filter_map(|l| l["title"].as_str().map(String::from))
            .collect())
    }

    fn links_page(names: &[&str], token: Option<&str>) -> Value {
        let links: Vec<Value> = names.iter().map(|n| json!({"ns": 0, "title": n})).collect();
        let mut page = json!({"query": {"pages": {"1": {"pageid": 1, "links": links}}}});
        if let Some(token) = token {
            page["continue"] = json!({"plcontinue": token, "continue": "||"});
        }
        page
    }

    #[tokio::test]
    async fn aggregates_in_fetch_order() {
        let transport = ScriptedTransport::new([
            links_page(&["Anakin Skywalker", "Boba Fett"], Some("53602|0|Jango_Fett")),
            links_page(&["Jango Fett", "Yoda"], None),
        ]);
        let first = paginate(
            transport.clone(),
            params([("prop", "links"), ("titles", "Star Wars")]),
            titles,
        );
        let all = aggregate_all(first).await.unwrap();
        assert_eq!(all, vec!["Anakin Skywalker", "Boba Fett", "Jango Fett", "Yoda"]);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].contains_key("plcontinue"));
        assert_eq!(calls[1]["plcontinue"], "53602|0|Jango_Fett");
        assert_eq!(calls[1]["continue"], "||");
        assert_eq!(calls[1]["titles"], "Star Wars");
    }

    #[tokio::test]
    async fn single_batch_exposes_continuation() {
        let transport = ScriptedTransport::new([
            links_page(&["A"], Some("1|0|B")),
            links_page(&["B"], None),
        ]);
        let batch = paginate(transport.clone(), params([("prop", "links")]), titles)
            .await
            .unwrap();
        assert_eq!(batch.results, vec!["A"]);
        let next = batch.next.expect("continuation");
        assert_eq!(next.state().continuation_key.as_deref(), Some("plcontinue"));

        let last = next.fetch().await.unwrap();
        assert_eq!(last.results, vec!["B"]);
        assert!(!last.has_next());
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn long_chains_do_not_recurse() {
        let pages: Vec<Value> = (0..300)
            .map(|i| {
                let name = format!("Page {}", i);
                let token = format!("{}|0|x", i + 1);
                links_page(&[name.as_str()], (i < 299).then_some(token.as_str()))
            })
            .collect();
        let transport = ScriptedTransport::new(pages);
        let all = aggregate_all(paginate(transport, Params::new(), titles))
            .await
            .unwrap();
        assert_eq!(all.len(), 300);
        assert_eq!(all[299], "Page 299");
    }

    #[tokio::test]
    async fn protocol_violation_aborts() {
        let mut broken = links_page(&["B"], None);
        broken["continue"] = json!({"continue": "||"});
        let transport = ScriptedTransport::new([links_page(&["A"], Some("t")), broken]);
        let err = aggregate_all(paginate(transport, Params::new(), titles))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ContinuationProtocol");
    }

    #[tokio::test]
    async fn stream_yields_each_batch() {
        let transport = ScriptedTransport::new([
            links_page(&["A", "B"], Some("t1")),
            links_page(&["C"], Some("t2")),
            links_page(&["D"], None),
        ]);
        let first = paginate(transport, Params::new(), titles).await.unwrap();
        let batches: Vec<Vec<String>> = first.into_stream().try_collect().await.unwrap();
        assert_eq!(batches, vec![vec!["A", "B"], vec!["C"], vec!["D"]]);
    }

    #[tokio::test]
    async fn search_batches_echo_query() {
        let transport = ScriptedTransport::new([json!({
            "query": {"pages": {"1": {"links": []}}}
        })]);
        let batch = paginate(transport, params([("srsearch", "kevin bacon")]), titles)
            .await
            .unwrap();
        assert_eq!(batch.query.as_deref(), Some("kevin bacon"));
        assert!(batch.results.is_empty());
    }

    #[test]
    fn continue_blocks() {
        let marker = extract_continuation(&json!({
            "continue": {"sroffset": 50, "continue": "-||"}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(marker.key, "sroffset");
        assert_eq!(marker.token(), Some("50"));
        assert_eq!(marker.params["continue"], "-||");

        assert!(extract_continuation(&json!({"query": {}})).unwrap().is_none());

        let err = extract_continuation(&json!({"continue": {"plcontinue": null}})).unwrap_err();
        assert_eq!(err.kind(), "ContinuationProtocol");
    }

    #[test]
    fn legacy_query_continue() {
        let marker = extract_continuation(&json!({
            "query-continue": {"allpages": {"apcontinue": "Batman_Begins"}}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(marker.key, "apcontinue");
        assert_eq!(marker.token(), Some("Batman_Begins"));
    }

    #[tokio::test]
    async fn relation_modes() {
        let transport = ScriptedTransport::new([
            links_page(&["A"], Some("t")),
            links_page(&["B"], None),
        ]);
        let relation = Relation::collect(paginate(transport, Params::new(), titles), false)
            .await
            .unwrap();
        assert_eq!(relation.results(), ["A".to_string()]);
        assert_eq!(relation.into_all().await.unwrap(), vec!["A", "B"]);
    }
}
