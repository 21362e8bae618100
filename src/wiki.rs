//! The wiki-level entry point: searching, listing and opening pages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::{HttpTransport, Params, Transport, params},
    chain::QueryChain,
    config::WikiOptions,
    errors::{Result, WikiError},
    page::{RawPage, WikiPage},
    pagination::{ResultBatch, aggregate_all, paginate},
};

pub const DEFAULT_SEARCH_LIMIT: u32 = 50;
pub const DEFAULT_OPENSEARCH_LIMIT: u32 = 10;
pub const DEFAULT_GEO_RADIUS: u32 = 1000;
/// Per-request limit used by the full listings.
pub const LISTING_LIMIT: u32 = 500;

/// A page in the most-viewed listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostViewed {
    pub title: String,
    pub count: u64,
}

/// Titles of the objects in the array at `pointer`. A missing array is an
/// empty listing; anything else that is not an array is malformed.
pub(crate) fn titles_at(response: &Value, pointer: &str) -> Result<Vec<String>> {
    strings_at(response, pointer, "title")
}

/// Values of `field` for the objects in the array at `pointer`.
pub(crate) fn strings_at(response: &Value, pointer: &str, field: &str) -> Result<Vec<String>> {
    match response.pointer(pointer) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|item| item.get(field).and_then(Value::as_str))
            .map(String::from)
            .collect()),
        Some(other) => Err(WikiError::malformed(format!(
            "expected a list at {}, got {}",
            pointer, other
        ))),
    }
}

/// The page object for `pageid` inside `query.pages`.
pub(crate) fn page_entry(response: &Value, pageid: u64) -> Result<&Value> {
    let pages = response
        .pointer("/query/pages")
        .ok_or_else(|| WikiError::malformed("response has no query.pages"))?;
    pages
        .get(pageid.to_string())
        .ok_or_else(|| WikiError::malformed(format!("page {} not in response", pageid)))
}

/// A client for one wiki.
#[derive(Clone)]
pub struct Wiki {
    transport: Arc<dyn Transport>,
    options: Arc<WikiOptions>,
}

impl std::fmt::Debug for Wiki {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wiki").field("options", &self.options).finish()
    }
}

impl Wiki {
    /// Client over HTTP with the given options.
    pub fn new(options: WikiOptions) -> Result<Self> {
        let options = Arc::new(options);
        let transport = HttpTransport::new(options.clone())?;
        Ok(Self {
            transport: Arc::new(transport),
            options,
        })
    }

    /// Client configured from the environment, see [`WikiOptions::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(WikiOptions::from_env()?)
    }

    /// Client over any [`Transport`].
    pub fn with_transport(options: WikiOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &WikiOptions {
        &self.options
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub(crate) async fn query(&self, params: &Params) -> Result<Value> {
        self.transport.perform_query(params).await
    }

    /// Start a multi-property query over generated pages.
    pub fn chain(&self) -> QueryChain {
        QueryChain::new(self.clone(), None)
    }

    /// Full-text search. The batch echoes the search term in `query`.
    pub async fn search(&self, query: &str, limit: Option<u32>) -> Result<ResultBatch<String>> {
        paginate(
            self.transport(),
            params([
                ("list", "search".to_string()),
                ("srsearch", query.to_string()),
                ("srlimit", limit.unwrap_or(DEFAULT_SEARCH_LIMIT).to_string()),
            ]),
            |res| titles_at(res, "/query/search"),
        )
        .await
    }

    /// Titles starting with `prefix`.
    pub async fn prefix_search(
        &self,
        prefix: &str,
        limit: Option<u32>,
    ) -> Result<ResultBatch<String>> {
        paginate(
            self.transport(),
            params([
                ("list", "prefixsearch".to_string()),
                ("pssearch", prefix.to_string()),
                ("pslimit", limit.unwrap_or(DEFAULT_SEARCH_LIMIT).to_string()),
            ]),
            |res| titles_at(res, "/query/prefixsearch"),
        )
        .await
    }

    /// Title suggestions through `action=opensearch`.
    pub async fn opensearch(&self, query: &str, limit: Option<u32>) -> Result<Vec<String>> {
        let res = self
            .query(&params([
                ("action", "opensearch".to_string()),
                ("search", query.to_string()),
                ("limit", limit.unwrap_or(DEFAULT_OPENSEARCH_LIMIT).to_string()),
                ("namespace", "0".to_string()),
            ]))
            .await?;
        let titles = res
            .get(1)
            .and_then(Value::as_array)
            .ok_or_else(|| WikiError::malformed("opensearch answer has no title list"))?;
        Ok(titles
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect())
    }

    /// Random article titles.
    pub async fn random(&self, limit: Option<u32>) -> Result<Vec<String>> {
        let res = self
            .query(&params([
                ("list", "random".to_string()),
                ("rnnamespace", "0".to_string()),
                ("rnlimit", limit.unwrap_or(1).to_string()),
            ]))
            .await?;
        titles_at(&res, "/query/random")
    }

    /// Open a page by title. Titles the API redirected or normalised are
    /// accepted.
    pub async fn page(&self, title: &str) -> Result<WikiPage> {
        let res = self
            .query(&params([
                ("prop", "info|pageprops"),
                ("inprop", "url"),
                ("ppprop", "disambiguation"),
                ("titles", title),
            ]))
            .await?;
        self.page_from_response(&res, title, |page| {
            page.get("title").and_then(Value::as_str) == Some(title)
        })
    }

    /// Open a page by its id.
    pub async fn find_by_id(&self, pageid: u64) -> Result<WikiPage> {
        let res = self
            .query(&params([
                ("prop", "info|pageprops".to_string()),
                ("inprop", "url".to_string()),
                ("ppprop", "disambiguation".to_string()),
                ("pageids", pageid.to_string()),
            ]))
            .await?;
        self.page_from_response(&res, &pageid.to_string(), |page| {
            page.get("pageid").and_then(Value::as_u64) == Some(pageid)
        })
    }

    fn page_from_response<F>(&self, res: &Value, wanted: &str, exact: F) -> Result<WikiPage>
    where
        F: Fn(&Value) -> bool,
    {
        let pages = res
            .pointer("/query/pages")
            .and_then(Value::as_object)
            .ok_or_else(|| WikiError::page_not_found(wanted))?;
        // a redirected or normalised title comes back under its new name
        let page = pages
            .values()
            .find(|p| exact(p))
            .or_else(|| (pages.len() == 1).then(|| pages.values().next()).flatten())
            .ok_or_else(|| WikiError::page_not_found(wanted))?;
        if page.get("missing").is_some() || page.get("invalid").is_some() {
            return Err(WikiError::page_not_found(wanted));
        }
        let raw: RawPage = serde_json::from_value(page.clone())?;
        Ok(WikiPage::new(raw, self.clone()))
    }

    /// Search and open the first result.
    pub async fn find(&self, query: &str) -> Result<WikiPage> {
        self.find_with(query, |titles| titles.first().cloned()).await
    }

    /// Search and open the result chosen by `choose`.
    pub async fn find_with<F>(&self, query: &str, choose: F) -> Result<WikiPage>
    where
        F: FnOnce(&[String]) -> Option<String>,
    {
        let batch = self.search(query, None).await?;
        let title = choose(&batch.results).ok_or_else(|| WikiError::page_not_found(query))?;
        self.page(&title).await
    }

    /// Titles of pages within `radius` metres of a point.
    pub async fn geo_search(&self, lat: f64, lon: f64, radius: Option<u32>) -> Result<Vec<String>> {
        let res = self
            .query(&params([
                ("list", "geosearch".to_string()),
                ("gsradius", radius.unwrap_or(DEFAULT_GEO_RADIUS).to_string()),
                ("gscoord", format!("{}|{}", lat, lon)),
            ]))
            .await?;
        titles_at(&res, "/query/geosearch")
    }

    /// Every article title on the wiki.
    pub async fn all_pages(&self) -> Result<Vec<String>> {
        self.listing("allpages", "ap", "title", Params::new()).await
    }

    /// Every category name on the wiki.
    pub async fn all_categories(&self) -> Result<Vec<String>> {
        self.listing("allcategories", "ac", "*", Params::new()).await
    }

    /// Every member of `category` (`Category:` prefix included).
    pub async fn pages_in_category(&self, category: &str) -> Result<Vec<String>> {
        self.listing(
            "categorymembers",
            "cm",
            "title",
            params([("cmtitle", category)]),
        )
        .await
    }

    async fn listing(
        &self,
        list: &str,
        prefix: &str,
        field: &str,
        mut extra: Params,
    ) -> Result<Vec<String>> {
        extra.insert("list".to_string(), list.to_string());
        extra.insert(format!("{}limit", prefix), LISTING_LIMIT.to_string());
        let pointer = format!("/query/{}", list);
        let field = field.to_string();
        let all = aggregate_all(paginate(self.transport(), extra, move |res| {
            strings_at(res, &pointer, &field)
        }))
        .await?;
        log::debug!("Listed {} entries of {}", all.len(), list);
        Ok(all)
    }

    /// The most viewed pages, as reported by the PageViewInfo extension.
    pub async fn most_viewed(&self) -> Result<Vec<MostViewed>> {
        let res = self
            .query(&params([("list", "mostviewed")]))
            .await?;
        match res.pointer("/query/mostviewed") {
            None => Ok(Vec::new()),
            Some(list) => Ok(serde_json::from_value(list.clone())?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;

    fn wiki(responses: Vec<Value>) -> (Wiki, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(responses);
        (
            Wiki::with_transport(WikiOptions::default(), transport.clone()),
            transport,
        )
    }

    #[tokio::test]
    async fn search_returns_first_batch() {
        let (wiki, transport) = wiki(vec![json!({
            "continue": {"sroffset": 2, "continue": "-||"},
            "query": {"search": [{"title": "Kevin Bacon"}, {"title": "Bacon number"}]}
        })]);
        let batch = wiki.search("kevin bacon", Some(2)).await.unwrap();
        assert_eq!(batch.results, vec!["Kevin Bacon", "Bacon number"]);
        assert_eq!(batch.query.as_deref(), Some("kevin bacon"));
        assert!(batch.has_next());
        assert_eq!(transport.calls()[0]["srlimit"], "2");
    }

    #[tokio::test]
    async fn opensearch_reads_second_element() {
        let (wiki, transport) = wiki(vec![json!([
            "batm", ["Batman", "Batman Begins"], ["", ""], ["u1", "u2"]
        ])]);
        let titles = wiki.opensearch("batm", None).await.unwrap();
        assert_eq!(titles, vec!["Batman", "Batman Begins"]);
        assert_eq!(transport.calls()[0]["action"], "opensearch");
        assert_eq!(transport.calls()[0]["limit"], "10");
    }

    #[tokio::test]
    async fn page_lookup_and_missing() {
        let (wiki, _) = wiki(vec![
            json!({"query": {"pages": {"4335": {
                "pageid": 4335, "ns": 0, "title": "Batman",
                "fullurl": "https://en.wikipedia.org/wiki/Batman"
            }}}}),
            json!({"query": {"pages": {"-1": {"ns": 0, "title": "Nope", "missing": ""}}}}),
        ]);
        let page = wiki.page("Batman").await.unwrap();
        assert_eq!(page.raw().pageid, 4335);
        assert_eq!(page.url(), Some("https://en.wikipedia.org/wiki/Batman"));

        let err = wiki.page("Nope").await.unwrap_err();
        assert_eq!(err.kind(), "PageNotFound");
    }

    #[tokio::test]
    async fn redirected_title_is_accepted() {
        let (wiki, _) = wiki(vec![json!({"query": {
            "redirects": [{"from": "batman", "to": "Batman"}],
            "pages": {"4335": {"pageid": 4335, "ns": 0, "title": "Batman"}}
        }})]);
        let page = wiki.page("batman").await.unwrap();
        assert_eq!(page.title(), "Batman");
    }

    #[tokio::test]
    async fn find_uses_first_result() {
        let (wiki, transport) = wiki(vec![
            json!({"query": {"search": [{"title": "Luke Skywalker"}, {"title": "Leia"}]}}),
            json!({"query": {"pages": {"1": {"pageid": 1, "ns": 0, "title": "Luke Skywalker"}}}}),
        ]);
        let page = wiki.find("luke").await.unwrap();
        assert_eq!(page.title(), "Luke Skywalker");
        assert_eq!(transport.calls()[1]["titles"], "Luke Skywalker");
    }

    #[tokio::test]
    async fn find_without_results() {
        let (wiki, _) = wiki(vec![json!({"query": {"search": []}})]);
        let err = wiki.find("zzzz").await.unwrap_err();
        assert_eq!(err.kind(), "PageNotFound");
    }

    #[tokio::test]
    async fn all_categories_follow_legacy_continuation() {
        let (wiki, transport) = wiki(vec![
            json!({
                "query-continue": {"allcategories": {"accontinue": "B"}},
                "query": {"allcategories": [{"*": "A"}]}
            }),
            json!({"query": {"allcategories": [{"*": "B"}, {"*": "C"}]}}),
        ]);
        let all = wiki.all_categories().await.unwrap();
        assert_eq!(all, vec!["A", "B", "C"]);
        let calls = transport.calls();
        assert_eq!(calls[0]["aclimit"], "500");
        assert_eq!(calls[1]["accontinue"], "B");
    }

    #[tokio::test]
    async fn pages_in_category_aggregates() {
        let (wiki, transport) = wiki(vec![
            json!({
                "continue": {"cmcontinue": "page|X", "continue": "-||"},
                "query": {"categorymembers": [{"title": "Anakin"}]}
            }),
            json!({"query": {"categorymembers": [{"title": "Yoda"}]}}),
        ]);
        let all = wiki.pages_in_category("Category:Jedi").await.unwrap();
        assert_eq!(all, vec!["Anakin", "Yoda"]);
        assert_eq!(transport.calls()[0]["cmtitle"], "Category:Jedi");
    }

    #[tokio::test]
    async fn geo_and_most_viewed() {
        let (wiki, transport) = wiki(vec![
            json!({"query": {"geosearch": [{"title": "Dublin Castle"}]}}),
            json!({"query": {"mostviewed": [{"ns": 0, "title": "Main Page", "count": 100}]}}),
        ]);
        let titles = wiki.geo_search(53.3, -6.2, None).await.unwrap();
        assert_eq!(titles, vec!["Dublin Castle"]);
        assert_eq!(transport.calls()[0]["gscoord"], "53.3|-6.2");

        let viewed = wiki.most_viewed().await.unwrap();
        assert_eq!(
            viewed,
            vec![MostViewed {
                title: "Main Page".into(),
                count: 100
            }]
        );
    }

    #[tokio::test]
    async fn api_errors_propagate() {
        let (wiki, _) = wiki(vec![json!({
            "error": {"code": "badvalue", "info": "Unrecognized value"}
        })]);
        let err = wiki.random(None).await.unwrap_err();
        assert_eq!(err.kind(), "Api");
    }

    #[test]
    fn titles_at_shapes() {
        let res = json!({"query": {"x": [{"title": "A"}, {"ns": 0}], "y": 3}});
        assert_eq!(titles_at(&res, "/query/x").unwrap(), vec!["A"]);
        assert!(titles_at(&res, "/query/missing").unwrap().is_empty());
        assert!(titles_at(&res, "/query/y").is_err());
    }
}
