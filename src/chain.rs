//! Several page properties fetched in one request.
//!
//! A [`QueryChain`] collects `prop` modules and their parameters, then issues
//! a single query and picks each requested property out of every returned
//! page. Start one from [`Wiki::chain`] (pages come from a generator such as
//! [`QueryChain::geosearch`]) or from [`WikiPage::chain`](crate::WikiPage::chain)
//! (one known page).

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::Params,
    errors::{Result, WikiError},
    infobox::Coordinate,
    page::{DEFAULT_RELATION_LIMIT, LangLink, geodata_of, langlinks_of},
    wiki::{DEFAULT_SEARCH_LIMIT, Wiki, page_entry, strings_at, titles_at},
};

/// A `prop` module a chain can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainProp {
    Extracts,
    Links,
    ExtLinks,
    LangLinks,
    Coordinates,
    Categories,
    PageImages,
}

impl ChainProp {
    pub fn name(&self) -> &'static str {
        match self {
            ChainProp::Extracts => "extracts",
            ChainProp::Links => "links",
            ChainProp::ExtLinks => "extlinks",
            ChainProp::LangLinks => "langlinks",
            ChainProp::Coordinates => "coordinates",
            ChainProp::Categories => "categories",
            ChainProp::PageImages => "pageimages",
        }
    }
}

/// Which page image details to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Thumbnail,
    Original,
    Name,
}

impl ImageKind {
    fn name(&self) -> &'static str {
        match self {
            ImageKind::Thumbnail => "thumbnail",
            ImageKind::Original => "original",
            ImageKind::Name => "name",
        }
    }
}

/// A rendition of the page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub source: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// The `pageimages` result of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub name: Option<String>,
    pub thumbnail: Option<ImageSource>,
    pub original: Option<ImageSource>,
}

/// One page of a chain's answer. A property is `Some` exactly when the chain
/// asked for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChainedPage {
    pub pageid: Option<u64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extlinks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub langlinks: Option<Vec<LangLink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PageImage>,
}

/// Builder for a multi-property query.
///
/// Props are requested in the order they were first added; repeating one
/// only merges its parameters.
#[derive(Clone)]
pub struct QueryChain {
    wiki: Wiki,
    pageid: Option<u64>,
    params: Params,
    props: Vec<ChainProp>,
}

impl QueryChain {
    pub(crate) fn new(wiki: Wiki, pageid: Option<u64>) -> Self {
        let mut params = Params::new();
        if let Some(id) = pageid {
            params.insert("pageids".into(), id.to_string());
        }
        Self {
            wiki,
            pageid,
            params,
            props: Vec::new(),
        }
    }

    fn with(mut self, prop: Option<ChainProp>, extra: &[(&str, String)]) -> Self {
        if let Some(prop) = prop.filter(|p| !self.props.contains(p)) {
            self.props.push(prop);
        }
        for (key, value) in extra {
            self.params.insert(key.to_string(), value.clone());
        }
        self
    }

    /// Pages within `radius` metres of a point.
    pub fn geosearch(self, lat: f64, lon: f64, radius: u32) -> Self {
        self.with(
            None,
            &[
                ("generator", "geosearch".into()),
                ("ggsradius", radius.to_string()),
                ("ggscoord", format!("{}|{}", lat, lon)),
            ],
        )
    }

    /// Pages matching a full-text search.
    pub fn search(self, query: &str, limit: Option<u32>) -> Self {
        self.with(
            None,
            &[
                ("generator", "search".into()),
                ("gsrsearch", query.into()),
                ("gsrlimit", limit.unwrap_or(DEFAULT_SEARCH_LIMIT).to_string()),
            ],
        )
    }

    /// Whole plain-text extract.
    pub fn content(self) -> Self {
        self.with(Some(ChainProp::Extracts), &[("explaintext", "1".into())])
    }

    /// Plain-text extract of the lead section.
    pub fn summary(self) -> Self {
        self.with(
            Some(ChainProp::Extracts),
            &[("explaintext", "1".into()), ("exintro", "1".into())],
        )
    }

    /// Page image details. An empty `kinds` asks for the thumbnail and name.
    pub fn image(self, kinds: &[ImageKind]) -> Self {
        let kinds = if kinds.is_empty() {
            &[ImageKind::Thumbnail, ImageKind::Name][..]
        } else {
            kinds
        };
        let piprop = kinds.iter().map(ImageKind::name).unique().join("|");
        self.with(Some(ChainProp::PageImages), &[("piprop", piprop)])
    }

    pub fn extlinks(self) -> Self {
        self.with(Some(ChainProp::ExtLinks), &[("ellimit", "max".into())])
    }

    /// Article-namespace links, up to `limit` per page.
    pub fn links(self, limit: Option<u32>) -> Self {
        self.with(
            Some(ChainProp::Links),
            &[
                ("plnamespace", "0".into()),
                ("pllimit", limit.unwrap_or(DEFAULT_RELATION_LIMIT).to_string()),
            ],
        )
    }

    pub fn categories(self, limit: Option<u32>) -> Self {
        self.with(
            Some(ChainProp::Categories),
            &[("cllimit", limit.unwrap_or(DEFAULT_RELATION_LIMIT).to_string())],
        )
    }

    pub fn coordinates(self) -> Self {
        self.with(Some(ChainProp::Coordinates), &[])
    }

    pub fn langlinks(self) -> Self {
        self.with(
            Some(ChainProp::LangLinks),
            &[("lllimit", "max".into()), ("llprop", "url".into())],
        )
    }

    /// The parameters the chain will send.
    pub fn params(&self) -> Params {
        let mut params = self.params.clone();
        if !self.props.is_empty() {
            let prop = self.props.iter().map(ChainProp::name).join("|");
            params.insert("prop".into(), prop);
        }
        params
    }

    /// Run the query. A chain started from a page answers with that page
    /// only; otherwise every returned page is listed in result order.
    pub async fn request(&self) -> Result<Vec<ChainedPage>> {
        let res = self.wiki.query(&self.params()).await?;
        if let Some(id) = self.pageid {
            return Ok(vec![self.process(page_entry(&res, id)?)?]);
        }
        let pages = match res.pointer("/query/pages") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Object(pages)) => pages.values().collect_vec(),
            Some(Value::Array(pages)) => pages.iter().collect_vec(),
            Some(other) => {
                return Err(WikiError::malformed(format!(
                    "expected pages in query.pages, got {}",
                    other
                )));
            }
        };
        log::debug!("Chain returned {} pages", pages.len());
        // generators number their results; object keys do not keep that order
        pages
            .into_iter()
            .sorted_by_key(|page| {
                (
                    page.get("index").and_then(Value::as_i64).unwrap_or(i64::MAX),
                    page.get("pageid").and_then(Value::as_u64).unwrap_or(u64::MAX),
                )
            })
            .map(|page| self.process(page))
            .collect()
    }

    /// Pick every requested property out of one page object.
    fn process(&self, page: &Value) -> Result<ChainedPage> {
        let mut out = ChainedPage {
            pageid: page.get("pageid").and_then(Value::as_u64),
            title: page
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            ..ChainedPage::default()
        };
        for prop in &self.props {
            match prop {
                ChainProp::Extracts => {
                    out.extract = Some(
                        page.get("extract")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    );
                }
                ChainProp::Links => out.links = Some(titles_at(page, "/links")?),
                ChainProp::ExtLinks => {
                    let mut links = strings_at(page, "/extlinks", "*")?;
                    if links.is_empty() {
                        links = strings_at(page, "/extlinks", "url")?;
                    }
                    out.extlinks = Some(links);
                }
                ChainProp::LangLinks => out.langlinks = Some(langlinks_of(page)),
                ChainProp::Coordinates => out.coordinates = geodata_of(page),
                ChainProp::Categories => out.categories = Some(titles_at(page, "/categories")?),
                ChainProp::PageImages => {
                    out.image = Some(PageImage {
                        name: page.get("pageimage").and_then(Value::as_str).map(String::from),
                        thumbnail: image_source(page, "thumbnail")?,
                        original: image_source(page, "original")?,
                    });
                }
            }
        }
        Ok(out)
    }
}

fn image_source(page: &Value, key: &str) -> Result<Option<ImageSource>> {
    match page.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(source) => Ok(Some(serde_json::from_value(source.clone())?)),
    }
}
