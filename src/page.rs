//! A single page and everything that can be fetched about it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::params,
    chain::QueryChain,
    errors::{Result, WikiError},
    infobox::{
        Coordinate, CoordinateFormat, Coordinates, FieldMap, FieldValue, parse_coordinates,
        parse_infobox,
    },
    pagination::{Relation, paginate},
    sections::{Section, parse_content},
    wiki::{Wiki, page_entry, strings_at, titles_at},
};

pub const DEFAULT_RELATION_LIMIT: u32 = 100;

/// Page metadata as returned by `prop=info|pageprops`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub pageid: u64,
    #[serde(default)]
    pub ns: i64,
    pub title: String,
    #[serde(default)]
    pub contentmodel: Option<String>,
    #[serde(default)]
    pub pagelanguage: Option<String>,
    #[serde(default)]
    pub touched: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lastrevid: Option<u64>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub fullurl: Option<String>,
    #[serde(default)]
    pub editurl: Option<String>,
    #[serde(default)]
    pub canonicalurl: Option<String>,
    #[serde(default)]
    pub pageprops: Option<BTreeMap<String, Value>>,
}

impl RawPage {
    pub fn is_disambiguation(&self) -> bool {
        self.pageprops
            .as_ref()
            .is_some_and(|props| props.contains_key("disambiguation"))
    }
}

/// An image used on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub descriptionurl: Option<String>,
}

/// The same page in another language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangLink {
    pub lang: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// `langlinks` entries of a page object, in either title layout.
pub(crate) fn langlinks_of(page: &Value) -> Vec<LangLink> {
    page.get("langlinks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|link| {
            Some(LangLink {
                lang: link.get("lang")?.as_str()?.to_string(),
                title: link.get("*").or_else(|| link.get("title"))?.as_str()?.to_string(),
                url: link.get("url").and_then(Value::as_str).map(String::from),
            })
        })
        .collect()
}

/// First usable `coordinates` entry of a page object.
pub(crate) fn geodata_of(page: &Value) -> Option<Coordinate> {
    let point = page.pointer("/coordinates/0")?;
    Some(Coordinate {
        lat: point.get("lat")?.as_f64()?,
        lon: point.get("lon")?.as_f64()?,
        format: CoordinateFormat::Geodata,
    })
}

/// Revision text of the first revision entry, in either slot layout.
fn revision_text(page: &Value) -> Option<&str> {
    let revision = page.pointer("/revisions/0")?;
    revision
        .get("*")
        .or_else(|| revision.pointer("/slots/main/*"))
        .or_else(|| revision.pointer("/slots/main/content"))
        .and_then(Value::as_str)
}

/// A page on a [`Wiki`].
#[derive(Debug, Clone)]
pub struct WikiPage {
    raw: RawPage,
    wiki: Wiki,
}

impl WikiPage {
    pub fn new(raw: RawPage, wiki: Wiki) -> Self {
        Self { raw, wiki }
    }

    pub fn raw(&self) -> &RawPage {
        &self.raw
    }

    pub fn title(&self) -> &str {
        &self.raw.title
    }

    /// Start a multi-property query for this page.
    pub fn chain(&self) -> QueryChain {
        QueryChain::new(self.wiki.clone(), Some(self.raw.pageid))
    }

    /// Canonical URL, when the page was loaded with `inprop=url`.
    pub fn url(&self) -> Option<&str> {
        self.raw
            .fullurl
            .as_deref()
            .or(self.raw.canonicalurl.as_deref())
    }

    /// Rendered HTML of the page.
    pub async fn html(&self) -> Result<String> {
        let res = self
            .wiki
            .query(&params([
                ("action", "parse".to_string()),
                ("prop", "text".to_string()),
                ("pageid", self.raw.pageid.to_string()),
            ]))
            .await?;
        res.pointer("/parse/text/*")
            .or_else(|| res.pointer("/parse/text"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| WikiError::malformed("parse answer has no text"))
    }

    async fn extract(&self, intro_only: bool) -> Result<String> {
        let mut query = params([
            ("prop", "extracts"),
            ("explaintext", ""),
            ("titles", self.raw.title.as_str()),
        ]);
        if intro_only {
            query.insert("exintro".to_string(), String::new());
        }
        let res = self.wiki.query(&query).await?;
        Ok(page_entry(&res, self.raw.pageid)?
            .get("extract")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Plain-text content of the whole page.
    pub async fn raw_content(&self) -> Result<String> {
        self.extract(false).await
    }

    /// Plain-text content split into sections.
    pub async fn content(&self) -> Result<Vec<Section>> {
        Ok(parse_content(&self.raw_content().await?))
    }

    /// Plain-text introduction.
    pub async fn summary(&self) -> Result<String> {
        self.extract(true).await
    }

    /// Wikitext of the current revision, or of one section of it.
    pub async fn wikitext(&self, section: Option<u32>) -> Result<String> {
        let mut query = params([
            ("prop", "revisions"),
            ("rvprop", "content"),
            ("rvslots", "main"),
            ("titles", self.raw.title.as_str()),
        ]);
        if let Some(section) = section {
            query.insert("rvsection".to_string(), section.to_string());
        }
        let res = self.wiki.query(&query).await?;
        let page = page_entry(&res, self.raw.pageid)?;
        if page.get("missing").is_some() {
            return Err(WikiError::page_not_found(&self.raw.title));
        }
        revision_text(page)
            .map(String::from)
            .ok_or_else(|| WikiError::malformed("revision has no content"))
    }

    /// Images on the page with their file URLs.
    pub async fn raw_images(&self) -> Result<Vec<ImageInfo>> {
        let res = self
            .wiki
            .query(&params([
                ("generator", "images"),
                ("gimlimit", "max"),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
                ("titles", self.raw.title.as_str()),
            ]))
            .await?;
        let Some(pages) = res.pointer("/query/pages").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        let mut images = Vec::new();
        for page in pages.values() {
            let title = page.get("title").and_then(Value::as_str).unwrap_or_default();
            let infos = page.get("imageinfo").and_then(Value::as_array);
            for info in infos.into_iter().flatten() {
                let Some(url) = info.get("url").and_then(Value::as_str) else {
                    continue;
                };
                images.push(ImageInfo {
                    title: title.to_string(),
                    url: url.to_string(),
                    descriptionurl: info
                        .get("descriptionurl")
                        .and_then(Value::as_str)
                        .map(String::from),
                });
            }
        }
        Ok(images)
    }

    /// URLs of the images on the page.
    pub async fn images(&self) -> Result<Vec<String>> {
        Ok(self.raw_images().await?.into_iter().map(|i| i.url).collect())
    }

    /// URL of the page's lead image, if it has one.
    pub async fn main_image(&self) -> Result<Option<String>> {
        let res = self
            .wiki
            .query(&params([
                ("prop", "pageimages"),
                ("piprop", "original"),
                ("titles", self.raw.title.as_str()),
            ]))
            .await?;
        Ok(page_entry(&res, self.raw.pageid)?
            .pointer("/original/source")
            .and_then(Value::as_str)
            .map(String::from))
    }

    /// External links.
    pub async fn references(&self) -> Result<Vec<String>> {
        let res = self
            .wiki
            .query(&params([
                ("prop", "extlinks"),
                ("ellimit", "max"),
                ("titles", self.raw.title.as_str()),
            ]))
            .await?;
        let pointer = format!("/query/pages/{}/extlinks", self.raw.pageid);
        let mut links = strings_at(&res, &pointer, "*")?;
        if links.is_empty() {
            links = strings_at(&res, &pointer, "url")?;
        }
        Ok(links)
    }

    /// Links to this page in other languages.
    pub async fn langlinks(&self) -> Result<Vec<LangLink>> {
        let res = self
            .wiki
            .query(&params([
                ("prop", "langlinks"),
                ("lllimit", "max"),
                ("llprop", "url"),
                ("titles", self.raw.title.as_str()),
            ]))
            .await?;
        Ok(langlinks_of(page_entry(&res, self.raw.pageid)?))
    }

    /// Article links on the page.
    pub async fn links(&self, aggregated: bool, limit: Option<u32>) -> Result<Relation<String>> {
        let pointer = format!("/query/pages/{}/links", self.raw.pageid);
        let first = paginate(
            self.wiki.transport(),
            params([
                ("prop", "links".to_string()),
                ("plnamespace", "0".to_string()),
                ("pllimit", limit.unwrap_or(DEFAULT_RELATION_LIMIT).to_string()),
                ("titles", self.raw.title.clone()),
            ]),
            move |res| titles_at(res, &pointer),
        );
        Relation::collect(first, aggregated).await
    }

    /// Categories the page belongs to.
    pub async fn categories(
        &self,
        aggregated: bool,
        limit: Option<u32>,
    ) -> Result<Relation<String>> {
        let pointer = format!("/query/pages/{}/categories", self.raw.pageid);
        let first = paginate(
            self.wiki.transport(),
            params([
                ("prop", "categories".to_string()),
                ("cllimit", limit.unwrap_or(DEFAULT_RELATION_LIMIT).to_string()),
                ("titles", self.raw.title.clone()),
            ]),
            move |res| titles_at(res, &pointer),
        );
        Relation::collect(first, aggregated).await
    }

    /// Pages linking here.
    pub async fn backlinks(&self, aggregated: bool, limit: Option<u32>) -> Result<Relation<String>> {
        let first = paginate(
            self.wiki.transport(),
            params([
                ("list", "backlinks".to_string()),
                ("bllimit", limit.unwrap_or(DEFAULT_RELATION_LIMIT).to_string()),
                ("bltitle", self.raw.title.clone()),
            ]),
            |res| titles_at(res, "/query/backlinks"),
        );
        Relation::collect(first, aggregated).await
    }

    /// Infobox fields of the page. A page without an infobox gives an empty
    /// map; a residual redirect is an error.
    pub async fn info(&self) -> Result<FieldMap> {
        let wikitext = self.wikitext(Some(0)).await?;
        match parse_infobox(&wikitext) {
            Err(WikiError::InfoboxNotFound) => {
                log::warn!("{} has no infobox", self.raw.title);
                Ok(FieldMap::new())
            }
            other => other,
        }
    }

    /// One infobox field, or a value derived from the others (such as `age`).
    pub async fn info_key(&self, key: &str) -> Result<Option<FieldValue>> {
        Ok(self.info().await?.lookup(key))
    }

    /// Coordinates from the API's geodata, falling back to the infobox.
    pub async fn coordinates(&self) -> Result<Coordinates> {
        let res = self
            .wiki
            .query(&params([
                ("prop", "coordinates"),
                ("titles", self.raw.title.as_str()),
            ]))
            .await?;
        let page = page_entry(&res, self.raw.pageid)?;
        if let Some(found) = geodata_of(page) {
            return Ok(Coordinates::Found(found));
        }
        if let Some(point) = page.pointer("/coordinates/0") {
            log::warn!("Unusable geodata for {}: {}", self.raw.title, point);
        }
        let coordinates = parse_coordinates(&self.info().await?);
        if !coordinates.is_found() {
            log::debug!("No coordinates for {}", self.raw.title);
        }
        Ok(coordinates)
    }
}
