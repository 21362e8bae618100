//! A MediaWiki API client.
//!
//! [`Wiki`] searches and opens pages; [`WikiPage`] fetches content, images,
//! relations and structured infobox data, or several properties at once
//! through a [`QueryChain`]. The infobox parser and the
//! continuation-based pagination are usable on their own through
//! [`infobox`] and [`pagination`].
//!
//! ```no_run
//! # async fn demo() -> wikipage::Result<()> {
//! use wikipage::{Wiki, WikiOptions};
//!
//! let wiki = Wiki::new(WikiOptions::default())?;
//! let page = wiki.page("Dublin").await?;
//! let info = page.info().await?;
//! println!("{:?}", info.get("population_total"));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chain;
pub mod config;
pub mod errors;
pub mod infobox;
pub mod page;
pub mod pagination;
pub mod reqwest_client;
pub mod sections;
pub mod wiki;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{HttpTransport, Params, Transport};
pub use chain::{ChainedPage, QueryChain};
pub use config::{WikiOptions, WikiOptionsBuilder};
pub use errors::{Result, WikiError};
pub use infobox::{Coordinates, FieldMap, FieldValue};
pub use page::{RawPage, WikiPage};
pub use pagination::{Relation, ResultBatch, aggregate_all, paginate};
pub use sections::Section;
pub use wiki::Wiki;
