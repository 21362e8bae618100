//! Error types for the whole crate.
//!
//! Every fallible operation returns [`Result<T>`], an alias over [`WikiError`].
//! Conditions that callers are expected to recover from (a page without an
//! infobox, an unparseable coordinate, an unknown derived field) are either
//! dedicated variants that the façade absorbs or are not errors at all.
//!
//! The error type implements `std::error::Error`, `Debug`, and `Display`, and
//! converts from the transport/decoding errors produced by the crates we sit on.

use std::error::Error;
use std::fmt;

/// The canonical result type used across the crate.
pub type Result<T> = std::result::Result<T, WikiError>;

/// Errors raised while talking to a MediaWiki API or interpreting its answers.
///
/// - `InfoboxNotFound` - the wikitext carries no `{{Infobox ...}}` template.
/// - `RedirectDetected` - revision content is a redirect rather than a page.
/// - `PageNotFound` - the API does not know the requested page.
/// - `MalformedResponse` - the JSON lacks a shape we rely on.
/// - `ContinuationProtocol` - a `continue` block without a usable token.
/// - `Api` - the API itself answered with an `error` object.
/// - `Transport` - the HTTP layer failed.
/// - `Json` / `Url` - decoding or URL construction failed.
/// - `Config` - client options could not be built.
#[derive(Debug)]
pub enum WikiError {
    InfoboxNotFound,
    RedirectDetected {
        content: String,
    },
    PageNotFound {
        title: String,
    },
    MalformedResponse {
        msg: String,
    },
    ContinuationProtocol {
        msg: String,
    },
    Api {
        code: String,
        info: String,
    },
    Transport {
        msg: String,
        source: Option<Box<dyn Error + Send + Sync + 'static>>,
    },
    Json {
        source: serde_json::Error,
    },
    Url {
        source: url::ParseError,
    },
    Config {
        msg: String,
    },
}

impl WikiError {
    /// Construct a redirect error carrying the offending revision content.
    pub fn redirect<S: Into<String>>(content: S) -> Self {
        WikiError::RedirectDetected {
            content: content.into(),
        }
    }

    /// Construct a page-not-found error.
    pub fn page_not_found<S: Into<String>>(title: S) -> Self {
        WikiError::PageNotFound {
            title: title.into(),
        }
    }

    /// Construct a malformed-response error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        WikiError::MalformedResponse { msg: msg.into() }
    }

    /// Construct a continuation protocol violation.
    pub fn continuation<S: Into<String>>(msg: S) -> Self {
        WikiError::ContinuationProtocol { msg: msg.into() }
    }

    /// Construct an error reported by the API itself.
    pub fn api<C: Into<String>, I: Into<String>>(code: C, info: I) -> Self {
        WikiError::Api {
            code: code.into(),
            info: info.into(),
        }
    }

    /// Wrap an HTTP layer error.
    pub fn transport<E: Error + Send + Sync + 'static>(msg: impl Into<String>, e: E) -> Self {
        WikiError::Transport {
            msg: msg.into(),
            source: Some(Box::new(e)),
        }
    }

    /// Returns a short, user-friendly description of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WikiError::InfoboxNotFound => "InfoboxNotFound",
            WikiError::RedirectDetected { .. } => "RedirectDetected",
            WikiError::PageNotFound { .. } => "PageNotFound",
            WikiError::MalformedResponse { .. } => "MalformedResponse",
            WikiError::ContinuationProtocol { .. } => "ContinuationProtocol",
            WikiError::Api { .. } => "Api",
            WikiError::Transport { .. } => "Transport",
            WikiError::Json { .. } => "Json",
            WikiError::Url { .. } => "Url",
            WikiError::Config { .. } => "Config",
        }
    }
}

impl fmt::Display for WikiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WikiError::InfoboxNotFound => write!(f, "Infobox not found"),
            WikiError::RedirectDetected { content } => {
                write!(f, "Unexpected redirect: {}", content.trim())
            }
            WikiError::PageNotFound { title } => write!(f, "No article found: {}", title),
            WikiError::MalformedResponse { msg } => write!(f, "Malformed response: {}", msg),
            WikiError::ContinuationProtocol { msg } => {
                write!(f, "Continuation protocol violation: {}", msg)
            }
            WikiError::Api { code, info } => write!(f, "API error ({}): {}", code, info),
            WikiError::Transport { msg, source } => {
                if let Some(s) = source {
                    write!(f, "Transport error: {} (cause: {})", msg, s)
                } else {
                    write!(f, "Transport error: {}", msg)
                }
            }
            WikiError::Json { source } => write!(f, "JSON error: {}", source),
            WikiError::Url { source } => write!(f, "URL error: {}", source),
            WikiError::Config { msg } => write!(f, "Invalid options: {}", msg),
        }
    }
}

impl Error for WikiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WikiError::Transport { source, .. } => {
                source.as_ref().map(|b| b.as_ref() as &(dyn Error + 'static))
            }
            WikiError::Json { source } => Some(source),
            WikiError::Url { source } => Some(source),
            _ => None,
        }
    }
}

/* Conversions so `?` works on the crates underneath. */

impl From<reqwest::Error> for WikiError {
    fn from(e: reqwest::Error) -> Self {
        WikiError::transport("request failed", e)
    }
}

impl From<reqwest_middleware::Error> for WikiError {
    fn from(e: reqwest_middleware::Error) -> Self {
        WikiError::transport("middleware failed", e)
    }
}

impl From<serde_json::Error> for WikiError {
    fn from(e: serde_json::Error) -> Self {
        WikiError::Json { source: e }
    }
}

impl From<url::ParseError> for WikiError {
    fn from(e: url::ParseError) -> Self {
        WikiError::Url { source: e }
    }
}

impl From<derive_builder::UninitializedFieldError> for WikiError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        WikiError::Config { msg: e.to_string() }
    }
}
