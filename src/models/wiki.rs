//! Result shapes returned by the MediaWiki query client.

use serde::Deserialize;
use serde_json::Value;

/// One entry of a page's `langlinks` list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LangLink {
    pub lang: String,
    /// Title of the translated page (absent in some response formats)
    #[serde(default)]
    pub title: Option<String>,
}

/// One entry of a page's `revisions` list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Revision {
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Missing when the username has been suppressed
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Daily pageviews in response order: ISO date to raw value (null on days without data).
pub type PageviewSeries = Vec<(String, Value)>;
