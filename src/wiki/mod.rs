//! MediaWiki action API client.
//!
//! Each query kind issues a single `action=query` GET for one title and reads the first
//! page of the response. There are no retries: a failed call fails the caller's update.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde_json::Value;

use crate::config::WikiConfig;
use crate::errors::AppError;
use crate::models::{LangLink, PageviewSeries, Revision};

/// Days of pageview history requested.
pub const PAGEVIEW_DAYS: u32 = 60;
/// Most revisions returned by one query.
pub const REVISION_LIMIT: u32 = 500;

/// Remote encyclopedia queries the sync pipeline depends on.
#[async_trait]
pub trait WikiApi: Send + Sync {
    async fn langlinks(&self, title: &str) -> Result<Vec<LangLink>, AppError>;
    async fn pageviews(&self, title: &str) -> Result<PageviewSeries, AppError>;
    async fn revisions(&self, title: &str) -> Result<Vec<Revision>, AppError>;
}

/// The three page properties the tracker queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Languages,
    Pageviews,
    Revisions,
}

impl QueryKind {
    /// Value of the `prop` parameter, also the key holding the result in the page object.
    pub fn prop(self) -> &'static str {
        match self {
            QueryKind::Languages => "langlinks",
            QueryKind::Pageviews => "pageviews",
            QueryKind::Revisions => "revisions",
        }
    }

    /// Full parameter set for querying `title` at time `now`.
    pub fn params(
        self,
        title: &str,
        now: DateTime<Utc>,
        revisions_cutoff: &str,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", self.prop().to_string()),
        ];
        match self {
            QueryKind::Languages => {}
            QueryKind::Pageviews => {
                params.push(("pvipdays", PAGEVIEW_DAYS.to_string()));
            }
            QueryKind::Revisions => {
                params.push(("rvprop", "timestamp|user|comment".to_string()));
                params.push(("rvslots", "main".to_string()));
                params.push(("rvlimit", REVISION_LIMIT.to_string()));
                params.push(("rvstart", now.format("%Y-%m-%dT00:00:00Z").to_string()));
                params.push(("rvend", revisions_cutoff.to_string()));
            }
        }
        params
    }
}

/// HTTP client for a MediaWiki `api.php` endpoint.
pub struct MediaWikiClient {
    client: Client,
    config: WikiConfig,
}

impl MediaWikiClient {
    pub fn new(config: WikiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build wiki HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Run one query and return the first page object of the response.
    pub async fn query(&self, kind: QueryKind, title: &str) -> Result<Value, AppError> {
        let params = kind.params(title, Utc::now(), &self.config.revisions_cutoff);
        let payload = self.request_json_get(&params).await?;
        first_page(payload, title)
    }

    async fn request_json_get(&self, params: &[(&str, String)]) -> Result<Value, AppError> {
        let base_url = Url::parse(&self.config.api_url).map_err(|e| {
            AppError::Remote(format!("Invalid WIKI_API_URL {}: {}", self.config.api_url, e))
        })?;

        let mut pairs: Vec<(&str, String)> = vec![
            ("origin", "*".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];
        pairs.extend(params.iter().map(|(key, value)| (*key, value.clone())));

        let response = self.client.get(base_url).query(&pairs).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Remote(format!(
                "Wiki API request failed with HTTP {}",
                status
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::Parse(format!("Failed to decode wiki API JSON response: {}", e))
        })?;

        if let Some(error) = payload.get("error") {
            let code = error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            let info = error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or("unknown info");
            return Err(AppError::Remote(format!("Wiki API error [{}]: {}", code, info)));
        }

        Ok(payload)
    }
}

#[async_trait]
impl WikiApi for MediaWikiClient {
    async fn langlinks(&self, title: &str) -> Result<Vec<LangLink>, AppError> {
        let page = self.query(QueryKind::Languages, title).await?;
        parse_langlinks(&page, title)
    }

    async fn pageviews(&self, title: &str) -> Result<PageviewSeries, AppError> {
        let page = self.query(QueryKind::Pageviews, title).await?;
        parse_pageviews(&page, title)
    }

    async fn revisions(&self, title: &str) -> Result<Vec<Revision>, AppError> {
        let page = self.query(QueryKind::Revisions, title).await?;
        parse_revisions(&page, title)
    }
}

/// Pick the first entry of `query.pages`, which is keyed by page id in the legacy
/// format and a plain array in format version 2.
pub fn first_page(mut payload: Value, title: &str) -> Result<Value, AppError> {
    let pages = payload
        .get_mut("query")
        .and_then(|query| query.get_mut("pages"))
        .map(Value::take)
        .ok_or_else(|| AppError::Parse(format!("No query.pages in response for {}", title)))?;

    let page = match pages {
        Value::Object(map) => map.into_iter().next().map(|(_, page)| page),
        Value::Array(list) => list.into_iter().next(),
        _ => None,
    };

    page.ok_or_else(|| AppError::Parse(format!("No page returned for {}", title)))
}

fn page_property<'a>(page: &'a Value, kind: QueryKind, title: &str) -> Result<&'a Value, AppError> {
    page.get(kind.prop())
        .ok_or_else(|| AppError::Parse(format!("No {} for {}", kind.prop(), title)))
}

pub fn parse_langlinks(page: &Value, title: &str) -> Result<Vec<LangLink>, AppError> {
    let links = page_property(page, QueryKind::Languages, title)?;
    Ok(serde_json::from_value(links.clone())?)
}

pub fn parse_pageviews(page: &Value, title: &str) -> Result<PageviewSeries, AppError> {
    let views = page_property(page, QueryKind::Pageviews, title)?
        .as_object()
        .ok_or_else(|| AppError::Parse(format!("pageviews for {} is not an object", title)))?;

    Ok(views
        .iter()
        .map(|(date, value)| (date.clone(), value.clone()))
        .collect())
}

pub fn parse_revisions(page: &Value, title: &str) -> Result<Vec<Revision>, AppError> {
    let revisions = page_property(page, QueryKind::Revisions, title)?;
    Ok(serde_json::from_value(revisions.clone())?)
}
