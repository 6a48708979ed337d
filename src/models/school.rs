//! School document model and the field-group updates written by the sync pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Language code every school document lists first.
pub const DEFAULT_LANGUAGE: &str = "en";

/// One tracked school, as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    pub name: String,
    pub languages: Vec<String>,
    pub lang_cnt: i64,
    /// Week identifier ("2023-27") to view count
    pub pageviews: BTreeMap<String, i64>,
    pub revision_cnt: i64,
    pub contributors: Vec<String>,
    pub contributor_cnt: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Language field group: overwritten as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageUpdate {
    pub languages: Vec<String>,
    pub lang_cnt: i64,
}

/// Revision field group: overwritten as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionUpdate {
    pub revision_cnt: i64,
    pub contributors: Vec<String>,
    pub contributor_cnt: i64,
}

/// Projection served by the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchoolSummary {
    pub name: String,
    pub pageviews: BTreeMap<String, i64>,
    pub languages: Vec<String>,
}

impl From<School> for SchoolSummary {
    fn from(school: School) -> Self {
        Self {
            name: school.name,
            pageviews: school.pageviews,
            languages: school.languages,
        }
    }
}

/// Response body of the school list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolList {
    pub school_list: Vec<String>,
}
