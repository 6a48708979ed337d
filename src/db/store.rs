//! The record store seam used by the sync pipeline and the read API.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{LanguageUpdate, RevisionUpdate, School};

/// Document store holding one record per school.
#[async_trait]
pub trait SchoolStore: Send + Sync {
    /// Read every school document in store order.
    async fn list_schools(&self) -> Result<Vec<School>, AppError>;

    /// Overwrite the language field group and stamp `updatedAt`.
    async fn update_languages(&self, id: &str, update: &LanguageUpdate) -> Result<(), AppError>;

    /// Merge-write a single week into `pageviews`, leaving other weeks untouched.
    async fn merge_pageviews(&self, id: &str, week: &str, views: i64) -> Result<(), AppError>;

    /// Overwrite the revision field group and stamp `updatedAt`.
    async fn update_revisions(&self, id: &str, update: &RevisionUpdate) -> Result<(), AppError>;
}
