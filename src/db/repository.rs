//! SQLite implementation of the school store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::SchoolStore;
use crate::errors::AppError;
use crate::models::{LanguageUpdate, RevisionUpdate, School, DEFAULT_LANGUAGE};

/// Database repository for all school data.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a school document with an empty history.
    pub async fn create_school(&self, name: &str) -> Result<School, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let languages = vec![DEFAULT_LANGUAGE.to_string()];

        sqlx::query(
            "INSERT INTO schools (id, name, languages, lang_cnt, revision_cnt, contributors, contributor_cnt) VALUES (?, ?, ?, 1, 0, '[]', 0)"
        )
        .bind(&id)
        .bind(name)
        .bind(serde_json::to_string(&languages)?)
        .execute(&self.pool)
        .await?;

        Ok(School {
            id,
            name: name.to_string(),
            languages,
            lang_cnt: 1,
            pageviews: BTreeMap::new(),
            revision_cnt: 0,
            contributors: Vec::new(),
            contributor_cnt: 0,
            updated_at: None,
        })
    }

    /// Insert every name not already tracked. Returns how many were created.
    pub async fn seed_schools(&self, names: &[String]) -> Result<usize, AppError> {
        let mut created = 0;
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let exists = sqlx::query("SELECT 1 FROM schools WHERE name = ? LIMIT 1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if exists {
                tracing::debug!("School {:?} already tracked, skipping", name);
                continue;
            }
            self.create_school(name).await?;
            created += 1;
        }
        Ok(created)
    }

    async fn load_pageviews(&self) -> Result<HashMap<String, BTreeMap<String, i64>>, AppError> {
        let rows = sqlx::query("SELECT school_id, week, views FROM school_pageviews")
            .fetch_all(&self.pool)
            .await?;

        let mut by_school: HashMap<String, BTreeMap<String, i64>> = HashMap::new();
        for row in rows {
            by_school
                .entry(row.get("school_id"))
                .or_default()
                .insert(row.get("week"), row.get("views"));
        }
        Ok(by_school)
    }
}

#[async_trait]
impl SchoolStore for Repository {
    async fn list_schools(&self) -> Result<Vec<School>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, languages, lang_cnt, revision_cnt, contributors, contributor_cnt, updated_at FROM schools ORDER BY rowid"
        )
        .fetch_all(&self.pool)
        .await?;

        let mut pageviews = self.load_pageviews().await?;

        Ok(rows
            .iter()
            .map(|row| {
                let mut school = school_from_row(row);
                school.pageviews = pageviews.remove(&school.id).unwrap_or_default();
                school
            })
            .collect())
    }

    async fn update_languages(&self, id: &str, update: &LanguageUpdate) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();

        let result =
            sqlx::query("UPDATE schools SET languages = ?, lang_cnt = ?, updated_at = ? WHERE id = ?")
                .bind(serde_json::to_string(&update.languages)?)
                .bind(update.lang_cnt)
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(missing_school(id));
        }
        Ok(())
    }

    async fn merge_pageviews(&self, id: &str, week: &str, views: i64) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE schools SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(missing_school(id));
        }

        sqlx::query(
            "INSERT INTO school_pageviews (school_id, week, views) VALUES (?, ?, ?) ON CONFLICT(school_id, week) DO UPDATE SET views = excluded.views"
        )
        .bind(id)
        .bind(week)
        .bind(views)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_revisions(&self, id: &str, update: &RevisionUpdate) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE schools SET revision_cnt = ?, contributors = ?, contributor_cnt = ?, updated_at = ? WHERE id = ?"
        )
        .bind(update.revision_cnt)
        .bind(serde_json::to_string(&update.contributors)?)
        .bind(update.contributor_cnt)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(missing_school(id));
        }
        Ok(())
    }
}

// Helper functions for row conversion

fn missing_school(id: &str) -> AppError {
    AppError::Store(format!("School {} not found", id))
}

fn school_from_row(row: &sqlx::sqlite::SqliteRow) -> School {
    let languages: String = row.get("languages");
    let contributors: String = row.get("contributors");
    School {
        id: row.get("id"),
        name: row.get("name"),
        languages: parse_json_array(&languages),
        lang_cnt: row.get("lang_cnt"),
        pageviews: BTreeMap::new(),
        revision_cnt: row.get("revision_cnt"),
        contributors: parse_json_array(&contributors),
        contributor_cnt: row.get("contributor_cnt"),
        updated_at: row.get("updated_at"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
