//! Per-school update pipeline.
//!
//! Every school gets three independent updates (languages, pageviews, revisions), each
//! backed by one wiki query and written to its own field group. A failure in one never
//! blocks or rolls back the others; failures are logged and counted, never retried.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::db::SchoolStore;
use crate::errors::AppError;
use crate::models::{
    LangLink, LanguageUpdate, Revision, RevisionUpdate, School, DEFAULT_LANGUAGE,
};
use crate::pageviews::aggregate_weekly;
use crate::wiki::WikiApi;

/// The three field groups refreshed for each school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Languages,
    Pageviews,
    Revisions,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 3] = [
        UpdateKind::Languages,
        UpdateKind::Pageviews,
        UpdateKind::Revisions,
    ];
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateKind::Languages => "languages",
            UpdateKind::Pageviews => "pageviews",
            UpdateKind::Revisions => "revisions",
        };
        f.write_str(name)
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub schools: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of one field-group update.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub school_id: String,
    pub school_name: String,
    pub kind: UpdateKind,
    pub result: Result<(), AppError>,
}

/// Refreshes school documents from the wiki.
#[derive(Clone)]
pub struct SchoolUpdater {
    wiki: Arc<dyn WikiApi>,
    store: Arc<dyn SchoolStore>,
}

impl SchoolUpdater {
    pub fn new(wiki: Arc<dyn WikiApi>, store: Arc<dyn SchoolStore>) -> Self {
        Self { wiki, store }
    }

    /// Refresh every school. All updates start before any is awaited; the run returns
    /// once every update has settled. Only a failure to enumerate schools is returned.
    pub async fn sync_all(&self) -> Result<SyncReport, AppError> {
        let schools = self.store.list_schools().await?;
        let mut report = SyncReport {
            schools: schools.len(),
            ..SyncReport::default()
        };

        let mut tasks = JoinSet::new();
        for school in &schools {
            tracing::info!("processing: {} => {}", school.id, school.name);
            self.spawn_updates(school, &mut tasks);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(UpdateOutcome { result: Ok(()), .. }) => report.succeeded += 1,
                Ok(UpdateOutcome {
                    school_id,
                    school_name,
                    kind,
                    result: Err(e),
                }) => {
                    tracing::error!(
                        "Failed to update {} for {} ({}): {}",
                        kind,
                        school_name,
                        school_id,
                        e
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Update task aborted: {}", AppError::from(e));
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Sync finished: {} schools, {} updates succeeded, {} failed",
            report.schools,
            report.succeeded,
            report.failed
        );
        Ok(report)
    }

    /// Start the three updates for one school on `tasks` without waiting for them.
    pub fn spawn_updates(&self, school: &School, tasks: &mut JoinSet<UpdateOutcome>) {
        for kind in UpdateKind::ALL {
            let updater = self.clone();
            let school_id = school.id.clone();
            let school_name = school.name.clone();
            tasks.spawn(async move {
                let result = updater.run(kind, &school_id, &school_name).await;
                UpdateOutcome {
                    school_id,
                    school_name,
                    kind,
                    result,
                }
            });
        }
    }

    async fn run(&self, kind: UpdateKind, id: &str, name: &str) -> Result<(), AppError> {
        match kind {
            UpdateKind::Languages => self.update_languages(id, name).await,
            UpdateKind::Pageviews => self.update_pageviews(id, name).await,
            UpdateKind::Revisions => self.update_revisions(id, name).await,
        }
    }

    /// Overwrite `languages` and `langCnt` from the page's language links.
    pub async fn update_languages(&self, id: &str, name: &str) -> Result<(), AppError> {
        let links = self.wiki.langlinks(name).await?;
        let update = language_update(&links);
        tracing::debug!("{} is available in {} languages", name, update.lang_cnt);
        self.store.update_languages(id, &update).await
    }

    /// Merge the last complete weeks of pageviews, one week per write.
    pub async fn update_pageviews(&self, id: &str, name: &str) -> Result<(), AppError> {
        let series = self.wiki.pageviews(name).await?;
        for week in aggregate_weekly(&series) {
            self.store.merge_pageviews(id, &week.week, week.views).await?;
        }
        Ok(())
    }

    /// Overwrite revision and contributor counts from the latest revisions.
    pub async fn update_revisions(&self, id: &str, name: &str) -> Result<(), AppError> {
        let revisions = self.wiki.revisions(name).await?;
        let update = revision_update(&revisions);
        self.store.update_revisions(id, &update).await
    }
}

/// `"en"` followed by every linked language in response order.
pub fn language_update(links: &[LangLink]) -> LanguageUpdate {
    let mut languages = Vec::with_capacity(links.len() + 1);
    languages.push(DEFAULT_LANGUAGE.to_string());
    let mut lang_cnt = 1;
    for link in links {
        lang_cnt += 1;
        languages.push(link.lang.clone());
    }
    LanguageUpdate {
        languages,
        lang_cnt,
    }
}

/// Revision count plus the distinct named contributors.
pub fn revision_update(revisions: &[Revision]) -> RevisionUpdate {
    let mut seen = HashSet::new();
    let mut contributors = Vec::new();
    for user in revisions.iter().filter_map(|r| r.user.as_ref()) {
        if seen.insert(user.as_str()) {
            contributors.push(user.clone());
        }
    }
    RevisionUpdate {
        revision_cnt: revisions.len() as i64,
        contributor_cnt: contributors.len() as i64,
        contributors,
    }
}
