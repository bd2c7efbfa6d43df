//! Work import from external sources
//!
//! One URL (or chapters mode) is a single-item import; several URLs become a
//! partial-failure batch where each source succeeds or fails on its own and
//! failures stay paired with the URL that caused them.

pub mod fetcher;

pub use fetcher::{FetchError, HttpStoryFetcher, ParsedStory, StoryFetcher};

use std::sync::Arc;

use archive_common::config::TomlConfig;
use archive_common::models::{Chapter, Work};
use archive_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::db::WorkStore;
use crate::notify::{ExternalAuthor, InviteNotifier};
use crate::workflow::outcome::{Notice, Outcome, Problem, Target, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Each URL becomes its own work
    #[default]
    Works,
    /// All URLs become chapters of one work
    Chapters,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub mode: ImportMode,
    /// An archivist importing on behalf of authors without accounts
    #[serde(default)]
    pub importing_for_others: bool,
    #[serde(default)]
    pub external_author_name: Option<String>,
    #[serde(default)]
    pub external_author_email: Option<String>,
}

/// One failed source, paired with its URL
#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    pub url: String,
    pub reason: String,
    /// Timeouts are worth retrying; parse failures are not
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<Uuid>,
    pub failed: Vec<ImportFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub report: ImportReport,
}

pub struct Importer {
    store: Arc<dyn WorkStore>,
    fetcher: Arc<dyn StoryFetcher>,
    notifier: Arc<dyn InviteNotifier>,
    config: TomlConfig,
}

impl Importer {
    pub fn new(
        store: Arc<dyn WorkStore>,
        fetcher: Arc<dyn StoryFetcher>,
        notifier: Arc<dyn InviteNotifier>,
        config: &TomlConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            config: config.clone(),
        }
    }

    pub async fn import(
        &self,
        ctx: &RequestContext,
        request: &ImportRequest,
    ) -> Result<ImportResult> {
        let user = ctx.require_user()?;

        let urls: Vec<String> = request
            .urls
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(Error::validation("urls", "Did you want to enter a URL?"));
        }

        let has_external_author = request.external_author_name.is_some()
            || request.external_author_email.is_some();
        if has_external_author && !request.importing_for_others {
            return Err(Error::validation(
                "external_author",
                "External author information is only used when importing for others.",
            ));
        }
        if request.importing_for_others && !user.is_archivist {
            return Err(Error::Permission(
                "Only an archivist may import works on behalf of other people.".to_string(),
            ));
        }

        let cap = match request.mode {
            ImportMode::Chapters => self.config.import_max_chapters,
            ImportMode::Works => self.config.import_cap(user.is_archivist),
        };
        if urls.len() > cap {
            return Err(Error::validation(
                "urls",
                format!("You cannot import more than {} URLs at once.", cap),
            ));
        }

        let pseud_id = user
            .default_pseud()
            .ok_or_else(|| {
                Error::Permission("Your account has no authoring identity.".to_string())
            })?
            .id;

        let requested_author = match (&request.external_author_name, &request.external_author_email)
        {
            (Some(name), Some(email)) => Some(ExternalAuthor {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        };

        let result = if request.mode == ImportMode::Chapters || urls.len() == 1 {
            self.import_single(&urls, request.mode, pseud_id).await?
        } else {
            self.import_batch(&urls, pseud_id).await?
        };
        let (report, mut outcome, mut authors) = result;

        if let Some(author) = requested_author {
            authors.push(author);
        }
        if request.importing_for_others && !authors.is_empty() && !report.imported.is_empty() {
            self.notifier.notify(&report.imported, &authors).await?;
            outcome = outcome.with_notice(Notice::ExternalAuthorsNotified);
        }

        Ok(ImportResult { outcome, report })
    }

    /// One work from one URL, or one work whose chapters come from each URL
    async fn import_single(
        &self,
        urls: &[String],
        mode: ImportMode,
        pseud_id: Uuid,
    ) -> Result<(ImportReport, Outcome, Vec<ExternalAuthor>)> {
        let mut stories = Vec::new();
        for url in urls {
            match self.fetcher.fetch(url).await {
                Ok(story) => stories.push(story),
                // A single-item timeout is the caller's to retry
                Err(FetchError::Timeout(url)) => {
                    return Err(Error::Timeout(format!("timed out fetching {}", url)))
                }
                Err(e) => {
                    let outcome = Outcome::rendered_with_problems(
                        View::NewImportForm,
                        vec![Problem::new("urls", e.to_string())],
                    );
                    return Ok((ImportReport::default(), outcome, Vec::new()));
                }
            }
        }

        let chapters: Vec<_> = match mode {
            ImportMode::Chapters => stories
                .iter()
                .flat_map(|s| s.chapters.iter().cloned())
                .collect(),
            ImportMode::Works => stories
                .first()
                .map(|s| s.chapters.clone())
                .unwrap_or_default(),
        };
        let title = stories
            .first()
            .map(|s| s.title.clone())
            .unwrap_or_default();
        let summary = stories.first().and_then(|s| s.summary.clone());
        let authors: Vec<ExternalAuthor> = stories
            .iter()
            .filter_map(|s| s.external_author.clone())
            .collect();

        let work_id = self
            .persist_imported(title, summary, chapters, pseud_id)
            .await?;

        let outcome = Outcome::redirected(Target::WorkPreview { id: work_id })
            .with_notice(Notice::ImportCompleted);
        Ok((
            ImportReport {
                imported: vec![work_id],
                failed: Vec::new(),
            },
            outcome,
            authors,
        ))
    }

    /// One work per URL; failures are collected, not fatal
    async fn import_batch(
        &self,
        urls: &[String],
        pseud_id: Uuid,
    ) -> Result<(ImportReport, Outcome, Vec<ExternalAuthor>)> {
        let mut report = ImportReport::default();
        let mut authors = Vec::new();

        for url in urls {
            match self.fetcher.fetch(url).await {
                Ok(story) => {
                    if let Some(author) = story.external_author.clone() {
                        authors.push(author);
                    }
                    match self
                        .persist_imported(story.title, story.summary, story.chapters, pseud_id)
                        .await
                    {
                        Ok(work_id) => report.imported.push(work_id),
                        Err(e) => report.failed.push(ImportFailure {
                            url: url.clone(),
                            reason: e.to_string(),
                            retryable: e.is_retriable(),
                        }),
                    }
                }
                Err(e) => report.failed.push(ImportFailure {
                    url: url.clone(),
                    reason: e.to_string(),
                    retryable: e.is_retryable(),
                }),
            }
        }

        info!(
            imported = report.imported.len(),
            failed = report.failed.len(),
            "batch import finished"
        );

        // The batch succeeded if anything came through
        let outcome = if report.imported.is_empty() {
            let problems = report
                .failed
                .iter()
                .map(|f| Problem::new("urls", format!("{}: {}", f.url, f.reason)))
                .collect();
            Outcome::rendered_with_problems(View::NewImportForm, problems)
        } else {
            Outcome::redirected(Target::ShowMultiple {
                work_ids: report.imported.clone(),
            })
            .with_notice(Notice::ImportCompleted)
        };

        Ok((report, outcome, authors))
    }

    async fn persist_imported(
        &self,
        title: String,
        summary: Option<String>,
        chapters: Vec<crate::workflow::ChapterContent>,
        pseud_id: Uuid,
    ) -> Result<Uuid> {
        let mut work = Work::new(title);
        work.summary = summary;
        work.pseud_ids.push(pseud_id);
        work.word_count = chapters
            .iter()
            .map(|c| c.content.split_whitespace().count() as i64)
            .sum();
        self.store.create_work(&work).await?;

        for (index, content) in chapters.into_iter().enumerate() {
            let mut chapter = Chapter::new(work.id, index as i64 + 1, content.content);
            chapter.title = content.title;
            self.store.save_chapter(&chapter).await?;
        }

        Ok(work.id)
    }
}
