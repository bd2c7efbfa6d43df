//! Multi-work bulk operations
//!
//! All three operations run over a deduplicated, ownership-verified set of
//! works and are partial-failure batches: one work failing is recorded
//! against its title and the rest still proceed.

use archive_common::models::Work;
use archive_common::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::outcome::{Notice, Outcome, Target};

/// Sentinel-bearing setting for anonymous commenting
///
/// `Unchanged` is the sparse no-op; `AllowAnon` is the explicit force-clear
/// of the disable flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonCommenting {
    #[default]
    Unchanged,
    DisableAnon,
    AllowAnon,
}

/// Sentinel-bearing setting for comment moderation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratedCommenting {
    #[default]
    Unchanged,
    Moderated,
    NotModerated,
}

/// A sparse bulk-edit patch
///
/// Blank or unset fields leave the target works untouched; only the two
/// commenting toggles have sentinels that force-clear their flag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub restricted: Option<bool>,
    #[serde(default)]
    pub anon_commenting: AnonCommenting,
    #[serde(default)]
    pub moderated_commenting: ModeratedCommenting,
}

impl BulkPatch {
    /// Apply the patch to one work; returns whether anything changed
    pub fn apply(&self, work: &mut Work) -> bool {
        let mut changed = false;

        if let Some(title) = &self.title {
            if !title.trim().is_empty() && *title != work.title {
                work.title = title.clone();
                changed = true;
            }
        }
        if let Some(summary) = &self.summary {
            if !summary.trim().is_empty() && Some(summary) != work.summary.as_ref() {
                work.summary = Some(summary.clone());
                changed = true;
            }
        }
        if let Some(restricted) = self.restricted {
            if restricted != work.restricted {
                work.restricted = restricted;
                changed = true;
            }
        }
        match self.anon_commenting {
            AnonCommenting::Unchanged => {}
            AnonCommenting::DisableAnon => {
                changed |= !work.anon_commenting_disabled;
                work.anon_commenting_disabled = true;
            }
            AnonCommenting::AllowAnon => {
                changed |= work.anon_commenting_disabled;
                work.anon_commenting_disabled = false;
            }
        }
        match self.moderated_commenting {
            ModeratedCommenting::Unchanged => {}
            ModeratedCommenting::Moderated => {
                changed |= !work.moderated_commenting_enabled;
                work.moderated_commenting_enabled = true;
            }
            ModeratedCommenting::NotModerated => {
                changed |= work.moderated_commenting_enabled;
                work.moderated_commenting_enabled = false;
            }
        }

        changed
    }
}

/// One failed work in a batch, keyed by title
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub title: String,
    pub reason: String,
}

/// Aggregate result of a partial-failure batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    fn record(&mut self, work: &Work, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded.push(work.id),
            Err(e) => {
                warn!(work_id = %work.id, error = %e, "bulk operation failed for work");
                self.failed.push(BatchFailure {
                    title: work.title.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// A bulk operation's outcome together with its per-work failures
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub report: BatchReport,
}

impl WorkflowEngine {
    /// Apply a sparse patch to every owned work in `ids`
    pub async fn edit_multiple(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
        patch: &BulkPatch,
    ) -> Result<BulkResult> {
        let user = ctx.require_user()?;
        let works = self
            .store()
            .works_owned_by(user.id, &dedup(ids))
            .await?;

        let mut report = BatchReport::default();
        for work in &works {
            let mut updated = work.clone();
            if !patch.apply(&mut updated) {
                report.succeeded.push(work.id);
                continue;
            }
            updated.minor_version = work.minor_version + 1;
            updated.revised_at = Utc::now();
            let result = self.store().update_work(&updated, work.minor_version).await;
            report.record(work, result);
        }

        let outcome = Outcome::redirected(Target::ShowMultiple {
            work_ids: report.succeeded.clone(),
        })
        .with_notice(Notice::BulkEditsApplied {
            work_ids: report.succeeded.clone(),
        });
        Ok(BulkResult { outcome, report })
    }

    /// Delete every owned work in `ids`
    pub async fn delete_multiple(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
    ) -> Result<BulkResult> {
        let user = ctx.require_user()?;
        let works = self
            .store()
            .works_owned_by(user.id, &dedup(ids))
            .await?;

        let mut report = BatchReport::default();
        let mut titles = Vec::new();
        for work in &works {
            let result = self.store().delete_work(work.id).await;
            if result.is_ok() {
                titles.push(work.title.clone());
            }
            report.record(work, result);
        }

        let outcome = Outcome::redirected(Target::UserWorks)
            .with_notice(Notice::WorksDeleted { titles });
        Ok(BulkResult { outcome, report })
    }

    /// Hand every owned work in `ids` to the orphaning flow
    pub async fn orphan_multiple(
        &self,
        ctx: &RequestContext,
        ids: &[Uuid],
    ) -> Result<BulkResult> {
        let user = ctx.require_user()?;
        let works = self
            .store()
            .works_owned_by(user.id, &dedup(ids))
            .await?;

        let work_ids: Vec<Uuid> = works.iter().map(|w| w.id).collect();
        let outcome = Outcome::redirected(Target::NewOrphan {
            work_ids: work_ids.clone(),
        });
        Ok(BulkResult {
            outcome,
            report: BatchReport {
                succeeded: work_ids,
                failed: Vec::new(),
            },
        })
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}
