//! Posting state machine
//!
//! A work moves between unposted (draft), previewed and posted states. Every
//! transition runs through the validity gate first: byline resolution,
//! required tag categories, and persistable chapter content. The engine
//! returns `Outcome` values and never renders.

use std::sync::Arc;

use archive_common::models::{Chapter, TagSet, Work};
use archive_common::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::context::{ActingUser, RequestContext};
use crate::db::WorkStore;
use crate::workflow::authorship::{resolve_byline, PseudResolution};
use crate::workflow::moderation::moderation_notice;
use crate::workflow::outcome::{EditAction, Notice, Outcome, Problem, Target, View, WorkState};

/// Chapter content carried by a submission
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterContent {
    pub title: Option<String>,
    pub content: String,
}

/// Everything a create or content-update request carries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkSubmission {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub anon_commenting_disabled: bool,
    #[serde(default)]
    pub moderated_commenting_enabled: bool,
    #[serde(default)]
    pub tags: TagSet,
    /// Author byline; empty means the acting account's default pseud
    #[serde(default)]
    pub pseud_names: Vec<String>,
    #[serde(default)]
    pub collection_names: Vec<String>,
    #[serde(default)]
    pub chapter: ChapterContent,
}

/// A submission that has passed the validity gate
struct PreparedSubmission {
    pseud_ids: Vec<Uuid>,
    collection_ids: Vec<Uuid>,
    advisories: Vec<Notice>,
}

enum Gate {
    Pass(PreparedSubmission),
    Blocked(Outcome),
}

pub struct WorkflowEngine {
    store: Arc<dyn WorkStore>,
    draft_expiry_days: i64,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkStore>, draft_expiry_days: i64) -> Self {
        Self {
            store,
            draft_expiry_days,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkStore> {
        &self.store
    }

    /// Create a new work
    ///
    /// `Preview` and the default `Save` both persist a draft; `Post`
    /// publishes immediately. `Cancel` before anything exists just goes
    /// back, and `Edit` re-renders the form.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        submission: &WorkSubmission,
        action: EditAction,
    ) -> Result<Outcome> {
        let user = ctx.require_user()?;

        match action {
            EditAction::Cancel => {
                return Ok(Outcome::redirected(Target::UserWorks)
                    .with_notice(Notice::PostingCanceled));
            }
            EditAction::Edit => return Ok(Outcome::rendered(View::NewForm)),
            _ => {}
        }

        let prepared = match self.run_gate(user, submission, View::NewForm).await? {
            Gate::Pass(prepared) => prepared,
            Gate::Blocked(outcome) => return Ok(outcome),
        };

        let mut work = Work::new(submission.title.clone());
        apply_submission(&mut work, submission, &prepared);
        work.posted = action == EditAction::Post;

        self.store.create_work(&work).await?;
        let mut chapter = Chapter::new(work.id, 1, submission.chapter.content.clone());
        chapter.title = submission.chapter.title.clone();
        chapter.posted = work.posted;
        self.store.save_chapter(&chapter).await?;

        info!(work_id = %work.id, posted = work.posted, "work created");

        let moderation = moderation_notice(self.store.as_ref(), work.id, user.id).await?;

        let outcome = match action {
            EditAction::Preview => Outcome::rendered(View::Preview {
                work_id: work.id,
                draft_delete_at: Some(work.draft_delete_at(self.draft_expiry_days)),
            })
            .with_notice(Notice::DraftCreated {
                delete_at: work.draft_delete_at(self.draft_expiry_days),
            }),
            EditAction::Post => Outcome::Saved {
                work_id: work.id,
                state: WorkState::Posted,
                notices: vec![Notice::Posted],
            },
            _ => Outcome::Saved {
                work_id: work.id,
                state: WorkState::Unposted,
                notices: vec![Notice::DraftCreated {
                    delete_at: work.draft_delete_at(self.draft_expiry_days),
                }],
            },
        };

        Ok(attach(outcome, prepared.advisories, moderation))
    }

    /// Update an existing work's content and metadata
    pub async fn update(
        &self,
        ctx: &RequestContext,
        work_id: Uuid,
        submission: &WorkSubmission,
        action: EditAction,
    ) -> Result<Outcome> {
        let user = ctx.require_user()?;
        let work = self.owned_work(user, work_id).await?;

        match action {
            EditAction::Cancel => return Ok(self.cancel_outcome(&work)),
            EditAction::Edit => {
                return Ok(Outcome::rendered(View::EditForm { work_id: work.id }))
            }
            _ => {}
        }

        let form = View::EditForm { work_id: work.id };
        let prepared = match self.run_gate(user, submission, form).await? {
            Gate::Pass(prepared) => prepared,
            Gate::Blocked(outcome) => return Ok(outcome),
        };

        if action == EditAction::Preview {
            // Validated but not persisted; the caller renders the submitted
            // content
            let draft_delete_at = (!work.posted)
                .then(|| work.draft_delete_at(self.draft_expiry_days));
            let mut outcome = Outcome::rendered(View::Preview {
                work_id: work.id,
                draft_delete_at,
            });
            // The unsaved-changes warning only applies to never-posted drafts
            if !work.posted {
                outcome = outcome.with_notice(Notice::ChangesNotSaved);
            }
            return Ok(outcome.with_notices(prepared.advisories));
        }

        let was_posted = work.posted;
        let mut updated = work.clone();
        apply_submission(&mut updated, submission, &prepared);
        if action == EditAction::Post {
            updated.posted = true;
        }
        updated.minor_version = work.minor_version + 1;
        updated.revised_at = Utc::now();

        self.store.update_work(&updated, work.minor_version).await?;
        let mut chapter = Chapter::new(updated.id, 1, submission.chapter.content.clone());
        chapter.title = submission.chapter.title.clone();
        chapter.posted = updated.posted;
        self.store.save_chapter(&chapter).await?;

        info!(work_id = %updated.id, posted = updated.posted, "work updated");

        let moderation = moderation_notice(self.store.as_ref(), updated.id, user.id).await?;

        let outcome = if updated.posted {
            Outcome::Saved {
                work_id: updated.id,
                state: WorkState::Posted,
                notices: vec![if was_posted {
                    Notice::Updated {
                        posted_changed: false,
                    }
                } else {
                    Notice::Posted
                }],
            }
        } else {
            Outcome::Saved {
                work_id: updated.id,
                state: WorkState::Unposted,
                notices: vec![Notice::DraftCreated {
                    delete_at: updated.draft_delete_at(self.draft_expiry_days),
                }],
            }
        };

        Ok(attach(outcome, prepared.advisories, moderation))
    }

    /// Tags-only update; the same four-way branching as a content update
    pub async fn update_tags(
        &self,
        ctx: &RequestContext,
        work_id: Uuid,
        tags: &TagSet,
        action: EditAction,
    ) -> Result<Outcome> {
        let user = ctx.require_user()?;
        let work = self.owned_work(user, work_id).await?;

        match action {
            EditAction::Cancel => return Ok(self.cancel_outcome(&work)),
            EditAction::Edit => {
                return Ok(Outcome::rendered(View::EditTagsForm { work_id: work.id }))
            }
            _ => {}
        }

        let problems: Vec<Problem> = tags
            .missing_required()
            .into_iter()
            .map(Problem::missing_tag)
            .collect();
        if !problems.is_empty() {
            return Ok(Outcome::rendered_with_problems(
                View::EditTagsForm { work_id: work.id },
                problems,
            ));
        }

        if action == EditAction::Preview {
            let mut outcome = Outcome::rendered(View::PreviewTags { work_id: work.id });
            if !work.posted {
                outcome = outcome.with_notice(Notice::ChangesNotSaved);
            }
            return Ok(outcome);
        }

        let mut updated = work.clone();
        updated.tags = tags.clone();
        updated.minor_version = work.minor_version + 1;
        updated.revised_at = Utc::now();
        self.store.update_work(&updated, work.minor_version).await?;

        Ok(Outcome::Saved {
            work_id: updated.id,
            state: if updated.posted {
                WorkState::Posted
            } else {
                WorkState::Unposted
            },
            notices: vec![Notice::TagsUpdated],
        })
    }

    /// Publish an existing draft without other changes
    pub async fn post_draft(&self, ctx: &RequestContext, work_id: Uuid) -> Result<Outcome> {
        let user = ctx.require_user()?;
        let work = self.owned_work(user, work_id).await?;

        if work.posted {
            return Ok(Outcome::redirected(Target::Work { id: work.id })
                .with_notice(Notice::AlreadyPosted));
        }

        let problems: Vec<Problem> = work
            .tags
            .missing_required()
            .into_iter()
            .map(Problem::missing_tag)
            .collect();
        if !problems.is_empty() {
            return Ok(Outcome::rendered_with_problems(
                View::EditForm { work_id: work.id },
                problems,
            ));
        }

        let mut updated = work.clone();
        updated.posted = true;
        updated.minor_version = work.minor_version + 1;
        updated.revised_at = Utc::now();
        self.store.update_work(&updated, work.minor_version).await?;

        info!(work_id = %updated.id, "draft posted");

        let moderation = moderation_notice(self.store.as_ref(), updated.id, user.id).await?;
        Ok(attach(
            Outcome::Saved {
                work_id: updated.id,
                state: WorkState::Posted,
                notices: vec![Notice::Posted],
            },
            Vec::new(),
            moderation,
        ))
    }

    /// Delete a work; a storage failure is reported, not propagated
    pub async fn delete(&self, ctx: &RequestContext, work_id: Uuid) -> Result<Outcome> {
        let user = ctx.require_user()?;
        let work = self.owned_work(user, work_id).await?;

        // Drafts go back to the drafts listing, posted works to the works
        // listing
        let target = if work.posted {
            Target::UserWorks
        } else {
            Target::UserDrafts
        };
        match self.store.delete_work(work.id).await {
            Ok(()) => Ok(Outcome::redirected(target).with_notice(Notice::WorkDeleted {
                title: work.title.clone(),
            })),
            Err(Error::Database(e)) => {
                tracing::error!(work_id = %work.id, error = %e, "work deletion failed");
                Ok(Outcome::redirected(Target::Work { id: work.id })
                    .with_notice(Notice::DeleteFailed))
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the acting user's identities from the work's byline
    pub async fn remove_self_as_author(
        &self,
        ctx: &RequestContext,
        work_id: Uuid,
    ) -> Result<Outcome> {
        let user = ctx.require_user()?;
        let work = self.owned_work(user, work_id).await?;

        let remaining: Vec<Uuid> = work
            .pseud_ids
            .iter()
            .copied()
            .filter(|id| !user.owns_pseud(*id))
            .collect();
        // Sole author: the work cannot be left authorless, so hand it to the
        // orphaning flow instead
        if remaining.is_empty() {
            return Ok(Outcome::redirected(Target::NewOrphan {
                work_ids: vec![work.id],
            }));
        }

        let mut updated = work.clone();
        updated.pseud_ids = remaining;
        updated.minor_version = work.minor_version + 1;
        self.store.update_work(&updated, work.minor_version).await?;

        Ok(Outcome::redirected(Target::UserWorks).with_notice(Notice::AuthorRemoved))
    }

    fn cancel_outcome(&self, work: &Work) -> Outcome {
        if work.posted {
            Outcome::redirected(Target::Work { id: work.id }).with_notice(Notice::NotSaved)
        } else {
            Outcome::redirected(Target::UserDrafts).with_notice(Notice::DraftRetained {
                delete_at: work.draft_delete_at(self.draft_expiry_days),
            })
        }
    }

    /// Load the work and verify the acting user is one of its authors
    /// (admins pass)
    async fn owned_work(&self, user: &ActingUser, work_id: Uuid) -> Result<Work> {
        let work = self
            .store
            .find_work(work_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("work {}", work_id)))?;

        let owns = work.pseud_ids.iter().any(|id| user.owns_pseud(*id));
        if !owns && !user.is_admin {
            return Err(Error::Permission(
                "You don't have permission to edit that work.".to_string(),
            ));
        }
        Ok(work)
    }

    /// The validity gate: byline, required tags, collections and chapter
    /// content all check out, or the caller gets a corrective `Outcome`
    async fn run_gate(
        &self,
        user: &ActingUser,
        submission: &WorkSubmission,
        form: View,
    ) -> Result<Gate> {
        let (pseuds, defaulted) =
            match resolve_byline(self.store.as_ref(), user, &submission.pseud_names).await? {
                PseudResolution::Resolved { pseuds, defaulted } => (pseuds, defaulted),
                PseudResolution::NeedsDisambiguation { unknown, ambiguous } => {
                    return Ok(Gate::Blocked(Outcome::rendered(View::ChooseCoauthor {
                        unknown,
                        ambiguous,
                    })));
                }
            };

        let mut problems: Vec<Problem> = submission
            .tags
            .missing_required()
            .into_iter()
            .map(Problem::missing_tag)
            .collect();

        if submission.chapter.content.trim().is_empty() {
            problems.push(Problem::new("content", "Chapter content can't be blank."));
        }

        let mut collection_ids = Vec::new();
        for name in &submission.collection_names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match self.store.find_collection_by_name(name).await? {
                Some(collection) => {
                    if !collection_ids.contains(&collection.id) {
                        collection_ids.push(collection.id);
                    }
                }
                None => problems.push(Problem::new(
                    "collections",
                    format!("Couldn't find a collection named '{}'.", name),
                )),
            }
        }

        if !problems.is_empty() {
            return Ok(Gate::Blocked(Outcome::rendered_with_problems(
                form, problems,
            )));
        }

        let mut advisories = Vec::new();
        if defaulted {
            if let Some(default) = pseuds.first() {
                advisories.push(Notice::DefaultPseudUsed {
                    pseud: default.name.clone(),
                });
            }
        }

        Ok(Gate::Pass(PreparedSubmission {
            pseud_ids: pseuds.iter().map(|p| p.id).collect(),
            collection_ids,
            advisories,
        }))
    }
}

fn apply_submission(work: &mut Work, submission: &WorkSubmission, prepared: &PreparedSubmission) {
    work.title = submission.title.clone();
    work.summary = submission.summary.clone();
    work.restricted = submission.restricted;
    work.anon_commenting_disabled = submission.anon_commenting_disabled;
    work.moderated_commenting_enabled = submission.moderated_commenting_enabled;
    work.tags = submission.tags.clone();
    work.pseud_ids = prepared.pseud_ids.clone();
    work.collection_ids = prepared.collection_ids.clone();
    work.word_count = submission.chapter.content.split_whitespace().count() as i64;
}

fn attach(outcome: Outcome, advisories: Vec<Notice>, moderation: Option<Notice>) -> Outcome {
    let mut outcome = outcome.with_notices(advisories);
    if let Some(notice) = moderation {
        outcome = outcome.with_notice(notice);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use archive_common::models::Pseud;

    async fn engine_with_user() -> (WorkflowEngine, RequestContext) {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        let user_id = Uuid::new_v4();
        let pseud = Pseud {
            id: Uuid::new_v4(),
            user_id,
            name: "main".to_string(),
            is_default: true,
        };
        store.create_pseud(&pseud).await.unwrap();

        let ctx = RequestContext::for_user(ActingUser {
            id: user_id,
            login: "author".to_string(),
            pseuds: vec![pseud],
            is_admin: false,
            is_archivist: false,
            is_tag_wrangler: false,
        });
        (WorkflowEngine::new(Arc::new(store), 31), ctx)
    }

    fn valid_submission(title: &str) -> WorkSubmission {
        let mut tags = TagSet::default();
        tags.fandoms.push("Original Work".to_string());
        tags.warnings.push("No Archive Warnings Apply".to_string());
        WorkSubmission {
            title: title.to_string(),
            tags,
            chapter: ChapterContent {
                title: None,
                content: "Once upon a midnight dreary".to_string(),
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_fandom_blocks_then_passes_after_adding_it() {
        let (engine, ctx) = engine_with_user().await;

        let mut submission = valid_submission("Gated");
        submission.tags.fandoms.clear();

        let outcome = engine
            .create(&ctx, &submission, EditAction::Post)
            .await
            .unwrap();
        match outcome {
            Outcome::Rendered { problems, .. } => {
                assert_eq!(problems.len(), 1);
                assert_eq!(problems[0].field, "Fandom");
            }
            other => panic!("expected rendered problems, got {:?}", other),
        }

        submission.tags.fandoms.push("Original Work".to_string());
        let outcome = engine
            .create(&ctx, &submission, EditAction::Post)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Saved {
                state: WorkState::Posted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn default_save_creates_a_draft_with_expiry_notice() {
        let (engine, ctx) = engine_with_user().await;
        let outcome = engine
            .create(&ctx, &valid_submission("Draft"), EditAction::Save)
            .await
            .unwrap();

        match outcome {
            Outcome::Saved {
                state, notices, ..
            } => {
                assert_eq!(state, WorkState::Unposted);
                assert!(notices
                    .iter()
                    .any(|n| matches!(n, Notice::DraftCreated { .. })));
                // No pseud was named, so the default identity advisory fires
                assert!(notices
                    .iter()
                    .any(|n| matches!(n, Notice::DefaultPseudUsed { .. })));
            }
            other => panic!("expected saved draft, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancel_branches_on_posted_state() {
        let (engine, ctx) = engine_with_user().await;
        let outcome = engine
            .create(&ctx, &valid_submission("Posted"), EditAction::Post)
            .await
            .unwrap();
        let posted_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };

        let outcome = engine
            .update(&ctx, posted_id, &valid_submission("Posted"), EditAction::Cancel)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Redirected {
                target: Target::Work { .. },
                ..
            }
        ));
        assert!(outcome
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::NotSaved)));

        let outcome = engine
            .create(&ctx, &valid_submission("Draft"), EditAction::Save)
            .await
            .unwrap();
        let draft_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };
        let outcome = engine
            .update(&ctx, draft_id, &valid_submission("Draft"), EditAction::Cancel)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Redirected {
                target: Target::UserDrafts,
                ..
            }
        ));
        assert!(outcome
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::DraftRetained { .. })));
    }

    #[tokio::test]
    async fn updating_a_posted_work_increments_minor_version() {
        let (engine, ctx) = engine_with_user().await;
        let outcome = engine
            .create(&ctx, &valid_submission("Versioned"), EditAction::Post)
            .await
            .unwrap();
        let work_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };

        engine
            .update(&ctx, work_id, &valid_submission("Versioned v2"), EditAction::Save)
            .await
            .unwrap();

        let work = engine.store().find_work(work_id).await.unwrap().unwrap();
        assert_eq!(work.minor_version, 1);
        assert_eq!(work.title, "Versioned v2");
        assert!(work.posted);
    }

    #[tokio::test]
    async fn preview_warns_about_unsaved_changes_only_for_drafts() {
        let (engine, ctx) = engine_with_user().await;

        let outcome = engine
            .create(&ctx, &valid_submission("Draft"), EditAction::Save)
            .await
            .unwrap();
        let draft_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };
        let outcome = engine
            .update(&ctx, draft_id, &valid_submission("Draft"), EditAction::Preview)
            .await
            .unwrap();
        assert!(outcome
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::ChangesNotSaved)));

        let outcome = engine
            .create(&ctx, &valid_submission("Posted"), EditAction::Post)
            .await
            .unwrap();
        let posted_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };
        let outcome = engine
            .update(&ctx, posted_id, &valid_submission("Posted"), EditAction::Preview)
            .await
            .unwrap();
        assert!(!outcome
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::ChangesNotSaved)));
    }

    #[tokio::test]
    async fn posting_an_already_posted_draft_redirects() {
        let (engine, ctx) = engine_with_user().await;
        let outcome = engine
            .create(&ctx, &valid_submission("Twice"), EditAction::Post)
            .await
            .unwrap();
        let work_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };

        let outcome = engine.post_draft(&ctx, work_id).await.unwrap();
        assert!(outcome
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::AlreadyPosted)));
    }

    #[tokio::test]
    async fn deleting_a_draft_redirects_to_the_drafts_listing() {
        let (engine, ctx) = engine_with_user().await;
        let outcome = engine
            .create(&ctx, &valid_submission("Ephemeral"), EditAction::Save)
            .await
            .unwrap();
        let work_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };

        let outcome = engine.delete(&ctx, work_id).await.unwrap();
        assert!(matches!(
            outcome,
            Outcome::Redirected {
                target: Target::UserDrafts,
                ..
            }
        ));
        assert!(outcome
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::WorkDeleted { .. })));
    }

    #[tokio::test]
    async fn sole_author_removal_hands_off_to_orphaning() {
        let (engine, ctx) = engine_with_user().await;
        let outcome = engine
            .create(&ctx, &valid_submission("Alone"), EditAction::Post)
            .await
            .unwrap();
        let work_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };

        let outcome = engine.remove_self_as_author(&ctx, work_id).await.unwrap();
        match outcome {
            Outcome::Redirected {
                target: Target::NewOrphan { work_ids },
                ..
            } => assert_eq!(work_ids, vec![work_id]),
            other => panic!("expected orphan redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn strangers_cannot_edit() {
        let (engine, ctx) = engine_with_user().await;
        let outcome = engine
            .create(&ctx, &valid_submission("Private"), EditAction::Post)
            .await
            .unwrap();
        let work_id = match outcome {
            Outcome::Saved { work_id, .. } => work_id,
            other => panic!("expected save, got {:?}", other),
        };

        let stranger = RequestContext::for_user(ActingUser {
            id: Uuid::new_v4(),
            login: "stranger".to_string(),
            pseuds: Vec::new(),
            is_admin: false,
            is_archivist: false,
            is_tag_wrangler: false,
        });
        let err = engine
            .update(&stranger, work_id, &valid_submission("Private"), EditAction::Save)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
    }
}
