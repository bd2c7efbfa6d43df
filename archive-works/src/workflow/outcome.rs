//! Workflow states, actions and transition outcomes
//!
//! A transition never renders or redirects by itself; it returns a tagged
//! `Outcome` and the calling layer decides presentation. Messages are
//! parameterized notices: the triggering condition and its parameters are
//! the contract, the wording is not.

use archive_common::models::TagCategory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle state of a work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    Unposted,
    Previewed,
    Posted,
    Deleted,
}

/// The mutually exclusive actions a work-editing request can carry
///
/// Exactly one fires per request; `Save` is the default when no recognized
/// action flag is present, and `Post` is a save that also publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    Preview,
    Cancel,
    Edit,
    Post,
    #[default]
    Save,
}

/// Where a redirect-style outcome points
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Work { id: Uuid },
    WorkPreview { id: Uuid },
    EditWork { id: Uuid },
    UserWorks,
    UserDrafts,
    ShowMultiple { work_ids: Vec<Uuid> },
    NewOrphan { work_ids: Vec<Uuid> },
    TagWorks(String),
    TagPage(String),
}

/// A view the caller should render, with whatever state it needs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    NewForm,
    EditForm { work_id: Uuid },
    EditTagsForm { work_id: Uuid },
    Preview {
        work_id: Uuid,
        /// Present only for never-posted drafts: when the draft will be
        /// automatically deleted
        draft_delete_at: Option<DateTime<Utc>>,
    },
    PreviewTags { work_id: Uuid },
    ChooseCoauthor {
        unknown: Vec<String>,
        ambiguous: Vec<AmbiguousPseud>,
    },
    NewImportForm,
}

/// One supplied pseud name that matched multiple identities
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousPseud {
    pub name: String,
    pub candidate_ids: Vec<Uuid>,
}

/// A structured validation problem surfaced on a rendered form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub field: String,
    pub reason: String,
}

impl Problem {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The canonical missing-required-tag problem, naming the category
    pub fn missing_tag(category: TagCategory) -> Self {
        Self::new(
            category.label(),
            format!("{} is missing.", category.label()),
        )
    }
}

/// A parameterized user-visible notice
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Draft saved; it will be automatically deleted at the given time
    DraftCreated { delete_at: DateTime<Utc> },
    /// Work published
    Posted,
    /// Work saved while already posted
    Updated { posted_changed: bool },
    /// Tags-only update saved
    TagsUpdated,
    /// Cancel on a posted work: nothing was saved
    NotSaved,
    /// Cancel on a never-posted work: the draft is retained until expiry
    DraftRetained { delete_at: DateTime<Utc> },
    /// Preview of a never-posted work: changes are not yet saved
    ChangesNotSaved,
    /// Submitted to moderated collections pending approval; the work will
    /// not appear in their public listings until approved
    PendingModeration { collections: Vec<String> },
    /// No pseud was selected; the acting account's default identity was used
    DefaultPseudUsed { pseud: String },
    /// The acting user was removed from the work's authors
    AuthorRemoved,
    /// Work deleted
    WorkDeleted { title: String },
    /// Deletion failed for an internal reason; the user should retry later
    DeleteFailed,
    /// The work is already posted; edit it instead
    AlreadyPosted,
    /// Work queued to be reindexed
    QueuedForReindex,
    /// Posting canceled before the work was ever created
    PostingCanceled,
    /// Batch import finished with at least one success
    ImportCompleted,
    /// External authors of imported works were notified
    ExternalAuthorsNotified,
    /// Bulk edits applied; works listed by id
    BulkEditsApplied { work_ids: Vec<Uuid> },
    /// Bulk deletion finished; works listed by title
    WorksDeleted { titles: Vec<String> },
}

/// Tagged result of a workflow transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Render a view, typically with correction problems attached
    Rendered {
        view: View,
        problems: Vec<Problem>,
        notices: Vec<Notice>,
    },
    /// Send the client elsewhere
    Redirected { target: Target, notices: Vec<Notice> },
    /// A state transition was persisted
    Saved {
        work_id: Uuid,
        state: WorkState,
        notices: Vec<Notice>,
    },
}

impl Outcome {
    pub fn rendered(view: View) -> Self {
        Outcome::Rendered {
            view,
            problems: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn rendered_with_problems(view: View, problems: Vec<Problem>) -> Self {
        Outcome::Rendered {
            view,
            problems,
            notices: Vec::new(),
        }
    }

    pub fn redirected(target: Target) -> Self {
        Outcome::Redirected {
            target,
            notices: Vec::new(),
        }
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notices_mut().push(notice);
        self
    }

    pub fn with_notices(mut self, extra: Vec<Notice>) -> Self {
        self.notices_mut().extend(extra);
        self
    }

    pub fn notices(&self) -> &[Notice] {
        match self {
            Outcome::Rendered { notices, .. }
            | Outcome::Redirected { notices, .. }
            | Outcome::Saved { notices, .. } => notices,
        }
    }

    fn notices_mut(&mut self) -> &mut Vec<Notice> {
        match self {
            Outcome::Rendered { notices, .. }
            | Outcome::Redirected { notices, .. }
            | Outcome::Saved { notices, .. } => notices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tag_problem_names_the_category() {
        let problem = Problem::missing_tag(TagCategory::Fandom);
        assert_eq!(problem.field, "Fandom");
        assert_eq!(problem.reason, "Fandom is missing.");
    }

    #[test]
    fn save_is_the_default_action() {
        assert_eq!(EditAction::default(), EditAction::Save);
    }

    #[test]
    fn notices_accumulate_across_variants() {
        let outcome = Outcome::redirected(Target::UserWorks)
            .with_notice(Notice::NotSaved)
            .with_notice(Notice::AuthorRemoved);
        assert_eq!(outcome.notices().len(), 2);
    }
}
