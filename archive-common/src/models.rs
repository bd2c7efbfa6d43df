//! Domain models shared by the archive services

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag categories recognized by the archive
///
/// `Fandom` and `Warning` are required: a work cannot be posted while either
/// is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagCategory {
    Fandom,
    Warning,
    Rating,
    Category,
    Character,
    Relationship,
    Freeform,
}

impl TagCategory {
    /// Categories that must be non-empty before a work may be posted
    pub const REQUIRED: [TagCategory; 2] = [TagCategory::Fandom, TagCategory::Warning];

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    /// Display label, also used as the validation field name
    pub fn label(self) -> &'static str {
        match self {
            TagCategory::Fandom => "Fandom",
            TagCategory::Warning => "Warning",
            TagCategory::Rating => "Rating",
            TagCategory::Category => "Category",
            TagCategory::Character => "Character",
            TagCategory::Relationship => "Relationship",
            TagCategory::Freeform => "Freeform",
        }
    }
}

/// A work's tags partitioned by category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSet {
    #[serde(default)]
    pub fandoms: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub ratings: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub freeforms: Vec<String>,
}

impl TagSet {
    pub fn get(&self, category: TagCategory) -> &[String] {
        match category {
            TagCategory::Fandom => &self.fandoms,
            TagCategory::Warning => &self.warnings,
            TagCategory::Rating => &self.ratings,
            TagCategory::Category => &self.categories,
            TagCategory::Character => &self.characters,
            TagCategory::Relationship => &self.relationships,
            TagCategory::Freeform => &self.freeforms,
        }
    }

    /// Required categories that are currently empty, in declaration order
    pub fn missing_required(&self) -> Vec<TagCategory> {
        TagCategory::REQUIRED
            .iter()
            .copied()
            .filter(|c| self.get(*c).is_empty())
            .collect()
    }

    pub fn has_required_tags(&self) -> bool {
        self.missing_required().is_empty()
    }
}

/// A creative posting composed of chapters, tags and authorship metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub posted: bool,
    pub restricted: bool,
    pub anon_commenting_disabled: bool,
    pub moderated_commenting_enabled: bool,
    /// Strictly increases on every content-affecting save while posted
    pub minor_version: i64,
    pub tags: TagSet,
    /// Authoring identities, one or more per work
    pub pseud_ids: Vec<Uuid>,
    pub collection_ids: Vec<Uuid>,
    pub word_count: i64,
    pub created_at: DateTime<Utc>,
    pub revised_at: DateTime<Utc>,
}

impl Work {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            summary: None,
            posted: false,
            restricted: false,
            anon_commenting_disabled: false,
            moderated_commenting_enabled: false,
            minor_version: 0,
            tags: TagSet::default(),
            pseud_ids: Vec::new(),
            collection_ids: Vec::new(),
            word_count: 0,
            created_at: now,
            revised_at: now,
        }
    }

    /// When an unposted draft will be automatically deleted
    pub fn draft_delete_at(&self, expiry_days: i64) -> DateTime<Utc> {
        self.created_at + Duration::days(expiry_days)
    }
}

/// A chapter belonging to a work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub work_id: Uuid,
    pub position: i64,
    pub title: Option<String>,
    pub content: String,
    pub posted: bool,
}

impl Chapter {
    pub fn new(work_id: Uuid, position: i64, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            work_id,
            position,
            title: None,
            content: content.into(),
            posted: false,
        }
    }
}

/// An authoring identity (pen name) owned by exactly one user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pseud {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// The account's default identity, used when no pseud is selected
    pub is_default: bool,
}

/// A named grouping of works, optionally moderated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub moderated: bool,
}

/// Approval status on one side of a work-collection pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Approval {
    Pending,
    Approved,
    Rejected,
}

impl Approval {
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Approval::Approved,
            2 => Approval::Rejected,
            _ => Approval::Pending,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Approval::Pending => 0,
            Approval::Approved => 1,
            Approval::Rejected => 2,
        }
    }
}

/// Membership link between a work and a collection
///
/// A work is excluded from a moderated collection's public listing until
/// `collection_approval` is `Approved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    pub collection_id: Uuid,
    pub work_id: Uuid,
    pub user_approval: Approval,
    pub collection_approval: Approval,
}

/// A tag record, possibly non-canonical with a merger target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub category: TagCategory,
    pub canonical: bool,
    /// Canonical tag this one has been merged into, if any
    pub merger: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_names_empty_categories() {
        let mut tags = TagSet::default();
        assert_eq!(
            tags.missing_required(),
            vec![TagCategory::Fandom, TagCategory::Warning]
        );

        tags.fandoms.push("Original Work".to_string());
        assert_eq!(tags.missing_required(), vec![TagCategory::Warning]);

        tags.warnings.push("No Archive Warnings Apply".to_string());
        assert!(tags.has_required_tags());
    }

    #[test]
    fn draft_delete_at_is_one_month_from_creation() {
        let work = Work::new("Untitled");
        let delete_at = work.draft_delete_at(31);
        assert_eq!(delete_at - work.created_at, Duration::days(31));
    }

    #[test]
    fn approval_round_trips_through_i64() {
        for approval in [Approval::Pending, Approval::Approved, Approval::Rejected] {
            assert_eq!(Approval::from_i64(approval.as_i64()), approval);
        }
    }
}
