//! Owner scoping for works listings
//!
//! A listing can be scoped to a pseud, a user, a collection or a tag. The
//! four owner kinds are a tagged variant with a named accessor per variant,
//! and tag resolution handles the merged-tag redirect rather than failing.

use archive_common::models::{Collection, Pseud, Tag};
use archive_common::{Error, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::db::WorkStore;
use crate::workflow::outcome::Target;

/// A user handle carried by an owner scope
#[derive(Debug, Clone, Serialize)]
pub struct UserHandle {
    pub id: Uuid,
    pub login: String,
}

/// The owner a works listing is scoped to
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnerScope {
    Pseud(Pseud),
    User(UserHandle),
    Collection(Collection),
    Tag(Tag),
}

impl OwnerScope {
    /// Display name for the listing title; each owner kind names itself
    /// differently
    pub fn display_name(&self) -> &str {
        match self {
            OwnerScope::Pseud(pseud) => &pseud.name,
            OwnerScope::User(user) => &user.login,
            OwnerScope::Collection(collection) => &collection.title,
            OwnerScope::Tag(tag) => &tag.name,
        }
    }

    /// Tag/fandom filter id this scope implies for the compiled query, if any
    pub fn implied_filter_id(&self) -> Option<Uuid> {
        match self {
            OwnerScope::Tag(tag) => Some(tag.id),
            _ => None,
        }
    }
}

/// Result of resolving a tag name into a listing scope
#[derive(Debug, Clone)]
pub enum TagResolution {
    Scoped(Tag),
    /// Non-canonical tag: send the viewer to the right listing instead of
    /// failing
    Redirect(Target),
}

/// Resolve a tag name for scoping, following merger redirects
///
/// An unknown tag is a hard `NotFound`; a known non-canonical tag resolves to
/// a redirect, to its merger's works listing when one exists, otherwise to
/// the tag's own page.
pub async fn resolve_tag_scope(store: &dyn WorkStore, name: &str) -> Result<TagResolution> {
    let tag = store
        .find_tag_by_name(name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Couldn't find tag named '{}'", name)))?;

    if tag.canonical {
        return Ok(TagResolution::Scoped(tag));
    }

    match &tag.merger {
        Some(merger) => Ok(TagResolution::Redirect(Target::TagWorks(merger.clone()))),
        None => Ok(TagResolution::Redirect(Target::TagPage(tag.name.clone()))),
    }
}
