//! Explicit request context
//!
//! Every operation receives a `RequestContext` describing the acting
//! principal; nothing in this service reads ambient/global request state.
//! Authentication itself is external: the surrounding infrastructure
//! forwards the authenticated user and their roles in headers, and this
//! module only consumes them.

use archive_common::models::Pseud;
use archive_common::{Error, Result};
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::db::WorkStore;

/// The authenticated acting account, with its authoring identities
#[derive(Debug, Clone)]
pub struct ActingUser {
    pub id: Uuid,
    pub login: String,
    pub pseuds: Vec<Pseud>,
    pub is_admin: bool,
    pub is_archivist: bool,
    pub is_tag_wrangler: bool,
}

impl ActingUser {
    /// The account's primary authoring identity, used when none is selected
    pub fn default_pseud(&self) -> Option<&Pseud> {
        self.pseuds
            .iter()
            .find(|p| p.is_default)
            .or_else(|| self.pseuds.first())
    }

    pub fn owns_pseud(&self, pseud_id: Uuid) -> bool {
        self.pseuds.iter().any(|p| p.id == pseud_id)
    }
}

/// Per-request context passed explicitly to every operation
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<ActingUser>,
}

impl RequestContext {
    pub fn for_user(user: ActingUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }

    /// The acting user, or a permission error for anonymous requests
    pub fn require_user(&self) -> Result<&ActingUser> {
        self.user
            .as_ref()
            .ok_or_else(|| Error::Permission("You must be logged in to do that.".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().map(|u| u.is_admin).unwrap_or(false)
    }

    /// Restricted works are visible to any logged-in account or admin
    pub fn show_restricted(&self) -> bool {
        self.user.is_some()
    }

    /// Build a context from the forwarded identity headers
    ///
    /// `x-archive-user` carries the account id, `x-archive-login` the login
    /// name, `x-archive-roles` a comma-separated role list. Missing headers
    /// mean an anonymous viewer, not an error.
    pub async fn from_headers(headers: &HeaderMap, store: &dyn WorkStore) -> Result<Self> {
        let user_id = match headers
            .get("x-archive-user")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
        {
            Some(id) => id,
            None => return Ok(Self::anonymous()),
        };

        let login = headers
            .get("x-archive-login")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let roles: Vec<String> = headers
            .get("x-archive-roles")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').map(|r| r.trim().to_string()).collect())
            .unwrap_or_default();

        let pseuds = store.pseuds_for_user(user_id).await?;

        Ok(Self::for_user(ActingUser {
            id: user_id,
            login,
            pseuds,
            is_admin: roles.iter().any(|r| r == "admin"),
            is_archivist: roles.iter().any(|r| r == "archivist"),
            is_tag_wrangler: roles.iter().any(|r| r == "tag_wrangler"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseud(name: &str, is_default: bool) -> Pseud {
        Pseud {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            is_default,
        }
    }

    #[test]
    fn default_pseud_prefers_the_flagged_identity() {
        let user = ActingUser {
            id: Uuid::new_v4(),
            login: "astolat".to_string(),
            pseuds: vec![pseud("alt", false), pseud("main", true)],
            is_admin: false,
            is_archivist: false,
            is_tag_wrangler: false,
        };
        assert_eq!(user.default_pseud().unwrap().name, "main");
    }

    #[test]
    fn anonymous_context_cannot_act() {
        let ctx = RequestContext::anonymous();
        assert!(ctx.require_user().is_err());
        assert!(!ctx.show_restricted());
    }
}
