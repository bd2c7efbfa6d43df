//! Byline resolution for work submissions
//!
//! A submission names its authors by pseud name. Resolution either produces
//! a concrete pseud list or reports exactly which names need correction;
//! it never guesses among ambiguous candidates.

use archive_common::models::Pseud;
use archive_common::{Error, Result};

use crate::context::ActingUser;
use crate::db::WorkStore;
use crate::workflow::outcome::AmbiguousPseud;

/// Result of resolving submitted pseud names
#[derive(Debug, Clone)]
pub enum PseudResolution {
    Resolved {
        pseuds: Vec<Pseud>,
        /// No pseud was named and the acting account's default was used
        defaulted: bool,
    },
    /// One or more names could not be resolved to a single identity
    NeedsDisambiguation {
        unknown: Vec<String>,
        ambiguous: Vec<AmbiguousPseud>,
    },
}

/// Resolve the submitted byline against the pseud registry
///
/// An empty name list falls back to the acting account's default pseud. A
/// resolvable byline must still include at least one pseud owned by the
/// acting user; a byline naming only other people is a permission error,
/// not a disambiguation problem.
pub async fn resolve_byline(
    store: &dyn WorkStore,
    user: &ActingUser,
    names: &[String],
) -> Result<PseudResolution> {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        let default = user.default_pseud().ok_or_else(|| {
            Error::Permission("Your account has no authoring identity.".to_string())
        })?;
        return Ok(PseudResolution::Resolved {
            pseuds: vec![default.clone()],
            defaulted: true,
        });
    }

    let mut pseuds = Vec::new();
    let mut unknown = Vec::new();
    let mut ambiguous = Vec::new();

    for name in names {
        // The acting user's own pseuds take precedence over namesakes
        if let Some(own) = user.pseuds.iter().find(|p| p.name == name) {
            if !pseuds.iter().any(|p: &Pseud| p.id == own.id) {
                pseuds.push(own.clone());
            }
            continue;
        }

        let candidates = store.find_pseuds_by_name(name).await?;
        match candidates.len() {
            0 => unknown.push(name.to_string()),
            1 => {
                if let Some(pseud) = candidates.into_iter().next() {
                    if !pseuds.iter().any(|p: &Pseud| p.id == pseud.id) {
                        pseuds.push(pseud);
                    }
                }
            }
            _ => ambiguous.push(AmbiguousPseud {
                name: name.to_string(),
                candidate_ids: candidates.iter().map(|p| p.id).collect(),
            }),
        }
    }

    if !unknown.is_empty() || !ambiguous.is_empty() {
        return Ok(PseudResolution::NeedsDisambiguation { unknown, ambiguous });
    }

    if !pseuds.iter().any(|p| user.owns_pseud(p.id)) {
        return Err(Error::Permission(
            "You can't post works you aren't an author of.".to_string(),
        ));
    }

    Ok(PseudResolution::Resolved {
        pseuds,
        defaulted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use uuid::Uuid;

    fn acting_user(pseuds: Vec<Pseud>) -> ActingUser {
        ActingUser {
            id: pseuds.first().map(|p| p.user_id).unwrap_or_else(Uuid::new_v4),
            login: "author".to_string(),
            pseuds,
            is_admin: false,
            is_archivist: false,
            is_tag_wrangler: false,
        }
    }

    fn pseud(user_id: Uuid, name: &str, is_default: bool) -> Pseud {
        Pseud {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            is_default,
        }
    }

    #[tokio::test]
    async fn empty_byline_falls_back_to_the_default_pseud() {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        let user_id = Uuid::new_v4();
        let user = acting_user(vec![pseud(user_id, "alt", false), pseud(user_id, "main", true)]);

        match resolve_byline(&store, &user, &[]).await.unwrap() {
            PseudResolution::Resolved { pseuds, defaulted } => {
                assert!(defaulted);
                assert_eq!(pseuds.len(), 1);
                assert_eq!(pseuds[0].name, "main");
            }
            other => panic!("expected resolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_and_ambiguous_names_are_reported_together() {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        let user_id = Uuid::new_v4();
        let mine = pseud(user_id, "main", true);
        store.create_pseud(&mine).await.unwrap();
        for _ in 0..2 {
            store
                .create_pseud(&pseud(Uuid::new_v4(), "popular", true))
                .await
                .unwrap();
        }
        let user = acting_user(vec![mine]);

        let names = vec![
            "main".to_string(),
            "nobody".to_string(),
            "popular".to_string(),
        ];
        match resolve_byline(&store, &user, &names).await.unwrap() {
            PseudResolution::NeedsDisambiguation { unknown, ambiguous } => {
                assert_eq!(unknown, vec!["nobody".to_string()]);
                assert_eq!(ambiguous.len(), 1);
                assert_eq!(ambiguous[0].name, "popular");
                assert_eq!(ambiguous[0].candidate_ids.len(), 2);
            }
            other => panic!("expected disambiguation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn byline_without_the_acting_user_is_rejected() {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        let other = pseud(Uuid::new_v4(), "someone_else", true);
        store.create_pseud(&other).await.unwrap();
        let user = acting_user(vec![pseud(Uuid::new_v4(), "me", true)]);

        let err = resolve_byline(&store, &user, &["someone_else".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
    }
}
