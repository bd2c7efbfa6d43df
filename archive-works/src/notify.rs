//! External-collaborator notification seam
//!
//! Imported works can credit authors who have no account here. The invite
//! service is external; this module only defines the call and a logging
//! implementation used until the real service is wired in.

use archive_common::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// An author credited on an imported work who has no account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalAuthor {
    pub name: String,
    pub email: String,
}

#[async_trait]
pub trait InviteNotifier: Send + Sync {
    /// Notify the given external authors about newly-created works
    async fn notify(&self, work_ids: &[Uuid], authors: &[ExternalAuthor]) -> Result<()>;
}

/// Deduplicate authors by email, preserving first-seen order
pub fn dedup_authors(authors: &[ExternalAuthor]) -> Vec<ExternalAuthor> {
    let mut seen: Vec<ExternalAuthor> = Vec::new();
    for author in authors {
        if !seen.iter().any(|a| a.email == author.email) {
            seen.push(author.clone());
        }
    }
    seen
}

/// Notifier that records the invitation instead of sending one
pub struct LoggingNotifier;

#[async_trait]
impl InviteNotifier for LoggingNotifier {
    async fn notify(&self, work_ids: &[Uuid], authors: &[ExternalAuthor]) -> Result<()> {
        for author in dedup_authors(authors) {
            info!(
                email = %author.email,
                works = work_ids.len(),
                "external author invited"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_emails_collapse_to_the_first_entry() {
        let authors = vec![
            ExternalAuthor {
                name: "A. Author".to_string(),
                email: "a@example.com".to_string(),
            },
            ExternalAuthor {
                name: "A Author (again)".to_string(),
                email: "a@example.com".to_string(),
            },
            ExternalAuthor {
                name: "B. Writer".to_string(),
                email: "b@example.com".to_string(),
            },
        ];
        let deduped = dedup_authors(&authors);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name, "A. Author");
        assert_eq!(deduped[1].email, "b@example.com");
    }
}
