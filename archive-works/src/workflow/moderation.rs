//! Moderated-collection membership checks

use archive_common::models::Approval;
use archive_common::Result;
use uuid::Uuid;

use crate::db::WorkStore;
use crate::workflow::outcome::Notice;

/// Titles of moderated collections where this work sits awaiting approval
///
/// A collection counts only when it is moderated, the acting user is not one
/// of its posting participants, the author's side of the pairing is already
/// approved, and the collection's side is still pending. Approved, rejected
/// and user-pending memberships never trigger the advisory.
pub async fn pending_moderated_collections(
    store: &dyn WorkStore,
    work_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<String>> {
    let collections = store.collections_for_work(work_id).await?;
    let items = store.collection_items_for_work(work_id).await?;

    let mut pending = Vec::new();
    for collection in collections {
        if !collection.moderated {
            continue;
        }
        if store.is_posting_participant(collection.id, user_id).await? {
            continue;
        }
        let held = items.iter().any(|item| {
            item.collection_id == collection.id
                && item.user_approval == Approval::Approved
                && item.collection_approval == Approval::Pending
        });
        if held {
            pending.push(collection.title);
        }
    }
    Ok(pending)
}

/// The single moderation advisory for a save, if any membership is held
///
/// Multiple pending collections still produce one notice naming them all.
pub async fn moderation_notice(
    store: &dyn WorkStore,
    work_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Notice>> {
    let collections = pending_moderated_collections(store, work_id, user_id).await?;
    if collections.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Notice::PendingModeration { collections }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use archive_common::models::{Collection, Work};

    async fn collection(store: &SqliteStore, name: &str, moderated: bool) -> Collection {
        let collection = Collection {
            id: Uuid::new_v4(),
            name: name.to_string(),
            title: name.to_string(),
            moderated,
        };
        store.create_collection(&collection).await.unwrap();
        collection
    }

    #[tokio::test]
    async fn two_pending_collections_yield_one_notice_naming_both() {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        let first = collection(&store, "strict_one", true).await;
        let second = collection(&store, "strict_two", true).await;
        let open = collection(&store, "open_door", false).await;

        let mut work = Work::new("Submitted");
        work.collection_ids = vec![first.id, second.id, open.id];
        store.create_work(&work).await.unwrap();

        let user_id = Uuid::new_v4();
        let notice = moderation_notice(&store, work.id, user_id)
            .await
            .unwrap()
            .expect("expected a pending-moderation notice");
        match notice {
            Notice::PendingModeration { collections } => {
                assert_eq!(
                    collections,
                    vec!["strict_one".to_string(), "strict_two".to_string()]
                );
            }
            other => panic!("unexpected notice {:?}", other),
        }
    }

    #[tokio::test]
    async fn posting_participants_are_not_warned() {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        let moderated = collection(&store, "their_own", true).await;

        let mut work = Work::new("Insider");
        work.collection_ids = vec![moderated.id];
        store.create_work(&work).await.unwrap();

        let user_id = Uuid::new_v4();
        store
            .add_posting_participant(moderated.id, user_id)
            .await
            .unwrap();

        assert!(moderation_notice(&store, work.id, user_id)
            .await
            .unwrap()
            .is_none());
    }
}
