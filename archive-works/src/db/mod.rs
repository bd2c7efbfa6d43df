//! Persistence seam for works, chapters, pseuds, collections and tags
//!
//! The engine only sees the `WorkStore` trait: find-by-id/find-by-name plus
//! save/destroy semantics. Saves can fail with structured per-field
//! validation errors; updates carry an optimistic version check that
//! surfaces concurrent modification as a retriable `Conflict`.

mod repository;

pub use repository::SqliteStore;

use archive_common::models::{Chapter, Collection, CollectionItem, Pseud, Tag, Work};
use archive_common::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait WorkStore: Send + Sync {
    async fn find_work(&self, id: Uuid) -> Result<Option<Work>>;

    /// Insert a new work; fails with a per-field validation error on
    /// invalid content
    async fn create_work(&self, work: &Work) -> Result<()>;

    /// Update an existing work if its stored `minor_version` still equals
    /// `expected_version`; otherwise fails with `Conflict`
    async fn update_work(&self, work: &Work, expected_version: i64) -> Result<()>;

    async fn delete_work(&self, id: Uuid) -> Result<()>;

    /// The subset of `ids` owned by `user_id`, ownership verified per work;
    /// an empty `ids` selects nothing
    async fn works_owned_by(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Work>>;

    /// Unposted drafts belonging to the user
    async fn unposted_works_for(&self, user_id: Uuid) -> Result<Vec<Work>>;

    async fn save_chapter(&self, chapter: &Chapter) -> Result<()>;

    async fn create_pseud(&self, pseud: &Pseud) -> Result<()>;
    async fn find_pseuds_by_name(&self, name: &str) -> Result<Vec<Pseud>>;
    async fn pseuds_for_user(&self, user_id: Uuid) -> Result<Vec<Pseud>>;

    async fn create_collection(&self, collection: &Collection) -> Result<()>;
    async fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>>;
    async fn collections_for_work(&self, work_id: Uuid) -> Result<Vec<Collection>>;
    async fn collection_items_for_work(&self, work_id: Uuid) -> Result<Vec<CollectionItem>>;

    async fn add_posting_participant(&self, collection_id: Uuid, user_id: Uuid) -> Result<()>;
    async fn is_posting_participant(&self, collection_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn create_tag(&self, tag: &Tag) -> Result<()>;
    async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>>;
}
