//! SQLite-backed `WorkStore`

use archive_common::models::{
    Approval, Chapter, Collection, CollectionItem, Pseud, Tag, TagCategory, TagSet, Work,
};
use archive_common::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::WorkStore;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS works (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        summary TEXT,
        posted INTEGER NOT NULL,
        restricted INTEGER NOT NULL,
        anon_commenting_disabled INTEGER NOT NULL,
        moderated_commenting_enabled INTEGER NOT NULL,
        minor_version INTEGER NOT NULL,
        tags TEXT NOT NULL,
        word_count INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        revised_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS work_authors (
        work_id TEXT NOT NULL,
        pseud_id TEXT NOT NULL,
        PRIMARY KEY (work_id, pseud_id)
    )",
    "CREATE TABLE IF NOT EXISTS chapters (
        id TEXT PRIMARY KEY,
        work_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        title TEXT,
        content TEXT NOT NULL,
        posted INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pseuds (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        is_default INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS collections (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        moderated INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS collection_items (
        collection_id TEXT NOT NULL,
        work_id TEXT NOT NULL,
        user_approval INTEGER NOT NULL,
        collection_approval INTEGER NOT NULL,
        PRIMARY KEY (collection_id, work_id)
    )",
    "CREATE TABLE IF NOT EXISTS collection_participants (
        collection_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (collection_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS tags (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        category TEXT NOT NULL,
        canonical INTEGER NOT NULL,
        merger TEXT
    )",
];

type WorkRow = (
    String,         // id
    String,         // title
    Option<String>, // summary
    i64,            // posted
    i64,            // restricted
    i64,            // anon_commenting_disabled
    i64,            // moderated_commenting_enabled
    i64,            // minor_version
    String,         // tags (JSON)
    i64,            // word_count
    String,         // created_at
    String,         // revised_at
);

const WORK_COLUMNS: &str = "id, title, summary, posted, restricted, \
    anon_commenting_disabled, moderated_commenting_enabled, minor_version, \
    tags, word_count, created_at, revised_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database and ensure the schema exists
    pub async fn connect(database_path: &str) -> Result<Self> {
        let url = if database_path == ":memory:" {
            ":memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", database_path)
        };
        let pool = SqlitePool::connect(&url).await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn validate_work(work: &Work) -> Result<()> {
        if work.title.trim().is_empty() {
            return Err(Error::validation("title", "Title can't be blank."));
        }
        Ok(())
    }

    async fn hydrate(&self, row: WorkRow) -> Result<Work> {
        let (
            id,
            title,
            summary,
            posted,
            restricted,
            anon,
            moderated,
            minor_version,
            tags_json,
            word_count,
            created_at,
            revised_at,
        ) = row;
        let id = parse_uuid(&id)?;

        let pseud_rows: Vec<(String,)> =
            sqlx::query_as("SELECT pseud_id FROM work_authors WHERE work_id = ? ORDER BY rowid")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;
        let collection_rows: Vec<(String,)> =
            sqlx::query_as("SELECT collection_id FROM collection_items WHERE work_id = ? ORDER BY rowid")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let tags: TagSet = serde_json::from_str(&tags_json)
            .map_err(|e| Error::Internal(format!("corrupt tag data for work {}: {}", id, e)))?;

        Ok(Work {
            id,
            title,
            summary,
            posted: posted != 0,
            restricted: restricted != 0,
            anon_commenting_disabled: anon != 0,
            moderated_commenting_enabled: moderated != 0,
            minor_version,
            tags,
            pseud_ids: pseud_rows
                .iter()
                .map(|(p,)| parse_uuid(p))
                .collect::<Result<_>>()?,
            collection_ids: collection_rows
                .iter()
                .map(|(c,)| parse_uuid(c))
                .collect::<Result<_>>()?,
            word_count,
            created_at: parse_time(&created_at)?,
            revised_at: parse_time(&revised_at)?,
        })
    }

    async fn sync_authors(&self, work: &Work) -> Result<()> {
        sqlx::query("DELETE FROM work_authors WHERE work_id = ?")
            .bind(work.id.to_string())
            .execute(&self.pool)
            .await?;
        for pseud_id in &work.pseud_ids {
            sqlx::query("INSERT OR IGNORE INTO work_authors (work_id, pseud_id) VALUES (?, ?)")
                .bind(work.id.to_string())
                .bind(pseud_id.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Ensure a collection-item link exists for every membership, with the
    /// approval defaults a fresh submission gets: user side approved,
    /// collection side pending when the collection is moderated.
    async fn sync_collection_items(&self, work: &Work) -> Result<()> {
        for collection_id in &work.collection_ids {
            let existing: Option<(i64,)> = sqlx::query_as(
                "SELECT 1 FROM collection_items WHERE collection_id = ? AND work_id = ?",
            )
            .bind(collection_id.to_string())
            .bind(work.id.to_string())
            .fetch_optional(&self.pool)
            .await?;
            if existing.is_some() {
                continue;
            }

            let moderated: Option<(i64,)> =
                sqlx::query_as("SELECT moderated FROM collections WHERE id = ?")
                    .bind(collection_id.to_string())
                    .fetch_optional(&self.pool)
                    .await?;
            let collection_approval = match moderated {
                Some((1, ..)) => Approval::Pending,
                _ => Approval::Approved,
            };

            sqlx::query(
                "INSERT INTO collection_items \
                 (collection_id, work_id, user_approval, collection_approval) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(collection_id.to_string())
            .bind(work.id.to_string())
            .bind(Approval::Approved.as_i64())
            .bind(collection_approval.as_i64())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn owned_works_query(&self, user_id: Uuid, ids: Option<&[Uuid]>) -> Result<Vec<Work>> {
        let mut sql = format!(
            "SELECT DISTINCT w.{} FROM works w \
             JOIN work_authors wa ON wa.work_id = w.id \
             JOIN pseuds p ON p.id = wa.pseud_id \
             WHERE p.user_id = ?",
            WORK_COLUMNS.replace(", ", ", w.")
        );
        if let Some(ids) = ids {
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND w.id IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY w.rowid");

        let mut query = sqlx::query_as::<_, WorkRow>(&sql).bind(user_id.to_string());
        if let Some(ids) = ids {
            for id in ids {
                query = query.bind(id.to_string());
            }
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut works = Vec::with_capacity(rows.len());
        for row in rows {
            works.push(self.hydrate(row).await?);
        }
        Ok(works)
    }
}

#[async_trait]
impl WorkStore for SqliteStore {
    async fn find_work(&self, id: Uuid) -> Result<Option<Work>> {
        let row: Option<WorkRow> =
            sqlx::query_as(&format!("SELECT {} FROM works WHERE id = ?", WORK_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn create_work(&self, work: &Work) -> Result<()> {
        Self::validate_work(work)?;

        sqlx::query(
            "INSERT INTO works (id, title, summary, posted, restricted, \
             anon_commenting_disabled, moderated_commenting_enabled, minor_version, \
             tags, word_count, created_at, revised_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(work.id.to_string())
        .bind(&work.title)
        .bind(&work.summary)
        .bind(work.posted as i64)
        .bind(work.restricted as i64)
        .bind(work.anon_commenting_disabled as i64)
        .bind(work.moderated_commenting_enabled as i64)
        .bind(work.minor_version)
        .bind(encode_tags(&work.tags)?)
        .bind(work.word_count)
        .bind(work.created_at.to_rfc3339())
        .bind(work.revised_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.sync_authors(work).await?;
        self.sync_collection_items(work).await?;
        Ok(())
    }

    async fn update_work(&self, work: &Work, expected_version: i64) -> Result<()> {
        Self::validate_work(work)?;

        let result = sqlx::query(
            "UPDATE works SET title = ?, summary = ?, posted = ?, restricted = ?, \
             anon_commenting_disabled = ?, moderated_commenting_enabled = ?, \
             minor_version = ?, tags = ?, word_count = ?, revised_at = ? \
             WHERE id = ? AND minor_version = ?",
        )
        .bind(&work.title)
        .bind(&work.summary)
        .bind(work.posted as i64)
        .bind(work.restricted as i64)
        .bind(work.anon_commenting_disabled as i64)
        .bind(work.moderated_commenting_enabled as i64)
        .bind(work.minor_version)
        .bind(encode_tags(&work.tags)?)
        .bind(work.word_count)
        .bind(work.revised_at.to_rfc3339())
        .bind(work.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM works WHERE id = ?")
                .bind(work.id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            return if exists.is_some() {
                Err(Error::Conflict(
                    "This work was changed by someone else while you were editing.".to_string(),
                ))
            } else {
                Err(Error::NotFound(format!("work {}", work.id)))
            };
        }

        self.sync_authors(work).await?;
        self.sync_collection_items(work).await?;
        Ok(())
    }

    async fn delete_work(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM works WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("work {}", id)));
        }

        for table in ["chapters", "work_authors", "collection_items"] {
            sqlx::query(&format!("DELETE FROM {} WHERE work_id = ?", table))
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn works_owned_by(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Work>> {
        // An empty id list selects nothing; it must never widen to the
        // user's whole catalog
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.owned_works_query(user_id, Some(ids)).await
    }

    async fn unposted_works_for(&self, user_id: Uuid) -> Result<Vec<Work>> {
        let works = self.owned_works_query(user_id, None).await?;
        Ok(works.into_iter().filter(|w| !w.posted).collect())
    }

    async fn save_chapter(&self, chapter: &Chapter) -> Result<()> {
        if chapter.content.trim().is_empty() {
            return Err(Error::validation("content", "Chapter content can't be blank."));
        }

        // One row per (work, position); a re-save replaces the old content
        sqlx::query("DELETE FROM chapters WHERE work_id = ? AND position = ?")
            .bind(chapter.work_id.to_string())
            .bind(chapter.position)
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "INSERT INTO chapters (id, work_id, position, title, content, posted) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(chapter.id.to_string())
        .bind(chapter.work_id.to_string())
        .bind(chapter.position)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(chapter.posted as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_pseud(&self, pseud: &Pseud) -> Result<()> {
        sqlx::query("INSERT INTO pseuds (id, user_id, name, is_default) VALUES (?, ?, ?, ?)")
            .bind(pseud.id.to_string())
            .bind(pseud.user_id.to_string())
            .bind(&pseud.name)
            .bind(pseud.is_default as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_pseuds_by_name(&self, name: &str) -> Result<Vec<Pseud>> {
        let rows: Vec<(String, String, String, i64)> =
            sqlx::query_as("SELECT id, user_id, name, is_default FROM pseuds WHERE name = ?")
                .bind(name)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(pseud_from_row).collect()
    }

    async fn pseuds_for_user(&self, user_id: Uuid) -> Result<Vec<Pseud>> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            "SELECT id, user_id, name, is_default FROM pseuds WHERE user_id = ? ORDER BY is_default DESC, name",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(pseud_from_row).collect()
    }

    async fn create_collection(&self, collection: &Collection) -> Result<()> {
        sqlx::query("INSERT INTO collections (id, name, title, moderated) VALUES (?, ?, ?, ?)")
            .bind(collection.id.to_string())
            .bind(&collection.name)
            .bind(&collection.title)
            .bind(collection.moderated as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>> {
        let row: Option<(String, String, String, i64)> =
            sqlx::query_as("SELECT id, name, title, moderated FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        row.map(collection_from_row).transpose()
    }

    async fn collections_for_work(&self, work_id: Uuid) -> Result<Vec<Collection>> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            "SELECT c.id, c.name, c.title, c.moderated FROM collections c \
             JOIN collection_items ci ON ci.collection_id = c.id \
             WHERE ci.work_id = ?",
        )
        .bind(work_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(collection_from_row).collect()
    }

    async fn collection_items_for_work(&self, work_id: Uuid) -> Result<Vec<CollectionItem>> {
        let rows: Vec<(String, String, i64, i64)> = sqlx::query_as(
            "SELECT collection_id, work_id, user_approval, collection_approval \
             FROM collection_items WHERE work_id = ?",
        )
        .bind(work_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(collection_id, work_id, user_approval, collection_approval)| {
                Ok(CollectionItem {
                    collection_id: parse_uuid(&collection_id)?,
                    work_id: parse_uuid(&work_id)?,
                    user_approval: Approval::from_i64(user_approval),
                    collection_approval: Approval::from_i64(collection_approval),
                })
            })
            .collect()
    }

    async fn add_posting_participant(&self, collection_id: Uuid, user_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO collection_participants (collection_id, user_id) VALUES (?, ?)",
        )
        .bind(collection_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_posting_participant(&self, collection_id: Uuid, user_id: Uuid) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM collection_participants WHERE collection_id = ? AND user_id = ?",
        )
        .bind(collection_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn create_tag(&self, tag: &Tag) -> Result<()> {
        sqlx::query("INSERT INTO tags (id, name, category, canonical, merger) VALUES (?, ?, ?, ?, ?)")
            .bind(tag.id.to_string())
            .bind(&tag.name)
            .bind(tag.category.label())
            .bind(tag.canonical as i64)
            .bind(&tag.merger)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row: Option<(String, String, String, i64, Option<String>)> = sqlx::query_as(
            "SELECT id, name, category, canonical, merger FROM tags WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, name, category, canonical, merger)| {
            Ok(Tag {
                id: parse_uuid(&id)?,
                name,
                category: category_from_label(&category),
                canonical: canonical != 0,
                merger,
            })
        })
        .transpose()
    }
}

fn encode_tags(tags: &TagSet) -> Result<String> {
    serde_json::to_string(tags).map_err(|e| Error::Internal(format!("tag encoding failed: {}", e)))
}

fn pseud_from_row(row: (String, String, String, i64)) -> Result<Pseud> {
    let (id, user_id, name, is_default) = row;
    Ok(Pseud {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        name,
        is_default: is_default != 0,
    })
}

fn collection_from_row(row: (String, String, String, i64)) -> Result<Collection> {
    let (id, name, title, moderated) = row;
    Ok(Collection {
        id: parse_uuid(&id)?,
        name,
        title,
        moderated: moderated != 0,
    })
}

fn category_from_label(label: &str) -> TagCategory {
    match label {
        "Fandom" => TagCategory::Fandom,
        "Warning" => TagCategory::Warning,
        "Rating" => TagCategory::Rating,
        "Category" => TagCategory::Category,
        "Character" => TagCategory::Character,
        "Relationship" => TagCategory::Relationship,
        _ => TagCategory::Freeform,
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("invalid id in store: {}", e)))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp in store: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect(":memory:").await.unwrap()
    }

    fn seeded_pseud(user_id: Uuid, name: &str) -> Pseud {
        Pseud {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            is_default: true,
        }
    }

    #[tokio::test]
    async fn work_round_trips_with_authors_and_tags() {
        let store = memory_store().await;
        let user_id = Uuid::new_v4();
        let pseud = seeded_pseud(user_id, "main");
        store.create_pseud(&pseud).await.unwrap();

        let mut work = Work::new("A Study in Rust");
        work.tags.fandoms.push("Original Work".to_string());
        work.pseud_ids.push(pseud.id);
        store.create_work(&work).await.unwrap();

        let found = store.find_work(work.id).await.unwrap().unwrap();
        assert_eq!(found.title, "A Study in Rust");
        assert_eq!(found.pseud_ids, vec![pseud.id]);
        assert_eq!(found.tags.fandoms, vec!["Original Work".to_string()]);
    }

    #[tokio::test]
    async fn blank_title_is_a_field_validation_error() {
        let store = memory_store().await;
        let work = Work::new("   ");
        let err = store.create_work(&work).await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "title"));
    }

    #[tokio::test]
    async fn stale_version_update_is_a_conflict() {
        let store = memory_store().await;
        let mut work = Work::new("Racy");
        store.create_work(&work).await.unwrap();

        // First writer wins
        work.minor_version = 1;
        store.update_work(&work, 0).await.unwrap();

        // Second writer still holds version 0
        work.minor_version = 1;
        let err = store.update_work(&work, 0).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn ownership_is_verified_per_work() {
        let store = memory_store().await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let pseud = seeded_pseud(owner, "author");
        store.create_pseud(&pseud).await.unwrap();

        let mut mine = Work::new("Mine");
        mine.pseud_ids.push(pseud.id);
        store.create_work(&mine).await.unwrap();
        let theirs = Work::new("Theirs");
        store.create_work(&theirs).await.unwrap();

        let owned = store
            .works_owned_by(owner, &[mine.id, theirs.id])
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, mine.id);

        assert!(store
            .works_owned_by(stranger, &[mine.id])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn empty_id_list_selects_no_works() {
        let store = memory_store().await;
        let owner = Uuid::new_v4();
        let pseud = seeded_pseud(owner, "author");
        store.create_pseud(&pseud).await.unwrap();

        let mut work = Work::new("Catalog");
        work.pseud_ids.push(pseud.id);
        store.create_work(&work).await.unwrap();

        // No ids means no works, not the user's whole catalog
        assert!(store.works_owned_by(owner, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn moderated_membership_starts_pending_on_collection_side() {
        let store = memory_store().await;
        let collection = Collection {
            id: Uuid::new_v4(),
            name: "yuletide".to_string(),
            title: "Yuletide".to_string(),
            moderated: true,
        };
        store.create_collection(&collection).await.unwrap();

        let mut work = Work::new("Gift");
        work.collection_ids.push(collection.id);
        store.create_work(&work).await.unwrap();

        let items = store.collection_items_for_work(work.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].user_approval, Approval::Approved);
        assert_eq!(items[0].collection_approval, Approval::Pending);
    }

    #[tokio::test]
    async fn blank_chapter_content_fails_validation() {
        let store = memory_store().await;
        let chapter = Chapter::new(Uuid::new_v4(), 1, "  ");
        let err = store.save_chapter(&chapter).await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "content"));
    }
}
