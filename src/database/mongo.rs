//! MongoDB storage collaborator.

use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions, ReplaceOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info, warn};

use super::filter::Filter;
use super::models::{CacheEntry, EntryMetadata, NEVER_EXPIRES};
use super::store::DocumentStore;
use crate::error::{CacheError, Result};

/// Cache collection handle.
///
/// The collection is resolved once at construction and held explicitly;
/// cloning shares the driver's connection pool.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Option<Client>,
    collection: Collection<CacheEntry>,
}

impl MongoStore {
    /// Connect to MongoDB and bind the cache collection.
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection string
    /// * `db_name` - Database holding the collection
    /// * `collection` - Collection used to store cache entries
    ///
    /// # Errors
    /// Returns a validation error for empty names, or a collaborator error
    /// if the connection or the ping fails.
    pub async fn connect(uri: &str, db_name: &str, collection: &str) -> Result<Self> {
        if db_name.trim().is_empty() {
            return Err(CacheError::validation("database name has to be set"));
        }
        if collection.trim().is_empty() {
            return Err(CacheError::validation("collection has to be set"));
        }

        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Connected to MongoDB, cache collection {}.{}", db_name, collection);

        let collection = client.database(db_name).collection(collection);

        Ok(Self {
            client: Some(client),
            collection,
        })
    }

    /// Wrap an existing collection handle.
    pub fn from_collection(collection: Collection<CacheEntry>) -> Self {
        Self {
            client: None,
            collection,
        }
    }

    /// Get a reference to the underlying client, if this store created it.
    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn collection(&self) -> &Collection<CacheEntry> {
        &self.collection
    }

    /// Create the indexes tag and expiry queries rely on.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let indexes = vec![
            IndexModel::builder().keys(doc! { "tags": 1 }).build(),
            IndexModel::builder().keys(doc! { "expire": 1 }).build(),
        ];
        self.collection.create_indexes(indexes).await?;
        debug!("Ensured indexes on {}", self.collection.name());
        Ok(())
    }

    fn raw(&self) -> Collection<Document> {
        self.collection.clone_with_type()
    }
}

/// Single-statement update that extends a finite expiry and leaves
/// immortal entries at `NEVER_EXPIRES`.
fn extend_expire_pipeline(extra: i64, mtime: i64) -> Vec<Document> {
    vec![doc! {
        "$set": {
            "mtime": mtime,
            "expire": {
                "$cond": [
                    { "$eq": ["$expire", NEVER_EXPIRES] },
                    NEVER_EXPIRES,
                    { "$add": ["$expire", extra] },
                ]
            },
        }
    }]
}

fn set_expire_update(expire: i64, mtime: i64) -> Document {
    doc! { "$set": { "expire": expire, "mtime": mtime } }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(&self, filter: &Filter) -> Result<Option<CacheEntry>> {
        Ok(self.collection.find_one(filter.to_document()).await?)
    }

    async fn find_ids(&self, filter: &Filter) -> Result<Vec<String>> {
        let options = FindOptions::builder().projection(doc! { "_id": 1 }).build();

        let mut cursor = self
            .raw()
            .find(filter.to_document())
            .with_options(options)
            .await?;
        let mut ids = Vec::new();

        while let Some(result) = cursor.next().await {
            let doc = result?;
            match doc.get_str("_id") {
                Ok(id) => ids.push(id.to_string()),
                Err(_) => warn!(
                    "Skipping cache document with non-string _id: {:?}",
                    doc.get("_id")
                ),
            }
        }
        Ok(ids)
    }

    async fn find_metadata(&self, id: &str) -> Result<Option<EntryMetadata>> {
        let options = FindOneOptions::builder()
            .projection(doc! { "tags": 1, "mtime": 1, "expire": 1 })
            .build();

        Ok(self
            .collection
            .clone_with_type::<EntryMetadata>()
            .find_one(doc! { "_id": id })
            .with_options(options)
            .await?)
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(doc! { "_id": entry.id.as_str() }, entry)
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64> {
        let result = self.collection.delete_many(filter.to_document()).await?;
        Ok(result.deleted_count)
    }

    async fn distinct_tags(&self) -> Result<Vec<String>> {
        let values = self.collection.distinct("tags", Document::new()).await?;
        Ok(values
            .into_iter()
            .filter_map(|value| match value {
                Bson::String(tag) => Some(tag),
                _ => None,
            })
            .collect())
    }

    async fn extend_expire(&self, id: &str, extra: i64, mtime: i64) -> Result<bool> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, extend_expire_pipeline(extra, mtime))
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn set_expire(&self, id: &str, expire: i64, mtime: i64) -> Result<bool> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, set_expire_update(expire, mtime))
            .await?;
        Ok(result.matched_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_expire_pipeline_keeps_immortal() {
        let pipeline = extend_expire_pipeline(100, 42);

        assert_eq!(pipeline.len(), 1);
        let set = pipeline[0].get_document("$set").unwrap();
        assert_eq!(set.get_i64("mtime").unwrap(), 42);
        assert_eq!(
            set.get_document("expire").unwrap(),
            &doc! {
                "$cond": [
                    { "$eq": ["$expire", 0_i64] },
                    0_i64,
                    { "$add": ["$expire", 100_i64] },
                ]
            }
        );
    }

    #[test]
    fn test_set_expire_update_touches_only_timestamps() {
        assert_eq!(
            set_expire_update(7, 8),
            doc! { "$set": { "expire": 7_i64, "mtime": 8_i64 } }
        );
    }
}
