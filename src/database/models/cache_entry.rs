//! Cache entry documents (stored in the configured cache collection).

use mongodb::bson::Binary;
use mongodb::bson::spec::BinarySubtype;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `expire` value of an entry that never expires.
pub const NEVER_EXPIRES: i64 = 0;

/// A single cached record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache id, the document primary key
    #[serde(rename = "_id")]
    pub id: String,

    /// Opaque payload, stored as BSON binary
    #[serde(with = "binary_content")]
    pub content: Vec<u8>,

    /// Last write time (unix seconds)
    pub mtime: i64,

    /// Expiry time (unix seconds), or `NEVER_EXPIRES`
    pub expire: i64,

    /// Tags attached to this entry
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CacheEntry {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<Vec<u8>>,
        tags: Vec<String>,
        mtime: i64,
        expire: i64,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            mtime,
            expire,
            tags,
        }
    }

    pub fn is_immortal(&self) -> bool {
        self.expire == NEVER_EXPIRES
    }

    /// Readable without bypassing validity: immortal or not yet expired.
    pub fn is_live(&self, now: i64) -> bool {
        self.is_immortal() || self.expire > now
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            tags: self.tags.clone(),
            mtime: self.mtime,
            expire: self.expire,
        }
    }
}

/// Projection of an entry without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    pub mtime: i64,
    pub expire: i64,
}

mod binary_content {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.to_vec(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Binary::deserialize(deserializer).map(|binary| binary.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, Bson};

    #[test]
    fn test_entry_document_shape() {
        let entry = CacheEntry::new("k", b"v".to_vec(), vec!["a".into()], 10, 0);
        let doc = bson::to_document(&entry).unwrap();

        assert_eq!(doc.get_str("_id").unwrap(), "k");
        assert_eq!(doc.get_i64("expire").unwrap(), 0);
        assert!(matches!(doc.get("content"), Some(Bson::Binary(_))));

        let back: CacheEntry = bson::from_document(doc).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_liveness() {
        let immortal = CacheEntry::new("a", Vec::new(), vec![], 1, NEVER_EXPIRES);
        let finite = CacheEntry::new("b", Vec::new(), vec![], 1, 100);

        assert!(immortal.is_live(i64::MAX));
        assert!(finite.is_live(99));
        assert!(!finite.is_live(100));
    }
}
