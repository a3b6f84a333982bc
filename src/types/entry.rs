//! Cache entries and answers.

use serde::{Deserialize, Serialize};

/// Opaque handle to a blob stored in the object store (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHandle(pub String);

impl ObjectHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A stored answer: either a plain string or a reference into the object
/// store, used when the answer's declared type is not a string (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Answer {
    Str(String),
    Handle {
        handle: ObjectHandle,
        answer_type: String,
    },
}

impl Answer {
    /// The answer as a plain string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Answer::Str(s) => Some(s),
            Answer::Handle { .. } => None,
        }
    }

    /// The declared answer type tag stored alongside non-string answers.
    /// `"str"` for plain string answers.
    pub fn answer_type(&self) -> &str {
        match self {
            Answer::Str(_) => "str",
            Answer::Handle { answer_type, .. } => answer_type,
        }
    }
}

/// The id the scalar store assigns to a newly inserted row (§3 invariant 4).
///
/// Opaque to every component but the scalar store that generates it; modeled
/// as `i64` to match the default SQLite `INTEGER PRIMARY KEY AUTOINCREMENT`
/// backend (§4.3), but callers should not assume contiguity or any other
/// structure.
pub type EntryId = i64;

/// A live cache entry, as persisted by the scalar store and mirrored (for
/// live, non-soft-deleted entries) into the vector index and, lazily, the
/// in-memory tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: EntryId,
    /// The exact pre-processed text that was embedded (§3).
    pub prompt: String,
    pub answer: Answer,
    /// Normalised model scope this entry belongs to.
    pub model: String,
    pub embedding: Vec<f32>,
    pub hit_count: u64,
    pub deleted: bool,
}

impl CacheEntry {
    /// Size in bytes of `embedding` serialised as a little-endian float32
    /// buffer, per the persisted-layout contract (§6): `4 * dim`.
    pub fn embedding_byte_len(&self) -> usize {
        4 * self.embedding.len()
    }

    /// Serialise `embedding` to the persisted little-endian float32 buffer.
    pub fn embedding_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.embedding_byte_len());
        for v in &self.embedding {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Deserialise a little-endian float32 buffer into embedding values.
    pub fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_bytes_roundtrip() {
        let entry = CacheEntry {
            id: 1,
            prompt: "p".into(),
            answer: Answer::Str("a".into()),
            model: "m".into(),
            embedding: vec![1.0, -2.5, 0.0, 3.25],
            hit_count: 0,
            deleted: false,
        };
        let bytes = entry.embedding_bytes();
        assert_eq!(bytes.len(), entry.embedding_byte_len());
        let back = CacheEntry::embedding_from_bytes(&bytes);
        assert_eq!(back, entry.embedding);
    }

    #[test]
    fn answer_type_tag() {
        assert_eq!(Answer::Str("x".into()).answer_type(), "str");
        assert_eq!(
            Answer::Handle {
                handle: ObjectHandle::new("h1"),
                answer_type: "image/png".into(),
            }
            .answer_type(),
            "image/png"
        );
    }
}
