//! Request/response envelopes (§6).
//!
//! Modeled as a tagged request enum and a fixed response record per the
//! Design Notes' "dynamic typing and ad-hoc dicts" guidance: the target must
//! define explicit variants instead of propagating the source's schemaless
//! request dicts.

use serde::{Deserialize, Serialize};

use crate::types::{EntryId, Prompt};

/// The model scope a request targets. Normalised at ingress (§3 invariant 5)
/// by [`crate::types::normalize_model_name`]; everything downstream of the
/// adapter sees the normalised form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub model: String,
}

/// One `(query, answer)` pair submitted to `insert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInfoPair {
    pub query: Prompt,
    pub answer: AnswerInput,
}

/// The answer half of an insert pair, as submitted by the caller.
///
/// A plain string is stored directly; anything else is routed through the
/// object store (§4.4) and replaced with a handle before being persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerInput {
    Str(String),
    Typed {
        /// Raw bytes (base64 in JSON transport) of the non-string answer.
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
        answer_type: String,
    },
}

mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        let encoded = encode(bytes);
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        decode(&s).map_err(serde::de::Error::custom)
    }

    const TABLE: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    fn encode(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
        for chunk in bytes.chunks(3) {
            let b = [
                chunk[0],
                *chunk.get(1).unwrap_or(&0),
                *chunk.get(2).unwrap_or(&0),
            ];
            let n = (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32;
            out.push(TABLE[(n >> 18 & 0x3f) as usize] as char);
            out.push(TABLE[(n >> 12 & 0x3f) as usize] as char);
            out.push(if chunk.len() > 1 {
                TABLE[(n >> 6 & 0x3f) as usize] as char
            } else {
                '='
            });
            out.push(if chunk.len() > 2 {
                TABLE[(n & 0x3f) as usize] as char
            } else {
                '='
            });
        }
        out
    }

    fn decode(s: &str) -> Result<Vec<u8>, String> {
        fn val(c: u8) -> Result<u32, String> {
            match c {
                b'A'..=b'Z' => Ok((c - b'A') as u32),
                b'a'..=b'z' => Ok((c - b'a' + 26) as u32),
                b'0'..=b'9' => Ok((c - b'0' + 52) as u32),
                b'+' => Ok(62),
                b'/' => Ok(63),
                _ => Err(format!("invalid base64 byte: {c}")),
            }
        }
        let s = s.trim_end_matches('=');
        let bytes = s.as_bytes();
        let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
        for chunk in bytes.chunks(4) {
            let mut n = 0u32;
            for (i, &c) in chunk.iter().enumerate() {
                n |= val(c)? << (18 - i * 6);
            }
            out.push((n >> 16 & 0xff) as u8);
            if chunk.len() > 2 {
                out.push((n >> 8 & 0xff) as u8);
            }
            if chunk.len() > 3 {
                out.push((n & 0xff) as u8);
            }
        }
        Ok(out)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn roundtrip() {
            for input in [b"".as_slice(), b"f", b"fo", b"foo", b"foob", b"fooba", b"foobar"] {
                let encoded = encode(input);
                let decoded = decode(&encoded).unwrap();
                assert_eq!(decoded, input, "roundtrip failed for {input:?}");
            }
        }
    }
}

/// How `remove` should select the entries to drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveType {
    DeleteById,
    TruncateByModel,
}

/// The tagged request envelope (§6). Unknown `type` values fail to
/// deserialize at the transport boundary; an adapter-level unknown-type
/// check (error code 102) additionally guards any constructed-in-code
/// request that bypasses JSON (e.g. from a future transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheRequest {
    Query {
        scope: Scope,
        query: Prompt,
        #[serde(skip_serializing_if = "Option::is_none")]
        top_k: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_factor: Option<f32>,
    },
    Insert {
        scope: Scope,
        chat_info: Vec<ChatInfoPair>,
    },
    Remove {
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<Scope>,
        remove_type: RemoveType,
        #[serde(skip_serializing_if = "Option::is_none")]
        id_list: Option<Vec<EntryId>>,
    },
    Register {
        scope: Scope,
    },
}

/// The fixed response envelope (§6). Field names and casing follow the
/// external interface contract verbatim (the JSON wire shape mixes
/// camelCase and snake_case by contract, not by accident).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheResponse {
    #[serde(rename = "errorCode")]
    pub error_code: u32,
    #[serde(rename = "errorDesc")]
    pub error_desc: String,
    #[serde(rename = "cacheHit", skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(rename = "writeStatus", skip_serializing_if = "Option::is_none")]
    pub write_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl CacheResponse {
    pub fn ok() -> Self {
        Self {
            error_code: 0,
            error_desc: String::new(),
            cache_hit: None,
            delta_time: None,
            hit_query: None,
            answer: None,
            write_status: None,
            response: None,
        }
    }

    pub fn error(code: u32, desc: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_desc: desc.into(),
            ..Self::ok()
        }
    }

    pub fn from_error(err: &crate::CacheError) -> Self {
        Self::error(err.error_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_roundtrips() {
        let req = CacheRequest::Query {
            scope: Scope { model: "gpt_4".into() },
            query: Prompt::Plain("hello".into()),
            top_k: Some(5),
            cache_factor: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"query\""));
        let back: CacheRequest = serde_json::from_str(&json).unwrap();
        matches!(back, CacheRequest::Query { .. });
    }

    #[test]
    fn response_omits_absent_optional_fields() {
        let resp = CacheResponse::ok();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("cacheHit"));
        assert!(json.contains("\"errorCode\":0"));
    }
}
