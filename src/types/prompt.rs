//! Prompt representation and pre-processor inputs.

use serde::{Deserialize, Serialize};

/// Role of a message participant in a structured conversation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// The lowercase string form used by the `role+last-content` pre-processor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a structured conversation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The kind of out-of-band payload a [`PromptDependency`] refers to.
///
/// Mirrors the original implementation's dependent-data handling (e.g. an
/// image URL attached to a question) without performing any remote fetch —
/// fetching third-party URLs is outside this crate's scope. A caller that
/// has already resolved a dependency to bytes can route it through the
/// object store directly and attach the resulting handle here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    ImageUrl,
    Other(String),
}

/// A dependent payload attached to a prompt (e.g. an image alongside a
/// text question). Not populated by any code path in this crate today —
/// see `SPEC_FULL.md`'s "Supplemented features" note — but part of the
/// public `Prompt` shape so a caller or a future multimodal variant has
/// somewhere to put it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDependency {
    pub kind: DependencyKind,
    pub handle: crate::types::ObjectHandle,
}

/// A request prompt: either a plain string or a structured conversation.
///
/// Pre-processors (see [`crate::processing`]) serialise either form into
/// the exact string that is embedded and stored as [`crate::types::CacheEntry::prompt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Plain(String),
    Conversation(Vec<ChatTurn>),
}

impl Prompt {
    /// Dependent payloads attached to this prompt, if any.
    pub fn deps(&self) -> Option<&[PromptDependency]> {
        None
    }
}
