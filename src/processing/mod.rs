//! C8: pre- and post-processors (§4.8).
//!
//! Pre-processors turn a request [`crate::types::Prompt`] into the exact
//! string that gets embedded and stored as a [`crate::types::CacheEntry::prompt`].
//! Ported from the reference implementation's handful of prompt-flattening
//! strategies.

use crate::types::{ChatTurn, Prompt, Role};

/// Which pre-processing strategy a model scope is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreProcessor {
    /// Embed only the last turn's content, dropping role and history.
    LastContent,
    /// Embed `"{role}: {content}"` of the last turn.
    RoleAndLastContent,
    /// Embed every turn, newline-joined, in order.
    AllContent,
    /// Embed a role-tagged, order-preserving splice of every turn, using a
    /// delimiter scheme that a corresponding `multi_analysis` parse can
    /// invert (used when downstream consumers need the structured turns
    /// back, not just a flattened string).
    MultiSplicing,
}

impl PreProcessor {
    pub fn apply(&self, prompt: &Prompt) -> String {
        match self {
            PreProcessor::LastContent => last_content(prompt),
            PreProcessor::RoleAndLastContent => role_and_last_content(prompt),
            PreProcessor::AllContent => all_content(prompt),
            PreProcessor::MultiSplicing => multi_splicing(prompt),
        }
    }
}

fn last_turn(prompt: &Prompt) -> Option<&ChatTurn> {
    match prompt {
        Prompt::Conversation(turns) => turns.last(),
        Prompt::Plain(_) => None,
    }
}

fn last_content(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Plain(s) => s.clone(),
        Prompt::Conversation(_) => last_turn(prompt).map(|t| t.content.clone()).unwrap_or_default(),
    }
}

fn role_and_last_content(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Plain(s) => s.clone(),
        Prompt::Conversation(_) => last_turn(prompt)
            .map(|t| format!("{}: {}", t.role.as_str(), t.content))
            .unwrap_or_default(),
    }
}

fn all_content(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Plain(s) => s.clone(),
        Prompt::Conversation(turns) => turns
            .iter()
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn multi_splicing(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Plain(s) => s.clone(),
        Prompt::Conversation(turns) => {
            let joined = turns
                .iter()
                .map(|t| format!("{}###{}", t.role.as_str(), t.content))
                .collect::<Vec<_>>()
                .join("|||");
            joined
        }
    }
}

/// Invert [`multi_splicing`]'s encoding back into turns. Malformed segments
/// (no `###` separator) are dropped rather than erroring, matching the
/// reference parser's tolerant behaviour.
pub fn multi_analysis(spliced: &str) -> Vec<ChatTurn> {
    spliced
        .split("|||")
        .filter_map(|segment| {
            let (role, content) = segment.split_once("###")?;
            let role = match role {
                "system" => Role::System,
                "assistant" => Role::Assistant,
                _ => Role::User,
            };
            Some(ChatTurn::new(role, content))
        })
        .collect()
}

/// Pick the highest-ranked item from a list already sorted by descending
/// rank, matching the reference `first` post-processor.
pub fn first<T: Clone>(ranked_desc: &[T]) -> Option<T> {
    ranked_desc.first().cloned()
}
