//! Timeline data model
//!
//! A `TimelineMessage` is immutable once appended to the log. The JSON shape
//! here is the persisted line format and the `message` payload on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a timeline entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sender {
    User {
        name: String,
    },
    Agent {
        id: String,
        name: String,
        emoji: String,
    },
    System,
}

/// Scheduling mode a user message was dispatched with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    OneShot,
    Debate,
}

/// Structured annotation on a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<bool>,
}

/// Token counts reported by an agent run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Per-turn statistics attached to agent replies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStats {
    /// Wall clock measured by the executor
    pub elapsed_ms: u64,
    /// Run time the agent reported for itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// A single entry of the shared history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineMessage {
    pub id: String,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MessageMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<TurnStats>,
}

impl TimelineMessage {
    fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            sender,
            content: content.into(),
            targets: None,
            reply_to: None,
            thread_id: None,
            round: None,
            meta: None,
            stats: None,
        }
    }

    pub fn user(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Sender::User { name: name.into() }, content)
    }

    pub fn agent(agent: &crate::roster::AgentIdentity, content: impl Into<String>) -> Self {
        Self::new(
            Sender::Agent {
                id: agent.id.clone(),
                name: agent.name.clone(),
                emoji: agent.emoji.clone(),
            },
            content,
        )
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Sender::System, content)
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn with_reply_to(mut self, id: impl Into<String>) -> Self {
        self.reply_to = Some(id.into());
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_round(mut self, round: i32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_meta(mut self, meta: MessageMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_stats(mut self, stats: Option<TurnStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Agent id of the author, if an agent wrote this
    #[cfg(test)]
    pub fn agent_id(&self) -> Option<&str> {
        match &self.sender {
            Sender::Agent { id, .. } => Some(id),
            _ => None,
        }
    }
}
