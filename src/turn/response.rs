//! Normalization of agent output encodings
//!
//! Agents answer in several shapes. Extraction precedence:
//! 1. a `payloads` array of `{text}` parts (top level or under `result`)
//! 2. a flat `text`, `message` or `content` string field
//! 3. the raw output

use crate::timeline::TokenUsage;
use serde_json::Value;

const TEXT_FIELDS: [&str; 3] = ["text", "message", "content"];

/// Known response encodings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse {
    Payloads(Vec<String>),
    Field(String),
    Raw(String),
}

impl AgentResponse {
    pub fn into_text(self) -> String {
        match self {
            Self::Payloads(parts) => parts.join("\n\n"),
            Self::Field(text) | Self::Raw(text) => text,
        }
    }
}

/// Response text plus whatever metadata the agent reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedOutput {
    pub response: AgentResponse,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub duration_ms: Option<u64>,
}

impl NormalizedOutput {
    /// Never fails: anything unrecognized is returned as raw text.
    pub fn parse(stdout: &str) -> Self {
        let raw = stdout.trim();
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return Self::raw(raw);
        };
        if !value.is_object() {
            return Self::raw(raw);
        }

        let scopes: Vec<&Value> = std::iter::once(&value)
            .chain(value.get("result").filter(|r| r.is_object()))
            .collect();

        let response = scopes
            .iter()
            .find_map(|scope| payload_parts(scope))
            .map(AgentResponse::Payloads)
            .or_else(|| scopes.iter().find_map(|scope| text_field(scope)).map(AgentResponse::Field))
            .unwrap_or_else(|| AgentResponse::Raw(raw.to_string()));

        let meta = scopes.iter().find_map(|scope| scope.get("meta"));
        let agent_meta = meta.and_then(|m| m.get("agentMeta"));

        Self {
            response,
            model: agent_meta
                .and_then(|a| a.get("model"))
                .and_then(Value::as_str)
                .map(str::to_string),
            usage: agent_meta
                .and_then(|a| a.get("usage"))
                .and_then(|u| serde_json::from_value(u.clone()).ok()),
            duration_ms: meta.and_then(|m| m.get("durationMs")).and_then(Value::as_u64),
        }
    }

    fn raw(text: &str) -> Self {
        Self {
            response: AgentResponse::Raw(text.to_string()),
            model: None,
            usage: None,
            duration_ms: None,
        }
    }
}

fn payload_parts(scope: &Value) -> Option<Vec<String>> {
    let parts: Vec<String> = scope
        .get("payloads")?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    (!parts.is_empty()).then_some(parts)
}

fn text_field(scope: &Value) -> Option<String> {
    TEXT_FIELDS.iter().find_map(|key| {
        scope
            .get(*key)
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
    })
}
