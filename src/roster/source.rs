//! Roster source backed by the agents configuration file

use super::{push_alias, AgentIdentity};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Failed to read agents config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid agents config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where the roster comes from
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn load(&self) -> Result<Vec<AgentIdentity>, RosterError>;
}

#[derive(Debug, Default, Deserialize)]
struct AgentsConfig {
    #[serde(default)]
    agents: Option<AgentsSection>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentsSection {
    #[serde(default)]
    list: Option<Vec<AgentEntry>>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    workspace: Option<PathBuf>,
    #[serde(default)]
    identity: Option<EntryIdentity>,
}

#[derive(Debug, Default, Deserialize)]
struct EntryIdentity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    emoji: Option<String>,
}

/// Fields read from a workspace `IDENTITY.md`
#[derive(Debug, Default, PartialEq, Eq)]
struct IdentityFile {
    name: Option<String>,
    emoji: Option<String>,
}

/// Reads `agents.list` from the JSON agents config under `home`
pub struct ConfigRosterSource {
    config_path: PathBuf,
    home: PathBuf,
}

impl ConfigRosterSource {
    pub fn new(config_path: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            home: home.into(),
        }
    }

    fn workspace_dir(&self, entry: &AgentEntry) -> PathBuf {
        match &entry.workspace {
            Some(dir) => dir.clone(),
            None if entry.id == "main" => self.home.join("workspace"),
            None => self.home.join(format!("workspace-{}", entry.id)),
        }
    }

    async fn identity_for(&self, entry: AgentEntry) -> AgentIdentity {
        let file = read_identity_file(&self.workspace_dir(&entry)).await;
        let configured = entry.identity.unwrap_or_default();

        let name = non_empty(file.name)
            .or_else(|| non_empty(configured.name.clone()))
            .or_else(|| non_empty(entry.name.clone()))
            .unwrap_or_else(|| entry.id.clone());
        let emoji = non_empty(configured.emoji)
            .or(non_empty(file.emoji))
            .unwrap_or_else(|| default_emoji(&entry.id).to_string());

        let mut agent = AgentIdentity::new(entry.id, name, emoji);
        for extra in [entry.name, configured.name].into_iter().flatten() {
            push_alias(&mut agent.aliases, &extra);
        }
        agent
    }
}

#[async_trait]
impl RosterSource for ConfigRosterSource {
    async fn load(&self) -> Result<Vec<AgentIdentity>, RosterError> {
        let raw = tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|source| RosterError::Read {
                path: self.config_path.clone(),
                source,
            })?;
        let config: AgentsConfig =
            serde_json::from_str(&raw).map_err(|source| RosterError::Parse {
                path: self.config_path.clone(),
                source,
            })?;

        let entries = config
            .agents
            .and_then(|a| a.list)
            .unwrap_or_else(|| {
                vec![AgentEntry {
                    id: "main".to_string(),
                    ..AgentEntry::default()
                }]
            });

        let mut agents = Vec::with_capacity(entries.len());
        for entry in entries {
            agents.push(self.identity_for(entry).await);
        }
        Ok(agents)
    }
}

fn default_emoji(id: &str) -> &'static str {
    if id == "main" {
        "🦞"
    } else {
        "🤖"
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn read_identity_file(workspace: &Path) -> IdentityFile {
    match tokio::fs::read_to_string(workspace.join("IDENTITY.md")).await {
        Ok(raw) => parse_identity(&raw),
        Err(_) => IdentityFile::default(),
    }
}

/// `**Field:** value` lines, optionally bulleted
static FIELD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*[-*]?\s*\*\*(\w+):\*\*[ \t]*(.+)$").expect("Invalid identity regex")
});

fn identity_field(raw: &str, field: &str) -> Option<String> {
    FIELD_REGEX
        .captures_iter(raw)
        .find(|c| c[1].eq_ignore_ascii_case(field))
        .map(|c| c[2].trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_identity(raw: &str) -> IdentityFile {
    IdentityFile {
        name: identity_field(raw, "Name"),
        emoji: identity_field(raw, "Emoji"),
    }
}
