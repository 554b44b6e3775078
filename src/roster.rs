//! Agent roster and alias resolution
//!
//! The roster source is comparatively expensive to read, so the resolver
//! keeps the last roster for a fixed TTL and recomputes on the first access
//! after expiry.

mod source;

pub use source::{ConfigRosterSource, RosterError, RosterSource};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A known agent and the tokens it answers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub aliases: Vec<String>,
}

impl AgentIdentity {
    /// Identity whose aliases are the id and the lowercased display name
    pub fn new(id: impl Into<String>, name: impl Into<String>, emoji: impl Into<String>) -> Self {
        let id = id.into();
        let name = name.into();
        let mut aliases = vec![id.clone()];
        push_alias(&mut aliases, &name);
        Self {
            id,
            name,
            emoji: emoji.into(),
            aliases,
        }
    }

    pub fn matches(&self, token: &str) -> bool {
        let token = token.to_lowercase();
        self.aliases.iter().any(|a| a.to_lowercase() == token)
    }

    /// `"🦞 Claw"` style label used in prompts and announcements
    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.name)
    }
}

pub(crate) fn push_alias(aliases: &mut Vec<String>, alias: &str) {
    let alias = alias.trim().to_lowercase();
    if !alias.is_empty() && !aliases.iter().any(|a| a.to_lowercase() == alias) {
        aliases.push(alias);
    }
}

/// Snapshot of the roster, in source order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Arc<Vec<AgentIdentity>>,
}

impl Roster {
    pub fn new(agents: Vec<AgentIdentity>) -> Self {
        Self {
            agents: Arc::new(agents),
        }
    }

    pub fn agents(&self) -> &[AgentIdentity] {
        &self.agents
    }

    pub fn ids(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&AgentIdentity> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Case-insensitive exact match of a bare token against every alias set.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| a.matches(token))
            .map(|a| a.id.as_str())
    }
}

struct CachedRoster {
    data: Roster,
    expires_at: Instant,
}

/// Roster cache in front of a `RosterSource`
pub struct AliasResolver {
    source: Arc<dyn RosterSource>,
    ttl: Duration,
    cache: Mutex<Option<CachedRoster>>,
}

impl AliasResolver {
    pub fn new(source: Arc<dyn RosterSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Current roster, recomputed from the source once the cache has expired.
    pub async fn resolve_aliases(&self) -> Result<Roster, RosterError> {
        let mut cache = self.cache.lock().await;
        let now = Instant::now();

        if let Some(cached) = cache.as_ref() {
            if now < cached.expires_at {
                return Ok(cached.data.clone());
            }
        }

        let agents = self.source.load().await?;
        tracing::debug!(agents = agents.len(), "Roster reloaded");
        let data = Roster::new(agents);
        *cache = Some(CachedRoster {
            data: data.clone(),
            expires_at: now + self.ttl,
        });
        Ok(data)
    }
}
