//! Broadcast hub for connected viewers
//!
//! Each viewer owns a bounded outbound queue. Broadcasts use `try_send` so a
//! stalled viewer only loses frames itself and never holds up the others.

use crate::roster::{AgentIdentity, AliasResolver};
use crate::store::MessageStore;
use crate::timeline::TimelineMessage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;

/// Outbound queue depth per viewer
const QUEUE_CAPACITY: usize = 256;

pub type ConnectionId = uuid::Uuid;

/// Server to client frames on the real-time channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    History {
        messages: Vec<TimelineMessage>,
    },
    Agents {
        agents: Vec<AgentIdentity>,
    },
    Message {
        message: TimelineMessage,
    },
    Typing {
        #[serde(rename = "agentId")]
        agent_id: String,
        name: String,
        emoji: String,
    },
    Done {
        #[serde(rename = "agentId")]
        agent_id: String,
    },
    Error {
        #[serde(rename = "agentId")]
        agent_id: String,
        error: String,
    },
}

impl ServerFrame {
    pub fn typing(agent: &AgentIdentity) -> Self {
        Self::Typing {
            agent_id: agent.id.clone(),
            name: agent.name.clone(),
            emoji: agent.emoji.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::History { .. } => "history",
            Self::Agents { .. } => "agents",
            Self::Message { .. } => "message",
            Self::Typing { .. } => "typing",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

/// A joined viewer: drain `rx` to deliver frames
pub struct Connection {
    pub id: ConnectionId,
    pub rx: mpsc::Receiver<ServerFrame>,
}

/// Set of connected viewers
pub struct BroadcastHub {
    store: Arc<MessageStore>,
    resolver: Arc<AliasResolver>,
    history_limit: usize,
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerFrame>>>,
}

impl BroadcastHub {
    pub fn new(store: Arc<MessageStore>, resolver: Arc<AliasResolver>, history_limit: usize) -> Self {
        Self {
            store,
            resolver,
            history_limit,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a viewer. Its queue starts with the history and roster frames.
    pub async fn join(&self) -> Connection {
        let id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        let agents = match self.resolver.resolve_aliases().await {
            Ok(roster) => roster.agents().to_vec(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load roster for new viewer");
                Vec::new()
            }
        };

        // Broadcasts wait while history is read, so nothing appended after the
        // read can be missed. Entries appended before it may arrive twice.
        let mut connections = self.connections.write().await;

        let messages = self
            .store
            .load_history(self.history_limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load history for new viewer");
                Vec::new()
            });

        let _ = tx.try_send(ServerFrame::History { messages });
        let _ = tx.try_send(ServerFrame::Agents { agents });
        connections.insert(id, tx);

        tracing::info!(connection_id = %id, viewers = connections.len(), "Viewer joined");
        Connection { id, rx }
    }

    pub async fn leave(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if connections.remove(&id).is_some() {
            tracing::info!(connection_id = %id, viewers = connections.len(), "Viewer left");
        }
    }

    #[cfg(test)]
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Best-effort fan-out to every joined viewer.
    pub async fn broadcast(&self, frame: ServerFrame) {
        let mut closed = Vec::new();
        {
            let connections = self.connections.read().await;
            for (id, tx) in connections.iter() {
                match tx.try_send(frame.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::debug!(connection_id = %id, kind = frame.kind(), "Viewer queue full, frame dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut connections = self.connections.write().await;
            for id in closed {
                connections.remove(&id);
                tracing::debug!(connection_id = %id, "Removed closed viewer");
            }
        }
    }

    pub async fn message(&self, message: TimelineMessage) {
        self.broadcast(ServerFrame::Message { message }).await;
    }

    pub async fn typing(&self, agent: &AgentIdentity) {
        self.broadcast(ServerFrame::typing(agent)).await;
    }

    pub async fn done(&self, agent_id: &str) {
        self.broadcast(ServerFrame::Done {
            agent_id: agent_id.to_string(),
        })
        .await;
    }

    pub async fn error(&self, agent_id: &str, error: impl Into<String>) {
        self.broadcast(ServerFrame::Error {
            agent_id: agent_id.to_string(),
            error: error.into(),
        })
        .await;
    }
}
