//! Scheduling engine
//!
//! Every inbound user message is dispatched once, either as a one-shot fan-out
//! to its targets or as a debate. All state for a dispatch lives in the call
//! itself; concurrent dispatches share only the log and the hub.

mod debate;
mod prompts;

use crate::command::{self, Dispatch, OneShotRequest};
use crate::hub::BroadcastHub;
use crate::roster::{AgentIdentity, AliasResolver, Roster, RosterError};
use crate::store::{MessageStore, StoreError};
use crate::timeline::{MessageMeta, Mode, TimelineMessage};
use crate::turn::{TurnExecutor, TurnResult};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// The war room: parser, log, executor and hub wired together
pub struct WarRoom {
    store: Arc<MessageStore>,
    resolver: Arc<AliasResolver>,
    executor: Arc<TurnExecutor>,
    hub: Arc<BroadcastHub>,
    user_name: String,
}

impl WarRoom {
    pub fn new(
        store: Arc<MessageStore>,
        resolver: Arc<AliasResolver>,
        executor: Arc<TurnExecutor>,
        hub: Arc<BroadcastHub>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            executor,
            hub,
            user_name: user_name.into(),
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Arc<AliasResolver> {
        &self.resolver
    }

    /// Handle one message typed by the human participant.
    ///
    /// Returns once every turn it triggered has finished. A failure to
    /// persist the user message aborts its dispatch.
    pub async fn handle_user_message(&self, content: &str) -> Result<(), EngineError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }

        let roster = self.resolver.resolve_aliases().await?;
        match command::parse(content, &roster) {
            Dispatch::OneShot(request) => self.run_one_shot(content, request, &roster).await?,
            Dispatch::Debate(request) => self.run_debate(content, request, &roster).await?,
        }
        Ok(())
    }

    /// Append to the log, then broadcast. Nothing is broadcast if the append fails.
    async fn post(&self, msg: TimelineMessage) -> Result<TimelineMessage, StoreError> {
        let msg = self.store.append(msg).await?;
        self.hub.message(msg.clone()).await;
        Ok(msg)
    }

    /// Like `post`, for messages whose loss should not stop the dispatch
    async fn post_logged(&self, msg: TimelineMessage) {
        let msg_id = msg.id.clone();
        if let Err(e) = self.post(msg).await {
            tracing::error!(msg_id = %msg_id, error = %e, "Failed to persist message, not broadcast");
        }
    }

    async fn run_one_shot(
        &self,
        content: &str,
        request: OneShotRequest,
        roster: &Roster,
    ) -> Result<(), StoreError> {
        let user_msg = self
            .post(
                TimelineMessage::user(&self.user_name, content)
                    .with_targets(request.targets.clone())
                    .with_meta(MessageMeta {
                        mode: Some(Mode::OneShot),
                        targets: Some(request.targets.clone()),
                        ..MessageMeta::default()
                    }),
            )
            .await?;

        tracing::info!(
            msg_id = %user_msg.id,
            targets = ?request.targets,
            explicit = request.explicit,
            "Dispatching one-shot"
        );

        let turns = request
            .targets
            .iter()
            .filter_map(|id| roster.get(id))
            .map(|agent| self.one_shot_turn(agent, content, &user_msg.id));
        join_all(turns).await;
        Ok(())
    }

    /// typing → turn → reply → done, for one agent
    async fn one_shot_turn(&self, agent: &AgentIdentity, content: &str, reply_to: &str) {
        self.hub.typing(agent).await;
        let result = self
            .executor
            .run_turn(&agent.id, content, &format!("warroom-{}", agent.id))
            .await;
        self.publish_reply(agent, result, |msg| msg.with_reply_to(reply_to))
            .await;
    }

    /// Append an agent's turn result and clear its typing indicator.
    async fn publish_reply(
        &self,
        agent: &AgentIdentity,
        result: TurnResult,
        tag: impl FnOnce(TimelineMessage) -> TimelineMessage,
    ) {
        if let Some(failure) = result.failure.as_ref().filter(|f| f.is_transport()) {
            self.hub.error(&agent.id, failure.to_string()).await;
        }
        let reply = tag(TimelineMessage::agent(agent, result.text).with_stats(Some(result.stats)));
        self.post_logged(reply).await;
        self.hub.done(&agent.id).await;
    }
}
