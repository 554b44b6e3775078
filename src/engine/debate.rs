//! Debate state machine
//!
//! `Starting → Round(0) → Round(1..=N) → Synthesis? → Complete`. Every
//! announcement is an ordinary system message tagged with the thread id, so
//! the whole debate can be rebuilt by replaying the log.

use super::prompts::{relay_prompt, synthesis_prompt};
use super::WarRoom;
use crate::command::DebateRequest;
use crate::roster::{AgentIdentity, Roster};
use crate::store::StoreError;
use crate::timeline::{MessageMeta, Mode, TimelineMessage};
use futures::future::join_all;
use std::collections::HashMap;

const NEED_QUORUM: &str = "Debate requires at least 2 agents.";
const COMPLETE: &str = "⚔️ Debate complete.";
/// Round tag of the opening announcement
const OPENING_ROUND: i32 = -1;

/// Where a debate is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebatePhase {
    Starting,
    Round(i32),
    Synthesis,
    Complete,
}

impl DebatePhase {
    /// Pure transition: the phase after this one
    pub fn next(self, rounds: i32, synthesize: bool) -> Self {
        match self {
            Self::Starting => Self::Round(0),
            Self::Round(r) if r < rounds => Self::Round(r + 1),
            Self::Round(_) if synthesize => Self::Synthesis,
            Self::Round(_) | Self::Synthesis | Self::Complete => Self::Complete,
        }
    }
}

/// Ephemeral state of one running debate
#[derive(Debug, Clone)]
pub struct DebateSession {
    pub thread_id: String,
    /// Id of the user message that opened the debate
    pub opened_by: String,
    pub participants: Vec<AgentIdentity>,
    /// Rebuttal rounds after round 0, as scheduled
    pub rounds: i32,
    pub synthesize: bool,
    pub moderator: AgentIdentity,
    pub prompt: String,
    /// Response per agent id from the last joined round; absent if that turn failed
    pub last_responses: HashMap<String, String>,
}

impl DebateSession {
    fn session_id(&self, agent_id: &str) -> String {
        format!("warroom-debate-{}-{agent_id}", self.thread_id)
    }

    fn synthesis_round(&self) -> i32 {
        self.rounds + 1
    }

    fn system(&self, content: impl Into<String>) -> TimelineMessage {
        TimelineMessage::system(content).with_thread(&self.thread_id)
    }

    fn opening_announcement(&self) -> String {
        let names: Vec<String> = self.participants.iter().map(AgentIdentity::label).collect();
        let closing = if self.synthesize {
            format!("synthesis by {}", self.moderator.label())
        } else {
            "no synthesis".to_string()
        };
        format!(
            "⚔️ Debate started: {} · {} rebuttal round{} · {closing}",
            names.join(" vs "),
            self.rounds,
            if self.rounds == 1 { "" } else { "s" },
        )
    }
}

impl WarRoom {
    pub(super) async fn run_debate(
        &self,
        content: &str,
        request: DebateRequest,
        roster: &Roster,
    ) -> Result<(), StoreError> {
        let thread_id = uuid::Uuid::new_v4().to_string();
        let user_msg = self
            .post(
                TimelineMessage::user(&self.user_name, content)
                    .with_targets(request.participants.clone())
                    .with_thread(&thread_id)
                    .with_meta(MessageMeta {
                        mode: Some(Mode::Debate),
                        max_rounds: Some(request.rounds),
                        targets: Some(request.participants.clone()),
                        synthesis: Some(request.synthesize),
                    }),
            )
            .await?;

        let participants: Vec<AgentIdentity> = request
            .participants
            .iter()
            .filter_map(|id| roster.get(id).cloned())
            .collect();
        let moderator = request
            .moderator
            .as_deref()
            .and_then(|id| roster.get(id).cloned())
            .or_else(|| participants.first().cloned());

        let moderator = match moderator {
            Some(moderator) if request.has_quorum() && participants.len() >= 2 => moderator,
            _ => {
                tracing::info!(thread_id = %thread_id, participants = participants.len(), "Debate lacks quorum");
                self.post(TimelineMessage::system(NEED_QUORUM).with_thread(&thread_id))
                    .await?;
                return Ok(());
            }
        };

        let mut session = DebateSession {
            thread_id,
            opened_by: user_msg.id,
            participants,
            rounds: request.rounds.max(0),
            synthesize: request.synthesize,
            moderator,
            prompt: request.prompt,
            last_responses: HashMap::new(),
        };

        tracing::info!(
            thread_id = %session.thread_id,
            participants = ?request.participants,
            rounds = session.rounds,
            synthesize = session.synthesize,
            "Debate starting"
        );

        let mut phase = DebatePhase::Starting;
        loop {
            match phase {
                DebatePhase::Starting => {
                    let announcement = session
                        .system(session.opening_announcement())
                        .with_round(OPENING_ROUND);
                    self.post_logged(announcement).await;
                }
                DebatePhase::Round(round) => self.run_round(&mut session, round).await,
                DebatePhase::Synthesis => self.run_synthesis(&session).await,
                DebatePhase::Complete => {
                    self.post_logged(session.system(COMPLETE)).await;
                    break;
                }
            }
            phase = phase.next(session.rounds, session.synthesize);
        }

        tracing::info!(thread_id = %session.thread_id, "Debate complete");
        Ok(())
    }

    /// Fan out one round to every participant and join before publishing.
    async fn run_round(&self, session: &mut DebateSession, round: i32) {
        if round > 0 {
            let announcement = session
                .system(format!("— Round {round}/{} —", session.rounds))
                .with_round(round);
            self.post_logged(announcement).await;
        }

        for agent in &session.participants {
            self.hub.typing(agent).await;
        }

        let prompts: Vec<String> = session
            .participants
            .iter()
            .map(|agent| {
                if round == 0 {
                    session.prompt.clone()
                } else {
                    relay_prompt(
                        &session.prompt,
                        agent,
                        &session.participants,
                        &session.last_responses,
                    )
                }
            })
            .collect();

        let turns = session
            .participants
            .iter()
            .zip(&prompts)
            .map(|(agent, prompt)| {
                let session_id = session.session_id(&agent.id);
                async move { self.executor.run_turn(&agent.id, prompt, &session_id).await }
            });
        let results = join_all(turns).await;

        tracing::debug!(thread_id = %session.thread_id, round, "Round joined");

        for (agent, result) in session.participants.iter().zip(results) {
            // A failed turn leaves no position for this round
            if result.is_ok() {
                session
                    .last_responses
                    .insert(agent.id.clone(), result.text.clone());
            } else {
                session.last_responses.remove(&agent.id);
            }
            let thread_id = session.thread_id.clone();
            let opened_by = session.opened_by.clone();
            self.publish_reply(agent, result, move |msg| {
                msg.with_thread(thread_id)
                    .with_round(round)
                    .with_reply_to(opened_by)
            })
            .await;
        }
    }

    async fn run_synthesis(&self, session: &DebateSession) {
        let moderator = &session.moderator;
        let round = session.synthesis_round();

        let announcement = session
            .system(format!("— Synthesis by {} —", moderator.label()))
            .with_round(round);
        self.post_logged(announcement).await;

        self.hub.typing(moderator).await;
        let prompt = synthesis_prompt(
            &session.prompt,
            &session.participants,
            &session.last_responses,
        );
        let result = self
            .executor
            .run_turn(&moderator.id, &prompt, &session.session_id(&moderator.id))
            .await;

        let thread_id = session.thread_id.clone();
        let opened_by = session.opened_by.clone();
        self.publish_reply(moderator, result, move |msg| {
            msg.with_thread(thread_id)
                .with_round(round)
                .with_reply_to(opened_by)
                .with_meta(MessageMeta {
                    mode: Some(Mode::Debate),
                    synthesis: Some(true),
                    ..MessageMeta::default()
                })
        })
        .await;
    }
}
