//! Turn executor
//!
//! Runs one agent for one prompt under a wall-clock deadline. Failures never
//! escape as errors: every outcome is a `TurnResult` whose text can be shown
//! in the timeline.

mod response;
mod runner;

use response::NormalizedOutput;
#[cfg(test)]
pub use runner::RunOutput;
pub use runner::{AgentRunner, CommandRunner};

use crate::timeline::TurnStats;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, Instant};

/// Placeholder shown when an agent exits cleanly but says nothing
const EMPTY_RESPONSE: &str = "(no response)";

/// Why a turn did not produce a normal reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnFailure {
    #[error("Agent timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("Failed to start agent: {0}")]
    Spawn(String),
    #[error("Agent exited with code {0}")]
    Exit(i32),
}

impl TurnFailure {
    /// Failures where the agent never produced output of its own
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Spawn(_))
    }
}

/// Outcome of a single turn
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Reply text, or a diagnostic when `failure` is set
    pub text: String,
    pub failure: Option<TurnFailure>,
    pub stats: TurnStats,
}

impl TurnResult {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    fn failed(failure: TurnFailure, text: String, elapsed_ms: u64) -> Self {
        Self {
            text,
            failure: Some(failure),
            stats: TurnStats {
                elapsed_ms,
                ..TurnStats::default()
            },
        }
    }
}

/// Invokes agents through an `AgentRunner` with a fixed deadline
pub struct TurnExecutor {
    runner: Arc<dyn AgentRunner>,
    deadline: Duration,
}

impl TurnExecutor {
    pub fn new(runner: Arc<dyn AgentRunner>, deadline: Duration) -> Self {
        Self { runner, deadline }
    }

    pub async fn run_turn(&self, agent_id: &str, prompt: &str, session_id: &str) -> TurnResult {
        let start = Instant::now();
        let outcome = timeout(self.deadline, self.runner.run(agent_id, prompt, session_id)).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Err(_) => {
                let failure = TurnFailure::Timeout(self.deadline);
                TurnResult::failed(failure.clone(), format!("⏱️ {failure}"), elapsed_ms)
            }
            Ok(Err(e)) => {
                let failure = TurnFailure::Spawn(e.to_string());
                TurnResult::failed(failure.clone(), format!("❌ {failure}"), elapsed_ms)
            }
            Ok(Ok(output)) if output.success() => {
                let normalized = NormalizedOutput::parse(&output.stdout);
                let mut text = normalized.response.into_text();
                if text.trim().is_empty() {
                    text = EMPTY_RESPONSE.to_string();
                }
                TurnResult {
                    text,
                    failure: None,
                    stats: TurnStats {
                        elapsed_ms,
                        agent_duration_ms: normalized.duration_ms,
                        model: normalized.model,
                        usage: normalized.usage,
                    },
                }
            }
            Ok(Ok(output)) => {
                let code = output.exit_code.unwrap_or(-1);
                TurnResult::failed(TurnFailure::Exit(code), output.diagnostic(), elapsed_ms)
            }
        };

        match &result.failure {
            None => tracing::info!(
                agent_id = %agent_id,
                elapsed_ms,
                model = result.stats.model.as_deref().unwrap_or("unknown"),
                "Turn completed"
            ),
            Some(failure) => tracing::warn!(
                agent_id = %agent_id,
                elapsed_ms,
                error = %failure,
                "Turn failed"
            ),
        }

        result
    }
}
