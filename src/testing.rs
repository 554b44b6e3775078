//! Test doubles for the roster source and the agent runner

use crate::engine::WarRoom;
use crate::hub::BroadcastHub;
use crate::roster::{AgentIdentity, AliasResolver, RosterError, RosterSource};
use crate::store::MessageStore;
use crate::turn::{AgentRunner, RunOutput, TurnExecutor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn sample_roster() -> Vec<AgentIdentity> {
    vec![
        AgentIdentity::new("a1", "Alice", "🦊"),
        AgentIdentity::new("b1", "Bob", "🐻"),
        AgentIdentity::new("c1", "Carol", "🐱"),
    ]
}

/// A room logging under `dir`, with a 60s alias TTL and a 120s turn deadline
pub fn room_in(dir: &std::path::Path, roster: StaticRoster, runner: Arc<MockRunner>) -> WarRoom {
    let store = Arc::new(MessageStore::new(dir.join("warroom.jsonl")));
    let resolver = Arc::new(AliasResolver::new(Arc::new(roster), Duration::from_secs(60)));
    let executor = Arc::new(TurnExecutor::new(runner, Duration::from_secs(120)));
    let hub = Arc::new(BroadcastHub::new(store.clone(), resolver.clone(), 200));
    WarRoom::new(store, resolver, executor, hub, "Ben")
}

// ============================================================================
// Static roster
// ============================================================================

/// Roster source returning a settable list, counting loads
pub struct StaticRoster {
    agents: Mutex<Option<Vec<AgentIdentity>>>,
    loads: AtomicUsize,
    delay: Option<Duration>,
}

impl StaticRoster {
    pub fn new(agents: Vec<AgentIdentity>) -> Self {
        Self {
            agents: Mutex::new(Some(agents)),
            loads: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Every load fails until `set` is called
    pub fn failing() -> Self {
        Self {
            agents: Mutex::new(None),
            loads: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Every load sleeps first, like a slow config read
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, agents: Vec<AgentIdentity>) {
        *self.agents.lock().unwrap() = Some(agents);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn load(&self) -> Result<Vec<AgentIdentity>, RosterError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.agents
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RosterError::Read {
                path: PathBuf::from("static"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no roster"),
            })
    }
}

// ============================================================================
// Mock agent runner
// ============================================================================

/// Scripted outcome of one mock run
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    exit_code: i32,
    stdout: String,
    stderr: String,
    spawn_error: Option<String>,
    delay: Option<Duration>,
}

impl MockReply {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn exit(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    pub fn spawn_error(message: impl Into<String>) -> Self {
        Self {
            spawn_error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCall {
    pub agent_id: String,
    pub prompt: String,
    pub session_id: String,
}

/// Runner with per-agent scripted replies.
///
/// Agents without a script answer `{"text":"<id> reply <n>"}` where `n` counts
/// that agent's calls from 1.
#[derive(Default)]
pub struct MockRunner {
    replies: HashMap<String, MockReply>,
    /// Per-call replies; call `n` uses entry `n - 1` when present
    scripts: HashMap<String, Vec<Option<MockReply>>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<RunCall>>,
    finished: Mutex<Vec<String>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, agent_id: impl Into<String>, reply: MockReply) -> Self {
        self.replies.insert(agent_id.into(), reply);
        self
    }

    /// Script individual calls of an agent. `None` entries, and calls past
    /// the end, fall back to the default reply.
    pub fn with_script(
        mut self,
        agent_id: impl Into<String>,
        script: Vec<Option<MockReply>>,
    ) -> Self {
        self.scripts.insert(agent_id.into(), script);
        self
    }

    /// Delay the default reply of an agent
    pub fn with_delay(mut self, agent_id: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(agent_id.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<RunCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, agent_id: &str) -> Vec<RunCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.agent_id == agent_id)
            .collect()
    }

    /// Agent ids in the order their runs completed
    pub fn finish_order(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentRunner for MockRunner {
    async fn run(
        &self,
        agent_id: &str,
        prompt: &str,
        session_id: &str,
    ) -> Result<RunOutput, std::io::Error> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RunCall {
                agent_id: agent_id.to_string(),
                prompt: prompt.to_string(),
                session_id: session_id.to_string(),
            });
            calls.iter().filter(|c| c.agent_id == agent_id).count()
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(self.in_flight.clone());

        let scripted = self
            .scripts
            .get(agent_id)
            .and_then(|script| script.get(call_number - 1).cloned().flatten());
        let reply = scripted.or_else(|| self.replies.get(agent_id).cloned()).unwrap_or_else(|| {
            let mut reply =
                MockReply::stdout(format!(r#"{{"text":"{agent_id} reply {call_number}"}}"#));
            reply.delay = self.delays.get(agent_id).copied();
            reply
        });

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.lock().unwrap().push(agent_id.to_string());

        if let Some(message) = reply.spawn_error {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, message));
        }
        Ok(RunOutput {
            exit_code: Some(reply.exit_code),
            stdout: reply.stdout,
            stderr: reply.stderr,
        })
    }
}
