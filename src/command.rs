//! Mention and command parsing for inbound user messages
//!
//! Plain messages go to every `@`-mentioned agent, or to the whole roster when
//! nothing resolves. `/debate` messages carry their own argument grammar.

#[cfg(test)]
mod proptests;

use crate::roster::Roster;
use regex::Regex;
use std::sync::LazyLock;

pub const MAX_ROUNDS: i32 = 3;
pub const MAX_PARTICIPANTS: usize = 5;
pub const MIN_PARTICIPANTS: usize = 2;
const DEFAULT_ROUNDS: i32 = 1;
const DEFAULT_DEBATE_PROMPT: &str = "Discuss and debate.";
const DEBATE_COMMAND: &str = "/debate";

static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("Invalid mention regex"));

/// How an inbound message should be scheduled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    OneShot(OneShotRequest),
    Debate(DebateRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShotRequest {
    pub targets: Vec<String>,
    /// False when no mention resolved and the whole roster was addressed
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebateRequest {
    /// Selection order; may hold fewer than two ids when the roster is too small
    pub participants: Vec<String>,
    pub rounds: i32,
    pub synthesize: bool,
    pub moderator: Option<String>,
    pub prompt: String,
}

impl DebateRequest {
    pub fn has_quorum(&self) -> bool {
        self.participants.len() >= MIN_PARTICIPANTS
    }
}

/// Bare tokens of every `@token` occurrence, in order
pub fn extract_mentions(text: &str) -> Vec<&str> {
    MENTION_REGEX
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// De-duplicated agent ids for the mentions that resolve
pub fn resolve_mentions(text: &str, roster: &Roster) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for token in extract_mentions(text) {
        if let Some(id) = roster.resolve(token) {
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

pub fn parse(content: &str, roster: &Roster) -> Dispatch {
    if let Some(args) = debate_args(content) {
        return Dispatch::Debate(parse_debate(args, roster));
    }

    let mentioned = resolve_mentions(content, roster);
    if mentioned.is_empty() {
        Dispatch::OneShot(OneShotRequest {
            targets: roster.ids(),
            explicit: false,
        })
    } else {
        Dispatch::OneShot(OneShotRequest {
            targets: mentioned,
            explicit: true,
        })
    }
}

/// Text after `/debate`, if this is a debate command
fn debate_args(content: &str) -> Option<&str> {
    let content = content.trim_start();
    let head = content.get(..DEBATE_COMMAND.len())?;
    if !head.eq_ignore_ascii_case(DEBATE_COMMAND) {
        return None;
    }
    let rest = content.get(DEBATE_COMMAND.len()..)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// Any integer is accepted; values beyond the cap clamp to it.
fn parse_rounds(value: &str) -> Option<i32> {
    let n = value.parse::<i128>().ok()?;
    i32::try_from(n.clamp(i128::from(i32::MIN), i128::from(MAX_ROUNDS))).ok()
}

fn is_no_synth(token: &str) -> bool {
    let normalized: String = token
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase();
    normalized == "nosynth"
}

fn moderator_value(lower: &str) -> Option<&str> {
    ["moderator=", "moderator:", "mod=", "mod:"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
}

/// Parse the argument tail of a `/debate` command. Order-independent;
/// recognized tokens are removed and the rest becomes the prompt.
pub fn parse_debate(args: &str, roster: &Roster) -> DebateRequest {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let mut selected: Vec<String> = Vec::new();
    let mut rounds: Option<i32> = None;
    let mut synthesize = true;
    let mut moderator: Option<String> = None;
    let mut remaining: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let lower = token.to_lowercase();
        i += 1;

        if let Some(bare) = token.strip_prefix('@') {
            let bare = extract_mentions(token).first().copied().unwrap_or(bare);
            if let Some(id) = roster.resolve(bare) {
                if !selected.iter().any(|s| s == id) {
                    selected.push(id.to_string());
                }
                continue;
            }
        } else if let Some(n) = lower
            .strip_prefix("rounds=")
            .or_else(|| lower.strip_prefix("rounds:"))
            .and_then(parse_rounds)
        {
            rounds = Some(n);
            continue;
        } else if lower == "rounds" {
            if let Some(n) = tokens.get(i).and_then(|next| parse_rounds(next)) {
                rounds = Some(n);
                i += 1;
                continue;
            }
        } else if is_no_synth(token) {
            synthesize = false;
            continue;
        } else if let Some(value) = moderator_value(&lower) {
            let value = value.trim_start_matches('@');
            match roster.resolve(value) {
                Some(id) => moderator = Some(id.to_string()),
                None => tracing::debug!(moderator = %value, "Unknown debate moderator ignored"),
            }
            continue;
        }

        remaining.push(token);
    }

    selected.truncate(MAX_PARTICIPANTS);
    for agent in roster.agents() {
        if selected.len() >= MIN_PARTICIPANTS {
            break;
        }
        if !selected.iter().any(|s| *s == agent.id) {
            selected.push(agent.id.clone());
        }
    }

    let prompt = remaining.join(" ");
    let prompt = if prompt.trim().is_empty() {
        DEFAULT_DEBATE_PROMPT.to_string()
    } else {
        prompt
    };

    let moderator = moderator.or_else(|| selected.first().cloned());

    DebateRequest {
        participants: selected,
        rounds: rounds.unwrap_or(DEFAULT_ROUNDS),
        synthesize,
        moderator,
        prompt,
    }
}
