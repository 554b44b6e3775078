//! Process configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_AGENT_BIN: &str = "openclaw";
const DEFAULT_USER_NAME: &str = "user";
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;
const DEFAULT_ALIAS_TTL_SECS: u64 = 60;
const DEFAULT_HISTORY_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Agent platform home; holds IDENTITY files' workspaces by default
    pub home: PathBuf,
    pub port: u16,
    pub log_path: PathBuf,
    pub agents_config: PathBuf,
    pub agent_bin: PathBuf,
    /// Extra arguments placed before `agent ...` on every invocation
    pub agent_args: Vec<String>,
    pub user_name: String,
    pub turn_timeout: Duration,
    pub alias_ttl: Duration,
    pub history_limit: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = var("WARROOM_HOME").map_or_else(
            || {
                let user_home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(user_home).join(".openclaw")
            },
            PathBuf::from,
        );

        Self {
            port: parse_or(&var, "WARROOM_PORT", DEFAULT_PORT),
            log_path: var("WARROOM_LOG_PATH")
                .map_or_else(|| home.join("warroom.jsonl"), PathBuf::from),
            agents_config: var("WARROOM_AGENTS_CONFIG")
                .map_or_else(|| home.join("openclaw.json"), PathBuf::from),
            agent_bin: PathBuf::from(
                var("WARROOM_AGENT_BIN").unwrap_or_else(|| DEFAULT_AGENT_BIN.to_string()),
            ),
            agent_args: var("WARROOM_AGENT_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            user_name: var("WARROOM_USER_NAME").unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            turn_timeout: Duration::from_secs(parse_or(
                &var,
                "WARROOM_TURN_TIMEOUT_SECS",
                DEFAULT_TURN_TIMEOUT_SECS,
            )),
            alias_ttl: Duration::from_secs(parse_or(
                &var,
                "WARROOM_ALIAS_TTL_SECS",
                DEFAULT_ALIAS_TTL_SECS,
            )),
            history_limit: parse_or(&var, "WARROOM_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            home,
        }
    }
}

fn parse_or<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match var(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Unparsable setting, using default");
            default
        }),
    }
}
