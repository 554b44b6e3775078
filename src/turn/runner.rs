//! Agent runner: the process boundary for one turn

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Captured result of a finished agent process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best-effort failure text: stderr, then stdout, then the exit code
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exit code {}", self.exit_code.unwrap_or(-1))
    }
}

/// Invokes an external agent for one prompt
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run to completion. Dropping the future must stop the agent.
    async fn run(
        &self,
        agent_id: &str,
        prompt: &str,
        session_id: &str,
    ) -> Result<RunOutput, std::io::Error>;
}

/// Runs the agent CLI as a subprocess in its own process group
pub struct CommandRunner {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Arguments placed before the `agent` subcommand
    pub fn with_prefix_args(mut self, args: Vec<String>) -> Self {
        self.prefix_args = args;
        self
    }

    fn command(&self, agent_id: &str, prompt: &str, session_id: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(["agent", "--agent", agent_id])
            .args(["--session-id", session_id])
            .args(["--message", prompt])
            .arg("--json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // New process group so a timed-out turn takes its descendants with it
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

#[async_trait]
impl AgentRunner for CommandRunner {
    async fn run(
        &self,
        agent_id: &str,
        prompt: &str,
        session_id: &str,
    ) -> Result<RunOutput, std::io::Error> {
        let child = self.command(agent_id, prompt, session_id).spawn()?;
        let mut guard = ProcessGroupGuard::new(child.id());

        tracing::debug!(agent_id = %agent_id, pid = ?child.id(), "Agent process started");

        let output = child.wait_with_output().await?;
        guard.disarm();

        Ok(RunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Kills the process group if the run future is dropped before the child exits
struct ProcessGroupGuard {
    pid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        kill_process_group(self.pid.take());
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    tracing::debug!(pgid = pid, "Sending SIGKILL to agent process group");
    let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {
    // kill_on_drop covers the direct child
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Scripts run through `sh` so the test never execs a freshly written file
    fn sh_runner(dir: &tempfile::TempDir, script: &str) -> CommandRunner {
        let path = dir.path().join("agent.sh");
        std::fs::write(&path, script).unwrap();
        CommandRunner::new("sh").with_prefix_args(vec![path.display().to_string()])
    }

    #[tokio::test]
    async fn test_passes_arguments_and_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner(
            &dir,
            r#"printf '{"text":"%s|%s|%s|%s"}' "$1" "$3" "$5" "$7""#,
        );
        let out = runner.run("a1", "hello there", "sess-1").await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, r#"{"text":"agent|a1|sess-1|hello there"}"#);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner(&dir, "echo 'bad things' >&2\nexit 7\n");
        let out = runner.run("a1", "x", "s").await.unwrap();
        assert_eq!(out.exit_code, Some(7));
        assert_eq!(out.diagnostic(), "bad things");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = CommandRunner::new("/nonexistent/agent-binary");
        assert!(runner.run("a1", "x", "s").await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_run_does_not_hang() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner(&dir, "sleep 30\n");
        let started = std::time::Instant::now();
        let result =
            tokio::time::timeout(Duration::from_millis(200), runner.run("a1", "x", "s")).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Alive and not a zombie
    #[cfg(target_os = "linux")]
    fn is_running(pid: i32) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
            stat.rsplit(')')
                .next()
                .is_some_and(|rest| !rest.trim_start().starts_with('Z'))
        })
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_run_kills_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("grandchild.pid");
        let runner = sh_runner(
            &dir,
            &format!("sleep 30 &\necho $! > {}\nwait\n", pidfile.display()),
        );

        let mut run = Box::pin(runner.run("a1", "x", "s"));
        let pid: i32 = loop {
            tokio::select! {
                _ = &mut run => panic!("agent exited before it was dropped"),
                () = tokio::time::sleep(Duration::from_millis(20)) => {
                    let parsed = std::fs::read_to_string(&pidfile)
                        .ok()
                        .and_then(|s| s.trim().parse().ok());
                    if let Some(pid) = parsed {
                        break pid;
                    }
                }
            }
        };
        assert!(is_running(pid));
        drop(run);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while is_running(pid) && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!is_running(pid), "background child {pid} survived the drop");
    }

    #[test]
    fn test_diagnostic_fallbacks() {
        let out = RunOutput {
            exit_code: None,
            ..RunOutput::default()
        };
        assert_eq!(out.diagnostic(), "exit code -1");
    }
}
