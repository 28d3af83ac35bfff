//! Process Execution
//!
//! Spawns a command, races its completion against an optional timeout and
//! reports the outcome. On timeout the child gets SIGTERM and the reply goes
//! out immediately; tokio reaps the child in the background.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use postern_protocol::{Response, RunShellParams};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub struct ProcessRunner {
    default_timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self { default_timeout }
    }

    pub async fn run(&self, params: &RunShellParams) -> Response {
        let Some((program, args)) = params.command.split_first() else {
            return Response::failure("empty command");
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &params.cwd {
            command.current_dir(cwd);
        }
        if let Some(env) = &params.env {
            command.env_clear().envs(env);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", program, e);
                return Response::failure(format!("failed to start: {}", e));
            }
        };
        info!(program = %program, pid = ?child.id(), "Process started");

        let limit = timeout_from_secs(params.timeout_seconds).or(self.default_timeout);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = async {
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        };
        let outcome = match limit {
            Some(limit) => tokio::select! {
                biased;
                done = finished => Some(done),
                _ = tokio::time::sleep(limit) => None,
            },
            None => Some(finished.await),
        };

        let Some((status, stdout, stderr)) = outcome else {
            warn!(program = %program, ?limit, "Process timed out");
            terminate(&mut child);
            return Response::failure("timeout");
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => return Response::failure(format!("failed to wait: {}", e)),
        };
        debug!(program = %program, ?status, "Process exited");

        let payload = if stdout.is_empty() { stderr } else { stdout };
        let response = if status.success() {
            Response::success()
        } else {
            Response::failure(exit_message(status))
        };
        response.with_payload(payload)
    }
}

/// Positive, finite seconds become a timeout; anything else means none.
pub fn timeout_from_secs(secs: Option<f64>) -> Option<Duration> {
    secs.filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64)
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("Pipe read ended early: {}", e);
        }
    }
    buf
}

fn exit_message(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {}", signal);
        }
    }
    "exit unknown".to_string()
}

/// Send a termination signal without waiting for the child to go away.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: pid belongs to a child we spawned and have not reaped.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            return;
        }
    }
    if let Err(e) = child.start_kill() {
        debug!("Kill after timeout failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::time::Instant;

    fn sh(script: &str) -> RunShellParams {
        RunShellParams {
            command: vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
            ..RunShellParams::default()
        }
    }

    #[tokio::test]
    async fn test_empty_command() {
        let resp = ProcessRunner::new(None).run(&RunShellParams::default()).await;
        assert_eq!(resp, Response::failure("empty command"));
    }

    #[tokio::test]
    async fn test_stdout_on_success() {
        let resp = ProcessRunner::new(None).run(&sh("printf hello")).await;
        assert_eq!(resp, Response::success().with_payload(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_stderr_on_nonzero_exit() {
        let resp = ProcessRunner::new(None)
            .run(&sh("printf oops >&2; exit 2"))
            .await;
        assert_eq!(
            resp,
            Response::failure("exit 2").with_payload(b"oops".to_vec())
        );
    }

    #[tokio::test]
    async fn test_stdout_preferred_over_stderr() {
        let resp = ProcessRunner::new(None)
            .run(&sh("printf out; printf err >&2; exit 1"))
            .await;
        assert_eq!(resp.payload.as_deref(), Some(&b"out"[..]));
        assert_eq!(resp.message.as_deref(), Some("exit 1"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let params = RunShellParams {
            command: vec!["/nonexistent/postern-test-binary".to_string()],
            ..RunShellParams::default()
        };
        let resp = ProcessRunner::new(Some(Duration::from_secs(1))).run(&params).await;
        assert!(!resp.ok);
        assert!(resp.message.unwrap().starts_with("failed to start: "));
    }

    #[tokio::test]
    async fn test_timeout_returns_promptly_and_signals() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("terminated");
        let mut params = sh(&format!(
            "trap 'touch {}; exit 0' TERM; sleep 5 & wait",
            marker.display()
        ));
        params.timeout_seconds = Some(1.0);

        let started = Instant::now();
        let resp = ProcessRunner::new(None).run(&params).await;

        assert_eq!(resp, Response::failure("timeout"));
        assert!(started.elapsed() < Duration::from_millis(2500));

        let deadline = Instant::now() + Duration::from_secs(3);
        while !marker.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(marker.exists(), "child never saw SIGTERM");
    }

    #[tokio::test]
    async fn test_default_timeout_applies_when_request_has_none() {
        let resp = ProcessRunner::new(Some(Duration::from_millis(200)))
            .run(&sh("sleep 5"))
            .await;
        assert_eq!(resp, Response::failure("timeout"));
    }

    #[tokio::test]
    async fn test_non_positive_timeout_means_none() {
        let mut params = sh("sleep 0.2; printf done");
        params.timeout_seconds = Some(0.0);
        let resp = ProcessRunner::new(None).run(&params).await;
        assert_eq!(resp.payload_text().as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_cwd_and_replacement_env() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = sh("printf \"$PWD:$ONLY:${HOME:-unset}\"");
        params.cwd = Some(dir.path().display().to_string());
        params.env = Some(BTreeMap::from([("ONLY".to_string(), "yes".to_string())]));

        let resp = ProcessRunner::new(None).run(&params).await;

        let text = resp.payload_text().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert!(
            text.starts_with(&dir.path().display().to_string())
                || text.starts_with(&canonical.display().to_string()),
            "unexpected cwd in {text}"
        );
        assert!(text.ends_with(":yes:unset"));
    }

    #[tokio::test]
    async fn test_large_output_is_drained() {
        let resp = ProcessRunner::new(Some(Duration::from_secs(10)))
            .run(&sh("head -c 200000 /dev/zero"))
            .await;
        assert!(resp.ok);
        assert_eq!(resp.payload.map(|p| p.len()), Some(200000));
    }
}
