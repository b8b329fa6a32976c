// src/utils/command.rs

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::constants::COMMAND_TIMEOUT_SECS;
use crate::errors::AdapterError;

/// Runs an external command with the default bounded wait.
pub fn run(program: &str, args: &[&str]) -> Result<String, AdapterError> {
    run_with_timeout(program, args, Duration::from_secs(COMMAND_TIMEOUT_SECS))
}

/// Runs `program` and waits up to `timeout` for it to exit. On timeout the
/// process is killed and the attempt reported as failed; there is no retry.
/// Returns stdout on success.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, AdapterError> {
    debug!("running: {program} {}", args.join(" "));
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AdapterError::from_io(&format!("failed to spawn '{program}'"), e))?;

    // Drain both pipes on their own threads so a chatty command cannot block
    // on a full pipe while we poll for exit.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AdapterError::Timeout {
                        command: program.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(AdapterError::from_io(
                    &format!("failed to wait for '{program}'"),
                    e,
                ))
            }
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if status.success() {
        Ok(stdout)
    } else {
        let detail = if stderr.trim().is_empty() { &stdout } else { &stderr };
        let detail = detail.trim();
        if detail.to_lowercase().contains("access is denied") {
            Err(AdapterError::PermissionDenied(format!(
                "'{program}': {detail}"
            )))
        } else {
            Err(AdapterError::Other(format!(
                "'{program}' exited with {status}: {detail}"
            )))
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut out = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut out);
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_successful_command() {
        let output = run("cmd", &["/C", "echo hello"]).expect("echo failed");
        assert_eq!(output.trim(), "hello");
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        let err = run("cmd", &["/C", "exit 1"]).unwrap_err();
        assert!(matches!(err, AdapterError::Other(_)));
    }

    #[test]
    fn slow_command_times_out() {
        let err = run_with_timeout(
            "cmd",
            &["/C", "ping -n 30 127.0.0.1 > NUL"],
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::Timeout { .. }));
    }
}
