//! The single process-exec collaborator used by every external invocation
//! in the Catalog Store (git), the Archive Fetcher (curl/wget for ftp://),
//! and the Build Runner (configure/make/cmake/install scripts).
//!
//! Centralizing this avoids the "string-heavy command construction" hazard
//! called out for the Build Runner: callers always pass an argv vector,
//! never a shell string, and `run` never invokes a shell itself.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use util::errors::{ErrorKind, Res};

#[derive(Debug, Clone)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `argv[0]` with `argv[1..]` as arguments in `cwd`, bounded by
/// `timeout`. A timed-out child is killed and reported as a `Build` error;
/// this is the only mandatory timeout point design note 9 calls for.
pub fn run(argv: &[String], cwd: &Path, timeout: Duration) -> Res<(i32, Output)> {
    if argv.is_empty() {
        return Err(ErrorKind::Build("empty command".into()).into());
    }

    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ErrorKind::Build(format!("failed to spawn {}: {}", argv[0], e)))?;

    let status = match child
        .wait_timeout(timeout)
        .map_err(|e| ErrorKind::Build(format!("failed to wait on {}: {}", argv[0], e)))?
    {
        Some(status) => status,
        None => {
            // Timed out: kill it and report as a build failure rather than
            // leaving the orchestrator hanging on an unbounded wait.
            let _ = child.kill();
            let _ = child.wait();
            return Err(ErrorKind::Build(format!(
                "command `{}` exceeded build_timeout of {:?}",
                argv.join(" "),
                timeout
            ))
            .into());
        }
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }

    let code = status.code().unwrap_or(-1);
    Ok((code, Output { stdout, stderr }))
}

/// Convenience wrapper: runs `argv` and converts a non-zero exit into a
/// `Build` error carrying the captured stderr.
pub fn run_checked(argv: &[String], cwd: &Path, timeout: Duration) -> Res<Output> {
    let (code, output) = run(argv, cwd, timeout)?;
    if code == 0 {
        Ok(output)
    } else {
        Err(ErrorKind::Build(format!(
            "`{}` exited with status {}: {}",
            argv.join(" "),
            code,
            output.stderr.trim()
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn runs_a_simple_command() {
        let dir = env::temp_dir();
        let (code, out) = run(
            &["echo".to_string(), "hello".to_string()],
            &dir,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn nonzero_exit_is_build_error() {
        let dir = env::temp_dir();
        let err = run_checked(&["false".to_string()], &dir, Duration::from_secs(5)).unwrap_err();
        assert_eq!(format!("{}", err.kind()).contains("exited"), true);
    }

    #[test]
    fn timeout_kills_the_child() {
        let dir = env::temp_dir();
        let err = run_checked(
            &["sleep".to_string(), "5".to_string()],
            &dir,
            Duration::from_millis(50),
        )
        .unwrap_err();
        assert!(format!("{}", err.kind()).contains("build_timeout"));
    }
}
