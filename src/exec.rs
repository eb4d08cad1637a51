//! Child process execution with tee'd, captured output and optional timeout.
//!
//! Mirrors the corpus's cross-platform process-spawning helpers
//! (`shell_exec`/`process`): a single `run` entry point, std `Command`
//! underneath, explicit options struct rather than a pile of arguments.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::BarError;

/// Options for a single child-process invocation.
#[derive(Default)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    /// Pass stdin/stdout/stderr through to the parent's own streams
    /// (interactive mode, used by `wrap`). When false, streams are
    /// captured only.
    pub inherit_stdio: bool,
}

/// Outcome of a completed (not necessarily zero-exit) child process.
#[derive(Debug)]
pub struct RunResult {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

/// Spawn `argv[0]` with `argv[1..]`, apply `opts`, and wait for completion.
///
/// A nonzero exit is *not* an error here — only a spawn failure or a
/// timeout is. Output is captured into `RunResult` regardless of whether
/// `inherit_stdio` also tees it live to the parent's terminal.
pub fn run(argv: &[String], opts: &RunOptions) -> anyhow::Result<RunResult> {
    if argv.is_empty() {
        return Err(BarError::command_failed("empty command").into());
    }

    let started = Instant::now();
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }

    if opts.inherit_stdio {
        run_inherited(cmd, opts, started)
    } else {
        run_captured(cmd, opts, started)
    }
}

/// Captured (non-interactive) execution, used by `run`.
fn run_captured(mut cmd: Command, opts: &RunOptions, started: Instant) -> anyhow::Result<RunResult> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    // A `--timeout` kills the whole process group, not just the direct
    // child, so a shell-wrapped command (`sh -c "... &"`) can't outlive
    // the timeout by forking. Only needed when a timeout is actually set.
    #[cfg(unix)]
    if opts.timeout.is_some() {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| BarError::command_failed(format!("failed to spawn command: {e}")))?;

    let mut stdout_pipe = child.stdout.take().expect("piped stdout");
    let mut stderr_pipe = child.stderr.take().expect("piped stderr");

    // Drain both pipes on their own threads so a chatty child never
    // deadlocks on a full OS pipe buffer while we wait on it.
    let (stdout_tx, stdout_rx) = mpsc::channel();
    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        let _ = stdout_tx.send(buf);
    });
    let (stderr_tx, stderr_rx) = mpsc::channel();
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf);
        let _ = stderr_tx.send(buf);
    });

    let status = wait_with_timeout(&mut child, opts.timeout)?;

    let stdout = stdout_rx.recv().unwrap_or_default();
    let stderr = stderr_rx.recv().unwrap_or_default();
    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    Ok(RunResult {
        exit_code: status,
        stdout,
        stderr,
        duration: started.elapsed(),
    })
}

/// Interactive execution, used by `wrap`: stdio is inherited so the child
/// behaves like a normal terminal program, but output is *also* captured
/// via OS pipes is not attempted here (teeing a TTY-attached child would
/// break raw-mode interaction) — `wrap` only needs the diff, not a byte
/// capture of an interactive session, so stdout/stderr are empty in the
/// result.
fn run_inherited(mut cmd: Command, opts: &RunOptions, started: Instant) -> anyhow::Result<RunResult> {
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());

    let mut child = cmd
        .spawn()
        .map_err(|e| BarError::command_failed(format!("failed to spawn command: {e}")))?;

    #[cfg(unix)]
    let forwarder = unix_signal_forwarder::spawn(child.id());

    let status = wait_with_timeout(&mut child, opts.timeout)?;

    #[cfg(unix)]
    forwarder.stop();

    Ok(RunResult {
        exit_code: status,
        stdout: Vec::new(),
        stderr: Vec::new(),
        duration: started.elapsed(),
    })
}

/// Forwards SIGINT/SIGTERM received by this process on to an inherited
/// child, so `bar wrap` behaves like running the child directly under a
/// shell — Ctrl+C interrupts the child, not just `bar`.
#[cfg(unix)]
mod unix_signal_forwarder {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::{Handle, Signals};

    pub struct Forwarder {
        handle: Handle,
        thread: std::thread::JoinHandle<()>,
    }

    impl Forwarder {
        pub fn stop(self) {
            self.handle.close();
            let _ = self.thread.join();
        }
    }

    pub fn spawn(child_pid: u32) -> Forwarder {
        let mut signals = Signals::new([SIGINT, SIGTERM]).expect("failed to register signal handler");
        let handle = signals.handle();
        let pid = Pid::from_raw(child_pid as i32);
        let thread = std::thread::spawn(move || {
            for sig in &mut signals {
                let forwarded = if sig == SIGINT { Signal::SIGINT } else { Signal::SIGTERM };
                let _ = signal::kill(pid, forwarded);
            }
        });
        Forwarder { handle, thread }
    }
}

fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Option<Duration>,
) -> anyhow::Result<Option<i32>> {
    match timeout {
        None => {
            let status = child.wait().map_err(|e| {
                BarError::command_failed(format!("failed waiting for command: {e}"))
            })?;
            Ok(status.code())
        }
        Some(limit) => match child
            .wait_timeout(limit)
            .map_err(|e| BarError::command_failed(format!("failed waiting for command: {e}")))?
        {
            Some(status) => Ok(status.code()),
            None => {
                kill_process_group(child);
                let _ = child.wait();
                Err(BarError::command_failed(format!(
                    "command timed out after {:.1}s",
                    limit.as_secs_f64()
                ))
                .into())
            }
        },
    }
}

/// Kill the child's whole process group on unix (it was placed in its own
/// group by [`run_captured`] whenever a timeout is set); elsewhere this is
/// just `Child::kill`.
#[cfg(unix)]
fn kill_process_group(child: &mut std::process::Child) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    let pid = Pid::from_raw(child.id() as i32);
    let _ = signal::killpg(pid, Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut std::process::Child) {
    let _ = child.kill();
}

/// Frame a captured stdout/stderr pair for persistence as a step artifact.
pub fn frame_output(stdout: &[u8], stderr: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(stdout.len() + stderr.len() + 64);
    buf.extend_from_slice(b"=== STDOUT ===\n");
    buf.extend_from_slice(stdout);
    buf.extend_from_slice(b"\n\n=== STDERR ===\n");
    buf.extend_from_slice(stderr);
    buf.extend_from_slice(b"\n");
    buf
}

/// Write bytes to `path`, creating parent directories as needed.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}

use wait_timeout::ChildExt;
