//! Run external commands and report what happened as data.
//!
//! Every OS tool the crate relies on (`ping`, `arp`, `ip`, `ifconfig`,
//! `systemctl`, `lspci`) goes through [`CommandRunner`]. The runner reports
//! exit status and captured output; deciding whether that is a failure is up
//! to the caller, usually through [`run_step`].
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// The step of a multi-command operation, used to say which one failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Probe,
    NeighborQuery,
    InterfaceDown,
    SetAddress,
    InterfaceUp,
    NetworkRestart,
    DeviceQuery,
}

impl Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Probe => "icmp probe",
            Step::NeighborQuery => "neighbor table query",
            Step::InterfaceDown => "interface down",
            Step::SetAddress => "set hardware address",
            Step::InterfaceUp => "interface up",
            Step::NetworkRestart => "network restart",
            Step::DeviceQuery => "device query",
        })
    }
}

/// What a finished (or abandoned) command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The command overran its timeout and was killed.
    pub timed_out: bool,
}

impl CommandOutput {
    /// A successful run printing `stdout`.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// A run that exited with `code` and printed `stderr`.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0) && !self.timed_out
    }
}

/// Runs external programs.
pub trait CommandRunner {
    /// Run `program` with `args`, killing it once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Only fails when the program cannot be started at all. A non-zero exit
    /// or a timeout is reported in the [`CommandOutput`].
    fn run(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> io::Result<CommandOutput>;

    /// Whether `program` can be found on this host.
    fn has_program(&self, program: &str) -> bool;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> io::Result<CommandOutput> {
        (**self).run(program, args, timeout)
    }

    fn has_program(&self, program: &str) -> bool {
        (**self).has_program(program)
    }
}

/// Run one step of an operation and turn anything but a clean exit into an
/// error naming the step.
///
/// # Errors
///
/// [`Error::ExternalToolFailure`] when the program is missing or exits
/// non-zero, [`Error::Timeout`] when it overruns `timeout`.
pub fn run_step<R: CommandRunner + ?Sized>(
    runner: &R,
    step: Step,
    program: &str,
    args: &[&str],
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    log::debug!("{step}: {program} {}", args.join(" "));
    let output = runner
        .run(program, args, timeout)
        .map_err(|err| Error::ExternalToolFailure {
            step,
            program: program.to_string(),
            status: None,
            stderr: err.to_string(),
        })?;

    if output.timed_out {
        return Err(Error::Timeout(timeout.unwrap_or_default()));
    }
    if !output.success() {
        return Err(Error::ExternalToolFailure {
            step,
            program: program.to_string(),
            status: output.status,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

/// Runs commands on the host with [`std::process::Command`].
///
/// Programs are looked up on `PATH` and then in the sbin directories, since
/// `ip` and `ifconfig` often live outside an unprivileged user's `PATH`.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    extra_dirs: Vec<PathBuf>,
    poll_interval: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self {
            extra_dirs: ["/sbin", "/usr/sbin", "/bin", "/usr/bin"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl SystemRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return path.is_file().then_some(path);
        }
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        std::env::split_paths(&path_var)
            .chain(self.extra_dirs.iter().cloned())
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }

    fn wait(&self, child: &mut Child, timeout: Option<Duration>) -> io::Result<(Option<i32>, bool)> {
        let Some(timeout) = timeout else {
            return Ok((child.wait()?.code(), false));
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok((status.code(), false));
            }
            let now = Instant::now();
            if now >= deadline {
                // The child may exit between try_wait and kill.
                let _ = child.kill();
                let status = child.wait()?;
                return Ok((status.code(), true));
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> io::Result<CommandOutput> {
        let path = self.locate(program).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{program} not found"))
        })?;

        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Pipes are drained while the child runs so a chatty command cannot
        // stall on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out) = self.wait(&mut child, timeout)?;

        // Backgrounded grandchildren can keep the pipes open long after the
        // child is gone. A bounded run only waits DRAIN_GRACE for them.
        let until = timeout.map(|_| Instant::now() + DRAIN_GRACE);
        Ok(CommandOutput {
            status,
            stdout: collect(&stdout, until),
            stderr: collect(&stderr, until),
            timed_out,
        })
    }

    fn has_program(&self, program: &str) -> bool {
        self.locate(program).is_some()
    }
}

// How long output is still awaited once a bounded child has exited or been
// killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buf = Vec::new();
                if let Err(err) = pipe.read_to_end(&mut buf) {
                    log::debug!("reading command output: {err}");
                }
                let _ = tx.send(buf);
            });
        }
        None => {
            let _ = tx.send(Vec::new());
        }
    }
    rx
}

fn collect(rx: &Receiver<Vec<u8>>, until: Option<Instant>) -> String {
    let received = match until {
        Some(until) => rx.recv_timeout(until.saturating_duration_since(Instant::now())).ok(),
        None => rx.recv().ok(),
    };
    match received {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => {
            log::debug!("command output still open after exit, dropping it");
            String::new()
        }
    }
}

/// A runner that never touches the host.
///
/// Every invocation is recorded. Programs answer with the output registered
/// through [`DryRunner::respond`], or with an empty success otherwise.
/// Programs registered with [`DryRunner::missing`] fail to start and are
/// reported as absent by [`CommandRunner::has_program`].
#[derive(Debug, Default)]
pub struct DryRunner {
    responses: RefCell<HashMap<String, Vec<CommandOutput>>>,
    missing: Vec<String>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl DryRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `output` as the answer to the next run of `program`. When
    /// several are queued they are used in order and the last one repeats.
    #[must_use]
    pub fn respond(self, program: &str, output: CommandOutput) -> Self {
        self.responses
            .borrow_mut()
            .entry(program.to_string())
            .or_default()
            .push(output);
        self
    }

    #[must_use]
    pub fn missing(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    /// Every command run so far, program first.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for DryRunner {
    fn run(&self, program: &str, args: &[&str], _timeout: Option<Duration>) -> io::Result<CommandOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().map(ToString::to_string));
        log::info!("dry run: {}", call.join(" "));
        self.calls.borrow_mut().push(call);

        if self.missing.iter().any(|m| m == program) {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("{program} not found")));
        }

        let mut responses = self.responses.borrow_mut();
        Ok(match responses.get_mut(program) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => queue.first().cloned().unwrap_or_default(),
            None => CommandOutput::ok(""),
        })
    }

    fn has_program(&self, program: &str) -> bool {
        !self.missing.iter().any(|m| m == program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_step_passes_clean_exit_through() -> Result<()> {
        let runner = DryRunner::new().respond("arp", CommandOutput::ok("table"));
        let output = run_step(&runner, Step::NeighborQuery, "arp", &["-n"], None)?;
        assert_eq!(output.stdout, "table");
        assert_eq!(runner.calls(), vec![vec!["arp".to_string(), "-n".to_string()]]);
        Ok(())
    }

    #[test]
    fn run_step_reports_non_zero_exit_with_step() {
        let runner = DryRunner::new().respond("ip", CommandOutput::failed(2, "denied"));
        let err = run_step(&runner, Step::InterfaceDown, "ip", &[], None).unwrap_err();
        match err {
            Error::ExternalToolFailure { step, status, stderr, .. } => {
                assert_eq!(step, Step::InterfaceDown);
                assert_eq!(status, Some(2));
                assert_eq!(stderr, "denied");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn run_step_reports_missing_program() {
        let runner = DryRunner::new().missing("ifconfig");
        let err = run_step(&runner, Step::InterfaceUp, "ifconfig", &[], None).unwrap_err();
        assert!(matches!(
            err,
            Error::ExternalToolFailure { step: Step::InterfaceUp, status: None, .. }
        ));
        assert!(!runner.has_program("ifconfig"));
        assert!(runner.has_program("ip"));
    }

    #[test]
    fn run_step_reports_timeout() {
        let output = CommandOutput {
            timed_out: true,
            ..CommandOutput::default()
        };
        let runner = DryRunner::new().respond("ping", output);
        let timeout = Duration::from_millis(5);
        let err = run_step(&runner, Step::Probe, "ping", &[], Some(timeout)).unwrap_err();
        assert!(matches!(err, Error::Timeout(t) if t == timeout));
    }

    #[test]
    fn dry_runner_replays_queued_responses_in_order() -> io::Result<()> {
        let runner = DryRunner::new()
            .respond("ping", CommandOutput::failed(1, ""))
            .respond("ping", CommandOutput::ok("pong"));
        assert_eq!(runner.run("ping", &[], None)?.status, Some(1));
        assert_eq!(runner.run("ping", &[], None)?.stdout, "pong");
        assert_eq!(runner.run("ping", &[], None)?.stdout, "pong");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output() -> io::Result<()> {
        let output = SystemRunner::new().run("sh", &["-c", "echo out; echo err >&2; exit 3"], None)?;
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_kills_overdue_command() -> io::Result<()> {
        let started = Instant::now();
        let output = SystemRunner::new().run("sleep", &["5"], Some(Duration::from_millis(100)))?;
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(4));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_drains_output_larger_than_a_pipe() -> io::Result<()> {
        let output = SystemRunner::new().run(
            "sh",
            &["-c", "head -c 200000 /dev/zero; exit 0"],
            Some(Duration::from_secs(10)),
        )?;
        assert!(!output.timed_out);
        assert_eq!(output.status, Some(0));
        assert_eq!(output.stdout.len(), 200_000);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_does_not_wait_for_background_children() -> io::Result<()> {
        let started = Instant::now();
        let output = SystemRunner::new().run("sh", &["-c", "sleep 3 & sleep 3"], Some(Duration::from_millis(100)))?;
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(2));
        Ok(())
    }

    #[test]
    fn system_runner_reports_unknown_program() {
        let runner = SystemRunner::new();
        assert!(!runner.has_program("definitely-not-a-real-program"));
        assert!(runner.run("definitely-not-a-real-program", &[], None).is_err());
    }
}
