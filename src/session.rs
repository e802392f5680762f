// Session layer: one run of the external download tool.
// The tool is spawned with both stdout and stderr piped. Each pipe gets its
// own reader thread; both feed a single channel so the session sees one
// ordered stream of lines and neither pipe can fill up and stall the child.
// Lines are echoed to a `SessionObserver` and scraped for progress.

use crate::auth::AuthSpec;
use crate::config::Settings;
use crate::error::SessionError;
use crate::progress::{ProgressDisplay, ProgressTracker};
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::fs;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// A URL plus the authentication resolved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub auth: AuthSpec,
}

impl DownloadTarget {
    pub fn new(url: impl Into<String>, auth: AuthSpec) -> Self {
        DownloadTarget {
            url: url.into(),
            auth,
        }
    }
}

/// Receives what the tool prints and how far along it is.
pub trait SessionObserver {
    fn on_line(&mut self, line: &str);
    fn on_progress(&mut self, percent: f64);
}

/// What the menu and the batch runner need from the tool.
pub trait ToolRunner {
    fn download(&mut self, target: &DownloadTarget) -> Result<(), SessionError>;
    fn update(&mut self) -> Result<(), SessionError>;
}

pub struct DownloadSession {
    settings: Settings,
}

impl DownloadSession {
    pub fn new(settings: Settings) -> Self {
        DownloadSession { settings }
    }

    /// Full argument vector (without the binary): fixed flags, archive
    /// ledger, output directory, auth flags, URL.
    pub fn command_args(&self, target: &DownloadTarget) -> Vec<String> {
        let mut args = self.settings.tool_args.clone();
        args.push("--download-archive".into());
        args.push(self.settings.archive_file.to_string_lossy().into_owned());
        args.push("-d".into());
        args.push(self.settings.download_dir.to_string_lossy().into_owned());
        args.extend(target.auth.to_args());
        args.push(target.url.clone());
        args
    }

    /// Download one target, reporting every line and each forward step of
    /// progress to `observer`. On success the progress always ends at 100.
    pub fn run(
        &self,
        target: &DownloadTarget,
        observer: &mut dyn SessionObserver,
    ) -> Result<(), SessionError> {
        fs::create_dir_all(&self.settings.download_dir).map_err(|e| {
            SessionError::Unexpected(format!(
                "cannot create {}: {}",
                self.settings.download_dir.display(),
                e
            ))
        })?;

        let args = self.command_args(target);
        info!(
            url = %target.url,
            command = %redacted(&self.settings.tool, &args),
            "starting download"
        );

        let mut tracker = ProgressTracker::new();
        run_streaming(
            &self.settings.tool,
            &args,
            self.settings.timeout(),
            |line| {
                observer.on_line(line);
                if let Some(percent) = tracker.observe(line) {
                    observer.on_progress(percent);
                }
            },
        )?;

        if let Some(percent) = tracker.finish() {
            observer.on_progress(percent);
        }
        info!(url = %target.url, "download finished");
        Ok(())
    }

    /// Run the tool's self-update, echoing its output.
    pub fn run_update(&self, observer: &mut dyn SessionObserver) -> Result<(), SessionError> {
        info!(command = %redacted(&self.settings.tool, &self.settings.update_args), "running update");
        run_streaming(&self.settings.tool, &self.settings.update_args, None, |line| {
            observer.on_line(line)
        })
    }
}

impl SessionObserver for ProgressDisplay {
    fn on_line(&mut self, line: &str) {
        self.echo(line);
    }

    fn on_progress(&mut self, percent: f64) {
        self.set_percent(percent);
    }
}

struct EchoObserver;

impl SessionObserver for EchoObserver {
    fn on_line(&mut self, line: &str) {
        println!("{}", line);
    }

    fn on_progress(&mut self, _percent: f64) {}
}

impl ToolRunner for DownloadSession {
    fn download(&mut self, target: &DownloadTarget) -> Result<(), SessionError> {
        let mut display = ProgressDisplay::new(&format!("Downloading: {}", target.url));
        let result = self.run(target, &mut display);
        match result {
            Ok(()) => display.complete(),
            Err(_) => display.abandon(),
        }
        result
    }

    fn update(&mut self) -> Result<(), SessionError> {
        self.run_update(&mut EchoObserver)
    }
}

/// Command line for logs, with any password replaced.
fn redacted(tool: &str, args: &[String]) -> String {
    let mut out = vec![tool.to_string()];
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push("***".into());
            hide_next = false;
        } else {
            hide_next = arg == "--password";
            out.push(arg.clone());
        }
    }
    out.join(" ")
}

enum StreamEvent {
    Line(String),
    Failed(io::Error),
}

/// Owns the child; kills and reaps it unless it was waited for.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    /// Poll until the child exits or `deadline` passes (`Ok(None)`).
    fn wait_until(&mut self, deadline: Instant) -> io::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(WAIT_POLL);
        }
    }
}

const WAIT_POLL: Duration = Duration::from_millis(100);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            debug!(pid = self.child.id(), "killing download tool");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Spawn `tool args`, hand every output line to `on_line` and wait for it.
fn run_streaming<F>(
    tool: &str,
    args: &[String],
    timeout: Option<Duration>,
    mut on_line: F,
) -> Result<(), SessionError>
where
    F: FnMut(&str),
{
    let child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SessionError::ToolNotFound(tool.to_string()),
            _ => SessionError::Unexpected(format!("failed to start {}: {}", tool, e)),
        })?;
    let mut guard = ChildGuard {
        child,
        reaped: false,
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = guard.child.stdout.take() {
        readers.push(spawn_reader("stdout", stdout, tx.clone()));
    }
    if let Some(stderr) = guard.child.stderr.take() {
        readers.push(spawn_reader("stderr", stderr, tx.clone()));
    }
    drop(tx);

    let deadline = timeout.map(|t| (Instant::now() + t, t.as_secs()));
    loop {
        let event = match deadline {
            Some((at, secs)) => match rx.recv_deadline(at) {
                Ok(event) => event,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(tool, secs, "download tool timed out");
                    return Err(SessionError::TimedOut(secs));
                }
            },
            None => match rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };
        match event {
            StreamEvent::Line(line) => on_line(&line),
            StreamEvent::Failed(e) => {
                warn!(tool, "reading tool output failed: {}", e);
                return Err(SessionError::Unexpected(format!(
                    "reading output of {}: {}",
                    tool, e
                )));
            }
        }
    }

    // Both senders are gone, so the readers are done.
    for reader in readers {
        let _ = reader.join();
    }

    let status = match deadline {
        Some((at, secs)) => match guard.wait_until(at) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(tool, secs, "download tool outlived its output and timed out");
                return Err(SessionError::TimedOut(secs));
            }
            Err(e) => {
                return Err(SessionError::Unexpected(format!(
                    "waiting for {}: {}",
                    tool, e
                )))
            }
        },
        None => guard
            .wait()
            .map_err(|e| SessionError::Unexpected(format!("waiting for {}: {}", tool, e)))?,
    };
    debug!(tool, ?status, "tool exited");
    if status.success() {
        Ok(())
    } else {
        Err(SessionError::ToolFailed(status.code().unwrap_or(-1)))
    }
}

fn spawn_reader<R>(name: &'static str, mut stream: R, tx: Sender<StreamEvent>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        let mut splitter = LineSplitter::default();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        if tx.send(StreamEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Failed(e));
                    return;
                }
            }
        }
        if let Some(line) = splitter.finish() {
            let _ = tx.send(StreamEvent::Line(line));
        }
        trace!(stream = name, "reader finished");
    })
}

/// Longest partial line kept before it is flushed anyway.
const MAX_PENDING: usize = 64 * 1024;

/// Cuts raw output into lines as bytes arrive. Progress bars in the tool's
/// output redraw with `\r`, so both `\r` and `\n` end a line. Invalid UTF-8
/// is replaced rather than rejected.
#[derive(Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                lines.extend(self.take_line());
            } else {
                self.pending.push(byte);
                if self.pending.len() >= MAX_PENDING {
                    lines.extend(self.take_line());
                }
            }
        }
        lines
    }

    /// Whatever is left once the stream has ended.
    fn finish(&mut self) -> Option<String> {
        self.take_line()
    }

    fn take_line(&mut self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session() -> DownloadSession {
        DownloadSession::new(Settings {
            download_dir: PathBuf::from("out"),
            archive_file: PathBuf::from("ledger.txt"),
            ..Settings::default()
        })
    }

    #[test]
    fn command_args_order_without_auth() {
        let target = DownloadTarget::new("https://a.example/1", AuthSpec::None);
        assert_eq!(
            session().command_args(&target),
            vec![
                "--verbose",
                "--download-archive",
                "ledger.txt",
                "-d",
                "out",
                "https://a.example/1"
            ]
        );
    }

    #[test]
    fn command_args_place_auth_before_url() {
        let target = DownloadTarget::new(
            "https://a.example/2",
            AuthSpec::CookieFile(PathBuf::from("cookies/site.txt")),
        );
        let args = session().command_args(&target);
        assert_eq!(
            &args[5..],
            &["--cookies", "cookies/site.txt", "https://a.example/2"]
        );
    }

    #[test]
    fn redacted_hides_password() {
        let args: Vec<String> = ["--username", "alice", "--password", "hunter2", "url"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            redacted("gallery-dl", &args),
            "gallery-dl --username alice --password *** url"
        );
    }

    #[test]
    fn splitter_emits_lines_as_bytes_arrive() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"  10%\r  2"), vec!["  10%"]);
        assert_eq!(splitter.push(b"0%\r"), vec!["  20%"]);
        assert_eq!(splitter.push(b"  30% done\r\n\n"), vec!["  30% done"]);
        assert_eq!(splitter.push(b"tail without newline"), Vec::<String>::new());
        assert_eq!(splitter.finish().as_deref(), Some("tail without newline"));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn splitter_replaces_bad_utf8_and_keeps_split_characters() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"ok \xff\n"), vec!["ok \u{fffd}"]);
        // "é" arriving in two reads
        assert_eq!(splitter.push(b"caf\xc3"), Vec::<String>::new());
        assert_eq!(splitter.push(b"\xa9\n"), vec!["café"]);
    }

    #[test]
    fn splitter_flushes_overlong_lines() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.push(&vec![b'x'; MAX_PENDING + 10]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_PENDING);
        assert_eq!(splitter.finish().map(|l| l.len()), Some(10));
    }
}
