// crates/clipdrop-media/src/process.rs
//
// Child-process runner for external tools.
//
// - environment cleared, then a short pass-through allowlist plus whatever
//   the handler adds (PATH with the tool's bin dir first, model dirs, …)
// - stdout/stderr drained on reader threads so a chatty tool cannot block
//   on a full pipe
// - bounded wait: try_wait polled against a deadline and the session cancel
//   flag; on either the child is killed
// - non-zero exit, or any stderr output when `stderr_is_failure` is set,
//   becomes PasteError::ExternalTool with a truncated stderr excerpt

use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use clipdrop_core::context::CancelToken;
use clipdrop_core::error::{PasteError, Result};
use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, info, warn};

const POLL_INTERVAL:    Duration = Duration::from_millis(50);
/// How long to wait for pipes to close after the child is gone. Grandchildren
/// can hold them open indefinitely.
const DRAIN_GRACE:      Duration = Duration::from_secs(2);
const MAX_OUTPUT_BYTES: u64      = 4 * 1024 * 1024;
/// stderr excerpt carried in error messages.
const MAX_STDERR_CHARS: usize    = 600;

const PASSTHROUGH_ENV: &[&str] = &[
    "PATH", "HOME", "USER", "LANG", "LC_ALL", "TMPDIR", "TEMP", "TMP",
    "XDG_RUNTIME_DIR", "XDG_CACHE_HOME", "USERPROFILE", "APPDATA", "LOCALAPPDATA",
    "SYSTEMROOT", "SYSTEMDRIVE", "WINDIR", "COMSPEC", "PATHEXT", "PROGRAMDATA",
    "CUDA_VISIBLE_DEVICES", "CUDA_PATH",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout:  String,
    pub stderr:  String,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub struct ToolInvocation {
    name:              String,
    program:           PathBuf,
    args:              Vec<OsString>,
    env:               Vec<(String, OsString)>,
    cwd:               Option<PathBuf>,
    timeout:           Duration,
    cancel:            CancelToken,
    stderr_is_failure: bool,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name:              name.into(),
            program:           program.into(),
            args:              Vec::new(),
            env:               Vec::new(),
            cwd:               None,
            timeout:           Duration::from_secs(clipdrop_core::config::DEFAULT_TOOL_TIMEOUT_SECS),
            cancel:            CancelToken::new(),
            stderr_is_failure: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Later values for the same key replace earlier ones.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    pub fn envs<I>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, OsString)>,
    {
        vars.into_iter().fold(self, |inv, (k, v)| inv.env(k, v))
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// A timeout too large to add to the clock means no deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Some tools log progress on stderr; those set this to false.
    pub fn stderr_is_failure(mut self, yes: bool) -> Self {
        self.stderr_is_failure = yes;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for key in PASSTHROUGH_ENV {
            if let Some(v) = std::env::var_os(key) {
                cmd.env(key, v);
            }
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    pub fn run(&self) -> Result<ToolOutput> {
        let start = Instant::now();
        info!(tool = %self.name, program = %self.program.display(), args = ?self.args, "running external tool");

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| self.fail(format!("could not start {}: {e}", self.program.display())))?;

        let (tx, rx) = bounded::<(Stream, Vec<u8>)>(2);
        if let Some(out) = child.stdout.take() {
            spawn_drain(Stream::Stdout, out, tx.clone());
        }
        if let Some(err) = child.stderr.take() {
            spawn_drain(Stream::Stderr, err, tx);
        }

        let status = self.wait(&mut child, start)?;
        let (stdout, stderr) = collect(&rx);
        let elapsed = start.elapsed();
        debug!(tool = %self.name, ?status, ms = elapsed.as_millis() as u64, "tool exited");

        if !status.success() {
            let code = status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".into());
            return Err(self.fail(format!("exited with code {code}: {}", excerpt(&stderr))));
        }
        if self.stderr_is_failure && !stderr.trim().is_empty() {
            return Err(self.fail(format!("reported an error: {}", excerpt(&stderr))));
        }
        Ok(ToolOutput { stdout, stderr, elapsed })
    }

    fn wait(&self, child: &mut Child, start: Instant) -> Result<ExitStatus> {
        let deadline = start.checked_add(self.timeout);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    kill(child);
                    return Err(self.fail(format!("wait failed: {e}")));
                }
            }
            if self.cancel.is_cancelled() {
                warn!(tool = %self.name, "cancelled; killing tool");
                kill(child);
                return Err(self.fail("cancelled"));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(tool = %self.name, "timed out; killing tool");
                kill(child);
                return Err(self.fail(format!("timed out after {:?}", self.timeout)));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn fail(&self, message: impl Into<String>) -> PasteError {
        PasteError::tool(self.name.clone(), message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn spawn_drain<R>(stream: Stream, pipe: R, tx: crossbeam_channel::Sender<(Stream, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut pipe = pipe;
        let mut buf  = Vec::new();
        let _ = pipe.by_ref().take(MAX_OUTPUT_BYTES).read_to_end(&mut buf);
        // Keep the pipe open past the cap so the child never sees EPIPE.
        let _ = io::copy(&mut pipe, &mut io::sink());
        let _ = tx.send((stream, buf));
    });
}

fn collect(rx: &Receiver<(Stream, Vec<u8>)>) -> (String, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let deadline = Instant::now() + DRAIN_GRACE;
    while let Ok((stream, bytes)) = rx.recv_deadline(deadline) {
        match stream {
            Stream::Stdout => stdout = bytes,
            Stream::Stderr => stderr = bytes,
        }
    }
    (
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "(no stderr output)".into();
    }
    let mut out: String = trimmed.chars().take(MAX_STDERR_CHARS).collect();
    if out.len() < trimmed.len() {
        out.push('…');
    }
    out
}

// ── Arguments and lookup ──────────────────────────────────────────────────────

/// Expand `{name}` placeholders. An argument that is exactly one placeholder
/// is replaced by the raw value so non-UTF-8 paths survive.
pub fn expand_args(template: &[String], vars: &[(&str, &OsStr)]) -> Vec<OsString> {
    template
        .iter()
        .map(|arg| {
            let whole = arg.strip_prefix('{').and_then(|a| a.strip_suffix('}'));
            if let Some((_, v)) = whole.and_then(|key| vars.iter().find(|(k, _)| *k == key)) {
                return v.to_os_string();
            }
            let mut s = arg.clone();
            for (k, v) in vars {
                s = s.replace(&format!("{{{k}}}"), &v.to_string_lossy());
            }
            OsString::from(s)
        })
        .collect()
}

/// Locate `name` in `extra_dirs`, then on PATH. Names containing a path
/// separator are checked as given.
pub fn find_executable(name: &str, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    let as_path = Path::new(name);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return as_path.is_file().then(|| as_path.to_path_buf());
    }

    let path_dirs = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();
    let with_suffix = format!("{name}{}", std::env::consts::EXE_SUFFIX);

    extra_dirs.iter().chain(path_dirs.iter()).find_map(|dir| {
        [dir.join(&with_suffix), dir.join(name)]
            .into_iter()
            .find(|candidate| candidate.is_file())
    })
}
