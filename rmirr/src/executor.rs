//! Runs one rsync invocation for one destination
//!
//! A run takes the rule lock (unless disabled), opens a fresh report, spawns
//! rsync with its combined output going into the report, optionally tees the
//! report to the console while it grows, and waits for exit. The lock and the
//! report are released on every path out of the run because both are owned
//! by the run's scope.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use rmirr_common::{Endpoint, RmirrConfig};

use crate::history::History;

/// Archive, verbose, compress
pub const BASE_FLAGS: &[&str] = &["-avz"];

/// Timestamp used for report names and markers
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Fully resolved parameters for a single rsync invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub rule_name: Option<String>,
    pub comment: Option<String>,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub excludes: Vec<String>,
    pub allow_delete: bool,
    pub dry_rsync: bool,
    pub use_lock: bool,
    pub confirm_all: bool,
}

impl RunContext {
    /// rsync arguments: base flags, excludes, delete, dry-run, source, destination
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = BASE_FLAGS.iter().map(|flag| flag.to_string()).collect();

        for pattern in &self.excludes {
            args.push(format!("--exclude={pattern}"));
        }

        if self.allow_delete {
            args.push("--delete".to_string());
        }

        if self.dry_rsync {
            args.push("--dry-run".to_string());
        }

        args.push(self.source_arg());
        args.push(self.destination.to_string());
        args
    }

    /// The source is always local, so rsync only gets its path
    pub fn source_arg(&self) -> String {
        self.source.path.clone().unwrap_or_default()
    }

    pub fn command_line(&self, program: &Path) -> String {
        let mut parts = vec![program.display().to_string()];
        parts.extend(self.args());
        parts.join(" ")
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nothing was executed
    Skipped,
    /// rsync ran; a non-zero code is informational. `None` when killed by a signal
    Completed {
        exit_code: Option<i32>,
        report: PathBuf,
    },
    Failed {
        reason: String,
        report: Option<PathBuf>,
    },
}

impl RunOutcome {
    pub fn report(&self) -> Option<&Path> {
        match self {
            RunOutcome::Skipped => None,
            RunOutcome::Completed { report, .. } => Some(report),
            RunOutcome::Failed { report, .. } => report.as_deref(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            RunOutcome::Skipped => "skipped".to_string(),
            RunOutcome::Completed {
                exit_code: Some(code),
                ..
            } => format!("completed (exit {code})"),
            RunOutcome::Completed {
                exit_code: None, ..
            } => "completed (killed by signal)".to_string(),
            RunOutcome::Failed { reason, .. } => format!("failed ({reason})"),
        }
    }
}

/// Faults inside a run; turned into [`RunOutcome::Failed`] at the run boundary
#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot get lock: rule has no name")]
    NoLockName,

    #[error("cannot get lock")]
    Lock(#[source] io::Error),

    #[error("cannot open report")]
    Report(#[source] io::Error),

    #[error("cannot run {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for rsync")]
    Wait(#[source] io::Error),
}

/// Exclusive, non-blocking advisory lock on `locks/<rule name>`
///
/// Released when dropped.
#[derive(Debug)]
pub struct RuleLock {
    file: File,
}

impl RuleLock {
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        fs2::FileExt::try_lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for RuleLock {
    fn drop(&mut self) {
        fs2::FileExt::unlock(&self.file).ok();
    }
}

/// Transcript of one run attempt: `reports/<timestamp>-<random>.txt`
#[derive(Debug)]
pub struct Report {
    file: File,
    path: PathBuf,
}

impl Report {
    pub fn create(dir: &Path) -> io::Result<Self> {
        let prefix = format!("{}-", timestamp());
        let (file, path) = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".txt")
            .tempfile_in(dir)?
            .keep()?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn marker(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.file, "rmirr: {} {}", text, timestamp())?;
        self.file.flush()
    }

    /// Handles sharing the report's file offset, for the child's stdout and stderr
    fn child_output(&self) -> io::Result<(Stdio, Stdio)> {
        Ok((
            Stdio::from(self.file.try_clone()?),
            Stdio::from(self.file.try_clone()?),
        ))
    }
}

pub struct Executor<'a> {
    config: &'a RmirrConfig,
    history: &'a History,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a RmirrConfig, history: &'a History) -> Self {
        Self { config, history }
    }

    /// Run rsync for `ctx`; with `tee`, copy the report to it while rsync runs
    pub fn execute(&self, ctx: &RunContext, tee: Option<&mut dyn Write>) -> RunOutcome {
        self.history.info("start", ctx.rule_name.as_deref().unwrap_or(""));
        self.history.info(
            "parameters",
            &format!(
                "name={} comment={} from={} to={} excludes={} uselock={}",
                ctx.rule_name.as_deref().unwrap_or(""),
                ctx.comment.as_deref().unwrap_or(""),
                ctx.source,
                ctx.destination,
                ctx.excludes.join(" "),
                if ctx.use_lock { "yes" } else { "no" },
            ),
        );

        let mut report = None;
        let outcome = match self.run(ctx, tee, &mut report) {
            Ok(exit_code) => {
                let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                self.history.info("completed", &format!("exit={code}"));
                match report {
                    Some(report) => RunOutcome::Completed { exit_code, report },
                    None => RunOutcome::Failed {
                        reason: "no report".to_string(),
                        report: None,
                    },
                }
            }
            Err(e) => {
                // "cannot get lock: Resource temporarily unavailable (os error 11)"
                let reason = format!("{:#}", anyhow::Error::new(e));
                log::error!("Mirror failure: {reason}");
                self.history.error("failure", &reason);
                RunOutcome::Failed { reason, report }
            }
        };

        self.history.mark("done");
        outcome
    }

    fn run(
        &self,
        ctx: &RunContext,
        tee: Option<&mut dyn Write>,
        report_path: &mut Option<PathBuf>,
    ) -> Result<Option<i32>, RunError> {
        let _lock = if ctx.use_lock {
            let name = ctx.rule_name.as_deref().ok_or(RunError::NoLockName)?;
            let lock = RuleLock::acquire(&self.config.lock_path(name)).map_err(RunError::Lock)?;
            self.history.info("lock", "obtained lock");
            Some(lock)
        } else {
            self.history.info("lock", "bypassing lock");
            None
        };

        let mut report = Report::create(&self.config.reports_dir).map_err(RunError::Report)?;
        *report_path = Some(report.path().to_path_buf());
        self.history
            .info("report", &report.path().display().to_string());
        report.marker("start").map_err(RunError::Report)?;

        let program = &self.config.rsync_program;
        self.history.info("command", &ctx.command_line(program));

        let (stdout, stderr) = report.child_output().map_err(RunError::Report)?;
        let mut child = Command::new(program)
            .args(ctx.args())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let status = match tee {
            Some(out) => follow(&mut child, report.path(), out, self.config.poll_interval),
            None => child.wait(),
        }
        .map_err(RunError::Wait)?;

        let code = status.code();
        let end = match code {
            Some(code) => format!("end exit={code}"),
            None => "end exit=signal".to_string(),
        };
        if let Err(e) = report.marker(&end) {
            log::warn!("Failed to write end marker to {}: {}", report.path().display(), e);
        }

        Ok(code)
    }
}

/// Copy new report bytes to `out` until the child has exited and the report
/// has been read to its end
///
/// Exit is checked before each read, so the read that follows an observed
/// exit always sees the child's final output. A failing tee falls back to a
/// plain wait; rsync is never abandoned.
fn follow(
    child: &mut Child,
    report: &Path,
    out: &mut dyn Write,
    poll_interval: Duration,
) -> io::Result<ExitStatus> {
    let mut reader = match File::open(report) {
        Ok(reader) => reader,
        Err(e) => {
            log::warn!("Cannot show report {}: {}", report.display(), e);
            return child.wait();
        }
    };
    let mut buf = [0u8; 8192];

    loop {
        let exited = child.try_wait()?;

        let copied = match drain(&mut reader, out, &mut buf) {
            Ok(copied) => copied,
            Err(e) => {
                log::warn!("Stopped showing report {}: {}", report.display(), e);
                return match exited {
                    Some(status) => Ok(status),
                    None => child.wait(),
                };
            }
        };

        match exited {
            Some(status) if copied == 0 => return Ok(status),
            Some(_) => continue,
            None if copied == 0 => thread::sleep(poll_interval),
            None => {}
        }
    }
}

/// Copy everything currently readable; returns the byte count
fn drain(reader: &mut File, out: &mut dyn Write, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    loop {
        let n = reader.read(buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        total += n;
    }
    out.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(name: Option<&str>) -> RunContext {
        RunContext {
            rule_name: name.map(str::to_string),
            comment: Some("project trees".to_string()),
            source: Endpoint::parse("alice@build01:/data/project/"),
            destination: Endpoint::parse("bob@backup01:/mnt/data"),
            excludes: vec!["*.o".to_string(), ".cache".to_string()],
            allow_delete: false,
            dry_rsync: false,
            use_lock: true,
            confirm_all: false,
        }
    }

    #[test]
    fn test_args_order() {
        let mut ctx = context(Some("project"));
        assert_eq!(
            ctx.args(),
            vec![
                "-avz",
                "--exclude=*.o",
                "--exclude=.cache",
                "/data/project/",
                "bob@backup01:/mnt/data",
            ]
        );

        ctx.allow_delete = true;
        ctx.dry_rsync = true;
        ctx.excludes.clear();
        assert_eq!(
            ctx.args(),
            vec![
                "-avz",
                "--delete",
                "--dry-run",
                "/data/project/",
                "bob@backup01:/mnt/data",
            ]
        );
        assert_eq!(
            ctx.command_line(Path::new("rsync")),
            "rsync -avz --delete --dry-run /data/project/ bob@backup01:/mnt/data"
        );
    }

    #[test]
    fn test_outcome_summary() {
        assert_eq!(RunOutcome::Skipped.summary(), "skipped");
        let outcome = RunOutcome::Completed {
            exit_code: Some(23),
            report: PathBuf::from("/r.txt"),
        };
        assert_eq!(outcome.summary(), "completed (exit 23)");
        assert_eq!(outcome.report(), Some(Path::new("/r.txt")));
        let outcome = RunOutcome::Failed {
            reason: "cannot get lock".to_string(),
            report: None,
        };
        assert_eq!(outcome.summary(), "failed (cannot get lock)");
        assert_eq!(outcome.report(), None);
    }

    #[test]
    fn test_report_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = Report::create(dir.path()).unwrap();
        let second = Report::create(dir.path()).unwrap();
        assert_ne!(first.path(), second.path());

        let name = first.path().file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".txt"));
        // 2026-10-19T12:00:00-
        assert_eq!(&name[4..5], "-");
        assert_eq!(&name[10..11], "T");
        assert_eq!(&name[19..20], "-");
    }

    #[test]
    fn test_rule_lock_is_exclusive() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("project");

        let held = RuleLock::acquire(&path).unwrap();
        assert!(RuleLock::acquire(&path).is_err());
        drop(held);
        assert!(RuleLock::acquire(&path).is_ok());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        struct Fixture {
            _dir: TempDir,
            config: RmirrConfig,
            history: History,
            marker: PathBuf,
        }

        /// Working directory with a fake rsync that echoes its arguments
        fn fixture(script_body: &str) -> Fixture {
            let dir = TempDir::new().unwrap();
            let mut config = RmirrConfig::with_work_dir(dir.path().join("work"));
            config.ensure_dirs().unwrap();
            config.poll_interval = Duration::from_millis(10);

            let marker = dir.path().join("ran");
            let script = dir.path().join("fake-rsync");
            std::fs::write(
                &script,
                format!(
                    "#!/bin/sh\ntouch '{}'\necho \"args: $*\"\n{}\n",
                    marker.display(),
                    script_body
                ),
            )
            .unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            config.rsync_program = script;

            let history = History::new(&config.history_file, "build01");
            Fixture {
                _dir: dir,
                config,
                history,
                marker,
            }
        }

        fn events(history: &History) -> Vec<String> {
            std::fs::read_to_string(history.path())
                .unwrap()
                .lines()
                .map(|line| {
                    let value: serde_json::Value = serde_json::from_str(line).unwrap();
                    value["event"].as_str().unwrap().to_string()
                })
                .collect()
        }

        #[test]
        fn test_completed_run_captures_report() {
            let fx = fixture("echo oops >&2\nexit 3");
            let executor = Executor::new(&fx.config, &fx.history);

            let outcome = executor.execute(&context(Some("project")), None);
            let RunOutcome::Completed { exit_code, report } = outcome else {
                panic!("unexpected outcome {outcome:?}");
            };
            assert_eq!(exit_code, Some(3));
            assert!(report.starts_with(&fx.config.reports_dir));

            let text = std::fs::read_to_string(&report).unwrap();
            let lines: Vec<&str> = text.lines().collect();
            assert!(lines[0].starts_with("rmirr: start "));
            assert_eq!(
                lines[1],
                "args: -avz --exclude=*.o --exclude=.cache /data/project/ bob@backup01:/mnt/data"
            );
            assert_eq!(lines[2], "oops");
            assert!(lines[3].starts_with("rmirr: end exit=3 "));

            assert_eq!(
                events(&fx.history),
                vec!["start", "parameters", "lock", "report", "command", "completed", "done"]
            );

            // Lock released
            assert!(RuleLock::acquire(&fx.config.lock_path("project")).is_ok());
        }

        #[test]
        fn test_lock_contention_never_spawns() {
            let fx = fixture("exit 0");
            let executor = Executor::new(&fx.config, &fx.history);

            let held = RuleLock::acquire(&fx.config.lock_path("project")).unwrap();
            let outcome = executor.execute(&context(Some("project")), None);
            let RunOutcome::Failed { reason, report } = outcome else {
                panic!("unexpected outcome {outcome:?}");
            };
            assert!(report.is_none());
            // The cause follows the summary
            assert!(reason.starts_with("cannot get lock: "), "{reason}");
            assert!(reason.len() > "cannot get lock: ".len());
            assert!(!fx.marker.exists());
            assert_eq!(events(&fx.history).last().map(String::as_str), Some("done"));

            let logged = std::fs::read_to_string(fx.history.path()).unwrap();
            assert!(logged.contains(&reason));
            drop(held);

            // Nothing left behind: the next run gets the lock and runs
            let outcome = executor.execute(&context(Some("project")), None);
            assert!(matches!(outcome, RunOutcome::Completed { exit_code: Some(0), .. }));
            assert!(fx.marker.exists());
            assert!(RuleLock::acquire(&fx.config.lock_path("project")).is_ok());
        }

        #[test]
        fn test_unnamed_rule_cannot_lock() {
            let fx = fixture("exit 0");
            let executor = Executor::new(&fx.config, &fx.history);

            let outcome = executor.execute(&context(None), None);
            assert!(matches!(outcome, RunOutcome::Failed { report: None, .. }));
            assert!(!fx.marker.exists());

            let mut ctx = context(None);
            ctx.use_lock = false;
            let outcome = executor.execute(&ctx, None);
            assert!(matches!(outcome, RunOutcome::Completed { .. }));
        }

        #[test]
        fn test_spawn_failure_releases_lock() {
            let mut fx = fixture("exit 0");
            fx.config.rsync_program = fx.config.work_dir.join("no-such-rsync");
            let executor = Executor::new(&fx.config, &fx.history);

            let outcome = executor.execute(&context(Some("project")), None);
            let RunOutcome::Failed { reason, report } = outcome else {
                panic!("unexpected outcome {outcome:?}");
            };
            assert!(reason.starts_with("cannot run "));
            assert!(reason.contains(": "), "{reason}");
            // Report was opened before the spawn and stays as a record
            assert!(report.unwrap().exists());
            assert!(RuleLock::acquire(&fx.config.lock_path("project")).is_ok());
        }

        #[test]
        fn test_tee_shows_final_output() {
            let fx = fixture("echo first\nsleep 0.2\necho last line");
            let executor = Executor::new(&fx.config, &fx.history);

            let mut shown = Vec::<u8>::new();
            let outcome = executor.execute(&context(Some("project")), Some(&mut shown as &mut dyn Write));
            assert!(matches!(outcome, RunOutcome::Completed { exit_code: Some(0), .. }));

            let shown = String::from_utf8(shown).unwrap();
            assert!(shown.contains("first\n"));
            assert!(shown.ends_with("last line\n"));
        }
    }
}
