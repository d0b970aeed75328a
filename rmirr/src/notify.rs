//! Mailing run reports
//!
//! A notification never changes the outcome of the run it describes; callers
//! log and show send failures as warnings.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

use rmirr_common::{Defaults, MirrorRule};

use crate::executor::{RunContext, RunOutcome};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no recipients")]
    NoRecipients,

    #[error("cannot read report {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed: {status}")]
    Transport { program: String, status: String },
}

/// Local mail submission
pub trait MailTransport {
    fn send(&self, sender: &str, recipients: &[String], message: &str) -> Result<(), NotifyError>;
}

/// Pipes the message to `sendmail -i -f <sender> -- <recipients>`
pub struct SendmailTransport {
    program: PathBuf,
}

impl SendmailTransport {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MailTransport for SendmailTransport {
    fn send(&self, sender: &str, recipients: &[String], message: &str) -> Result<(), NotifyError> {
        let program = self.program.display().to_string();
        let spawn_error = |source: io::Error| NotifyError::Spawn {
            program: program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .arg("-i")
            .arg("-f")
            .arg(sender)
            .arg("--")
            .args(recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            // Keep going on a write error; the exit status says what happened
            if let Err(e) = stdin.write_all(message.as_bytes()) {
                log::warn!("Failed to write message to {}: {}", program, e);
            }
        }

        let status = child.wait().map_err(spawn_error)?;
        if !status.success() {
            return Err(NotifyError::Transport {
                program,
                status: status.to_string(),
            });
        }

        Ok(())
    }
}

/// Recipients for a rule: the explicit override, else the rule's list, else
/// the configured defaults; the first non-empty list wins
pub fn resolve_recipients(mailto: &[String], rule: &MirrorRule, defaults: &Defaults) -> Vec<String> {
    [
        mailto,
        rule.email_recipients.as_slice(),
        defaults.email_recipients.as_slice(),
    ]
    .into_iter()
    .find(|list| !list.is_empty())
    .map(<[String]>::to_vec)
    .unwrap_or_default()
}

/// What the message body says about the run
pub struct RunSummary<'a> {
    pub ctx: &'a RunContext,
    pub outcome: &'a RunOutcome,
}

impl RunSummary<'_> {
    pub fn subject(&self) -> String {
        let report = self
            .outcome
            .report()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "no report".to_string());
        format!(
            "rmirr report for {} ({})",
            self.ctx.rule_name.as_deref().unwrap_or("(unnamed)"),
            report
        )
    }
}

pub struct Notifier {
    transport: Box<dyn MailTransport>,
    sender: String,
}

impl Notifier {
    pub fn new(transport: Box<dyn MailTransport>, sender: impl Into<String>) -> Self {
        Self {
            transport,
            sender: sender.into(),
        }
    }

    pub fn notify(
        &self,
        recipients: &[String],
        subject: &str,
        summary: &RunSummary<'_>,
        report_body: &str,
    ) -> Result<(), NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let message = self.compose(recipients, subject, summary, report_body);
        self.transport.send(&self.sender, recipients, &message)
    }

    /// Mail the report of a finished run, reading it from disk
    pub fn send_report(&self, recipients: &[String], summary: &RunSummary<'_>) -> Result<(), NotifyError> {
        let body = match summary.outcome.report() {
            Some(path) => std::fs::read_to_string(path).map_err(|source| NotifyError::Report {
                path: path.display().to_string(),
                source,
            })?,
            None => "(no report was captured)\n".to_string(),
        };

        self.notify(recipients, &summary.subject(), summary, &body)
    }

    fn compose(
        &self,
        recipients: &[String],
        subject: &str,
        summary: &RunSummary<'_>,
        report_body: &str,
    ) -> String {
        let ctx = summary.ctx;
        let report_path = summary
            .outcome
            .report()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut message = String::new();
        message.push_str(&format!("From: {}\n", self.sender));
        message.push_str(&format!("To: {}\n", recipients.join(", ")));
        message.push_str(&format!("Subject: {subject}\n"));
        message.push('\n');
        message.push_str(&format!(
            "Name:        {}\n",
            ctx.rule_name.as_deref().unwrap_or("")
        ));
        message.push_str(&format!("From:        {}\n", ctx.source));
        message.push_str(&format!("To:          {}\n", ctx.destination));
        message.push_str(&format!("Excludes:    {}\n", ctx.excludes.join(" ")));
        message.push_str(&format!("Report path: {report_path}\n"));
        message.push_str(&format!("Outcome:     {}\n", summary.outcome.summary()));
        message.push('\n');
        message.push_str("Report:\n");
        message.push_str(report_body);
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmirr_common::Endpoint;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Sent = Rc<RefCell<Vec<(String, Vec<String>, String)>>>;

    struct RecordingTransport {
        sent: Sent,
        fail: bool,
    }

    impl MailTransport for RecordingTransport {
        fn send(&self, sender: &str, recipients: &[String], message: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport {
                    program: "test".to_string(),
                    status: "exit status: 1".to_string(),
                });
            }
            self.sent
                .borrow_mut()
                .push((sender.to_string(), recipients.to_vec(), message.to_string()));
            Ok(())
        }
    }

    fn recording_notifier(fail: bool) -> (Notifier, Sent) {
        let sent: Sent = Rc::default();
        let transport = RecordingTransport {
            sent: Rc::clone(&sent),
            fail,
        };
        (
            Notifier::new(Box::new(transport), "alice@build01.example.org"),
            sent,
        )
    }

    fn context() -> RunContext {
        RunContext {
            rule_name: Some("project".to_string()),
            comment: None,
            source: Endpoint::parse("alice@build01:/data/project/"),
            destination: Endpoint::parse("bob@backup01:/mnt/data"),
            excludes: vec!["*.o".to_string()],
            allow_delete: false,
            dry_rsync: false,
            use_lock: true,
            confirm_all: false,
        }
    }

    fn rule(recipients: &[&str]) -> MirrorRule {
        MirrorRule {
            name: Some("project".to_string()),
            comment: None,
            source: Endpoint::parse("h:/data"),
            alias_names: Vec::new(),
            destinations: Vec::new(),
            excludes: Vec::new(),
            email_recipients: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_recipient_precedence() {
        let defaults = Defaults {
            email_recipients: vec!["ops@example.org".to_string()],
        };
        let mailto = vec!["me@example.org".to_string()];

        assert_eq!(
            resolve_recipients(&mailto, &rule(&["team@example.org"]), &defaults),
            vec!["me@example.org"]
        );
        assert_eq!(
            resolve_recipients(&[], &rule(&["team@example.org"]), &defaults),
            vec!["team@example.org"]
        );
        assert_eq!(resolve_recipients(&[], &rule(&[]), &defaults), vec!["ops@example.org"]);
        assert!(resolve_recipients(&[], &rule(&[]), &Defaults::default()).is_empty());
    }

    #[test]
    fn test_send_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = dir.path().join("2026-10-19T12:00:00-abc.txt");
        std::fs::write(&report, "sending incremental file list\n").unwrap();

        let ctx = context();
        let outcome = RunOutcome::Completed {
            exit_code: Some(0),
            report: report.clone(),
        };
        let summary = RunSummary {
            ctx: &ctx,
            outcome: &outcome,
        };
        assert_eq!(
            summary.subject(),
            "rmirr report for project (2026-10-19T12:00:00-abc.txt)"
        );

        let (notifier, sent) = recording_notifier(false);
        let recipients = vec!["ops@example.org".to_string(), "me@example.org".to_string()];
        notifier.send_report(&recipients, &summary).unwrap();

        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);
        let (sender, to, message) = &sent[0];
        assert_eq!(sender, "alice@build01.example.org");
        assert_eq!(to, &recipients);
        assert!(message.starts_with("From: alice@build01.example.org\nTo: ops@example.org, me@example.org\n"));
        assert!(message.contains("Subject: rmirr report for project (2026-10-19T12:00:00-abc.txt)\n\n"));
        assert!(message.contains("From:        alice@build01:/data/project/\n"));
        assert!(message.contains("To:          bob@backup01:/mnt/data\n"));
        assert!(message.contains("Outcome:     completed (exit 0)\n"));
        assert!(message.ends_with("Report:\nsending incremental file list\n"));
    }

    #[test]
    fn test_failed_run_without_report() {
        let ctx = context();
        let outcome = RunOutcome::Failed {
            reason: "cannot get lock".to_string(),
            report: None,
        };
        let summary = RunSummary {
            ctx: &ctx,
            outcome: &outcome,
        };
        assert_eq!(summary.subject(), "rmirr report for project (no report)");

        let (notifier, sent) = recording_notifier(false);
        notifier
            .send_report(&["ops@example.org".to_string()], &summary)
            .unwrap();
        assert!(sent.borrow()[0].2.contains("(no report was captured)"));
    }

    #[test]
    fn test_errors() {
        let ctx = context();
        let outcome = RunOutcome::Skipped;
        let summary = RunSummary {
            ctx: &ctx,
            outcome: &outcome,
        };

        let (notifier, _) = recording_notifier(false);
        assert!(matches!(
            notifier.notify(&[], "s", &summary, ""),
            Err(NotifyError::NoRecipients)
        ));

        let (notifier, _) = recording_notifier(true);
        assert!(matches!(
            notifier.notify(&["a@example.org".to_string()], "s", &summary, ""),
            Err(NotifyError::Transport { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_sendmail_transport() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let captured = dir.path().join("captured");
        let script = dir.path().join("sendmail");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$*\" > '{0}'\ncat >> '{0}'\n",
                captured.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transport = SendmailTransport::new(&script);
        transport
            .send("alice@build01", &["ops@example.org".to_string()], "Subject: hi\n\nbody\n")
            .unwrap();

        let text = std::fs::read_to_string(&captured).unwrap();
        assert_eq!(text, "-i -f alice@build01 -- ops@example.org\nSubject: hi\n\nbody\n");

        let missing = SendmailTransport::new(dir.path().join("no-sendmail"));
        assert!(matches!(
            missing.send("a@b", &["c@d".to_string()], "x"),
            Err(NotifyError::Spawn { .. })
        ));
    }
}
