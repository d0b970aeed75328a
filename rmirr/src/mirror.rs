//! Mirroring a path or a suite of paths
//!
//! For each path: resolve the owning rule, then for every selected
//! destination run the gate, confirm, execute and optionally mail the report.
//! Failures stay with the destination (or path) they happened on; only an
//! explicit quit stops the remaining work.

use std::io::Write;
use std::path::Path;
use thiserror::Error;

use rmirr_common::endpoint::join_relative;
use rmirr_common::{Endpoint, MirrorsConfig, Resolution, RmirrConfig, resolve};

use crate::console;
use crate::executor::{Executor, RunContext, RunOutcome};
use crate::gate::{Gate, GateCheck, Verdict};
use crate::history::History;
use crate::identity::Identity;
use crate::notify::{Notifier, RunSummary, resolve_recipients};
use crate::options::RunOptions;
use crate::prompt::{Answer, Prompt};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MirrorError {
    #[error("no match for path ({path})")]
    NoMatch { path: String },
}

/// What happened to one configured destination
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationStatus {
    /// Filtered out by the destination allow-list
    NotSelected,
    /// Stopped by a gate check
    Declined(GateCheck),
    /// Operator answered no at the execute prompt
    Skipped,
    Ran(RunOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestinationResult {
    pub destination: Endpoint,
    pub status: DestinationStatus,
}

/// Per-destination results for one path
#[derive(Debug, Clone, PartialEq)]
pub struct PathReport {
    pub path: String,
    pub destinations: Vec<DestinationResult>,
    /// The operator asked to stop all remaining work
    pub quit: bool,
}

/// Results for every attempted suite path, in order
#[derive(Debug)]
pub struct SuiteReport {
    pub paths: Vec<(String, Result<PathReport, MirrorError>)>,
    pub quit: bool,
}

/// Source endpoint as the invoking identity sees it; directories get a trailing `/`
pub fn compose_source(identity: &Identity, query: &str) -> Endpoint {
    let mut path = query.to_string();
    if Path::new(query).is_dir() && !path.ends_with('/') {
        path.push('/');
    }
    Endpoint::new(Some(&identity.user), &identity.host, Some(&path))
}

/// Destination endpoint for a resolved query
///
/// The user defaults to the invoking user. Without a configured path the
/// query path is reused; otherwise the query's path below the matched root
/// is appended to the configured one.
pub fn compose_destination(
    destination: &Endpoint,
    identity: &Identity,
    resolution: &Resolution<'_>,
) -> Endpoint {
    let mut endpoint = destination.with_default_user(&identity.user);
    endpoint.path = Some(match destination.path.as_deref() {
        None => resolution.query.clone(),
        Some(base) => join_relative(base, resolution.relative_path()),
    });
    endpoint
}

pub struct Mirrorer<'a> {
    config: &'a MirrorsConfig,
    settings: &'a RmirrConfig,
    options: &'a RunOptions,
    identity: &'a Identity,
    history: &'a History,
    notifier: Option<&'a Notifier>,
}

impl<'a> Mirrorer<'a> {
    pub fn new(
        config: &'a MirrorsConfig,
        settings: &'a RmirrConfig,
        options: &'a RunOptions,
        identity: &'a Identity,
        history: &'a History,
        notifier: Option<&'a Notifier>,
    ) -> Self {
        Self {
            config,
            settings,
            options,
            identity,
            history,
            notifier,
        }
    }

    /// Mirror every path of a suite; a path that fails does not stop the others
    pub fn mirror_suite(
        &self,
        paths: &[String],
        prompt: &mut dyn Prompt,
        out: &mut dyn Write,
    ) -> SuiteReport {
        let mut report = SuiteReport {
            paths: Vec::new(),
            quit: false,
        };

        for path in paths {
            let result = self.mirror_path(path, prompt, out);
            let quit = matches!(&result, Ok(path_report) if path_report.quit);
            report.paths.push((path.clone(), result));

            if quit {
                report.quit = true;
                break;
            }
        }

        report
    }

    pub fn mirror_path(
        &self,
        path: &str,
        prompt: &mut dyn Prompt,
        out: &mut dyn Write,
    ) -> Result<PathReport, MirrorError> {
        let Some(resolution) = resolve(path, &self.config.mirrors) else {
            console::error(out, &format!("no match for path ({path})"));
            return Err(MirrorError::NoMatch {
                path: path.to_string(),
            });
        };
        let rule = resolution.rule;

        if self.options.debug {
            console::line(out, &format!("debug: root path ({})", resolution.root_path));
            console::line(out, &format!("debug: matched path ({})", resolution.alias_path));
            if resolution.matched_alias() {
                console::line(out, &format!("debug: relative path ({})", resolution.relative_path()));
            }
            console::line(out, &format!("debug: rule ({})", rule.display_name()));
        }

        let source = compose_source(self.identity, path);
        let recipients = resolve_recipients(&self.options.mailto, rule, &self.config.defaults);
        let gate = Gate::new(self.options, self.identity);

        let mut report = PathReport {
            path: path.to_string(),
            destinations: Vec::new(),
            quit: false,
        };
        let mut first = true;

        for configured in &rule.destinations {
            let destination = compose_destination(configured, self.identity, &resolution);

            if !self.options.selects(&destination.host) {
                log::info!("Skipping destination {}", destination.host);
                if self.options.verbose {
                    console::line(
                        out,
                        &format!("verbose: skipping destination ({})", destination.host),
                    );
                }
                report.destinations.push(DestinationResult {
                    destination,
                    status: DestinationStatus::NotSelected,
                });
                continue;
            }

            if !first {
                console::line(out, "");
            }
            first = false;

            if let Verdict::Decline(check) = gate.check(&resolution, &source, prompt, out) {
                log::info!("Destination {} declined: {}", destination, check.as_str());
                report.destinations.push(DestinationResult {
                    destination,
                    status: DestinationStatus::Declined(check),
                });
                continue;
            }

            let ctx = RunContext {
                rule_name: rule.name.clone(),
                comment: rule.comment.clone(),
                source: source.clone(),
                destination: destination.clone(),
                excludes: rule.excludes.clone(),
                allow_delete: self.options.allow_delete,
                dry_rsync: self.options.dry_rsync,
                use_lock: self.options.use_lock,
                confirm_all: self.options.assume_yes,
            };
            self.print_summary(&ctx, &recipients, out);

            if !ctx.confirm_all {
                match prompt.ask("execute", true) {
                    Answer::Yes => {}
                    Answer::No => {
                        console::line(out, "skipped");
                        report.destinations.push(DestinationResult {
                            destination,
                            status: DestinationStatus::Skipped,
                        });
                        continue;
                    }
                    Answer::Quit => {
                        console::line(out, "quitting");
                        report.quit = true;
                        return Ok(report);
                    }
                }
            }

            console::line(out, "running ...");
            if self.options.dry {
                console::line(out, &ctx.command_line(&self.settings.rsync_program));
                report.destinations.push(DestinationResult {
                    destination,
                    status: DestinationStatus::Ran(RunOutcome::Skipped),
                });
                continue;
            }

            let outcome = self.run(&ctx, out);

            if self.options.mail_report {
                self.mail(&ctx, &outcome, &recipients, out);
            }

            report.destinations.push(DestinationResult {
                destination,
                status: DestinationStatus::Ran(outcome),
            });
        }

        Ok(report)
    }

    fn run(&self, ctx: &RunContext, out: &mut dyn Write) -> RunOutcome {
        if !ctx.use_lock {
            console::line(out, "info: bypassing lock");
        }

        let executor = Executor::new(self.settings, self.history);
        let outcome = if self.options.show_report {
            executor.execute(ctx, Some(&mut *out))
        } else {
            executor.execute(ctx, None)
        };

        match &outcome {
            RunOutcome::Completed {
                exit_code: Some(0), ..
            }
            | RunOutcome::Skipped => {}
            RunOutcome::Completed {
                exit_code: Some(code),
                ..
            } => console::warn(out, &format!("non-zero exit value ({code})")),
            RunOutcome::Completed {
                exit_code: None, ..
            } => console::warn(out, "rsync was killed by a signal"),
            RunOutcome::Failed { reason, .. } => console::error(out, reason),
        }

        outcome
    }

    fn mail(&self, ctx: &RunContext, outcome: &RunOutcome, recipients: &[String], out: &mut dyn Write) {
        let Some(notifier) = self.notifier else {
            return;
        };

        if recipients.is_empty() {
            console::warn(out, "no email recipients; report not sent");
            return;
        }

        let summary = RunSummary { ctx, outcome };
        if let Err(e) = notifier.send_report(recipients, &summary) {
            self.history.warn("mail", &format!("failed to send report: {e}"));
            console::warn(out, &format!("failed to send report: {e}"));
        }
    }

    fn print_summary(&self, ctx: &RunContext, recipients: &[String], out: &mut dyn Write) {
        let lines = [
            format!("name:             {}", ctx.rule_name.as_deref().unwrap_or("")),
            format!("comment:          {}", ctx.comment.as_deref().unwrap_or("")),
            format!("sync from:        {}", ctx.source),
            format!("sync to:          {}", ctx.destination),
            format!("excludes:         {}", ctx.excludes.join(" ")),
            format!("uselock:          {}", if ctx.use_lock { "yes" } else { "no" }),
            format!("email recipients: {}", recipients.join(" ")),
        ];
        for line in &lines {
            console::line(out, line);
        }

        if self.options.debug {
            console::line(out, &format!("debug: {:?}", ctx.args()));
        }
    }
}
