//! Pre-execution safety checks
//!
//! Checks run in a fixed order for every destination. The existence check is
//! hard; every other check only asks for confirmation, which `-y` answers.
//! A decline stops the current destination only.

use std::io::Write;
use std::path::Path;

use rmirr_common::{Endpoint, Resolution};

use crate::console;
use crate::identity::Identity;
use crate::options::RunOptions;
use crate::prompt::Prompt;

/// The check that stopped a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCheck {
    SourceMissing,
    PathShape,
    TrailingSeparator,
    UserMismatch,
    HostMismatch,
}

impl GateCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateCheck::SourceMissing => "source missing",
            GateCheck::PathShape => "unexpected path shape",
            GateCheck::TrailingSeparator => "no trailing separator",
            GateCheck::UserMismatch => "user mismatch",
            GateCheck::HostMismatch => "host mismatch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Decline(GateCheck),
}

pub struct Gate<'a> {
    options: &'a RunOptions,
    identity: &'a Identity,
}

impl<'a> Gate<'a> {
    pub fn new(options: &'a RunOptions, identity: &'a Identity) -> Self {
        Self { options, identity }
    }

    pub fn check(
        &self,
        resolution: &Resolution<'_>,
        source: &Endpoint,
        prompt: &mut dyn Prompt,
        out: &mut dyn Write,
    ) -> Verdict {
        if !Path::new(&resolution.query).exists() {
            console::warn(
                out,
                &format!(
                    "skipping path ({}); does not exist on source",
                    resolution.query
                ),
            );
            return Verdict::Decline(GateCheck::SourceMissing);
        }

        if self.options.safe_mode {
            if let Some(relative) = unexpected_shape(resolution) {
                let message = format!(
                    "unexpected values for root ({}) and relative path ({})",
                    resolution.alias_path, relative
                );
                if !self.soft(&message, prompt, out) {
                    return Verdict::Decline(GateCheck::PathShape);
                }
            }

            let source_str = source.to_string();
            if !source_str.ends_with('/') {
                let message = format!("source ({source_str}) does not end with '/'");
                if !self.soft(&message, prompt, out) {
                    return Verdict::Decline(GateCheck::TrailingSeparator);
                }
            }
        }

        let declared = &resolution.rule.source;

        // A source without a user never matches the invoking user
        if declared.user.as_deref() != Some(self.identity.user.as_str()) {
            let message = format!(
                "you ({}) do not match source user ({})",
                self.identity.user,
                declared.user.as_deref().unwrap_or("none")
            );
            if !self.soft(&message, prompt, out) {
                return Verdict::Decline(GateCheck::UserMismatch);
            }
        }

        if declared.host != self.identity.host {
            let message = format!(
                "this host ({}) does not match source host ({})",
                self.identity.host, declared.host
            );
            if !self.soft(&message, prompt, out) {
                return Verdict::Decline(GateCheck::HostMismatch);
            }
        }

        Verdict::Proceed
    }

    /// Warn, then confirm unless assuming yes
    fn soft(&self, message: &str, prompt: &mut dyn Prompt, out: &mut dyn Write) -> bool {
        console::warn(out, message);
        if self.options.assume_yes {
            return true;
        }
        prompt.confirm("continue")
    }
}

/// The raw relative path when the query does not continue the matched root
/// at a separator, or continues it with more than one
fn unexpected_shape(resolution: &Resolution<'_>) -> Option<String> {
    let rest = resolution.query.strip_prefix(&resolution.alias_path)?;
    if rest.is_empty() {
        return None;
    }

    let at_boundary = resolution.alias_path.ends_with('/') || rest.starts_with('/');
    let relative = rest.strip_prefix('/').unwrap_or(rest);

    if at_boundary && !relative.starts_with('/') {
        None
    } else {
        Some(relative.to_string())
    }
}
