//! Who and where rmirr is running

use anyhow::{Context, Result, anyhow};
use std::process::Command;

/// Invoking user name and fully-qualified host name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub host: String,
}

impl Identity {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }

    /// Look up the current user and host
    pub fn current() -> Result<Self> {
        let uid = nix::unistd::getuid();
        let user = nix::unistd::User::from_uid(uid)
            .context("Failed to look up current user")?
            .ok_or_else(|| anyhow!("No passwd entry for uid {}", uid))?
            .name;

        Ok(Self::new(user, fqdn()?))
    }

    /// Mail sender address
    pub fn sender(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Fully-qualified host name, falling back to the kernel host name
fn fqdn() -> Result<String> {
    // Best effort: `hostname -f` consults the resolver
    if let Ok(output) = Command::new("hostname").arg("-f").output() {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return Ok(name);
            }
        }
    }

    log::debug!("hostname -f unavailable, using kernel host name");
    let name = nix::unistd::gethostname().context("Failed to get host name")?;
    Ok(name.to_string_lossy().into_owned())
}
