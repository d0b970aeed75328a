// Centralized configuration for rmirr

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Working-directory layout and external tools, with environment variable overrides
#[derive(Debug, Clone)]
pub struct RmirrConfig {
    /// Per-user working directory (default: ~/.rmirr)
    pub work_dir: PathBuf,

    /// Rule file (default: ~/.rmirr/rmirr.json)
    pub config_file: PathBuf,

    /// One lock file per rule name (default: ~/.rmirr/locks)
    pub locks_dir: PathBuf,

    /// One transcript per run attempt (default: ~/.rmirr/reports)
    pub reports_dir: PathBuf,

    /// Append-only event trail (default: ~/.rmirr/history.log)
    pub history_file: PathBuf,

    /// Mirroring binary (default: rsync from PATH)
    pub rsync_program: PathBuf,

    /// Local mail submission binary (default: /usr/sbin/sendmail)
    pub sendmail_program: PathBuf,

    /// How often the live report tee looks for new output
    pub poll_interval: Duration,
}

impl RmirrConfig {
    /// Create a new configuration with environment variable overrides
    ///
    /// Supported environment variables:
    /// - RMIRR_HOME: Override the working directory
    /// - RMIRR_CONFIG: Override the rule file path
    /// - RMIRR_RSYNC: Override the rsync binary
    /// - RMIRR_SENDMAIL: Override the sendmail binary
    ///
    /// Fails when neither RMIRR_HOME nor a home directory is available.
    pub fn new() -> Result<Self> {
        Self::with_home(dirs::home_dir().as_deref())
    }

    /// Same as [`RmirrConfig::new`] with an explicit home directory
    pub fn with_home(home: Option<&Path>) -> Result<Self> {
        let mut config = match std::env::var_os("RMIRR_HOME") {
            Some(dir) => Self::with_work_dir(PathBuf::from(dir)),
            None => {
                let home = home.context("Cannot determine home directory; set RMIRR_HOME")?;
                Self::with_work_dir(home.join(".rmirr"))
            }
        };

        if let Some(file) = std::env::var_os("RMIRR_CONFIG") {
            config.config_file = PathBuf::from(file);
        }

        if let Some(program) = std::env::var_os("RMIRR_RSYNC") {
            config.rsync_program = PathBuf::from(program);
        }

        if let Some(program) = std::env::var_os("RMIRR_SENDMAIL") {
            config.sendmail_program = PathBuf::from(program);
        }

        Ok(config)
    }

    /// Layout rooted at `work_dir` with default tools
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            config_file: work_dir.join("rmirr.json"),
            locks_dir: work_dir.join("locks"),
            reports_dir: work_dir.join("reports"),
            history_file: work_dir.join("history.log"),
            rsync_program: PathBuf::from("rsync"),
            sendmail_program: PathBuf::from("/usr/sbin/sendmail"),
            poll_interval: Duration::from_millis(500),
            work_dir,
        }
    }

    /// Lock file for a rule name
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(name)
    }

    /// Create the working, locks and reports directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.work_dir, &self.locks_dir, &self.reports_dir] {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))
}
