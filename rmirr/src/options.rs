//! Per-invocation run options
//!
//! Built once from the command line and passed by reference to the gate,
//! the executor and the notifier.

use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Pass `--delete` to rsync
    pub allow_delete: bool,
    /// Print the command instead of running it
    pub dry: bool,
    /// Pass `--dry-run` to rsync
    pub dry_rsync: bool,
    /// Destination host allow-list; empty means every destination
    pub destinations: Vec<String>,
    /// Explicit recipient override
    pub mailto: Vec<String>,
    pub mail_report: bool,
    pub use_lock: bool,
    /// Path-shape and trailing-separator checks
    pub safe_mode: bool,
    pub show_report: bool,
    pub verbose: bool,
    pub debug: bool,
    /// Answer every soft confirmation with yes
    pub assume_yes: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            allow_delete: false,
            dry: false,
            dry_rsync: false,
            destinations: Vec::new(),
            mailto: Vec::new(),
            mail_report: false,
            use_lock: true,
            safe_mode: true,
            show_report: false,
            verbose: false,
            debug: false,
            assume_yes: false,
        }
    }
}

impl RunOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            allow_delete: cli.delete,
            dry: cli.dry,
            dry_rsync: cli.dry_rsync,
            destinations: cli.destinations.clone(),
            mailto: cli.mailto.clone(),
            mail_report: cli.mailreport,
            use_lock: !cli.nolock,
            safe_mode: !cli.safeoff,
            show_report: cli.showreport,
            verbose: cli.verbose || cli.debug,
            debug: cli.debug,
            assume_yes: cli.yes,
        }
    }

    /// Whether a destination host passes the `-d` allow-list
    pub fn selects(&self, host: &str) -> bool {
        self.destinations.is_empty() || self.destinations.iter().any(|d| d == host)
    }
}
