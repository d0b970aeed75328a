//! Command-line argument parsing

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Mirror file objects at a path to the destinations configured for it
#[derive(Parser, Debug)]
#[command(name = "rmirr", version)]
#[command(about = "Mirror file objects at <path> using rsync", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["list", "path", "suite"])))]
pub struct Cli {
    /// List suites and mirrorable paths
    #[arg(short = 'l')]
    pub list: bool,

    /// Mirror path
    #[arg(short = 'p', value_name = "PATH")]
    pub path: Option<String>,

    /// Mirror all paths belonging to a suite
    #[arg(short = 's', value_name = "SUITENAME")]
    pub suite: Option<String>,

    /// Location of the rmirr.json configuration file
    #[arg(short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Destinations (hosts) to mirror to from the list in the configuration
    #[arg(short = 'd', value_name = "HOSTNAME", value_delimiter = ',')]
    pub destinations: Vec<String>,

    /// Enable debugging
    #[arg(long)]
    pub debug: bool,

    /// Allow file object deletion
    #[arg(long)]
    pub delete: bool,

    /// Dry run; print the command instead of executing it
    #[arg(long)]
    pub dry: bool,

    /// Dry run for rsync
    #[arg(long = "dry-rsync")]
    pub dry_rsync: bool,

    /// Set/override recipients when mailing the report
    #[arg(long, value_name = "EMAILADDR", value_delimiter = ',')]
    pub mailto: Vec<String>,

    /// Mail the report
    #[arg(long)]
    pub mailreport: bool,

    /// Do not use/require the lock to run
    #[arg(long)]
    pub nolock: bool,

    /// Disable safe mode
    #[arg(long)]
    pub safeoff: bool,

    /// Show the report on the console while rsync runs
    #[arg(long)]
    pub showreport: bool,

    /// Enable verbosity
    #[arg(long)]
    pub verbose: bool,

    /// Do not ask for confirmation before executing
    #[arg(short = 'y')]
    pub yes: bool,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_mode() {
        let cli = Cli::try_parse_from(["rmirr", "-p", "/data/project", "-y", "--delete"]).unwrap();
        assert_eq!(cli.path.as_deref(), Some("/data/project"));
        assert!(cli.yes);
        assert!(cli.delete);
        assert!(!cli.nolock);
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn test_comma_lists() {
        let cli = Cli::try_parse_from([
            "rmirr",
            "-s",
            "nightly",
            "-d",
            "backup01,backup02",
            "--mailto",
            "a@example.org,b@example.org",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(cli.suite.as_deref(), Some("nightly"));
        assert_eq!(cli.destinations, vec!["backup01", "backup02"]);
        assert_eq!(cli.mailto, vec!["a@example.org", "b@example.org"]);
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn test_mode_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["rmirr", "-y"]).is_err());
        assert!(Cli::try_parse_from(["rmirr", "-l", "-p", "/x"]).is_err());
        assert!(Cli::try_parse_from(["rmirr", "-l"]).is_ok());
    }

    #[test]
    fn test_unknown_flag() {
        assert!(Cli::try_parse_from(["rmirr", "-l", "--bogus"]).is_err());
    }
}
