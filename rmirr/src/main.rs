// rmirr - mirror file objects to their configured destinations with rsync

use clap::Parser;
use std::io::{self, Write};

use rmirr_common::endpoint::{expand_home, normalize_path};
use rmirr_common::validation::validate_mirrors;
use rmirr_common::{MirrorsConfig, RmirrConfig};

mod cli;
mod console;
mod executor;
mod gate;
mod history;
mod identity;
mod listing;
mod mirror;
mod notify;
mod options;
mod prompt;

use cli::Cli;
use history::History;
use identity::Identity;
use mirror::{Mirrorer, PathReport};
use notify::{Notifier, SendmailTransport};
use options::RunOptions;
use prompt::TerminalPrompt;

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    std::process::exit(run(&cli));
}

/// Exit status is 1 only when startup fails; per-destination problems are
/// reported as they happen
fn run(cli: &Cli) -> i32 {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut err = io::stderr();

    let mut config = match RmirrConfig::new() {
        Ok(config) => config,
        Err(e) => {
            console::error(&mut err, &format!("cannot setup working file/dir: {e:#}"));
            return 1;
        }
    };
    if let Some(path) = &cli.config {
        config.config_file = path.clone();
    }

    if !config.config_file.exists() {
        console::error(
            &mut err,
            &format!(
                "cannot find configuration file ({})",
                config.config_file.display()
            ),
        );
        return 1;
    }

    if let Err(e) = config.ensure_dirs() {
        log::debug!("Setup failed: {e:#}");
        console::error(
            &mut err,
            &format!("cannot setup working file/dir under {}", config.work_dir.display()),
        );
        return 1;
    }

    let mut mirrors = match MirrorsConfig::load(&config.config_file) {
        Ok(mirrors) => mirrors,
        Err(e) => {
            log::debug!("Configuration load failed: {e:#}");
            console::error(&mut err, "bad/missing configuration file");
            return 1;
        }
    };

    // Listing shows the file as written
    if cli.list {
        listing::show_list(&mirrors, &mut out);
        return 0;
    }

    mirrors.normalize();
    if let Err(errors) = validate_mirrors(&mirrors) {
        console::error(&mut err, "bad/missing configuration file");
        for e in &errors {
            console::line(&mut err, &format!("    {e}"));
        }
        return 1;
    }

    let identity = match Identity::current() {
        Ok(identity) => identity,
        Err(e) => {
            console::error(&mut err, &format!("cannot determine user and host: {e:#}"));
            return 1;
        }
    };

    let options = RunOptions::from_cli(cli);
    let history = History::new(&config.history_file, identity.host.clone());
    let notifier = Notifier::new(
        Box::new(SendmailTransport::new(&config.sendmail_program)),
        identity.sender(),
    );
    let mut prompt = TerminalPrompt::stdin();

    log::debug!("Running as {} on {}", identity.user, identity.host);
    log::debug!("History at {}", history.path().display());

    let mirrorer = Mirrorer::new(
        &mirrors,
        &config,
        &options,
        &identity,
        &history,
        Some(&notifier),
    );

    if let Some(name) = &cli.suite {
        let Some(paths) = mirrors.suite(name) else {
            console::error(&mut err, &format!("unknown suite ({name})"));
            return 1;
        };
        let report = mirrorer.mirror_suite(paths, &mut prompt, &mut out);
        for (_, result) in &report.paths {
            if let Ok(path_report) = result {
                log_results(path_report);
            }
        }
        log::info!(
            "Suite {} finished: {} of {} path(s) attempted, quit={}",
            name,
            report.paths.len(),
            paths.len(),
            report.quit
        );
    } else if let Some(path) = &cli.path {
        let path = normalize_path(&expand_home(path));
        // Unresolved paths were already reported to the operator
        if let Ok(path_report) = mirrorer.mirror_path(&path, &mut prompt, &mut out) {
            log_results(&path_report);
        }
    }

    let _ = out.flush();
    0
}

fn log_results(report: &PathReport) {
    for result in &report.destinations {
        log::info!("{} -> {}: {:?}", report.path, result.destination, result.status);
    }
}
