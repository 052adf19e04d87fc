//! Console output and log setup.
//!
//! Progress lines go to stdout with `colored`; diagnostics go through
//! `tracing` to stderr, filtered by `RUST_LOG` (default `tastelog=info`).

use colored::*;
use tracing_subscriber::EnvFilter;

use crate::fetch::{ItemProgress, ItemStatus};

pub fn init_logging(verbose: bool) {
    let default = if verbose { "tastelog=debug" } else { "tastelog=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn banner(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(title.chars().count()));
}

pub fn field(name: &str, value: impl std::fmt::Display) {
    println!("{:<10}: {}", name, value);
}

pub fn step(message: &str) {
    println!("  {} {}", "→".bright_black(), message);
}

pub fn done(message: &str) {
    println!("    {} {}", "✓".green(), message);
}

pub fn skipped(message: &str) {
    println!("    {} {}", "↷".bright_black(), message.yellow());
}

pub fn item(progress: &ItemProgress<'_>) {
    let counter = format!("[{}/{}]", progress.position, progress.total);
    match &progress.status {
        ItemStatus::Found => println!(
            "    {} {} {}",
            counter.bright_blue(),
            progress.label.bright_white(),
            "✓".green()
        ),
        ItemStatus::Missed(miss) => println!(
            "    {} {} {} {}",
            counter.bright_blue(),
            progress.label.bright_white(),
            "✗".yellow(),
            miss.to_string().bright_black()
        ),
        ItemStatus::Failed(err) => println!(
            "    {} {} {} {}",
            counter.bright_blue(),
            progress.label.bright_white(),
            "✗".red(),
            err.to_string().bright_red()
        ),
    }
}

pub fn rule() {
    println!();
    println!("{}", "═".repeat(60).bright_black());
    println!();
}

pub fn count(label: &str, value: usize) {
    println!("  {} {}", format!("{}:", label).white(), value);
}

pub fn misses(title: &str, misses: &[(String, crate::fetch::Miss)]) {
    if misses.is_empty() {
        return;
    }
    println!();
    println!("{}", title.yellow().bold());
    for (key, reason) in misses {
        println!(
            "  {} {} - {}",
            "✗".yellow(),
            key.bright_white(),
            reason.to_string().bright_black()
        );
    }
}

pub fn failure(err: &crate::error::SyncError) {
    eprintln!();
    eprintln!("{} {}", "Error:".red().bold(), err.to_string().bright_red());
    eprintln!("  exit code {}", err.exit_code());
}
