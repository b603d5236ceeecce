//! VCloud Saver CLI
//!
//! Developer tool for checking URLs against the classifier, dumping the
//! declarative rule set and replaying recorded event traces.

mod replay;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

use vs_core::suppressor::build_rules;
use vs_core::{Classifier, Config};

#[derive(Parser)]
#[command(name = "vs-cli")]
#[command(about = "VCloud Saver resolution pipeline tools")]
struct Cli {
    /// JSON config file (defaults to the built-in config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify URLs and extract canonical media paths
    Classify {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Print the declarative blocking rules as JSON
    Rules {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay an event trace against an in-memory browser
    Replay {
        /// Trace file (JSON array of events)
        #[arg(short, long)]
        input: PathBuf,

        /// Root URL of the extension's own pages
        #[arg(long, default_value = "chrome-extension://vcloud-saver/")]
        extension_base: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Also forwards the core crate's `log` records.
    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Classify { urls } => cmd_classify(config, &urls),
        Commands::Rules { output } => cmd_rules(&config, output.as_deref()),
        Commands::Replay { input, extension_base } => cmd_replay(config, &input, &extension_base),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn log_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, String> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    Config::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path.display(), e))
}

fn cmd_classify(config: Config, urls: &[String]) -> Result<(), String> {
    let classifier = Classifier::new(config);

    for url in urls {
        println!("{url}");
        println!("  Player page:   {}", classifier.is_player_page_url(url));
        println!("  Media file:    {}", classifier.is_media_file_url(url));
        println!("  Media host:    {}", classifier.is_media_host_url(url));
        println!("  Extension:     {}", classifier.is_extension_internal_url(url));
        match classifier.extract_canonical_media_path(url) {
            Some(canonical) => println!("  Canonical:     {canonical}"),
            None => println!("  Canonical:     (no match)"),
        }
    }

    Ok(())
}

fn cmd_rules(config: &Config, output: Option<&Path>) -> Result<(), String> {
    let rules = build_rules(config);
    let json = serde_json::to_string_pretty(&rules).map_err(|e| format!("Failed to encode rules: {}", e))?;

    match output {
        Some(path) => {
            fs::write(path, json).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
            println!("Wrote {} rules to '{}'", rules.len(), path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_replay(config: Config, input: &Path, extension_base: &str) -> Result<(), String> {
    let trace = replay::read_trace(input)?;
    let count = trace.len();
    let report = replay::run_replay(config, extension_base, trace)?;

    for line in &report.lines {
        println!("{line}");
    }
    println!();
    println!("Replayed {count} events");
    println!(
        "Session:  {}",
        serde_json::to_string_pretty(&report.session).map_err(|e| e.to_string())?
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_pipeline_debug_logs() {
        assert_eq!(log_level(true), LevelFilter::DEBUG);
        assert_eq!(log_level(false), LevelFilter::OFF);
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_config(None).map(|c| c.player_hosts), Ok(Config::default().player_hosts));
        assert!(load_config(Some(Path::new("/nonexistent/vs-config.json"))).is_err());
    }
}
