use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use portaria::config::AnalysisConfig;

#[derive(Parser)]
#[command(
    name = "portaria",
    about = "Gate access-log auditor: anomaly scoring, alerts, charts and SQLite export",
    version,
    long_about = None
)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Access log to analyse [default: portaria_log.csv]
    #[arg(long)]
    input: Option<PathBuf>,

    /// SQLite database receiving the `acessos` table [default: acessos.db]
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory for the rendered charts [default: charts]
    #[arg(long)]
    charts_dir: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Flags override the config file, which overrides the defaults.
    fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut cfg = match &self.config {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(input) = &self.input {
            cfg.paths.input = input.clone();
        }
        if let Some(database) = &self.database {
            cfg.paths.database = database.clone();
        }
        if let Some(dir) = &self.charts_dir {
            cfg.paths.charts_dir = dir.clone();
        }
        Ok(cfg)
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("Unexpected error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match portaria::run(&config, &mut out) {
        Ok(summary) => {
            if cli.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => {
                        let _ = writeln!(out, "{json}");
                    }
                    Err(e) => tracing::error!(error = %e, "failed to serialize run summary"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "analysis aborted");
            let _ = writeln!(out, "{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
