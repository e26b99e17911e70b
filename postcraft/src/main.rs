//! Guided post-creation workflow CLI.
//!
//! `postcraft run` walks one post from product facts to publication against
//! the configured backend. Config lives in `postcraft.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;

use postcraft::controller::WorkflowController;
use postcraft::core::types::FormInput;
use postcraft::io::config::{AppConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use postcraft::io::services::Services;
use postcraft::session::{SessionOutcome, run_session};
use postcraft::{exit_codes, logging};

#[derive(Parser)]
#[command(name = "postcraft", version, about = "Guided post-creation workflow")]
struct Cli {
    /// Config file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Load and validate the config file.
    CheckConfig,
    /// Run the workflow interactively on stdin/stdout.
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Product page URL.
    #[arg(long)]
    url: String,
    /// What was decided about the product.
    #[arg(long)]
    decided: String,
    /// Post date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,
    #[arg(long, default_value = "")]
    anniversary: String,
    #[arg(long, default_value = "")]
    remarks: String,
}

impl RunArgs {
    fn into_form(self) -> FormInput {
        FormInput {
            date: Some(self.date.unwrap_or_else(|| Local::now().date_naive())),
            url: self.url,
            decided: self.decided,
            anniversary: self.anniversary,
            remarks: self.remarks,
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::InitConfig { force } => cmd_init_config(&cli.config, force),
        Command::CheckConfig => cmd_check_config(&cli.config),
        Command::Run(args) => cmd_run(&cli.config, args).await,
    }
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &AppConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_check_config(path: &Path) -> Result<i32> {
    let config = load_config(path)?;
    let publisher = if config.archive.enabled {
        format!("archive {}", config.archive.path.display())
    } else {
        "backend".to_string()
    };
    println!(
        "config ok: backend {} (timeout {}s), publish to {publisher}",
        config.backend.base_url, config.backend.timeout_secs
    );
    Ok(exit_codes::OK)
}

async fn cmd_run(path: &Path, args: RunArgs) -> Result<i32> {
    let config = load_config(path)?;
    let services = Services::from_config(&config)?;
    let mut controller = WorkflowController::new(services);
    info!(backend = %config.backend.base_url, "starting workflow");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let outcome = run_session(&mut controller, args.into_form(), stdin, &mut stdout).await?;
    match outcome {
        SessionOutcome::Published(_) => Ok(exit_codes::OK),
        SessionOutcome::Abandoned => {
            eprintln!("abandoned at step '{}'", controller.step());
            Ok(exit_codes::ABANDONED)
        }
    }
}
