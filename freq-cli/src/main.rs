use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use env_logger::{Env, Target};
use freq_responder::{Config, Session};

const DEFAULT_CONFIG: &str = "/etc/freq/freq.cfg";

#[derive(Parser, Debug)]
#[command(name = "freq-cli")]
#[command(about = "Answer a mailer file request described by a SRIF", long_about = None)]
struct Cli {
    /// Responder configuration
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Print the session report as JSON
    #[arg(long)]
    report: bool,

    /// Descriptor written by the mailer
    srif: PathBuf,
}

fn main() -> ExitCode {
    let args = Cli::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("freq-cli: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    init_logging(config.log_file.as_deref())?;

    let report = Session::new(&config).run_file(&args.srif)?;
    log::info!(
        "[{}] done: {} of {} requests found",
        report.session_id,
        report.fulfilled(),
        report.results.len()
    );

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("can't open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
