// dli-switch: read or replace the script stored on a DLI Web Power Switch.

mod config;
mod http;
mod source;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use dli_core::{Endpoint, Switch, SyncOutcome};
use indicatif::{ProgressBar, ProgressStyle};

use crate::http::HttpTransport;

/// Write a script to a DLI Web Power Switch.
///
/// This program will stop all threads on the switch, overwrite the entire script stored
/// on it, verify it, and start a thread at the first line of your script.
///
/// If writing the script is interrupted, your switch's script may be left in an
/// inconsistent state and will not be running. You can safely run this again to fix
/// this and get scripting running again.
#[derive(Debug, Parser)]
#[command(name = "dli-switch", version)]
struct Cli {
    /// What to do with the switch's script.
    #[arg(value_enum)]
    mode: Mode,
    /// Hostname or IP address of a DLI Web Power Switch.
    host: String,
    /// File containing a DLI-flavored Basic script (write mode only).
    script: Option<PathBuf>,
    /// Username to provide to the switch [default: admin].
    #[arg(long)]
    user: Option<String>,
    /// Password to provide to the switch [default: 1234].
    #[arg(long = "pass")]
    password: Option<String>,
    /// Maximum seconds to wait for any single request [default: 3].
    #[arg(long)]
    timeout: Option<u64>,
    /// Attempts on any single request before aborting the entire run [default: 3].
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    attempts: Option<u32>,
    /// Line to start a thread at after a verified write.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=127))]
    start_line: u16,
    /// Log each request.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Read,
    Write,
}

impl Cli {
    /// Mode/argument combinations clap can't express; exits with the usage status.
    fn check_usage(&self) {
        let mut cmd = Cli::command();
        match (self.mode, &self.script) {
            (Mode::Read, Some(_)) => cmd
                .error(ErrorKind::ArgumentConflict, "don't give me a file in read mode")
                .exit(),
            (Mode::Write, None) => cmd
                .error(ErrorKind::MissingRequiredArgument, "write mode needs a SCRIPT file")
                .exit(),
            _ => {}
        }
    }

    fn endpoint(&self, cfg: &config::Config) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            user: self.user.clone().unwrap_or_else(|| cfg.user.clone()),
            password: self.password.clone().unwrap_or_else(|| cfg.password.clone()),
            timeout: Duration::from_secs(self.timeout.unwrap_or(cfg.timeout_secs)),
            attempts: self.attempts.unwrap_or(cfg.attempts),
        }
    }
}

/// How the invocation ended. Success and failure never share a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Read,
    Running,
    /// Written but not verified; scripting left stopped.
    Unverified,
    Fatal,
}

impl Outcome {
    fn code(self) -> u8 {
        match self {
            Outcome::Read | Outcome::Running => 0,
            Outcome::Unverified => 1,
            Outcome::Fatal => 255,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.code())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.check_usage();
    init_tracing(cli.verbose);

    let endpoint = cli.endpoint(&config::load());
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("ERROR: starting runtime: {}", e);
            return Outcome::Fatal.into();
        }
    };
    let outcome = rt.block_on(async {
        tokio::select! {
            result = run(&cli, endpoint) => match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("\nERROR: {:#}", e);
                    Outcome::Fatal
                }
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nInterrupted.");
                if cli.mode == Mode::Write {
                    eprintln!("Scripting may be stopped with a partial script; run write again to recover.");
                }
                Outcome::Fatal
            }
        }
    });
    outcome.into()
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, endpoint: Endpoint) -> anyhow::Result<Outcome> {
    let transport = HttpTransport::new(&endpoint).context("building HTTP client")?;
    let switch = Switch::new(endpoint, transport);
    match cli.mode {
        Mode::Read => {
            let script = switch.read().await?;
            println!("{}", script.lines().join("\n"));
            Ok(Outcome::Read)
        }
        Mode::Write => {
            let path = cli.script.as_deref().context("write mode needs a SCRIPT file")?;
            // Capacity is checked here, before anything is sent.
            let script = dli_core::encode(source::load(path)?)?;
            write(&switch, &script, usize::from(cli.start_line)).await
        }
    }
}

async fn write(
    switch: &Switch<HttpTransport>,
    script: &dli_core::FixedScript,
    start_line: usize,
) -> anyhow::Result<Outcome> {
    let total = script.len() as u64;
    let bar = ProgressBar::new(total);
    bar.set_style(ProgressStyle::with_template("{msg} {percent:>3}% [{bar:40}] {pos}/{len}")?);
    bar.set_message("Writing script...");
    let result = switch
        .sync(script, start_line, |fraction| {
            bar.set_position((fraction * total as f64).round() as u64)
        })
        .await;
    bar.finish();

    match result? {
        SyncOutcome::Running { line } => {
            println!("Verified. Started a thread at line {}.", line);
            Ok(Outcome::Running)
        }
        SyncOutcome::Unverified(m) => {
            eprintln!(
                "\nVerification first failed on line {}: wrote '{}' but the switch has '{}'",
                m.index, m.expected, m.actual
            );
            eprintln!("Scripting is stopped; the new script was not started.");
            Ok(Outcome::Unverified)
        }
    }
}
