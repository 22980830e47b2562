//! `clicksim`: run the BG96 and NFC example applications against
//! simulated Click boards.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use click_at::Status;
use click_runner::{simulated_bg96, simulated_nfc, ClickConfig, DEFAULT_BG96_SCRIPT};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Polls granted to the NFC application per requested tag.
const NFC_POLLS_PER_TAG: u32 = 64;

#[derive(Parser, Debug)]
#[command(name = "clicksim")]
#[command(about = "Drive the Click board drivers against simulated hardware")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a BG96 command script
    Bg96 {
        /// Comma-separated command names
        #[arg(long, value_delimiter = ',')]
        script: Vec<String>,
    },
    /// Read tags with the PN7150
    Nfc {
        /// Number of tag read cycles
        #[arg(long)]
        tags: Option<u32>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run_bg96(config: &ClickConfig, script: Vec<String>) -> Result<bool, Box<dyn std::error::Error>> {
    let script = if script.is_empty() {
        DEFAULT_BG96_SCRIPT.iter().map(|s| s.to_string()).collect()
    } else {
        script
    };

    let mut app = simulated_bg96(config);
    let results = app.run_script(&script)?;

    let mut all_ok = true;
    for result in &results {
        let ok = result.status == Status::Ok;
        all_ok &= ok;
        match (&result.error, result.data.is_empty()) {
            (Some(err), _) => println!("{:<12} {:?} ({})", result.command, result.status, err),
            (None, true) => println!("{:<12} {:?}", result.command, result.status),
            (None, false) => println!("{:<12} {:?} {}", result.command, result.status, result.data.replace('\n', " | ")),
        }
    }
    info!(commands = results.len(), elapsed_ms = app.now_ms(), "bg96 script finished");
    Ok(all_ok)
}

fn run_nfc(config: &ClickConfig, tags: Option<u32>) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = config.clone();
    if let Some(tags) = tags {
        config.app.tag_cycles = tags;
    }
    info!(
        i2c_address = config.nfc.i2c_address,
        cycles = config.app.tag_cycles,
        "nfc: starting"
    );

    let mut app = simulated_nfc(&config);
    let polls = NFC_POLLS_PER_TAG.saturating_mul(config.app.tag_cycles.max(1));
    let reads = app.run(polls)?;
    for read in reads {
        println!(
            "uid {} block {}: {}",
            hex::encode_upper(&read.uid),
            read.block,
            hex::encode_upper(&read.data)
        );
    }
    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => match ClickConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                error!(path = %path.display(), %err, "failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => ClickConfig::default(),
    };

    let outcome = match cli.command {
        Command::Bg96 { script } => run_bg96(&config, script),
        Command::Nfc { tags } => run_nfc(&config, tags),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(%err, "run failed");
            ExitCode::FAILURE
        }
    }
}
