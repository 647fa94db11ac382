mod cli;
mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sumo_core::Manager;
use sumo_serial::SerialOptions;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands work without a valid configuration
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "sumo", &mut std::io::stdout());
            Ok(())
        }

        Command::Ports(args) => {
            let cfg = load_config(&cli.global)?;
            commands::ports::handle(&args, &cfg, &cli.global)
        }

        cmd => {
            let cfg = load_config(&cli.global)?;
            let backend = sumo_serial::system_backend(&serial_options(&cfg.serial));
            let manager = Manager::new(cfg.to_manager_config()?, backend)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &manager, &cli.global).await;
            manager.shutdown().await;
            result
        }
    }
}

fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(sumo_config::config_path)
}

fn load_config(global: &GlobalOpts) -> Result<sumo_config::Config, CliError> {
    Ok(sumo_config::load_config_from(&config_file(global))?)
}

fn serial_options(serial: &sumo_config::SerialSection) -> SerialOptions {
    SerialOptions {
        baud: serial.baud,
        timeout: Duration::from_secs(serial.response_timeout),
        raw_delay: Duration::from_millis(serial.raw_delay_ms),
        esptool: serial.esptool.clone(),
        chip: serial.chip.clone(),
    }
}
