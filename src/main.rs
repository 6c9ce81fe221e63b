mod adapter;
mod adapter_btle;
#[cfg(test)]
mod adapter_mock;
mod config;
mod error;
mod input;
mod logging;
mod modes;
mod report;
mod session;

use crate::adapter_btle::BtleplugAdapter;
use crate::config::{Args, Mode};
use crate::error::SessionError;
use crate::input::TerminalInput;
use crate::report::LogReporter;
use crate::session::{Controller, Outcome};

use std::future::pending;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use log::{debug, error, info};

async fn interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Script terminated by user"),
        Err(err) => {
            // without a signal handler the run can still end through the prompt
            error!("unable to listen for Ctrl-C: {}", err);
            pending::<()>().await
        }
    }
}

async fn run(args: &Args, mode: &Mode) -> anyhow::Result<Outcome> {
    let adapter = BtleplugAdapter::new()
        .await
        .context("unable to set up the Bluetooth adapter")?;
    let controller = Controller::new(adapter, args.session_config(), Arc::new(LogReporter));
    let mut input = TerminalInput::new("LED>");
    let outcome = controller.run(mode, &mut input, interrupt()).await?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = logging::init_logger(args.log_file.as_deref()) {
        eprintln!("{:#}", err);
        return ExitCode::FAILURE;
    }
    debug!("args = {args:?}");

    let mode = args.mode();
    if mode == Mode::CommandRelay {
        println!("Enter 1 to turn LED ON, 0 to turn LED OFF (q to quit)");
    }

    match run(&args, &mode).await {
        Ok(outcome) => {
            info!("Finished: {:?}", outcome);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            let code = err.downcast_ref::<SessionError>().map_or(1, SessionError::exit_code);
            ExitCode::from(code)
        }
    }
}
