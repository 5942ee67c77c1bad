mod cli;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use iplimit::device::{DeviceResolver, Fixed, Interfaces};
use iplimit::serve::{self, Session};
use iplimit::shell::{Shell, SystemShell};
use iplimit::{BandwidthLimiter, Result};
use simple_logger::SimpleLogger;

use crate::cli::{Cli, Command};

type Resolver = Box<dyn DeviceResolver + Send>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = SimpleLogger::new().with_level(cli.log_level.filter()).init() {
        eprintln!("failed to set up logging: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let resolver: Resolver = match cli.device.clone() {
        Some(device) => Box::new(Fixed(device)),
        None => Box::new(Interfaces),
    };
    let limiter = BandwidthLimiter::new(SystemShell, resolver, &cli.config());
    let mut stdout = io::stdout();

    match cli.command {
        Command::Set {
            address,
            rate,
            burst,
        } => {
            let rule = limiter.set_limit(address, &rate, &burst)?;
            writeln!(stdout, "{} {} {}", rule.device, rule.address, rule.flow_id)?;
        }
        Command::Delete { address } => limiter.delete_limit(address)?,
        Command::List { address } => {
            let (device, records) = limiter.limits(address)?;
            for record in records {
                writeln!(
                    stdout,
                    "{device} {} {} {}",
                    record.address, record.flow_id, record.handle
                )?;
            }
        }
        Command::Serve { cleanup } => {
            let session = Arc::new(Mutex::new(Session::new(limiter, cleanup)));
            handle_ctrlc(session.clone());
            serve::serve(&session, io::stdin().lock(), stdout)?;
        }
    }
    Ok(())
}

fn handle_ctrlc<S>(session: Arc<Mutex<Session<S, Resolver>>>)
where
    S: Shell + Send + 'static,
{
    let installed = ctrlc::set_handler(move || {
        log::warn!("Caught SIGINT signal");
        serve::lock(&session).finish();
        std::process::exit(0);
    });
    if let Err(e) = installed {
        log::warn!("Ctrl-C cleanup is unavailable: {e}");
    }
}
