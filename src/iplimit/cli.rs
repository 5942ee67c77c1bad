use std::net::IpAddr;

use clap::{Parser, Subcommand, ValueEnum};
use iplimit::config::{Config, DEFAULT_TC};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// tc binary to run.
    #[arg(long, value_name = "PATH", env = "IPLIMIT_TC", default_value = DEFAULT_TC)]
    pub tc: String,

    #[arg(
        short,
        long,
        value_name = "LEVEL",
        env = "IPLIMIT_LOG",
        value_enum,
        default_value_t = LogLevel::Info
    )]
    pub log_level: LogLevel,

    /// Shape on this device instead of the one carrying the address.
    #[arg(short, long, env = "IPLIMIT_DEVICE")]
    pub device: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Limit traffic from ADDRESS, replacing any previous limit.
    Set {
        address: IpAddr,
        /// tc rate, e.g. 1mbit
        rate: String,
        /// tc burst, e.g. 32kbit
        burst: String,
    },
    /// Remove the limit on ADDRESS.
    Delete { address: IpAddr },
    /// Show the limits on the device carrying ADDRESS.
    List { address: IpAddr },
    /// Read `Set:`/`Delete:`/`Stop` messages from stdin.
    Serve {
        /// Remove the limits set by this session when it ends.
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            tc_binary: self.tc.clone(),
        }
    }
}
