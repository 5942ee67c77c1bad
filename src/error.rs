use std::io;
use std::net::IpAddr;

use crate::filter::FlowId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no free {what} id left in 1..=0xffff")]
    AllocationExhausted { what: &'static str },
    #[error("no local device carries {0}")]
    DeviceNotFound(IpAddr),
    #[error("`{command}` failed: {output}")]
    CommandFailed { command: String, output: String },
    /// The filter is gone but its class is still installed.
    #[error("filter for {flow_id} on {device} was deleted but its class was not: {output}")]
    PartialDelete {
        device: String,
        flow_id: FlowId,
        output: String,
    },
    #[error("unexpected tc output: {0}")]
    ParseMismatch(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
