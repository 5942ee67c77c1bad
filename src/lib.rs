//! Per-address bandwidth limits on Linux, driven through `tc`.
//!
//! Every limited address gets its own HTB class under the device's root
//! qdisc and a u32 filter steering its traffic into that class. Nothing is
//! stored locally: the kernel tables are read back whenever a rule has to be
//! found again.

pub mod allocator;
pub mod codec;
pub mod config;
pub mod device;
mod error;
pub mod family;
pub mod filter;
pub mod ipc;
pub mod limiter;
pub mod serve;
pub mod shell;
pub mod tc;

#[cfg(test)]
mod fake;

pub use config::Config;
pub use error::{Error, Result};
pub use family::AddressFamily;
pub use filter::{FilterHandle, FilterRecord, FlowId};
pub use limiter::{BandwidthLimiter, ShapingRule};
