use std::net::IpAddr;

use crate::allocator;
use crate::codec;
use crate::config::Config;
use crate::device::DeviceResolver;
use crate::family::AddressFamily;
use crate::filter::{FilterRecord, FilterStore, FlowId};
use crate::shell::Shell;
use crate::tc::{self, Tc};
use crate::{Error, Result};

/// What [`BandwidthLimiter::set_limit`] installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapingRule {
    pub device: String,
    pub address: IpAddr,
    pub flow_id: FlowId,
}

/// Installs and removes per-address HTB limits.
#[derive(Debug)]
pub struct BandwidthLimiter<S, R> {
    tc: Tc<S>,
    resolver: R,
}

impl<S: Shell, R: DeviceResolver> BandwidthLimiter<S, R> {
    pub fn new(shell: S, resolver: R, config: &Config) -> Self {
        Self {
            tc: Tc::new(shell, config.tc_binary.clone()),
            resolver,
        }
    }

    pub fn tc(&self) -> &Tc<S> {
        &self.tc
    }

    /// Replaces any limit on `address` with `rate`/`burst`.
    pub fn set_limit(&self, address: IpAddr, rate: &str, burst: &str) -> Result<ShapingRule> {
        check_token("rate", rate)?;
        check_token("burst", burst)?;

        let family = AddressFamily::of(&address);
        let device = self.resolver.resolve(&address)?;
        self.remove_existing(&device, &address)?;

        let root = allocator::root(&self.tc, &device)?;
        let class = allocator::allocate_class(&self.tc, root, rate, burst, &device)?;
        let flow_id = FlowId { root, class };

        let filter = tc::add_filter(&device, family, &codec::encode(&address), flow_id);
        if let Err(e) = self.tc.run_quiet(&filter) {
            log::warn!("class {flow_id} on {device} is left without a filter");
            return Err(e);
        }

        log::info!("limited {address} to {rate} (burst {burst}) via {flow_id} on {device}");
        Ok(ShapingRule {
            device,
            address,
            flow_id,
        })
    }

    /// Removes the limit on `address`. Nothing to remove is not an error.
    pub fn delete_limit(&self, address: IpAddr) -> Result<()> {
        let device = self.resolver.resolve(&address)?;
        if self.remove_existing(&device, &address)? == 0 {
            log::debug!("no limit for {address} on {device}");
        }
        Ok(())
    }

    /// Active limits on the device `address` resolves to, for its family.
    pub fn limits(&self, address: IpAddr) -> Result<(String, Vec<FilterRecord>)> {
        let device = self.resolver.resolve(&address)?;
        let records = FilterStore::new(&self.tc).list(&device, AddressFamily::of(&address))?;
        Ok((device, records))
    }

    fn remove_existing(&self, device: &str, address: &IpAddr) -> Result<usize> {
        let store = FilterStore::new(&self.tc);
        let stale = store.matching(device, address)?;
        for record in &stale {
            store.delete(device, record)?;
        }
        Ok(stale.len())
    }
}

/// Rates and bursts are passed to tc as single words, e.g. `1mbit`.
fn check_token(what: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("{what} {value:?}")))
    }
}
