//! Root qdisc discovery and class id allocation.
//!
//! tc has no "give me a free id" query. The only signal is whether a create
//! command prints anything, so ids are claimed by linear probing: try 1, then
//! 2, and so on until the kernel accepts one without complaint.

use crate::filter::FlowId;
use crate::shell::Shell;
use crate::tc::{self, Tc};
use crate::{Error, Result};

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Claimed,
    /// Already in use or rejected; holds the kernel's complaint.
    Taken(String),
}

/// A test-and-set over some id namespace.
pub trait Oracle {
    /// Errors mean the probe could not be run at all and abort the search.
    fn try_claim(&mut self, id: u16) -> Result<Claim>;
}

/// Claims the first id in `1..=0xffff` the oracle accepts.
pub fn probe<O: Oracle>(oracle: &mut O, what: &'static str) -> Result<u16> {
    for id in 1..=u16::MAX {
        match oracle.try_claim(id)? {
            Claim::Claimed => return Ok(id),
            Claim::Taken(reason) => log::trace!("{what} id {id:x} taken: {reason}"),
        }
    }
    Err(Error::AllocationExhausted { what })
}

fn claim<S: Shell>(tc: &Tc<S>, args: &str) -> Result<Claim> {
    let output = tc.run(args)?;
    if output.is_clean() {
        Ok(Claim::Claimed)
    } else {
        Ok(Claim::Taken(output.diagnostic()))
    }
}

struct RootClaim<'a, S> {
    tc: &'a Tc<S>,
    device: &'a str,
}

impl<S: Shell> Oracle for RootClaim<'_, S> {
    fn try_claim(&mut self, id: u16) -> Result<Claim> {
        claim(self.tc, &tc::add_root(self.device, id))
    }
}

struct ClassClaim<'a, S> {
    tc: &'a Tc<S>,
    device: &'a str,
    root: u16,
    rate: &'a str,
    burst: &'a str,
}

impl<S: Shell> Oracle for ClassClaim<'_, S> {
    fn try_claim(&mut self, id: u16) -> Result<Claim> {
        let flow_id = FlowId {
            root: self.root,
            class: id,
        };
        claim(
            self.tc,
            &tc::add_class(self.device, flow_id, self.rate, self.burst),
        )
    }
}

/// Finds the root htb handle in `tc qdisc show` output.
///
/// ```text
/// qdisc htb 1: root refcnt 5 r2q 10 default 0 direct_packets_stat 18
/// ```
pub fn parse_root_handle(output: &str) -> Option<u16> {
    let mut fallback = None;
    for line in output.lines() {
        let mut words = line.split_whitespace();
        if words.next() != Some("qdisc") || words.next() != Some("htb") {
            continue;
        }
        let handle = match words
            .next()
            .and_then(|h| h.strip_suffix(':'))
            .and_then(|h| u16::from_str_radix(h, 16).ok())
        {
            Some(handle) => handle,
            None => {
                log::warn!("Failed to parse line: {line}");
                continue;
            }
        };
        if words.any(|w| w == "root") {
            return Some(handle);
        }
        fallback.get_or_insert(handle);
    }
    fallback
}

/// Returns the device's root htb handle, creating one if there is none.
pub fn root<S: Shell>(tc: &Tc<S>, device: &str) -> Result<u16> {
    let output = tc.show(&tc::show_qdisc(device))?;
    match parse_root_handle(&output) {
        Some(root) => {
            log::debug!("reusing htb root {root:x}: on {device}");
            Ok(root)
        }
        None => create_root(tc, device),
    }
}

pub fn create_root<S: Shell>(tc: &Tc<S>, device: &str) -> Result<u16> {
    let root = probe(&mut RootClaim { tc, device }, "root qdisc")?;
    log::info!("created htb root {root:x}: on {device}");
    Ok(root)
}

pub fn allocate_class<S: Shell>(
    tc: &Tc<S>,
    root: u16,
    rate: &str,
    burst: &str,
    device: &str,
) -> Result<u16> {
    let mut oracle = ClassClaim {
        tc,
        device,
        root,
        rate,
        burst,
    };
    let class = probe(&mut oracle, "class")?;
    log::debug!("allocated class {root:x}:{class:x} on {device}");
    Ok(class)
}
