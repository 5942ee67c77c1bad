use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::codec::{self, MatchGroup};
use crate::family::AddressFamily;
use crate::shell::Shell;
use crate::tc::{self, Tc};
use crate::{Error, Result};

/// `root:class`, printed in lowercase hex as tc does.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FlowId {
    pub root: u16,
    pub class: u16,
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}", self.root, self.class)
    }
}

impl FromStr for FlowId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = || -> Option<FlowId> {
            let (root, class) = s.split_once(':')?;
            Some(FlowId {
                root: u16::from_str_radix(root, 16).ok()?,
                class: u16::from_str_radix(class, 16).ok()?,
            })
        };
        parse().ok_or_else(|| Error::ParseMismatch(format!("bad flowid: {s}")))
    }
}

/// Handle of an installed u32 filter, e.g. `800::801`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FilterHandle(String);

impl fmt::Display for FilterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FilterHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let is_hex = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_hexdigit());
        match s.split_once("::") {
            Some((table, node)) if is_hex(table) && is_hex(node) => Ok(FilterHandle(s.to_string())),
            _ => Err(Error::ParseMismatch(format!("bad filter handle: {s}"))),
        }
    }
}

/// One shaping rule as read back from `tc filter show`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FilterRecord {
    pub handle: FilterHandle,
    pub flow_id: FlowId,
    pub family: AddressFamily,
    pub groups: Vec<MatchGroup>,
    /// Decoded source address, in [`codec::decode`] form.
    pub address: String,
}

impl FilterRecord {
    /// Compares the keys, not [`FilterRecord::address`]: distinct IPv6
    /// addresses can share the same listing text.
    pub fn is_for(&self, address: &IpAddr) -> bool {
        codec::source_address(&self.groups, self.family).as_ref() == Some(address)
    }
}

struct Header {
    handle: FilterHandle,
    flow_id: FlowId,
    family: Option<AddressFamily>,
}

/// ```text
/// filter parent 1: protocol ip pref 1 u32 chain 0 fh 800::800 order 2048 key ht 800 bkt 0 flowid 1:1 not_in_hw
/// ```
///
/// Headers naming a protocol other than `ip`/`ipv6`, or a priority other
/// than [`tc::PRIO`], belong to rules we never install and yield `None`.
fn parse_header(line: &str) -> Option<Header> {
    let mut handle = None;
    let mut flow_id = None;
    let mut family = None;

    let mut words = line.split_whitespace();
    while let Some(word) = words.next() {
        match word {
            "fh" => handle = words.next().and_then(|h| h.parse().ok()),
            "flowid" | "classid" => flow_id = words.next().and_then(|f| f.parse().ok()),
            "protocol" => family = Some(words.next().and_then(AddressFamily::from_protocol)?),
            "pref" | "prio" => {
                if words.next()?.parse::<u32>().ok()? != tc::PRIO {
                    return None;
                }
            }
            _ => (),
        }
    }

    Some(Header {
        handle: handle?,
        flow_id: flow_id?,
        family,
    })
}

/// Parses a `tc filter show` listing into the records of `family`.
///
/// A record is a header line carrying `fh` and `flowid` followed by its
/// `match` lines. Anything else, including rules of the other family, keys
/// on other header fields and records whose keys don't decode, is skipped.
pub fn parse_filters(output: &str, family: AddressFamily) -> Vec<FilterRecord> {
    let mut records = Vec::new();
    let mut current: Option<(Header, Vec<MatchGroup>)> = None;

    let mut finish = |entry: Option<(Header, Vec<MatchGroup>)>| {
        let (header, groups) = match entry {
            Some(entry) => entry,
            None => return,
        };
        if header.family.is_some_and(|f| f != family) {
            return;
        }
        if !codec::is_source_match(&groups, family) {
            log::debug!("skipping filter {}: not a source address match", header.handle);
            return;
        }
        match codec::decode(&groups, family) {
            Ok(address) => records.push(FilterRecord {
                handle: header.handle,
                flow_id: header.flow_id,
                family,
                groups,
                address,
            }),
            Err(e) => log::debug!("skipping filter {}: {e}", header.handle),
        }
    };

    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("match ") {
            match (current.as_mut(), codec::parse_match_line(line)) {
                (Some((_, groups)), Some(group)) => groups.push(group),
                (Some((header, _)), None) => {
                    log::debug!("unparsable key in filter {}: {line}", header.handle)
                }
                (None, _) => (),
            }
        } else if line.starts_with("filter ") {
            finish(current.take());
            current = parse_header(line).map(|header| (header, Vec::new()));
        }
    }
    finish(current.take());

    records
}

/// Read and delete access to the filters installed on a device.
#[derive(Debug)]
pub struct FilterStore<'a, S> {
    tc: &'a Tc<S>,
}

impl<'a, S: Shell> FilterStore<'a, S> {
    pub fn new(tc: &'a Tc<S>) -> Self {
        Self { tc }
    }

    pub fn list(&self, device: &str, family: AddressFamily) -> Result<Vec<FilterRecord>> {
        let output = self.tc.show(&tc::show_filter(device))?;
        Ok(parse_filters(&output, family))
    }

    /// Every record whose keys select exactly `address`.
    pub fn matching(&self, device: &str, address: &IpAddr) -> Result<Vec<FilterRecord>> {
        let mut records = self.list(device, AddressFamily::of(address))?;
        records.retain(|r| r.is_for(address));
        Ok(records)
    }

    pub fn find_by_address(&self, device: &str, address: &IpAddr) -> Result<Option<FilterRecord>> {
        Ok(self.matching(device, address)?.into_iter().next())
    }

    /// Removes the filter and then its class.
    ///
    /// There is no rollback: if the class delete fails the filter is already
    /// gone and [`Error::PartialDelete`] is returned.
    pub fn delete(&self, device: &str, record: &FilterRecord) -> Result<()> {
        let root = record.flow_id.root;
        self.tc.run_quiet(&tc::delete_filter(
            device,
            record.family,
            root,
            &record.handle,
        ))?;

        match self.tc.run_quiet(&tc::delete_class(device, record.flow_id)) {
            Ok(()) => {
                log::info!(
                    "removed limit for {} ({}) on {device}",
                    record.address,
                    record.flow_id
                );
                Ok(())
            }
            Err(Error::CommandFailed { output, .. }) => {
                log::error!(
                    "filter {} deleted but class {} is still on {device}",
                    record.handle,
                    record.flow_id
                );
                Err(Error::PartialDelete {
                    device: device.to_string(),
                    flow_id: record.flow_id,
                    output,
                })
            }
            Err(e) => Err(e),
        }
    }
}
