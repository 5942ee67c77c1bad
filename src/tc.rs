use crate::family::AddressFamily;
use crate::filter::{FilterHandle, FlowId};
use crate::shell::{Output, Shell};
use crate::{Error, Result};

/// A [`Shell`] bound to the tc binary.
#[derive(Debug, Clone)]
pub struct Tc<S> {
    shell: S,
    binary: String,
}

impl<S: Shell> Tc<S> {
    pub fn new(shell: S, binary: impl Into<String>) -> Self {
        Self {
            shell,
            binary: binary.into(),
        }
    }

    pub fn run(&self, args: &str) -> Result<Output> {
        let command = format!("{} {args}", self.binary);
        Ok(self.shell.execute(&command)?)
    }

    /// Runs a create/delete primitive that must print nothing.
    pub fn run_quiet(&self, args: &str) -> Result<()> {
        let output = self.run(args)?;
        if output.is_clean() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: format!("{} {args}", self.binary),
                output: output.diagnostic(),
            })
        }
    }

    /// Runs a listing command and returns its stdout.
    pub fn show(&self, args: &str) -> Result<String> {
        let output = self.run(args)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::CommandFailed {
                command: format!("{} {args}", self.binary),
                output: output.diagnostic(),
            })
        }
    }
}

pub fn add_root(device: &str, root: u16) -> String {
    format!("qdisc add dev {device} root handle {root:x}: htb")
}

pub fn show_qdisc(device: &str) -> String {
    format!("qdisc show dev {device}")
}

pub fn add_class(device: &str, flow_id: FlowId, rate: &str, burst: &str) -> String {
    format!(
        "class add dev {device} parent {:x}: classid {flow_id} htb rate {rate} burst {burst}",
        flow_id.root
    )
}

/// Priority of every filter this crate installs.
pub const PRIO: u32 = 1;

pub fn add_filter(device: &str, family: AddressFamily, address: &str, flow_id: FlowId) -> String {
    format!(
        "filter add dev {device} protocol {} parent {:x}:0 prio {PRIO} u32 match {} src {address} flowid {flow_id}",
        family.protocol(),
        flow_id.root,
        family.selector(),
    )
}

pub fn show_filter(device: &str) -> String {
    format!("filter show dev {device}")
}

pub fn delete_filter(
    device: &str,
    family: AddressFamily,
    root: u16,
    handle: &FilterHandle,
) -> String {
    format!(
        "filter delete dev {device} parent {root:x}: protocol {} prio {PRIO} handle {handle} u32",
        family.protocol()
    )
}

pub fn delete_class(device: &str, flow_id: FlowId) -> String {
    format!(
        "class del dev {device} parent {:x}: classid {flow_id}",
        flow_id.root
    )
}
