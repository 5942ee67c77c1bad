//! A stand-in for the tc binary that keeps qdisc, class and filter tables in
//! memory and prints listings the way iproute2 does.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::net::IpAddr;

use crate::codec;
use crate::family::AddressFamily;
use crate::filter::FlowId;
use crate::shell::{Output, Shell};

#[derive(Default)]
struct Device {
    root: Option<u16>,
    classes: BTreeMap<FlowId, (String, String)>,
    filters: Vec<Filter>,
    next_node: u32,
}

struct Filter {
    handle: String,
    family: AddressFamily,
    address: IpAddr,
    flow_id: FlowId,
}

#[derive(Default)]
pub(crate) struct FakeTc {
    devices: RefCell<BTreeMap<String, Device>>,
    commands: RefCell<Vec<String>>,
    failing: RefCell<Vec<String>>,
}

fn ok(stdout: impl Into<String>) -> Output {
    Output {
        success: true,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

fn err(stderr: &str) -> Output {
    Output {
        success: false,
        stdout: String::new(),
        stderr: format!("{stderr}\n"),
    }
}

fn after<'a>(words: &[&'a str], key: &str) -> Option<&'a str> {
    let pos = words.iter().position(|w| *w == key)?;
    words.get(pos + 1).copied()
}

fn parse_major(word: &str) -> Option<u16> {
    let major = word.strip_suffix(":0").or_else(|| word.strip_suffix(':'))?;
    u16::from_str_radix(major, 16).ok()
}

impl FakeTc {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    /// Makes every command containing `pattern` fail.
    pub(crate) fn fail_on(&self, pattern: &str) {
        self.failing.borrow_mut().push(pattern.to_string());
    }

    pub(crate) fn add_root(&self, device: &str, root: u16) {
        let mut devices = self.devices.borrow_mut();
        devices.entry(device.to_string()).or_default().root = Some(root);
    }

    /// Rate and burst of an installed class.
    pub(crate) fn class(&self, device: &str, flow_id: FlowId) -> Option<(String, String)> {
        let devices = self.devices.borrow();
        devices.get(device)?.classes.get(&flow_id).cloned()
    }

    /// Installs a limit directly, bypassing the command parser.
    pub(crate) fn install(&self, device: &str, address: IpAddr, rate: &str, burst: &str) -> FlowId {
        let mut devices = self.devices.borrow_mut();
        let dev = devices.entry(device.to_string()).or_default();
        let root = *dev.root.get_or_insert(1);
        let class = (1..=u16::MAX)
            .find(|c| !dev.classes.contains_key(&FlowId { root, class: *c }))
            .unwrap();
        let flow_id = FlowId { root, class };
        dev.classes
            .insert(flow_id, (rate.to_string(), burst.to_string()));
        dev.add_filter(AddressFamily::of(&address), address, flow_id);
        flow_id
    }

    fn dispatch(&self, words: &[&str]) -> Option<Output> {
        let device = after(words, "dev")?.to_string();
        let mut devices = self.devices.borrow_mut();
        let dev = devices.entry(device).or_default();

        let out = match (*words.get(1)?, *words.get(2)?) {
            ("qdisc", "add") => {
                let handle = parse_major(after(words, "handle")?)?;
                if dev.root.is_some() {
                    err("Error: Exclusivity flag on, cannot modify.")
                } else {
                    dev.root = Some(handle);
                    ok("")
                }
            }
            ("qdisc", "show") => match dev.root {
                Some(root) => ok(format!(
                    "qdisc htb {root:x}: root refcnt 2 r2q 10 default 0 direct_packets_stat 0 direct_qlen 1000\n"
                )),
                None => ok("qdisc noqueue 0: root refcnt 2 \n"),
            },
            ("class", "add") => {
                let parent = parse_major(after(words, "parent")?)?;
                let flow_id: FlowId = after(words, "classid")?.parse().ok()?;
                let rate = after(words, "rate")?.to_string();
                let burst = after(words, "burst")?.to_string();
                if dev.root != Some(parent) || flow_id.root != parent {
                    err("Error: Failed to find specified qdisc.")
                } else if flow_id.class == 0 {
                    err(&format!("Error: argument \"{flow_id}\" is wrong: invalid class ID"))
                } else if dev.classes.contains_key(&flow_id) {
                    err("RTNETLINK answers: File exists")
                } else {
                    dev.classes.insert(flow_id, (rate, burst));
                    ok("")
                }
            }
            ("class", "del") => {
                let flow_id: FlowId = after(words, "classid")?.parse().ok()?;
                if dev.filters.iter().any(|f| f.flow_id == flow_id) {
                    err("RTNETLINK answers: Device or resource busy")
                } else if dev.classes.remove(&flow_id).is_none() {
                    err("RTNETLINK answers: No such file or directory")
                } else {
                    ok("")
                }
            }
            ("filter", "add") => {
                let family = AddressFamily::from_protocol(after(words, "protocol")?)?;
                let parent = parse_major(after(words, "parent")?)?;
                let address: IpAddr = after(words, "src")?.parse().ok()?;
                let flow_id: FlowId = after(words, "flowid")?.parse().ok()?;
                if dev.root != Some(parent) {
                    err("Error: Parent Qdisc doesn't exists.")
                } else {
                    dev.add_filter(family, address, flow_id);
                    ok("")
                }
            }
            ("filter", "delete") | ("filter", "del") => {
                let family = AddressFamily::from_protocol(after(words, "protocol")?)?;
                let handle = after(words, "handle")?;
                let before = dev.filters.len();
                dev.filters
                    .retain(|f| !(f.handle == handle && f.family == family));
                if dev.filters.len() == before {
                    err("Error: Filter with specified handle not found.")
                } else {
                    ok("")
                }
            }
            ("filter", "show") => ok(dev.render_filters()),
            _ => return None,
        };
        Some(out)
    }
}

impl Device {
    fn add_filter(&mut self, family: AddressFamily, address: IpAddr, flow_id: FlowId) {
        let handle = format!("800::{:x}", 0x800 + self.next_node);
        self.next_node += 1;
        self.filters.push(Filter {
            handle,
            family,
            address,
            flow_id,
        });
    }

    fn render_filters(&self) -> String {
        let root = match self.root {
            Some(root) => root,
            None => return String::new(),
        };
        let mut out = String::new();
        for family in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
            let filters: Vec<_> = self.filters.iter().filter(|f| f.family == family).collect();
            if filters.is_empty() {
                continue;
            }
            let prefix = format!(
                "filter parent {root:x}: protocol {} pref 1 u32 chain 0 ",
                family.protocol()
            );
            out.push_str(&format!("{prefix}\n{prefix}fh 800: ht divisor 1 \n"));
            for filter in filters {
                let order = u32::from_str_radix(&filter.handle[5..], 16).unwrap_or(0);
                out.push_str(&format!(
                    "{prefix}fh {} order {order} key ht 800 bkt 0 flowid {} not_in_hw \n",
                    filter.handle, filter.flow_id
                ));
                for group in codec::match_groups(&filter.address) {
                    out.push_str(&format!(
                        "  match {:08x}/{:08x} at {}\n",
                        group.value, group.mask, group.offset
                    ));
                }
            }
        }
        out
    }
}

impl Shell for FakeTc {
    fn execute(&self, command: &str) -> io::Result<Output> {
        self.commands.borrow_mut().push(command.to_string());
        if self
            .failing
            .borrow()
            .iter()
            .any(|pattern| command.contains(pattern.as_str()))
        {
            return Ok(err("RTNETLINK answers: Operation not permitted"));
        }

        let words: Vec<&str> = command.split_whitespace().collect();
        if words.first() != Some(&"tc") {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }
        Ok(self
            .dispatch(&words)
            .unwrap_or_else(|| err(&format!("Command \"{command}\" is unknown, try \"tc help\"."))))
    }
}

#[test]
fn fake_lists_what_was_added() {
    let fake = FakeTc::new();
    fake.install("eth0", "203.0.113.5".parse().unwrap(), "1mbit", "32kbit");
    let out = fake.execute("tc filter show dev eth0").unwrap();
    assert!(out.stdout.contains("fh 800::800 order 2048"));
    assert!(out.stdout.contains("flowid 1:1"));
    assert!(out.stdout.contains("  match cb007105/ffffffff at 12"));
    assert!(fake.execute("ls").is_err());
}
