use std::net::IpAddr;

use pnet::datalink;
use pnet::ipnetwork::IpNetwork;

use crate::{Error, Result};

/// Maps an address to the local device it is shaped on.
pub trait DeviceResolver {
    fn resolve(&self, address: &IpAddr) -> Result<String>;
}

impl<R: DeviceResolver + ?Sized> DeviceResolver for Box<R> {
    fn resolve(&self, address: &IpAddr) -> Result<String> {
        (**self).resolve(address)
    }
}

/// Resolves against the host's interfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interfaces;

impl DeviceResolver for Interfaces {
    fn resolve(&self, address: &IpAddr) -> Result<String> {
        let interfaces: Vec<(String, Vec<IpNetwork>)> = datalink::interfaces()
            .into_iter()
            .map(|i| (i.name, i.ips))
            .collect();
        find_device(&interfaces, address).ok_or(Error::DeviceNotFound(*address))
    }
}

/// Always answers with the same device.
#[derive(Debug, Clone)]
pub struct Fixed(pub String);

impl DeviceResolver for Fixed {
    fn resolve(&self, _address: &IpAddr) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// An interface carrying the address itself wins over one whose subnet
/// merely contains it.
pub fn find_device(interfaces: &[(String, Vec<IpNetwork>)], address: &IpAddr) -> Option<String> {
    let exact = interfaces
        .iter()
        .find(|(_, ips)| ips.iter().any(|net| net.ip() == *address));
    let containing = || {
        interfaces
            .iter()
            .find(|(_, ips)| ips.iter().any(|net| net.contains(*address)))
    };

    let (name, _) = exact.or_else(containing)?;
    log::debug!("{address} is on {name}");
    Some(name.clone())
}

#[test]
fn resolves_exact_before_subnet() {
    let net = |s: &str| s.parse::<IpNetwork>().unwrap();
    let interfaces = vec![
        ("lo".to_string(), vec![net("127.0.0.1/8"), net("::1/128")]),
        ("eth0".to_string(), vec![net("203.0.113.1/24"), net("2001:db8::1/64")]),
        ("wg0".to_string(), vec![net("203.0.113.5/32")]),
    ];
    let find = |a: &str| find_device(&interfaces, &a.parse().unwrap());

    assert_eq!(find("203.0.113.5").as_deref(), Some("wg0"));
    assert_eq!(find("203.0.113.9").as_deref(), Some("eth0"));
    assert_eq!(find("2001:db8::42").as_deref(), Some("eth0"));
    assert_eq!(find("127.0.0.1").as_deref(), Some("lo"));
    assert_eq!(find("198.51.100.1"), None);
}
