use std::fmt;
use std::net::IpAddr;

/// Protocol family of a shaped address.
///
/// Selects the keywords used when talking to tc and the listing grammar
/// used when reading filters back.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// `protocol <keyword>` in filter commands and listings.
    pub fn protocol(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ip",
            AddressFamily::Ipv6 => "ipv6",
        }
    }

    /// `match <keyword> src` selector of the u32 classifier.
    pub fn selector(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ip",
            AddressFamily::Ipv6 => "ip6",
        }
    }

    /// Offset of the source address in the network header.
    pub fn src_offset(self) -> u16 {
        match self {
            AddressFamily::Ipv4 => 12,
            AddressFamily::Ipv6 => 8,
        }
    }

    /// Number of 32-bit match words covering a full source address.
    pub fn words(self) -> usize {
        match self {
            AddressFamily::Ipv4 => 1,
            AddressFamily::Ipv6 => 4,
        }
    }

    pub fn from_protocol(keyword: &str) -> Option<Self> {
        match keyword {
            "ip" => Some(AddressFamily::Ipv4),
            "ipv6" => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

#[test]
fn family_keywords() {
    let v4: IpAddr = "203.0.113.5".parse().unwrap();
    let v6: IpAddr = "2001:db8::1".parse().unwrap();
    assert_eq!(AddressFamily::of(&v4).protocol(), "ip");
    assert_eq!(AddressFamily::of(&v6).protocol(), "ipv6");
    assert_eq!(AddressFamily::of(&v6).selector(), "ip6");
    assert_eq!(AddressFamily::from_protocol("ipv6"), Some(AddressFamily::Ipv6));
    assert_eq!(AddressFamily::from_protocol("all"), None);
}
