//! Conversion between addresses and the `value/mask` words of u32 matches.
//!
//! The kernel does the forward encoding itself when a filter is added, so
//! the interesting direction is [`decode`]: `tc filter show` prints each key
//! as `match <value>/<mask> at <offset>` and we rebuild the address from
//! those words. [`decode`] gives the listing text, [`source_address`] the
//! exact address used to find the filter belonging to an address.

use std::net::IpAddr;

use crate::family::AddressFamily;
use crate::{Error, Result};

/// One `match <value>/<mask> at <offset>` key of a u32 filter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MatchGroup {
    pub value: u32,
    pub mask: u32,
    pub offset: u16,
}

impl MatchGroup {
    pub fn masked(&self) -> u32 {
        self.value & self.mask
    }
}

/// The `src` argument of a filter add command.
pub fn encode(address: &IpAddr) -> String {
    address.to_string()
}

/// The full-mask keys the kernel lists for a filter matching `address`.
pub fn match_groups(address: &IpAddr) -> Vec<MatchGroup> {
    let offset = AddressFamily::of(address).src_offset();
    let octets = match address {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    octets
        .chunks(4)
        .zip((offset..).step_by(4))
        .map(|(word, offset)| MatchGroup {
            value: u32::from_be_bytes([word[0], word[1], word[2], word[3]]),
            mask: u32::MAX,
            offset,
        })
        .collect()
}

/// Text that a listed filter for `address` decodes to.
pub fn listing_form(address: &IpAddr) -> String {
    // match_groups always yields a decodable shape
    decode(&match_groups(address), AddressFamily::of(address)).unwrap_or_default()
}

/// Whether the keys sit on the source address field of `family`.
pub fn is_source_match(groups: &[MatchGroup], family: AddressFamily) -> bool {
    let start = family.src_offset();
    match family {
        AddressFamily::Ipv4 => groups.iter().all(|g| g.offset == start),
        AddressFamily::Ipv6 => groups
            .iter()
            .zip((start..).step_by(4))
            .all(|(g, offset)| g.offset == offset),
    }
}

pub fn decode(groups: &[MatchGroup], family: AddressFamily) -> Result<String> {
    match family {
        AddressFamily::Ipv4 => decode_v4(groups),
        AddressFamily::Ipv6 => decode_v6(groups),
    }
}

fn decode_v4(groups: &[MatchGroup]) -> Result<String> {
    let octets = v4_octets(groups)?;
    Ok(format!(
        "{}.{}.{}.{}",
        octets[0], octets[1], octets[2], octets[3]
    ))
}

fn v4_octets(groups: &[MatchGroup]) -> Result<[u8; 4]> {
    Ok(match groups {
        [word] => word.masked().to_be_bytes(),
        // one key per octet, octet i taken from byte i of key i
        [a, b, c, d] => [
            a.masked().to_be_bytes()[0],
            b.masked().to_be_bytes()[1],
            c.masked().to_be_bytes()[2],
            d.masked().to_be_bytes()[3],
        ],
        _ => {
            return Err(Error::ParseMismatch(format!(
                "expected 1 or 4 IPv4 match keys, got {}",
                groups.len()
            )))
        }
    })
}

fn decode_v6(groups: &[MatchGroup]) -> Result<String> {
    if groups.len() != 4 {
        return Err(Error::ParseMismatch(format!(
            "expected 4 IPv6 match keys, got {}",
            groups.len()
        )));
    }

    let half = |v: u32| {
        if v == 0 {
            String::new()
        } else {
            format!("{v:x}")
        }
    };

    let mut text = String::new();
    for group in groups {
        let word = group.masked();
        let (high, low) = (half(word >> 16), half(word & 0xffff));
        if high.is_empty() && low.is_empty() {
            text.push(':');
        } else {
            text.push_str(&high);
            text.push(':');
            text.push_str(&low);
            text.push(':');
        }
    }
    text.pop();
    Ok(text)
}

/// The exact address the keys select, or `None` when a key is not a full
/// mask or the shape is wrong. Unlike the [`decode`] text this tells every
/// address apart.
pub fn source_address(groups: &[MatchGroup], family: AddressFamily) -> Option<IpAddr> {
    if groups.iter().any(|g| g.mask != u32::MAX) {
        return None;
    }
    match family {
        AddressFamily::Ipv4 => v4_octets(groups).ok().map(IpAddr::from),
        AddressFamily::Ipv6 => match groups {
            [a, b, c, d] => {
                let mut octets = [0u8; 16];
                for (chunk, group) in octets.chunks_exact_mut(4).zip([a, b, c, d]) {
                    chunk.copy_from_slice(&group.value.to_be_bytes());
                }
                Some(IpAddr::from(octets))
            }
            _ => None,
        },
    }
}

/// Parses `match 2a4b5d9c/ffffffff at 8`.
pub fn parse_match_line(line: &str) -> Option<MatchGroup> {
    let mut words = line.split_whitespace();
    if words.next()? != "match" {
        return None;
    }
    let (value, mask) = words.next()?.split_once('/')?;
    if words.next()? != "at" {
        return None;
    }
    let offset = words.next()?.parse().ok()?;

    Some(MatchGroup {
        value: parse_word(value)?,
        mask: parse_word(mask)?,
        offset,
    })
}

fn parse_word(hex: &str) -> Option<u32> {
    if hex.len() != 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}
