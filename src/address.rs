//! Converts dotted-quad addresses to and from their 32-bit ordinal.
//!
//! Working with ordinals makes range enumeration a plain integer loop.
//!
//! ```rust
//! # use reachscan::address::{decode, encode};
//! let address = encode("10.0.0.255").unwrap();
//! assert_eq!(u32::from(address), 0x0A00_00FF);
//! assert_eq!(decode(address.next().unwrap()), "10.0.1.0");
//! ```
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use thiserror::Error;

/// An IPv4 address held as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u32);

/// Returned when text is not exactly four decimal octets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a dotted-quad address")]
pub struct MalformedAddress(pub String);

/// Parses `a.b.c.d` into an [`Address`].
///
/// Exactly four segments are required, each made only of ASCII digits and
/// within `0..=255`.
pub fn encode(text: &str) -> Result<Address, MalformedAddress> {
    let malformed = || MalformedAddress(text.to_owned());

    let mut ordinal: u32 = 0;
    let mut segments = 0;
    for segment in text.split('.') {
        segments += 1;
        if segments > 4 || segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let octet: u8 = segment.parse().map_err(|_| malformed())?;
        ordinal = (ordinal << 8) | u32::from(octet);
    }

    if segments != 4 {
        return Err(malformed());
    }
    Ok(Address(ordinal))
}

/// Renders an [`Address`] in canonical dotted form.
pub fn decode(address: Address) -> String {
    address.to_string()
}

impl Address {
    /// The following address, or `None` past `255.255.255.255`.
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(ordinal) => Some(Self(ordinal)),
            None => None,
        }
    }
}

impl From<u32> for Address {
    fn from(ordinal: u32) -> Self {
        Self(ordinal)
    }
}

impl From<Address> for u32 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Self(u32::from(ip))
    }
}

impl From<Address> for Ipv4Addr {
    fn from(address: Address) -> Self {
        Self::from(address.0)
    }
}

impl FromStr for Address {
    type Err = MalformedAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        encode(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0.to_be_bytes();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

/// An inclusive span of addresses with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: Address,
    pub end: Address,
}

impl AddressRange {
    /// Builds a range, or `None` when the bounds are reversed.
    pub fn new(start: Address, end: Address) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// A range holding a single address.
    pub const fn single(address: Address) -> Self {
        Self {
            start: address,
            end: address,
        }
    }

    /// Number of addresses covered. Always at least one.
    pub fn len(&self) -> u64 {
        u64::from(self.end.0 - self.start.0) + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = Address> + Clone {
        (self.start.0..=self.end.0).map(Address)
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, Address, AddressRange, MalformedAddress};
    use parameterized::parameterized;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    #[test]
    fn encodes_big_endian_ordinal() {
        assert_eq!(u32::from(encode("1.2.3.4").unwrap()), 0x0102_0304);
        assert_eq!(u32::from(encode("0.0.0.0").unwrap()), 0);
        assert_eq!(u32::from(encode("255.255.255.255").unwrap()), u32::MAX);
    }

    #[test]
    fn decodes_canonical_form() {
        assert_eq!(decode(Address::from(0x0A00_0001)), "10.0.0.1");
        assert_eq!(decode(Address::from(Ipv4Addr::new(192, 168, 1, 254))), "192.168.1.254");
    }

    #[parameterized(input = {
        "10.0.0", "10.0.0.1.2", "256.0.0.1", "10..0.1", "", "10.0.0.", "a.b.c.d", "10.0.0.-1", "10.0.0.+1",
    })]
    fn rejects_malformed(input: &str) {
        assert_eq!(encode(input), Err(MalformedAddress(input.to_owned())));
    }

    #[test]
    fn leading_zeros_are_tolerated() {
        assert_eq!(encode("010.000.000.001").unwrap(), encode("10.0.0.1").unwrap());
    }

    #[test]
    fn next_stops_at_the_top() {
        assert_eq!(encode("10.0.0.255").unwrap().next(), Some(encode("10.0.1.0").unwrap()));
        assert_eq!(Address::from(u32::MAX).next(), None);
    }

    #[test]
    fn range_rejects_reversed_bounds() {
        let low = encode("10.0.0.1").unwrap();
        let high = encode("10.0.0.5").unwrap();
        assert!(AddressRange::new(high, low).is_none());

        let range = AddressRange::new(low, high).unwrap();
        assert_eq!(range.len(), 5);
        assert_eq!(range.iter().last(), Some(high));
    }

    #[test]
    fn full_space_length_does_not_overflow() {
        let range = AddressRange::new(Address::from(0), Address::from(u32::MAX)).unwrap();
        assert_eq!(range.len(), 1 << 32);
    }

    proptest! {
        #[test]
        fn text_round_trips(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            let text = format!("{a}.{b}.{c}.{d}");
            prop_assert_eq!(decode(encode(&text).unwrap()), text);
        }

        #[test]
        fn ordinal_round_trips(ordinal in any::<u32>()) {
            let address = Address::from(ordinal);
            prop_assert_eq!(encode(&decode(address)).unwrap(), address);
        }
    }
}
