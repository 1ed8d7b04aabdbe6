//! Synthetic hardware identifiers
//!
//! Profiles cannot ship real serial numbers or UUIDs (every cloaked VM would
//! then share them), so candidate sets carry generator directives instead:
//!
//! - `SERIAL:<length>` (legacy form `<SERIAL> <length>`)
//! - `UUID` (legacy form `<UUID>`)
//!
//! All generators draw from a caller-supplied RNG so a seeded session is
//! reproducible.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Characters seen in vendor serials: uppercase letters and digits.
const SERIAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Longest serial a directive may request.
pub const MAX_SERIAL_LENGTH: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid generator directive {raw:?}: {reason}")]
pub struct DirectiveError {
    pub raw: String,
    pub reason: String,
}

/// A generator request embedded in a profile value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Serial(usize),
    Uuid,
}

impl Directive {
    /// `Ok(None)` means the value is a plain literal.
    pub fn parse(raw: &str) -> Result<Option<Self>, DirectiveError> {
        let trimmed = raw.trim();

        if trimmed == "UUID" || trimmed.starts_with("<UUID>") {
            return Ok(Some(Directive::Uuid));
        }

        let length = if let Some(rest) = trimmed.strip_prefix("SERIAL:") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("<SERIAL>") {
            rest
        } else {
            return Ok(None);
        };

        let invalid = |reason: &str| DirectiveError {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let length: usize = length
            .trim()
            .parse()
            .map_err(|_| invalid("serial length must be a positive integer"))?;
        if length == 0 {
            return Err(invalid("serial length must be at least 1"));
        }
        if length > MAX_SERIAL_LENGTH {
            return Err(invalid(&format!(
                "serial length must not exceed {}",
                MAX_SERIAL_LENGTH
            )));
        }

        Ok(Some(Directive::Serial(length)))
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String, GeneratorError> {
        match self {
            Directive::Serial(length) => serial(rng, *length),
            Directive::Uuid => Ok(uuid(rng)),
        }
    }
}

/// Random serial of exactly `length` characters.
pub fn serial<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Result<String, GeneratorError> {
    if length == 0 {
        return Err(GeneratorError::InvalidArgument(
            "serial length must be at least 1".to_string(),
        ));
    }
    if length > MAX_SERIAL_LENGTH {
        return Err(GeneratorError::InvalidArgument(format!(
            "serial length {} exceeds {}",
            length, MAX_SERIAL_LENGTH
        )));
    }

    Ok((0..length)
        .map(|_| SERIAL_ALPHABET[rng.gen_range(0..SERIAL_ALPHABET.len())] as char)
        .collect())
}

/// Random (version 4) UUID in lowercase 8-4-4-4-12 form.
pub fn uuid<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// Random unicast, globally administered MAC address.
pub fn mac_address<R: Rng + ?Sized>(rng: &mut R) -> MacAddress {
    let mut octets = [0u8; 6];
    rng.fill(&mut octets);
    // clear multicast and locally-administered bits
    octets[0] &= 0b1111_1100;
    MacAddress(octets)
}

/// Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Separator-free uppercase form, e.g. `0800271A2B3C`.
    pub fn compact(&self) -> String {
        self.0.iter().map(|octet| format!("{:02X}", octet)).collect()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddress {
    type Err = GeneratorError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-...` and the compact 12-digit form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        let invalid = || GeneratorError::InvalidArgument(format!("invalid MAC address {:?}", s));

        if digits.len() != 12 || !digits.is_ascii() {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(MacAddress(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = GeneratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_serial_has_exact_length() {
        let mut rng = StdRng::seed_from_u64(1);
        for length in [1, 8, 10, 20, 64] {
            let value = serial(&mut rng, length).unwrap();
            assert_eq!(value.len(), length);
            assert!(value.bytes().all(|b| SERIAL_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_serial_rejects_zero_length() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(serial(&mut rng, 0), Err(GeneratorError::InvalidArgument(_))));
        assert!(matches!(
            serial(&mut rng, MAX_SERIAL_LENGTH + 1),
            Err(GeneratorError::InvalidArgument(_))
        ));
        assert_eq!(serial(&mut rng, MAX_SERIAL_LENGTH).unwrap().len(), MAX_SERIAL_LENGTH);
    }

    #[test]
    fn test_uuid_canonical_form() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..32 {
            let value = uuid(&mut rng);
            assert_eq!(value.len(), 36);

            let groups: Vec<&str> = value.split('-').collect();
            let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
            assert_eq!(lengths, vec![8, 4, 4, 4, 12]);
            assert!(groups.iter().all(|g| g.chars().all(|c| c.is_ascii_hexdigit())));

            let parsed = ::uuid::Uuid::parse_str(&value).unwrap();
            assert_eq!(parsed.get_version_num(), 4);
            assert_eq!(parsed.get_variant(), ::uuid::Variant::RFC4122);
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(serial(&mut a, 12).unwrap(), serial(&mut b, 12).unwrap());
        assert_eq!(uuid(&mut a), uuid(&mut b));
    }

    #[test]
    fn test_directive_parsing() {
        assert_eq!(Directive::parse("SERIAL:8").unwrap(), Some(Directive::Serial(8)));
        assert_eq!(Directive::parse("<SERIAL> 16").unwrap(), Some(Directive::Serial(16)));
        assert_eq!(Directive::parse("UUID").unwrap(), Some(Directive::Uuid));
        assert_eq!(Directive::parse("<UUID>").unwrap(), Some(Directive::Uuid));
        assert_eq!(Directive::parse("American Megatrends Inc.").unwrap(), None);

        assert!(Directive::parse("SERIAL:abc").is_err());
        assert!(Directive::parse("SERIAL:0").is_err());
        assert!(Directive::parse("SERIAL:-4").is_err());
        assert!(Directive::parse("SERIAL:257").is_err());
        assert!(Directive::parse("<SERIAL> 18446744073709551615").is_err());
        assert!(Directive::parse("SERIAL:18446744073709551616").is_err());
    }

    #[test]
    fn test_mac_address_is_unicast_and_global() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..64 {
            let mac = mac_address(&mut rng);
            assert_eq!(mac.octets()[0] & 0b11, 0);
        }
    }

    #[test]
    fn test_mac_address_formats() {
        let mac: MacAddress = "08:00:27:1a:2b:3c".parse().unwrap();
        assert_eq!(mac.to_string(), "08:00:27:1a:2b:3c");
        assert_eq!(mac.compact(), "0800271A2B3C");
        assert_eq!("0800271A2B3C".parse::<MacAddress>().unwrap(), mac);
        assert!("08:00:27".parse::<MacAddress>().is_err());
        assert!("zz:00:27:1a:2b:3c".parse::<MacAddress>().is_err());

        assert_eq!(serde_json::to_string(&mac).unwrap(), r#""08:00:27:1a:2b:3c""#);
        assert_eq!(serde_json::from_str::<MacAddress>(r#""08-00-27-1A-2B-3C""#).unwrap(), mac);
    }
}
