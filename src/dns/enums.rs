use serde::Serialize;
use std::fmt;

/// Record types the trust anchor machinery understands
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DNSResourceType {
    DS,
    RRSIG,
    DNSKEY,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CS,
    CH,
    HS,
}

impl DNSResourceClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(DNSResourceClass::IN),
            2 => Some(DNSResourceClass::CS),
            3 => Some(DNSResourceClass::CH),
            4 => Some(DNSResourceClass::HS),
            _ => None,
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "IN" => Some(DNSResourceClass::IN),
            "CS" => Some(DNSResourceClass::CS),
            "CH" => Some(DNSResourceClass::CH),
            "HS" => Some(DNSResourceClass::HS),
            _ => None,
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> u16 {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
        }
    }
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DNSResourceClass::IN => "IN",
            DNSResourceClass::CS => "CS",
            DNSResourceClass::CH => "CH",
            DNSResourceClass::HS => "HS",
        };
        write!(f, "{}", s)
    }
}

impl DNSResourceType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            43 => Some(DNSResourceType::DS),
            46 => Some(DNSResourceType::RRSIG),
            48 => Some(DNSResourceType::DNSKEY),
            _ => None,
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DS" => Some(DNSResourceType::DS),
            "RRSIG" => Some(DNSResourceType::RRSIG),
            "DNSKEY" => Some(DNSResourceType::DNSKEY),
            other => other
                .strip_prefix("TYPE")
                .and_then(|n| n.parse::<u16>().ok())
                .and_then(Self::from_u16),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> u16 {
        match rtype {
            DNSResourceType::DS => 43,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::DNSKEY => 48,
        }
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DNSResourceType::DS => "DS",
            DNSResourceType::RRSIG => "RRSIG",
            DNSResourceType::DNSKEY => "DNSKEY",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_conversions() {
        assert_eq!(DNSResourceType::from_u16(48), Some(DNSResourceType::DNSKEY));
        assert_eq!(u16::from(DNSResourceType::DS), 43);
        assert_eq!(
            DNSResourceType::from_mnemonic("type46"),
            Some(DNSResourceType::RRSIG)
        );
        assert_eq!(DNSResourceType::from_mnemonic("A"), None);
    }

    #[test]
    fn test_class_conversions() {
        assert_eq!(DNSResourceClass::from_mnemonic("in"), Some(DNSResourceClass::IN));
        assert_eq!(u16::from(DNSResourceClass::CH), 3);
        assert_eq!(DNSResourceClass::from_u16(9), None);
    }
}
