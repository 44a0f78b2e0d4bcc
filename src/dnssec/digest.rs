use ring::digest;
use std::fmt;

use crate::dns::{DnsKeyData, Name};

/// DS digest type algorithms (RFC 4034, 4509, 5933, 6605)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    /// SHA-1 (RFC 3658)
    Sha1 = 1,
    /// SHA-256 (RFC 4509)
    Sha256 = 2,
    /// GOST R 34.11-94 (RFC 5933)
    Gost94 = 3,
    /// SHA-384 (RFC 6605)
    Sha384 = 4,
}

impl DigestType {
    /// Create from digest type number
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Gost94),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    /// Convert to digest type number
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if digest type is supported
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Sha1 | Self::Sha256 | Self::Sha384)
    }

    /// Calculate digest of data using this algorithm
    pub fn digest(&self, data: &[u8]) -> Option<Vec<u8>> {
        let algorithm = match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Gost94 => return None,
        };
        Some(digest::digest(algorithm, data).as_ref().to_vec())
    }

    /// DS digest of a DNSKEY: hash over owner name and DNSKEY RDATA (RFC 4034 section 5.1.4)
    pub fn ds_digest(&self, owner: &Name, key: &DnsKeyData) -> Option<Vec<u8>> {
        let mut data = owner.as_wire().to_vec();
        data.extend_from_slice(&key.to_wire());
        self.digest(&data)
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Gost94 => write!(f, "GOST94"),
            Self::Sha384 => write!(f, "SHA384"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_lengths() {
        assert_eq!(DigestType::Sha1.digest(b"test data").unwrap().len(), 20);
        assert_eq!(
            hex::encode(DigestType::Sha256.digest(b"test data").unwrap()),
            "916f0027a575074ce72a331777c3478d6513f786a591bd892da1a577bf2335f9"
        );
        assert_eq!(DigestType::Sha384.digest(b"test data").unwrap().len(), 48);
        assert!(DigestType::Gost94.digest(b"test data").is_none());
    }
}
