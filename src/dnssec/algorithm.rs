use ring::signature::{self, VerificationAlgorithm};
use std::fmt;

use super::DnsSecError;

/// DNSSEC Algorithm numbers (RFC 4034, 5155, 5702, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

impl DnsSecAlgorithm {
    /// Create from algorithm number
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            3 => Some(Self::DSA),
            5 => Some(Self::RsaSha1),
            6 => Some(Self::DsaNsec3Sha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            12 => Some(Self::EccGost),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    /// Convert to algorithm number
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if algorithm is supported for validation
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::RsaSha1
                | Self::RsaSha1Nsec3Sha1
                | Self::RsaSha256
                | Self::RsaSha512
                | Self::EcdsaP256Sha256
                | Self::EcdsaP384Sha384
                | Self::Ed25519
        )
    }

    fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 | Self::RsaSha256 | Self::RsaSha512
        )
    }

    /// Verify `signature` over `message` with a key in DNSKEY public key format
    pub fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), DnsSecError> {
        if self.is_rsa() {
            let params = match self {
                Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => {
                    &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY
                }
                Self::RsaSha256 => &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
                _ => &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
            };
            let (e, n) = split_rsa_key(public_key).ok_or(DnsSecError::InvalidPublicKey)?;
            return signature::RsaPublicKeyComponents { n, e }
                .verify(params, message, signature)
                .map_err(|_| DnsSecError::SignatureVerificationFailed);
        }

        let (alg, key): (&'static dyn VerificationAlgorithm, Vec<u8>) = match self {
            // DNSKEY carries the bare X and Y coordinates, ring wants an uncompressed point
            Self::EcdsaP256Sha256 => (
                &signature::ECDSA_P256_SHA256_FIXED,
                [&[0x04][..], public_key].concat(),
            ),
            Self::EcdsaP384Sha384 => (
                &signature::ECDSA_P384_SHA384_FIXED,
                [&[0x04][..], public_key].concat(),
            ),
            Self::Ed25519 => (&signature::ED25519, public_key.to_vec()),
            _ => return Err(DnsSecError::UnsupportedAlgorithm(self.to_u8())),
        };

        signature::UnparsedPublicKey::new(alg, key)
            .verify(message, signature)
            .map_err(|_| DnsSecError::SignatureVerificationFailed)
    }
}

/// Split an RSA DNSKEY into exponent and modulus (RFC 3110 section 2)
fn split_rsa_key(key: &[u8]) -> Option<(&[u8], &[u8])> {
    let (exp_len, rest) = match key.split_first()? {
        (&0, rest) if rest.len() >= 2 => {
            let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
            (len, &rest[2..])
        }
        (&len, rest) => (len as usize, rest),
    };
    if exp_len == 0 || rest.len() <= exp_len {
        return None;
    }
    Some(rest.split_at(exp_len))
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RsaMd5 => write!(f, "RSAMD5"),
            Self::DSA => write!(f, "DSA"),
            Self::RsaSha1 => write!(f, "RSASHA1"),
            Self::DsaNsec3Sha1 => write!(f, "DSA-NSEC3-SHA1"),
            Self::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            Self::RsaSha256 => write!(f, "RSASHA256"),
            Self::RsaSha512 => write!(f, "RSASHA512"),
            Self::EccGost => write!(f, "ECC-GOST"),
            Self::EcdsaP256Sha256 => write!(f, "ECDSAP256SHA256"),
            Self::EcdsaP384Sha384 => write!(f, "ECDSAP384SHA384"),
            Self::Ed25519 => write!(f, "ED25519"),
            Self::Ed448 => write!(f, "ED448"),
        }
    }
}
