use std::fmt;

/// Reasons a DNSKEY set failed to verify
#[derive(Debug, Clone, PartialEq)]
pub enum DnsSecError {
    /// No DNSKEY in the candidate set matched a trusted DS
    NoDsMatch,
    /// No RRSIG by a trusted key covers the set
    NoRrsig,
    /// Signature expired
    SignatureExpired,
    /// Signature not yet valid
    SignatureNotYetValid,
    /// Algorithm not supported
    UnsupportedAlgorithm(u8),
    /// Digest type not supported
    UnsupportedDigestType(u8),
    /// Signature verification failed
    SignatureVerificationFailed,
    /// Invalid public key format
    InvalidPublicKey,
    /// Trusted set is empty or of the wrong type
    TrustAnchorNotFound,
}

impl fmt::Display for DnsSecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDsMatch => write!(f, "No DNSKEY matches a trusted DS record"),
            Self::NoRrsig => write!(f, "No RRSIG by a trusted key covers the DNSKEY set"),
            Self::SignatureExpired => write!(f, "DNSSEC signature has expired"),
            Self::SignatureNotYetValid => write!(f, "DNSSEC signature is not yet valid"),
            Self::UnsupportedAlgorithm(alg) => write!(f, "Unsupported DNSSEC algorithm: {}", alg),
            Self::UnsupportedDigestType(digest) => write!(f, "Unsupported digest type: {}", digest),
            Self::SignatureVerificationFailed => write!(f, "DNSSEC signature verification failed"),
            Self::InvalidPublicKey => write!(f, "Invalid DNSKEY public key format"),
            Self::TrustAnchorNotFound => write!(f, "Trust anchor not found for validation"),
        }
    }
}

impl std::error::Error for DnsSecError {}

pub type Result<T> = std::result::Result<T, DnsSecError>;
