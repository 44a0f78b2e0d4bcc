pub mod algorithm;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod validator;

pub use algorithm::DnsSecAlgorithm;
pub use digest::DigestType;
pub use errors::DnsSecError;
pub use key_tag::calculate_key_tag;
pub use validator::{RingVerifier, RrsetVerifier, SecStatus};

/// DNSSEC constants
pub mod constants {
    /// Root trust anchor key tag (2017 KSK)
    pub const ROOT_KSK_KEY_TAG: u16 = 20326;
}
