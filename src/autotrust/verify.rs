use tracing::debug;

use crate::autotrust::point::TrustPointData;
use crate::dns::{DnsKeyData, Name, RrSet};
use crate::dnssec::{DigestType, RrsetVerifier};

/// Which trusted set vouched for a DNSKEY set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifiedBy {
    Ds,
    Dnskey,
}

/// Verify a fetched DNSKEY set against the trusted material of a trust point.
///
/// The DS set is tried first, then the DNSKEY set. Either one succeeding is enough.
pub fn verify_dnskey(
    verifier: &dyn RrsetVerifier,
    zone: &Name,
    data: &TrustPointData,
    candidate: &RrSet,
    now: u64,
) -> Option<VerifiedBy> {
    if let Some(ds_set) = &data.ds_set {
        let status = verifier.verify_rrset(candidate, ds_set, now);
        debug!("Verifying DNSKEY set of {} with DS: {:?}", zone, status);
        if status.is_secure() {
            return Some(VerifiedBy::Ds);
        }
    }

    if let Some(dnskey_set) = &data.dnskey_set {
        let status = verifier.verify_rrset(candidate, dnskey_set, now);
        debug!("Verifying DNSKEY set of {} with DNSKEY: {:?}", zone, status);
        if status.is_secure() {
            return Some(VerifiedBy::Dnskey);
        }
    }

    None
}

/// True when a DS record of `ds_set` is the digest of `key`
pub fn matches_trusted_ds(ds_set: &RrSet, key: &DnsKeyData) -> bool {
    ds_set.records.iter().filter_map(|r| r.as_ds()).any(|ds| {
        ds.key_tag == key.key_tag()
            && ds.algorithm == key.algorithm
            && DigestType::from_u8(ds.digest_type)
                .and_then(|digest| digest.ds_digest(&ds_set.owner, key))
                .is_some_and(|digest| digest == ds.digest)
    })
}
