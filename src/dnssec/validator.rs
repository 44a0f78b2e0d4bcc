use tracing::{debug, trace};

use super::{DigestType, DnsSecAlgorithm, DnsSecError, errors::Result};
use crate::dns::{DNSResourceType, DnsKeyData, RrSet, RrsigData, canonical_rr_wire};

/// Outcome of a signature check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecStatus {
    Secure,
    Insecure,
}

impl SecStatus {
    pub fn is_secure(&self) -> bool {
        matches!(self, SecStatus::Secure)
    }
}

/// Cryptographic oracle used to verify DNSKEY sets
pub trait RrsetVerifier: Send + Sync {
    /// Verify `candidate` against a trusted DS or DNSKEY set
    fn verify_rrset(&self, candidate: &RrSet, trusted: &RrSet, now: u64) -> SecStatus;

    /// Check that `key` itself signed `candidate` (used for revoked keys, RFC 5011 section 2.1)
    fn verify_self_signed(&self, candidate: &RrSet, key: &DnsKeyData, now: u64) -> SecStatus;
}

/// Signature verification with `ring`
#[derive(Debug, Default, Clone)]
pub struct RingVerifier;

impl RingVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify the set with any of the given keys
    fn verify_with_keys(&self, candidate: &RrSet, keys: &[&DnsKeyData], now: u64) -> Result<()> {
        let mut last_error = DnsSecError::NoRrsig;

        for rrsig in &candidate.rrsigs {
            if rrsig.signer_name != candidate.owner {
                continue;
            }
            for key in keys.iter().filter(|k| {
                k.key_tag() == rrsig.key_tag && k.algorithm == rrsig.algorithm
            }) {
                match self.verify_signature(candidate, rrsig, key, now) {
                    Ok(()) => {
                        trace!("RRSIG with key tag {} verified", rrsig.key_tag);
                        return Ok(());
                    }
                    Err(e) => {
                        debug!("RRSIG with key tag {} failed: {}", rrsig.key_tag, e);
                        last_error = e;
                    }
                }
            }
        }

        Err(last_error)
    }

    fn verify_signature(
        &self,
        candidate: &RrSet,
        rrsig: &RrsigData,
        key: &DnsKeyData,
        now: u64,
    ) -> Result<()> {
        check_signature_validity(rrsig, now)?;

        let algorithm = DnsSecAlgorithm::from_u8(rrsig.algorithm)
            .ok_or(DnsSecError::UnsupportedAlgorithm(rrsig.algorithm))?;
        if !algorithm.is_supported() {
            return Err(DnsSecError::UnsupportedAlgorithm(rrsig.algorithm));
        }

        let signed_data = build_signed_data(candidate, rrsig);
        algorithm.verify(&key.public_key, &signed_data, &rrsig.signature)
    }

    /// Find candidate keys whose DS digest matches a trusted DS record
    fn keys_matching_ds<'a>(&self, candidate: &'a RrSet, trusted: &RrSet) -> Vec<&'a DnsKeyData> {
        let mut matched = Vec::new();
        for ds in trusted.records.iter().filter_map(|r| r.as_ds()) {
            let Some(digest_type) = DigestType::from_u8(ds.digest_type) else {
                debug!("Skipping DS with unsupported digest type {}", ds.digest_type);
                continue;
            };
            for key in candidate.records.iter().filter_map(|r| r.as_dnskey()) {
                if key.key_tag() != ds.key_tag || key.algorithm != ds.algorithm {
                    continue;
                }
                if digest_type.ds_digest(&candidate.owner, key).as_deref() == Some(&ds.digest[..]) {
                    matched.push(key);
                }
            }
        }
        matched
    }
}

impl RrsetVerifier for RingVerifier {
    fn verify_rrset(&self, candidate: &RrSet, trusted: &RrSet, now: u64) -> SecStatus {
        if candidate.rtype != DNSResourceType::DNSKEY || trusted.is_empty() {
            return SecStatus::Insecure;
        }

        let result = match trusted.rtype {
            DNSResourceType::DS => {
                let keys = self.keys_matching_ds(candidate, trusted);
                if keys.is_empty() {
                    Err(DnsSecError::NoDsMatch)
                } else {
                    self.verify_with_keys(candidate, &keys, now)
                }
            }
            DNSResourceType::DNSKEY => {
                // A revoked key only vouches for its own revocation (RFC 5011 section 2.1)
                let keys: Vec<&DnsKeyData> = trusted
                    .records
                    .iter()
                    .filter_map(|r| r.as_dnskey())
                    .filter(|k| !k.is_revoked())
                    .collect();
                self.verify_with_keys(candidate, &keys, now)
            }
            DNSResourceType::RRSIG => Err(DnsSecError::TrustAnchorNotFound),
        };

        match result {
            Ok(()) => SecStatus::Secure,
            Err(e) => {
                debug!("DNSKEY set for {} did not verify: {}", candidate.owner, e);
                SecStatus::Insecure
            }
        }
    }

    fn verify_self_signed(&self, candidate: &RrSet, key: &DnsKeyData, now: u64) -> SecStatus {
        match self.verify_with_keys(candidate, &[key], now) {
            Ok(()) => SecStatus::Secure,
            Err(_) => SecStatus::Insecure,
        }
    }
}

/// Check signature validity period
fn check_signature_validity(rrsig: &RrsigData, now: u64) -> Result<()> {
    if now < u64::from(rrsig.sig_inception) {
        return Err(DnsSecError::SignatureNotYetValid);
    }
    if now > u64::from(rrsig.sig_expiration) {
        return Err(DnsSecError::SignatureExpired);
    }
    Ok(())
}

/// Build the signed data for signature verification (RFC 4034 section 3.1.8.1)
pub fn build_signed_data(candidate: &RrSet, rrsig: &RrsigData) -> Vec<u8> {
    let mut data = rrsig.signed_prefix();

    let mut records: Vec<Vec<u8>> = candidate
        .records
        .iter()
        .map(|record| canonical_rr_wire(candidate, record, rrsig.original_ttl))
        .collect();
    // Canonical order compares RDATA only (RFC 4034 section 6.3)
    let header = candidate.owner.as_wire().len() + 10;
    records.sort_by(|a, b| a[header..].cmp(&b[header..]));
    records.dedup();

    for record in records {
        data.extend_from_slice(&record);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DNSResource, DNSResourceClass, DNSResourceData, DsData, Name};
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    struct Signer {
        pair: Ed25519KeyPair,
        key: DnsKeyData,
    }

    fn signer(flags: u16) -> Signer {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let key = DnsKeyData {
            flags,
            protocol: 3,
            algorithm: 15,
            public_key: pair.public_key().as_ref().to_vec(),
        };
        Signer { pair, key }
    }

    fn key_set(owner: &Name, keys: &[&DnsKeyData]) -> RrSet {
        let mut set = RrSet::new(owner.clone(), DNSResourceClass::IN, DNSResourceType::DNSKEY);
        for key in keys {
            set.push(DNSResource::new(
                owner.clone(),
                3600,
                DNSResourceClass::IN,
                DNSResourceData::DnsKey((*key).clone()),
            ));
        }
        set
    }

    fn sign(set: &mut RrSet, signer: &Signer) {
        let mut rrsig = RrsigData {
            type_covered: 48,
            algorithm: 15,
            labels: set.owner.label_count() - 1,
            original_ttl: 3600,
            sig_expiration: 2_000_000_000,
            sig_inception: 1_000_000_000,
            key_tag: signer.key.key_tag(),
            signer_name: set.owner.clone(),
            signature: Vec::new(),
        };
        let data = build_signed_data(set, &rrsig);
        rrsig.signature = signer.pair.sign(&data).as_ref().to_vec();
        set.rrsigs.push(rrsig);
    }

    fn ds_for(owner: &Name, key: &DnsKeyData) -> RrSet {
        let mut set = RrSet::new(owner.clone(), DNSResourceClass::IN, DNSResourceType::DS);
        set.push(DNSResource::new(
            owner.clone(),
            3600,
            DNSResourceClass::IN,
            DNSResourceData::Ds(DsData {
                key_tag: key.key_tag(),
                algorithm: key.algorithm,
                digest_type: 2,
                digest: DigestType::Sha256.ds_digest(owner, key).unwrap(),
            }),
        ));
        set
    }

    const NOW: u64 = 1_500_000_000;

    #[test]
    fn test_verify_with_trusted_dnskey() {
        let owner: Name = "example.".parse().unwrap();
        let ksk = signer(257);
        let zsk = signer(256);
        let mut candidate = key_set(&owner, &[&ksk.key, &zsk.key]);
        sign(&mut candidate, &ksk);

        let trusted = key_set(&owner, &[&ksk.key]);
        let verifier = RingVerifier::new();
        assert_eq!(verifier.verify_rrset(&candidate, &trusted, NOW), SecStatus::Secure);

        // Untrusted signer
        let other = key_set(&owner, &[&zsk.key]);
        assert_eq!(verifier.verify_rrset(&candidate, &other, NOW), SecStatus::Insecure);
    }

    #[test]
    fn test_verify_with_ds() {
        let owner: Name = "example.".parse().unwrap();
        let ksk = signer(257);
        let mut candidate = key_set(&owner, &[&ksk.key]);
        sign(&mut candidate, &ksk);

        let verifier = RingVerifier::new();
        assert!(
            verifier
                .verify_rrset(&candidate, &ds_for(&owner, &ksk.key), NOW)
                .is_secure()
        );
    }

    #[test]
    fn test_tampered_set_rejected() {
        let owner: Name = "example.".parse().unwrap();
        let ksk = signer(257);
        let mut candidate = key_set(&owner, &[&ksk.key]);
        sign(&mut candidate, &ksk);
        let trusted = key_set(&owner, &[&ksk.key]);

        let intruder = signer(257);
        candidate.push(DNSResource::new(
            owner.clone(),
            3600,
            DNSResourceClass::IN,
            DNSResourceData::DnsKey(intruder.key.clone()),
        ));

        assert_eq!(
            RingVerifier::new().verify_rrset(&candidate, &trusted, NOW),
            SecStatus::Insecure
        );
    }

    #[test]
    fn test_expired_signature_rejected() {
        let owner: Name = "example.".parse().unwrap();
        let ksk = signer(257);
        let mut candidate = key_set(&owner, &[&ksk.key]);
        sign(&mut candidate, &ksk);
        let trusted = key_set(&owner, &[&ksk.key]);

        let verifier = RingVerifier::new();
        assert!(!verifier.verify_rrset(&candidate, &trusted, 2_100_000_000).is_secure());
        assert!(!verifier.verify_rrset(&candidate, &trusted, 900_000_000).is_secure());
    }

    #[test]
    fn test_revoked_self_signature() {
        let owner: Name = "example.".parse().unwrap();
        let mut ksk = signer(257);
        let trusted = key_set(&owner, &[&ksk.key]);

        ksk.key.flags |= crate::dns::resource::DNSKEY_FLAG_REVOKE;
        let mut candidate = key_set(&owner, &[&ksk.key]);
        sign(&mut candidate, &ksk);

        let verifier = RingVerifier::new();
        assert!(verifier.verify_self_signed(&candidate, &ksk.key, NOW).is_secure());
        // The revoked form carries no trust for the set
        assert!(!verifier.verify_rrset(&candidate, &trusted, NOW).is_secure());
    }
}
