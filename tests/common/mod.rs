//! Helpers shared by the integration tests: Ed25519 zone keys and signed DNSKEY sets.

#![allow(dead_code)]

use autotrust::dns::resource::DNSKEY_FLAG_REVOKE;
use autotrust::dns::{
    DNSResource, DNSResourceClass, DNSResourceData, DNSResourceType, DnsKeyData, DsData, Name,
    RrSet, RrsigData,
};
use autotrust::dnssec::DigestType;
use autotrust::dnssec::validator::build_signed_data;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};

pub const DAY: u64 = 86_400;

/// Start of simulated time; signatures are valid well past it
pub const T0: u64 = 1_700_000_000;

pub struct TestKey {
    pair: Ed25519KeyPair,
    pub dnskey: DnsKeyData,
}

impl TestKey {
    pub fn generate(flags: u16) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let dnskey = DnsKeyData {
            flags,
            protocol: 3,
            algorithm: 15,
            public_key: pair.public_key().as_ref().to_vec(),
        };
        Self { pair, dnskey }
    }

    pub fn ksk() -> Self {
        Self::generate(257)
    }

    pub fn zsk() -> Self {
        Self::generate(256)
    }

    pub fn revoke(&mut self) {
        self.dnskey.flags |= DNSKEY_FLAG_REVOKE;
    }

    pub fn key_tag(&self) -> u16 {
        self.dnskey.key_tag()
    }

    /// Key tag of the key without the REVOKE bit
    pub fn unrevoked_tag(&self) -> u16 {
        DnsKeyData {
            flags: self.dnskey.flags & !DNSKEY_FLAG_REVOKE,
            ..self.dnskey.clone()
        }
        .key_tag()
    }

    pub fn rr(&self, owner: &Name) -> DNSResource {
        DNSResource::new(
            owner.clone(),
            3600,
            DNSResourceClass::IN,
            DNSResourceData::DnsKey(self.dnskey.clone()),
        )
    }

    pub fn ds(&self, owner: &Name) -> DNSResource {
        DNSResource::new(
            owner.clone(),
            3600,
            DNSResourceClass::IN,
            DNSResourceData::Ds(DsData {
                key_tag: self.key_tag(),
                algorithm: self.dnskey.algorithm,
                digest_type: 2,
                digest: DigestType::Sha256.ds_digest(owner, &self.dnskey).unwrap(),
            }),
        )
    }
}

/// DNSKEY set publishing `published`, signed by each of `signers`
pub fn signed_dnskey_set(owner: &Name, published: &[&TestKey], signers: &[&TestKey]) -> RrSet {
    let mut set = RrSet::new(owner.clone(), DNSResourceClass::IN, DNSResourceType::DNSKEY);
    for key in published {
        set.push(key.rr(owner));
    }

    for signer in signers {
        sign_as(&mut set, signer, signer.key_tag());
    }
    set
}

/// Add an RRSIG by `signer` that names `key_tag` as its key
pub fn sign_as(set: &mut RrSet, signer: &TestKey, key_tag: u16) {
    let mut rrsig = RrsigData {
        type_covered: 48,
        algorithm: 15,
        labels: set.owner.label_count() - 1,
        original_ttl: 3600,
        sig_expiration: 4_000_000_000,
        sig_inception: 1_000_000_000,
        key_tag,
        signer_name: set.owner.clone(),
        signature: Vec::new(),
    };
    let data = build_signed_data(set, &rrsig);
    rrsig.signature = signer.pair.sign(&data).as_ref().to_vec();
    set.rrsigs.push(rrsig);
}

/// Anchor file line for a record with a state comment
pub fn anchor_line(rr: &DNSResource, comment: &str) -> String {
    format!("{} ;{}", rr.to_text(), comment)
}
