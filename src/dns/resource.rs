use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::Name;
use crate::dnssec::calculate_key_tag;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;

/// DNSKEY flag: key revoked (RFC 5011)
pub const DNSKEY_FLAG_REVOKE: u16 = 0x0080;
/// DNSKEY flag: secure entry point (RFC 4034)
pub const DNSKEY_FLAG_SEP: u16 = 0x0001;

/// A resource record as used by trust anchor maintenance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DNSResource {
    pub owner: Name,
    pub ttl: u32,
    pub rclass: DNSResourceClass,
    pub rdata: DNSResourceData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DNSResourceData {
    DnsKey(DnsKeyData),
    Ds(DsData),
    Rrsig(RrsigData),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsKeyData {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DsData {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RrsigData {
    pub type_covered: u16,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub sig_expiration: u32,
    pub sig_inception: u32,
    pub key_tag: u16,
    pub signer_name: Name,
    pub signature: Vec<u8>,
}

impl DNSResource {
    pub fn new(owner: Name, ttl: u32, rclass: DNSResourceClass, rdata: DNSResourceData) -> Self {
        Self {
            owner,
            ttl,
            rclass,
            rdata,
        }
    }

    pub fn rtype(&self) -> DNSResourceType {
        match self.rdata {
            DNSResourceData::DnsKey(_) => DNSResourceType::DNSKEY,
            DNSResourceData::Ds(_) => DNSResourceType::DS,
            DNSResourceData::Rrsig(_) => DNSResourceType::RRSIG,
        }
    }

    pub fn as_dnskey(&self) -> Option<&DnsKeyData> {
        match &self.rdata {
            DNSResourceData::DnsKey(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_ds(&self) -> Option<&DsData> {
        match &self.rdata {
            DNSResourceData::Ds(ds) => Some(ds),
            _ => None,
        }
    }

    pub fn as_rrsig(&self) -> Option<&RrsigData> {
        match &self.rdata {
            DNSResourceData::Rrsig(sig) => Some(sig),
            _ => None,
        }
    }

    /// Key tag of the key this record refers to
    pub fn key_tag(&self) -> u16 {
        match &self.rdata {
            DNSResourceData::DnsKey(key) => key.key_tag(),
            DNSResourceData::Ds(ds) => ds.key_tag,
            DNSResourceData::Rrsig(sig) => sig.key_tag,
        }
    }

    /// RDATA in wire format
    pub fn rdata_wire(&self) -> Vec<u8> {
        match &self.rdata {
            DNSResourceData::DnsKey(key) => key.to_wire(),
            DNSResourceData::Ds(ds) => {
                let mut data = Vec::with_capacity(4 + ds.digest.len());
                data.extend_from_slice(&ds.key_tag.to_be_bytes());
                data.push(ds.algorithm);
                data.push(ds.digest_type);
                data.extend_from_slice(&ds.digest);
                data
            }
            DNSResourceData::Rrsig(sig) => {
                let mut data = sig.signed_prefix();
                data.extend_from_slice(&sig.signature);
                data
            }
        }
    }

    /// Presentation format, one line, without trailing comment
    pub fn to_text(&self) -> String {
        let rdata = match &self.rdata {
            DNSResourceData::DnsKey(key) => format!(
                "{} {} {} {}",
                key.flags,
                key.protocol,
                key.algorithm,
                STANDARD.encode(&key.public_key)
            ),
            DNSResourceData::Ds(ds) => format!(
                "{} {} {} {}",
                ds.key_tag,
                ds.algorithm,
                ds.digest_type,
                hex::encode_upper(&ds.digest)
            ),
            DNSResourceData::Rrsig(sig) => {
                let covered = DNSResourceType::from_u16(sig.type_covered)
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| format!("TYPE{}", sig.type_covered));
                format!(
                    "{} {} {} {} {} {} {} {} {}",
                    covered,
                    sig.algorithm,
                    sig.labels,
                    sig.original_ttl,
                    format_sig_time(sig.sig_expiration),
                    format_sig_time(sig.sig_inception),
                    sig.key_tag,
                    sig.signer_name,
                    STANDARD.encode(&sig.signature)
                )
            }
        };

        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.owner,
            self.ttl,
            self.rclass,
            self.rtype(),
            rdata
        )
    }
}

impl DnsKeyData {
    pub fn to_wire(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + self.public_key.len());
        data.extend_from_slice(&self.flags.to_be_bytes());
        data.push(self.protocol);
        data.push(self.algorithm);
        data.extend_from_slice(&self.public_key);
        data
    }

    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    pub fn is_sep(&self) -> bool {
        self.flags & DNSKEY_FLAG_SEP != 0
    }

    pub fn is_revoked(&self) -> bool {
        self.flags & DNSKEY_FLAG_REVOKE != 0
    }

    /// Same key material, ignoring the REVOKE flag (RFC 5011 section 2.1)
    pub fn same_key(&self, other: &DnsKeyData) -> bool {
        self.flags | DNSKEY_FLAG_REVOKE == other.flags | DNSKEY_FLAG_REVOKE
            && self.protocol == other.protocol
            && self.algorithm == other.algorithm
            && self.public_key == other.public_key
    }

    /// Approximate key size in bits, for file annotations
    pub fn key_size(&self) -> usize {
        match self.algorithm {
            // RSA: exponent length prefix, exponent, modulus (RFC 3110)
            1 | 5 | 7 | 8 | 10 => match self.public_key.first() {
                Some(0) if self.public_key.len() > 3 => {
                    let exp_len =
                        u16::from_be_bytes([self.public_key[1], self.public_key[2]]) as usize;
                    self.public_key.len().saturating_sub(3 + exp_len) * 8
                }
                Some(&exp_len) => self.public_key.len().saturating_sub(1 + exp_len as usize) * 8,
                None => 0,
            },
            13 | 14 => self.public_key.len() * 4,
            _ => self.public_key.len() * 8,
        }
    }
}

impl RrsigData {
    /// RRSIG RDATA without the signature, as covered by the signature (RFC 4034 section 3.1.8.1)
    pub fn signed_prefix(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(18 + self.signer_name.as_wire().len());
        data.extend_from_slice(&self.type_covered.to_be_bytes());
        data.push(self.algorithm);
        data.push(self.labels);
        data.extend_from_slice(&self.original_ttl.to_be_bytes());
        data.extend_from_slice(&self.sig_expiration.to_be_bytes());
        data.extend_from_slice(&self.sig_inception.to_be_bytes());
        data.extend_from_slice(&self.key_tag.to_be_bytes());
        data.extend_from_slice(self.signer_name.as_wire());
        data
    }
}

fn format_sig_time(secs: u32) -> String {
    DateTime::from_timestamp(i64::from(secs), 0)
        .map(|dt| dt.format("%Y%m%d%H%M%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}
