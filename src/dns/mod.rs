pub mod enums;
pub mod name;
pub mod parser;
pub mod resource;
pub mod rrset;

pub use enums::{DNSResourceClass, DNSResourceType};
pub use name::Name;
pub use parser::{RecordParser, TextRecordParser};
pub use resource::{DNSResource, DNSResourceData, DnsKeyData, DsData, RrsigData};
pub use rrset::RrSet;

/// Canonical wire form of one record of `set` as it enters signature input (RFC 4034 section 6.2)
pub fn canonical_rr_wire(set: &RrSet, record: &DNSResource, original_ttl: u32) -> Vec<u8> {
    let rdata = record.rdata_wire();
    let owner = set.owner.as_wire();
    let mut data = Vec::with_capacity(owner.len() + 10 + rdata.len());
    data.extend_from_slice(owner);
    data.extend_from_slice(&u16::from(set.rtype).to_be_bytes());
    data.extend_from_slice(&u16::from(set.rclass).to_be_bytes());
    data.extend_from_slice(&original_ttl.to_be_bytes());
    data.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    data.extend_from_slice(&rdata);
    data
}
