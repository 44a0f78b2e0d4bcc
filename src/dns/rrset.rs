use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::Name;
use super::resource::{DNSResource, RrsigData};

/// A set of records sharing owner, class and type, with the signatures covering it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RrSet {
    pub owner: Name,
    pub rclass: DNSResourceClass,
    pub rtype: DNSResourceType,
    pub ttl: u32,
    pub records: Vec<DNSResource>,
    pub rrsigs: Vec<RrsigData>,
}

impl RrSet {
    pub fn new(owner: Name, rclass: DNSResourceClass, rtype: DNSResourceType) -> Self {
        Self {
            owner,
            rclass,
            rtype,
            ttl: 0,
            records: Vec::new(),
            rrsigs: Vec::new(),
        }
    }

    /// Group records of `rtype` at `owner` together with the RRSIGs that cover them.
    /// Records for other names, classes or types are ignored.
    pub fn from_records(
        owner: &Name,
        rclass: DNSResourceClass,
        rtype: DNSResourceType,
        records: impl IntoIterator<Item = DNSResource>,
    ) -> Self {
        let mut set = Self::new(owner.clone(), rclass, rtype);
        for record in records {
            if record.owner != *owner || record.rclass != rclass {
                continue;
            }
            if let Some(sig) = record.as_rrsig() {
                if sig.type_covered == u16::from(rtype) {
                    set.rrsigs.push(sig.clone());
                }
            } else if record.rtype() == rtype {
                set.push(record);
            }
        }
        set
    }

    /// Add a record, keeping the lowest TTL as the set TTL
    pub fn push(&mut self, record: DNSResource) {
        if self.records.is_empty() || record.ttl < self.ttl {
            self.ttl = record.ttl;
        }
        self.records.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Original TTL as claimed by the signatures, or the set TTL when unsigned
    pub fn original_ttl(&self) -> u32 {
        self.rrsigs
            .iter()
            .map(|sig| sig.original_ttl)
            .max()
            .unwrap_or(self.ttl)
    }
}
