use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::autotrust::state::{KeyEntry, KeyState};
use crate::dns::{DNSResource, DNSResourceClass, DNSResourceType, Name, RrSet};
use crate::error::Result;

/// Mutable state of a trust point, guarded by the trust point lock
#[derive(Debug, Clone, Default)]
pub struct TrustPointData {
    pub keys: Vec<KeyEntry>,
    /// Trusted DS records, rebuilt by `assemble`
    pub ds_set: Option<RrSet>,
    /// Trusted DNSKEY records, rebuilt by `assemble`
    pub dnskey_set: Option<RrSet>,
    /// Number of keys in the Valid state
    pub valid: usize,
    /// Number of keys in the Missing state
    pub missing: usize,
    pub last_queried: u64,
    pub last_success: u64,
    pub next_probe_time: u64,
    /// Consecutive failed probes
    pub query_failed: u32,
    pub query_interval: u64,
    pub retry_time: u64,
    pub file: Option<PathBuf>,
}

impl TrustPointData {
    /// Rebuild the trusted DS and DNSKEY sets from keys in the Valid or Missing state.
    ///
    /// Both sets are built into fresh buffers first; when memory cannot be
    /// reserved the previous sets and counters are left as they were.
    pub fn assemble(&mut self, owner: &Name, class: DNSResourceClass) -> Result<()> {
        let trusted = || self.keys.iter().filter(|k| k.state.is_trusted());
        let ds_count = trusted().filter(|k| k.rr.as_ds().is_some()).count();
        let dnskey_count = trusted().filter(|k| k.is_dnskey()).count();

        let mut ds_records: Vec<DNSResource> = Vec::new();
        ds_records.try_reserve_exact(ds_count)?;
        let mut dnskey_records: Vec<DNSResource> = Vec::new();
        dnskey_records.try_reserve_exact(dnskey_count)?;

        for key in trusted() {
            match key.rr.rtype() {
                DNSResourceType::DS => ds_records.push(key.rr.clone()),
                DNSResourceType::DNSKEY => dnskey_records.push(key.rr.clone()),
                DNSResourceType::RRSIG => {}
            }
        }

        self.ds_set = build_set(owner, class, DNSResourceType::DS, ds_records);
        self.dnskey_set = build_set(owner, class, DNSResourceType::DNSKEY, dnskey_records);
        self.recount();
        Ok(())
    }

    /// Recompute the cached Valid and Missing counters
    pub fn recount(&mut self) {
        self.valid = self.count_in(KeyState::Valid);
        self.missing = self.count_in(KeyState::Missing);
    }

    pub fn count_in(&self, state: KeyState) -> usize {
        self.keys.iter().filter(|k| k.state == state).count()
    }

    /// No key is Valid: the zone cannot be verified from this trust point
    pub fn is_degraded(&self) -> bool {
        self.valid == 0
    }

    /// Add keys that are not present yet. Returns how many were added.
    pub fn merge_keys(&mut self, keys: Vec<KeyEntry>) -> usize {
        let mut added = 0;
        for key in keys {
            if !self.keys.iter().any(|k| k.rr.rdata == key.rr.rdata) {
                self.keys.push(key);
                added += 1;
            }
        }
        added
    }
}

fn build_set(
    owner: &Name,
    class: DNSResourceClass,
    rtype: DNSResourceType,
    records: Vec<DNSResource>,
) -> Option<RrSet> {
    if records.is_empty() {
        return None;
    }
    let mut set = RrSet::new(owner.clone(), class, rtype);
    set.ttl = records.iter().map(|r| r.ttl).min().unwrap_or_default();
    set.records = records;
    Some(set)
}

/// One anchored zone under RFC 5011 maintenance
pub struct TrustPoint {
    id: u64,
    name: Name,
    class: DNSResourceClass,
    data: Mutex<TrustPointData>,
    probing: AtomicBool,
}

impl TrustPoint {
    pub fn new(id: u64, name: Name, class: DNSResourceClass, data: TrustPointData) -> Self {
        Self {
            id,
            name,
            class,
            data: Mutex::new(data),
            probing: AtomicBool::new(false),
        }
    }

    /// Stable identity, used to order trust points probed at the same time
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn class(&self) -> DNSResourceClass {
        self.class
    }

    pub fn lock(&self) -> MutexGuard<'_, TrustPointData> {
        self.data.lock()
    }

    pub fn next_probe_time(&self) -> u64 {
        self.data.lock().next_probe_time
    }

    /// Claim the trust point for one probe. Fails while another probe runs.
    pub fn try_begin_probe(self: &Arc<Self>) -> Option<ProbeGuard> {
        self.probing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProbeGuard {
                point: Arc::clone(self),
            })
    }

    pub fn is_probing(&self) -> bool {
        self.probing.load(Ordering::Acquire)
    }

    pub fn status(&self) -> TrustPointStatus {
        let data = self.data.lock();
        TrustPointStatus {
            zone: self.name.to_string(),
            class: self.class.to_string(),
            valid: data.valid,
            missing: data.missing,
            degraded: data.is_degraded(),
            last_queried: data.last_queried,
            last_success: data.last_success,
            next_probe_time: data.next_probe_time,
            query_failed: data.query_failed,
            query_interval: data.query_interval,
            retry_time: data.retry_time,
            file: data.file.as_ref().map(|p| p.display().to_string()),
            keys: data
                .keys
                .iter()
                .map(|k| KeyStatus {
                    key_tag: k.key_tag(),
                    rtype: k.rr.rtype(),
                    flags: k.rr.as_dnskey().map(|d| d.flags),
                    state: k.state,
                    pending_count: k.pending_count,
                    last_change: k.last_change,
                })
                .collect(),
        }
    }
}

impl fmt::Debug for TrustPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustPoint")
            .field("id", &self.id)
            .field("name", &self.name.to_string())
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// Held while a probe runs; releases the trust point on drop
pub struct ProbeGuard {
    point: Arc<TrustPoint>,
}

impl ProbeGuard {
    pub fn point(&self) -> &Arc<TrustPoint> {
        &self.point
    }
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.point.probing.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub key_tag: u16,
    pub rtype: DNSResourceType,
    pub flags: Option<u16>,
    pub state: KeyState,
    pub pending_count: u8,
    pub last_change: u64,
}

/// Point in time view of a trust point
#[derive(Debug, Clone, Serialize)]
pub struct TrustPointStatus {
    pub zone: String,
    pub class: String,
    pub valid: usize,
    pub missing: usize,
    pub degraded: bool,
    pub last_queried: u64,
    pub last_success: u64,
    pub next_probe_time: u64,
    pub query_failed: u32,
    pub query_interval: u64,
    pub retry_time: u64,
    pub file: Option<String>,
    pub keys: Vec<KeyStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DNSResourceData, DnsKeyData, DsData};

    fn dnskey(owner: &Name, fill: u8) -> DNSResource {
        DNSResource::new(
            owner.clone(),
            3600,
            DNSResourceClass::IN,
            DNSResourceData::DnsKey(DnsKeyData {
                flags: 257,
                protocol: 3,
                algorithm: 15,
                public_key: vec![fill; 32],
            }),
        )
    }

    fn ds(owner: &Name) -> DNSResource {
        DNSResource::new(
            owner.clone(),
            86400,
            DNSResourceClass::IN,
            DNSResourceData::Ds(DsData {
                key_tag: 1,
                algorithm: 15,
                digest_type: 2,
                digest: vec![0xab; 32],
            }),
        )
    }

    #[test]
    fn test_assemble_partitions_trusted_keys() {
        let owner: Name = "example.".parse().unwrap();
        let mut data = TrustPointData {
            keys: vec![
                KeyEntry::new(ds(&owner), KeyState::Valid, 0),
                KeyEntry::new(dnskey(&owner, 1), KeyState::Valid, 0),
                KeyEntry::new(dnskey(&owner, 2), KeyState::Missing, 0),
                KeyEntry::new(dnskey(&owner, 3), KeyState::AddPending, 0),
                KeyEntry::new(dnskey(&owner, 4), KeyState::Revoked, 0),
            ],
            ..Default::default()
        };

        data.assemble(&owner, DNSResourceClass::IN).unwrap();
        assert_eq!(data.ds_set.as_ref().unwrap().len(), 1);
        assert_eq!(data.dnskey_set.as_ref().unwrap().len(), 2);
        assert_eq!(data.valid, 2);
        assert_eq!(data.missing, 1);

        let first = (data.ds_set.clone(), data.dnskey_set.clone());
        data.assemble(&owner, DNSResourceClass::IN).unwrap();
        assert_eq!(first, (data.ds_set.clone(), data.dnskey_set.clone()));
    }

    #[test]
    fn test_assemble_empty_partition_is_none() {
        let owner: Name = "example.".parse().unwrap();
        let mut data = TrustPointData {
            keys: vec![KeyEntry::new(dnskey(&owner, 1), KeyState::Valid, 0)],
            ds_set: Some(RrSet::new(owner.clone(), DNSResourceClass::IN, DNSResourceType::DS)),
            ..Default::default()
        };
        data.assemble(&owner, DNSResourceClass::IN).unwrap();
        assert!(data.ds_set.is_none());
        assert!(data.dnskey_set.is_some());
    }

    #[test]
    fn test_probe_guard_is_exclusive() {
        let point = Arc::new(TrustPoint::new(
            1,
            Name::root(),
            DNSResourceClass::IN,
            TrustPointData::default(),
        ));
        let guard = point.try_begin_probe().unwrap();
        assert!(point.is_probing());
        assert!(point.try_begin_probe().is_none());
        drop(guard);
        assert!(point.try_begin_probe().is_some());
    }
}
