use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::autotrust::file::{self, LoadedAnchor};
use crate::autotrust::point::{TrustPoint, TrustPointData};
use crate::autotrust::probe::ProbeOutcome;
use crate::autotrust::schedule::{ProbePolicy, ProbeSchedule};
use crate::autotrust::state::{KeyEntry, KeyState};
use crate::autotrust::statetable::{HoldDown, run_statetable};
use crate::autotrust::verify::verify_dnskey;
use crate::config::AutotrustConfig;
use crate::dns::{
    DNSResource, DNSResourceClass, DNSResourceType, Name, RecordParser, RrSet, TextRecordParser,
};
use crate::dnssec::RrsetVerifier;
use crate::error::{AutotrustError, Result};
use crate::metrics::AutotrustMetrics;

type ZoneKey = (Name, DNSResourceClass);

/// Lookup table and probe schedule, always updated together
#[derive(Default)]
struct Registry {
    points: HashMap<ZoneKey, Arc<TrustPoint>>,
    by_id: HashMap<u64, Arc<TrustPoint>>,
    schedule: ProbeSchedule,
}

/// All trust points of a resolver under RFC 5011 maintenance
pub struct TrustAnchorStore {
    config: AutotrustConfig,
    verifier: Arc<dyn RrsetVerifier>,
    parser: Box<dyn RecordParser>,
    metrics: Option<Arc<AutotrustMetrics>>,
    policy: ProbePolicy,
    next_id: AtomicU64,
    registry: Mutex<Registry>,
}

impl TrustAnchorStore {
    pub fn new(config: AutotrustConfig, verifier: Arc<dyn RrsetVerifier>) -> Self {
        Self {
            policy: ProbePolicy::from_config(&config),
            config,
            verifier,
            parser: Box::new(TextRecordParser::new()),
            metrics: None,
            next_id: AtomicU64::new(1),
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AutotrustMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_parser(mut self, parser: Box<dyn RecordParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &AutotrustConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&Arc<AutotrustMetrics>> {
        self.metrics.as_ref()
    }

    fn holddown(&self) -> HoldDown {
        HoldDown {
            add_holddown: self.config.add_holddown,
            remove_holddown: self.config.remove_holddown,
            revoke_age: self.config.revoke_age,
        }
    }

    /// Load an anchor file and register its trust point
    pub fn load_file(&self, path: &Path, now: u64) -> Result<Arc<TrustPoint>> {
        let loaded = file::load(path, now, self.parser.as_ref())?;
        let point = self.register(loaded)?;
        info!(
            "Loaded trust anchor file {} for {}",
            path.display(),
            point.name()
        );
        Ok(point)
    }

    /// Load every configured anchor file. Failures are logged and skipped.
    pub fn load_configured(&self, now: u64) -> usize {
        let mut loaded = 0;
        for path in &self.config.anchor_files {
            match self.load_file(path, now) {
                Ok(_) => loaded += 1,
                Err(e) => error!("Failed to load trust anchor file {}: {}", path.display(), e),
            }
        }
        loaded
    }

    /// Register a trust point from records, without a backing file.
    /// The records are trusted as given.
    pub fn add_trust_point(&self, records: Vec<DNSResource>, now: u64) -> Result<Arc<TrustPoint>> {
        let first = records
            .first()
            .ok_or_else(|| AutotrustError::RecordParse("No trust anchor records given".to_string()))?;
        let name = first.owner.clone();
        let class = first.rclass;

        let mut keys = Vec::new();
        keys.try_reserve(records.len())?;
        for rr in records {
            if rr.owner != name || rr.rclass != class {
                return Err(AutotrustError::ZoneMismatch {
                    file: Default::default(),
                    expected: format!("{} {}", name, class),
                    found: format!("{} {}", rr.owner, rr.rclass),
                });
            }
            if !matches!(rr.rtype(), DNSResourceType::DS | DNSResourceType::DNSKEY) {
                return Err(AutotrustError::RecordParse(format!(
                    "{} record cannot be a trust anchor",
                    rr.rtype()
                )));
            }
            keys.push(KeyEntry::new(rr, KeyState::Valid, now));
        }

        self.register(LoadedAnchor {
            name,
            class,
            data: TrustPointData {
                keys,
                next_probe_time: now,
                ..Default::default()
            },
        })
    }

    /// Insert a new trust point, or merge keys into the one already registered for the zone
    fn register(&self, loaded: LoadedAnchor) -> Result<Arc<TrustPoint>> {
        let LoadedAnchor {
            name,
            class,
            mut data,
        } = loaded;

        if let Some(existing) = self.find(&name, class) {
            self.merge_into(&existing, data)?;
            return Ok(existing);
        }

        self.policy.init(&mut data);
        data.assemble(&name, class)?;
        if data.is_degraded() {
            error!("Trust point {} has no valid keys", name);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let next_probe_time = data.next_probe_time;
        let point = Arc::new(TrustPoint::new(id, name.clone(), class, data));

        let raced = {
            let mut registry = self.registry.lock();
            match registry.points.get(&(name.clone(), class)).cloned() {
                Some(raced) => Some(raced),
                None => {
                    registry.points.insert((name.clone(), class), Arc::clone(&point));
                    registry.by_id.insert(id, Arc::clone(&point));
                    registry.schedule.schedule(id, next_probe_time);
                    None
                }
            }
        };

        match raced {
            // Another loader registered the zone meanwhile
            Some(existing) => {
                let data = point.lock().clone();
                self.merge_into(&existing, data)?;
                Ok(existing)
            }
            None => {
                self.report_point(&name, class, &point.lock());
                Ok(point)
            }
        }
    }

    /// Merge loaded keys into a registered trust point
    fn merge_into(&self, existing: &TrustPoint, data: TrustPointData) -> Result<()> {
        let (name, class) = (existing.name(), existing.class());
        let mut current = existing.lock();
        let mut merged = current.clone();
        let added = merged.merge_keys(data.keys);
        if merged.file.is_none() {
            merged.file = data.file;
        }
        merged.assemble(name, class)?;
        *current = merged;
        debug!("Merged {} keys into existing trust point {}", added, name);
        self.report_point(name, class, &current);
        Ok(())
    }

    pub fn find(&self, name: &Name, class: DNSResourceClass) -> Option<Arc<TrustPoint>> {
        self.registry
            .lock()
            .points
            .get(&(name.clone(), class))
            .cloned()
    }

    /// Administrative removal of a trust point
    pub fn remove(&self, name: &Name, class: DNSResourceClass) -> Option<Arc<TrustPoint>> {
        let removed = {
            let mut registry = self.registry.lock();
            let point = registry.points.remove(&(name.clone(), class))?;
            registry.by_id.remove(&point.id());
            registry.schedule.remove(point.id());
            point
        };
        if let Some(metrics) = &self.metrics {
            metrics.remove_trust_point(name, class);
        }
        info!("Removed trust point {} {}", name, class);
        Some(removed)
    }

    /// All trust points, sorted by zone
    pub fn trust_points(&self) -> Vec<Arc<TrustPoint>> {
        let mut points: Vec<_> = self.registry.lock().points.values().cloned().collect();
        points.sort_by(|a, b| (a.name(), a.class()).cmp(&(b.name(), b.class())));
        points
    }

    pub fn len(&self) -> usize {
        self.registry.lock().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest trust point due at `now` that is not being probed
    pub fn next_due(&self, now: u64) -> Option<Arc<TrustPoint>> {
        let registry = self.registry.lock();
        registry
            .schedule
            .due(now)
            .filter_map(|id| registry.by_id.get(&id))
            .find(|point| !point.is_probing())
            .cloned()
    }

    /// Trust points due at `now` that are not being probed, earliest first
    pub fn due(&self, now: u64) -> Vec<Arc<TrustPoint>> {
        let registry = self.registry.lock();
        registry
            .schedule
            .due(now)
            .filter_map(|id| registry.by_id.get(&id))
            .filter(|point| !point.is_probing())
            .cloned()
            .collect()
    }

    /// Earliest scheduled probe time
    pub fn next_probe_at(&self) -> Option<u64> {
        self.registry.lock().schedule.first()
    }

    /// Move a trust point to its current next probe time
    pub fn reschedule(&self, point: &TrustPoint) {
        let time = point.next_probe_time();
        let mut registry = self.registry.lock();
        if registry.by_id.contains_key(&point.id()) {
            registry.schedule.schedule(point.id(), time);
        }
    }

    /// Check that lookup and schedule hold the same trust points
    pub fn is_consistent(&self) -> bool {
        let registry = self.registry.lock();
        registry.points.len() == registry.by_id.len()
            && registry.schedule.len() == registry.by_id.len()
            && registry
                .points
                .values()
                .all(|p| registry.schedule.contains(p.id()) && registry.by_id.contains_key(&p.id()))
    }

    /// Handle the result of one DNSKEY query for a trust point.
    ///
    /// A missing or unverifiable answer only counts a failure and backs off;
    /// the trust point keeps its last known good state. A verified answer runs
    /// the state table and rebuilds the trusted sets. If rebuilding fails the
    /// trust point is left unchanged and not rescheduled.
    pub fn process_probe(
        &self,
        point: &TrustPoint,
        candidate: Option<RrSet>,
        now: u64,
    ) -> Result<ProbeOutcome> {
        let outcome = {
            let mut data = point.lock();
            data.last_queried = now;

            let verified = candidate.as_ref().and_then(|set| {
                verify_dnskey(self.verifier.as_ref(), point.name(), &data, set, now)
                    .map(|by| (set, by))
            });

            let outcome = match (candidate.is_some(), verified) {
                (false, _) => {
                    self.policy.on_failure(&mut data, now);
                    debug!("No DNSKEY answer for {} ({} failures)", point.name(), data.query_failed);
                    ProbeOutcome::NoResponse
                }
                (true, None) => {
                    self.policy.on_failure(&mut data, now);
                    warn!(
                        "DNSKEY set for {} failed verification ({} failures)",
                        point.name(),
                        data.query_failed
                    );
                    ProbeOutcome::Bogus
                }
                (true, Some((set, verified_by))) => {
                    let mut working = data.clone();
                    let report = run_statetable(
                        point.name(),
                        &mut working,
                        set,
                        verified_by,
                        self.verifier.as_ref(),
                        &self.holddown(),
                        now,
                    );
                    working.assemble(point.name(), point.class())?;
                    self.policy.on_success(&mut working, set, now);
                    *data = working;

                    if let Some(metrics) = &self.metrics {
                        for t in &report.transitions {
                            metrics.record_transition(t.from, t.to);
                        }
                        metrics.record_conflicts(report.conflicts);
                    }
                    ProbeOutcome::Secure(report)
                }
            };

            if data.is_degraded() {
                error!("Trust point {} has no valid keys", point.name());
            }
            self.report_point(point.name(), point.class(), &data);
            outcome
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_probe(outcome.label());
        }
        self.reschedule(point);

        if self.config.write_anchor_files {
            if let Err(e) = file::save(point) {
                error!("Failed to write trust anchor file for {}: {}", point.name(), e);
            }
        }

        Ok(outcome)
    }

    fn report_point(&self, name: &Name, class: DNSResourceClass, data: &TrustPointData) {
        if let Some(metrics) = &self.metrics {
            metrics.update_trust_point(name, class, data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DNSResourceData, DnsKeyData};
    use crate::dnssec::SecStatus;

    struct Accept;

    impl RrsetVerifier for Accept {
        fn verify_rrset(&self, _: &RrSet, _: &RrSet, _: u64) -> SecStatus {
            SecStatus::Secure
        }

        fn verify_self_signed(&self, _: &RrSet, _: &DnsKeyData, _: u64) -> SecStatus {
            SecStatus::Secure
        }
    }

    fn key_rr(zone: &str, fill: u8) -> DNSResource {
        DNSResource::new(
            zone.parse().unwrap(),
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

    fn store() -> TrustAnchorStore {
        let config = AutotrustConfig {
            write_anchor_files: false,
            ..Default::default()
        };
        TrustAnchorStore::new(config, Arc::new(Accept))
    }

    #[test]
    fn test_register_find_remove() {
        let store = store();
        let a = store.add_trust_point(vec![key_rr("a.example.", 1)], 100).unwrap();
        store.add_trust_point(vec![key_rr("b.example.", 2)], 50).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.is_consistent());

        let name: Name = "a.example.".parse().unwrap();
        assert_eq!(store.find(&name, DNSResourceClass::IN).unwrap().id(), a.id());
        assert!(store.find(&name, DNSResourceClass::CH).is_none());

        assert_eq!(store.next_probe_at(), Some(50));
        assert!(store.remove(&name, DNSResourceClass::IN).is_some());
        assert!(store.remove(&name, DNSResourceClass::IN).is_none());
        assert_eq!(store.len(), 1);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_same_zone_merges() {
        let store = store();
        let first = store.add_trust_point(vec![key_rr("example.", 1)], 0).unwrap();
        let second = store.add_trust_point(vec![key_rr("example.", 2)], 0).unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(store.len(), 1);
        assert_eq!(first.lock().keys.len(), 2);
        assert_eq!(first.lock().valid, 2);
    }

    #[test]
    fn test_mixed_zones_rejected() {
        let store = store();
        let err = store
            .add_trust_point(vec![key_rr("a.example.", 1), key_rr("b.example.", 2)], 0)
            .unwrap_err();
        assert!(matches!(err, AutotrustError::ZoneMismatch { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_next_due_skips_in_flight() {
        let store = store();
        let first = store.add_trust_point(vec![key_rr("a.example.", 1)], 10).unwrap();
        let second = store.add_trust_point(vec![key_rr("b.example.", 2)], 20).unwrap();

        assert!(store.next_due(5).is_none());
        assert_eq!(store.next_due(30).unwrap().id(), first.id());

        let _guard = first.try_begin_probe().unwrap();
        assert_eq!(store.next_due(30).unwrap().id(), second.id());
    }

    #[test]
    fn test_failed_probe_reschedules() {
        let store = store();
        let point = store.add_trust_point(vec![key_rr("example.", 1)], 0).unwrap();

        let outcome = store.process_probe(&point, None, 1000).unwrap();
        assert!(matches!(outcome, ProbeOutcome::NoResponse));
        let data = point.lock().clone();
        assert_eq!(data.query_failed, 1);
        assert_eq!(data.last_queried, 1000);
        assert_eq!(data.next_probe_time, 1000 + data.retry_time);
        assert_eq!(store.next_probe_at(), Some(data.next_probe_time));
        assert_eq!(data.valid, 1);
    }

    #[test]
    fn test_concurrent_loads_of_one_zone_keep_all_keys() {
        for _ in 0..20 {
            let store = Arc::new(store());
            let barrier = Arc::new(std::sync::Barrier::new(8));
            let handles: Vec<_> = (0..8u8)
                .map(|fill| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.add_trust_point(vec![key_rr("example.", fill)], 0).unwrap()
                    })
                })
                .collect();
            let points: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert_eq!(store.len(), 1);
            assert!(points.iter().all(|p| p.id() == points[0].id()));
            assert_eq!(points[0].lock().keys.len(), 8);
            assert_eq!(points[0].lock().valid, 8);
            assert!(store.is_consistent());
        }
    }
}
