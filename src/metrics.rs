use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Registry, TextEncoder, opts};

use crate::autotrust::TrustPointData;
use crate::autotrust::state::KeyState;
use crate::dns::{DNSResourceClass, Name};

/// Prometheus registry and collectors for trust anchor maintenance
pub struct AutotrustMetrics {
    registry: Registry,

    probes_total: IntCounterVec,
    state_transitions: IntCounterVec,
    holddown_conflicts: IntCounter,

    valid_keys: IntGaugeVec,
    missing_keys: IntGaugeVec,
    query_failed: IntGaugeVec,
}

impl AutotrustMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let probes_total = IntCounterVec::new(
            opts!(
                "autotrust_probes_total",
                "Total number of DNSKEY probes by result"
            ),
            &["result"],
        )?;

        let state_transitions = IntCounterVec::new(
            opts!(
                "autotrust_state_transitions_total",
                "Total number of RFC 5011 key state transitions"
            ),
            &["from", "to"],
        )?;

        let holddown_conflicts = IntCounter::with_opts(opts!(
            "autotrust_holddown_conflicts_total",
            "Transitions deferred because they would leave a zone without a valid key"
        ))?;

        let valid_keys = IntGaugeVec::new(
            opts!(
                "autotrust_valid_keys",
                "Number of keys in the VALID state per trust point"
            ),
            &["zone", "class"],
        )?;

        let missing_keys = IntGaugeVec::new(
            opts!(
                "autotrust_missing_keys",
                "Number of keys in the MISSING state per trust point"
            ),
            &["zone", "class"],
        )?;

        let query_failed = IntGaugeVec::new(
            opts!(
                "autotrust_query_failed",
                "Consecutive failed probes per trust point"
            ),
            &["zone", "class"],
        )?;

        registry.register(Box::new(probes_total.clone()))?;
        registry.register(Box::new(state_transitions.clone()))?;
        registry.register(Box::new(holddown_conflicts.clone()))?;
        registry.register(Box::new(valid_keys.clone()))?;
        registry.register(Box::new(missing_keys.clone()))?;
        registry.register(Box::new(query_failed.clone()))?;

        Ok(Self {
            registry,
            probes_total,
            state_transitions,
            holddown_conflicts,
            valid_keys,
            missing_keys,
            query_failed,
        })
    }

    /// `result` is one of `secure`, `bogus` or `no_response`
    pub fn record_probe(&self, result: &str) {
        self.probes_total.with_label_values(&[result]).inc();
    }

    pub fn record_transition(&self, from: KeyState, to: KeyState) {
        self.state_transitions
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }

    pub fn record_conflicts(&self, count: usize) {
        self.holddown_conflicts.inc_by(count as u64);
    }

    /// Refresh the per zone gauges
    pub fn update_trust_point(&self, zone: &Name, class: DNSResourceClass, data: &TrustPointData) {
        let (zone, class) = (zone.to_string(), class.to_string());
        let labels = [zone.as_str(), class.as_str()];
        self.valid_keys.with_label_values(&labels).set(data.valid as i64);
        self.missing_keys
            .with_label_values(&labels)
            .set(data.missing as i64);
        self.query_failed
            .with_label_values(&labels)
            .set(i64::from(data.query_failed));
    }

    /// Drop the gauges of a removed trust point
    pub fn remove_trust_point(&self, zone: &Name, class: DNSResourceClass) {
        let (zone, class) = (zone.to_string(), class.to_string());
        for gauge in [&self.valid_keys, &self.missing_keys, &self.query_failed] {
            let _ = gauge.remove_label_values(&[zone.as_str(), class.as_str()]);
        }
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
