use std::collections::{BTreeSet, HashMap};

use crate::autotrust::point::TrustPointData;
use crate::autotrust::state::KeyState;
use crate::config::AutotrustConfig;
use crate::dns::RrSet;

const DAY: u64 = 86_400;

/// Probe timing policy (RFC 5011 section 2.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    pub min_query_interval: u64,
    pub max_query_interval: u64,
    pub initial_retry_time: u64,
}

impl ProbePolicy {
    pub fn from_config(config: &AutotrustConfig) -> Self {
        Self {
            min_query_interval: config.min_query_interval,
            max_query_interval: config.max_query_interval,
            initial_retry_time: config.initial_retry_time,
        }
    }

    fn bound(&self, value: u64, upper: u64) -> u64 {
        value.min(upper).max(self.min_query_interval)
    }

    /// Fill in intervals that a fresh trust point does not have yet
    pub fn init(&self, data: &mut TrustPointData) {
        if data.query_interval == 0 {
            data.query_interval = self.max_query_interval;
        }
        if data.retry_time == 0 {
            data.retry_time = self.initial_retry_time;
        }
    }

    /// Schedule after a verified probe of `candidate`
    pub fn on_success(&self, data: &mut TrustPointData, candidate: &RrSet, now: u64) {
        let ttl = u64::from(candidate.original_ttl());
        let (interval_base, retry_base) = match soonest_expiration(data, candidate) {
            Some(expiration) => {
                let expire = expiration.saturating_sub(now);
                ((ttl / 2).min(expire / 2), (ttl / 10).min(expire / 10))
            }
            None => (ttl / 2, ttl / 10),
        };

        data.query_interval = self.bound(interval_base, self.max_query_interval);
        data.retry_time = self.bound(retry_base, DAY.min(self.max_query_interval));
        data.query_failed = 0;
        data.last_success = now;
        data.next_probe_time = now.saturating_add(data.query_interval);
    }

    /// Schedule after a probe without a usable answer. The retry time is kept
    /// for the first failure and doubles with each further one.
    pub fn on_failure(&self, data: &mut TrustPointData, now: u64) {
        data.query_failed = data.query_failed.saturating_add(1);
        if data.retry_time == 0 {
            data.retry_time = self.initial_retry_time;
        } else if data.query_failed > 1 {
            data.retry_time = data.retry_time.saturating_mul(2);
        }
        data.retry_time = data.retry_time.min(self.max_query_interval);
        data.next_probe_time = now.saturating_add(data.retry_time);
    }
}

/// Soonest expiration of a signature by a Valid key, or of any signature
fn soonest_expiration(data: &TrustPointData, candidate: &RrSet) -> Option<u64> {
    let valid_tags: Vec<u16> = data
        .keys
        .iter()
        .filter(|k| k.state == KeyState::Valid && k.is_dnskey())
        .map(|k| k.key_tag())
        .collect();

    let by_valid = candidate
        .rrsigs
        .iter()
        .filter(|sig| valid_tags.contains(&sig.key_tag))
        .map(|sig| u64::from(sig.sig_expiration))
        .min();

    by_valid.or_else(|| {
        candidate
            .rrsigs
            .iter()
            .map(|sig| u64::from(sig.sig_expiration))
            .min()
    })
}

/// Trust points ordered by next probe time, ties broken by id
#[derive(Debug, Default)]
pub struct ProbeSchedule {
    queue: BTreeSet<(u64, u64)>,
    times: HashMap<u64, u64>,
}

impl ProbeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or move the entry for `id`
    pub fn schedule(&mut self, id: u64, time: u64) {
        if let Some(old) = self.times.insert(id, time) {
            self.queue.remove(&(old, id));
        }
        self.queue.insert((time, id));
    }

    pub fn remove(&mut self, id: u64) -> bool {
        match self.times.remove(&id) {
            Some(time) => self.queue.remove(&(time, id)),
            None => false,
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.times.contains_key(&id)
    }

    pub fn time_of(&self, id: u64) -> Option<u64> {
        self.times.get(&id).copied()
    }

    /// Earliest scheduled time
    pub fn first(&self) -> Option<u64> {
        self.queue.first().map(|(time, _)| *time)
    }

    /// Ids due at `now`, earliest first
    pub fn due(&self, now: u64) -> impl Iterator<Item = u64> + '_ {
        self.queue
            .iter()
            .take_while(move |(time, _)| *time <= now)
            .map(|(_, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
