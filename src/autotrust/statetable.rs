//! RFC 5011 key state transitions, run once per verified probe.

use tracing::{debug, info, warn};

use crate::autotrust::point::TrustPointData;
use crate::autotrust::state::{KeyEntry, KeyState};
use crate::autotrust::verify::{VerifiedBy, matches_trusted_ds};
use crate::dns::{DNSResource, DNSResourceData, DnsKeyData, Name, RrSet};
use crate::dnssec::RrsetVerifier;

/// Hold-down timers in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldDown {
    pub add_holddown: u64,
    pub remove_holddown: u64,
    pub revoke_age: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub key_tag: u16,
    pub from: KeyState,
    pub to: KeyState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateTableReport {
    pub transitions: Vec<Transition>,
    /// Keys newly observed in this probe
    pub added: usize,
    /// Transitions out of Valid held back to keep a Valid key
    pub conflicts: usize,
    pub valid: usize,
}

impl StateTableReport {
    pub fn changed(&self) -> bool {
        !self.transitions.is_empty() || self.added > 0
    }
}

/// How a key entry showed up in the probed set
#[derive(Debug, Clone, PartialEq, Eq)]
enum Sighting {
    Absent,
    Present,
    /// Present with the REVOKE bit and a valid self-signature
    Revoked(DnsKeyData),
}

/// Apply one round of RFC 5011 transitions to `data` for a verified `candidate` set.
///
/// New SEP keys are added in Start, every DNSKEY entry is moved along the
/// state table, DS entries are retired once a DNSKEY is Valid, and Removed
/// entries are purged. Transitions that would leave no Valid key are deferred.
pub fn run_statetable(
    zone: &Name,
    data: &mut TrustPointData,
    candidate: &RrSet,
    verified_by: VerifiedBy,
    verifier: &dyn RrsetVerifier,
    holddown: &HoldDown,
    now: u64,
) -> StateTableReport {
    let mut report = StateTableReport::default();
    let valid_before = data.count_in(KeyState::Valid);
    let bootstrap = verified_by == VerifiedBy::Ds
        && !data
            .keys
            .iter()
            .any(|k| k.is_dnskey() && k.state == KeyState::Valid);

    let sightings = observe(zone, data, candidate, verifier, now, &mut report);

    let mut proposed: Vec<KeyState> = data
        .keys
        .iter()
        .zip(&sightings)
        .map(|(key, seen)| next_state(data, key, seen, bootstrap, valid_before, holddown, now))
        .collect();

    // Never leave the zone without a Valid key after a verified probe
    let valid_after = proposed.iter().filter(|s| **s == KeyState::Valid).count();
    if valid_before > 0 && valid_after == 0 {
        for (key, next) in data.keys.iter().zip(proposed.iter_mut()) {
            if key.state == KeyState::Valid && *next != KeyState::Valid {
                warn!(
                    "Holddown conflict for {}: key {} would go {} -> {} leaving no valid key, deferred",
                    zone,
                    key.key_tag(),
                    key.state,
                    next
                );
                *next = KeyState::Valid;
                report.conflicts += 1;
            }
        }
    }

    for ((key, next), seen) in data.keys.iter_mut().zip(proposed).zip(sightings) {
        if next == key.state {
            if next == KeyState::AddPending && seen == Sighting::Present {
                key.pending_count = key.pending_count.saturating_add(1);
            }
            continue;
        }

        if next == KeyState::Revoked {
            if let Sighting::Revoked(revoked) = seen {
                key.rr.rdata = DNSResourceData::DnsKey(revoked);
            }
        }
        record(zone, key, next, now, &mut report);
        if next == KeyState::AddPending {
            key.pending_count = 1;
        }
    }

    // Once a DNSKEY carries trust the DS records are no longer needed
    if data
        .keys
        .iter()
        .any(|k| k.is_dnskey() && k.state == KeyState::Valid)
    {
        for key in data
            .keys
            .iter_mut()
            .filter(|k| !k.is_dnskey() && k.state != KeyState::Removed)
        {
            record(zone, key, KeyState::Removed, now, &mut report);
        }
    }

    data.keys.retain(|k| k.state != KeyState::Removed);
    data.recount();
    report.valid = data.valid;
    report
}

/// Match candidate keys to entries, adding new SEP keys in Start
fn observe(
    zone: &Name,
    data: &mut TrustPointData,
    candidate: &RrSet,
    verifier: &dyn RrsetVerifier,
    now: u64,
    report: &mut StateTableReport,
) -> Vec<Sighting> {
    let mut sightings = vec![Sighting::Absent; data.keys.len()];

    for rr in &candidate.records {
        let Some(key) = rr.as_dnskey() else {
            continue;
        };

        let revoked = key.is_revoked();
        if revoked && !verifier.verify_self_signed(candidate, key, now).is_secure() {
            debug!(
                "Key {} of {} has the REVOKE bit but is not self-signed, ignored",
                key.key_tag(),
                zone
            );
            continue;
        }

        let existing = data
            .keys
            .iter()
            .position(|k| k.rr.as_dnskey().is_some_and(|d| d.same_key(key)));
        let sighting = if revoked {
            Sighting::Revoked(key.clone())
        } else {
            Sighting::Present
        };

        match existing {
            Some(idx) => sightings[idx] = sighting,
            None if revoked || !key.is_sep() => {}
            None => {
                info!("New trust anchor key {} for {}", key.key_tag(), zone);
                let rr = DNSResource::new(
                    candidate.owner.clone(),
                    candidate.ttl,
                    candidate.rclass,
                    DNSResourceData::DnsKey(key.clone()),
                );
                data.keys.push(KeyEntry::new(rr, KeyState::Start, now));
                sightings.push(sighting);
                report.added += 1;
            }
        }
    }

    sightings
}

fn next_state(
    data: &TrustPointData,
    key: &KeyEntry,
    seen: &Sighting,
    bootstrap: bool,
    valid_before: usize,
    holddown: &HoldDown,
    now: u64,
) -> KeyState {
    let Some(dnskey) = key.rr.as_dnskey() else {
        // DS entries only leave through retirement
        return key.state;
    };
    let age = key.age(now);
    let vouched_by_ds = || {
        bootstrap
            && data
                .ds_set
                .as_ref()
                .is_some_and(|ds_set| matches_trusted_ds(ds_set, dnskey))
    };

    match (key.state, seen) {
        (KeyState::Start, Sighting::Present) => {
            if vouched_by_ds() || (age >= holddown.add_holddown && valid_before > 0) {
                KeyState::Valid
            } else {
                KeyState::AddPending
            }
        }
        (KeyState::Start, _) => KeyState::Removed,
        (KeyState::AddPending, Sighting::Present) => {
            if vouched_by_ds() || age >= holddown.add_holddown {
                KeyState::Valid
            } else {
                KeyState::AddPending
            }
        }
        (KeyState::AddPending, _) => KeyState::Removed,
        (KeyState::Valid, Sighting::Present) => KeyState::Valid,
        (KeyState::Valid | KeyState::Missing, Sighting::Revoked(_)) => KeyState::Revoked,
        (KeyState::Valid, Sighting::Absent) => KeyState::Missing,
        (KeyState::Missing, Sighting::Present) => KeyState::Valid,
        (KeyState::Missing, Sighting::Absent) => {
            if age >= holddown.remove_holddown {
                KeyState::Removed
            } else {
                KeyState::Missing
            }
        }
        (KeyState::Revoked, _) => {
            if age >= holddown.revoke_age {
                KeyState::Removed
            } else {
                KeyState::Revoked
            }
        }
        (KeyState::Removed, _) => KeyState::Removed,
    }
}

fn record(zone: &Name, key: &mut KeyEntry, to: KeyState, now: u64, report: &mut StateTableReport) {
    let transition = Transition {
        key_tag: key.key_tag(),
        from: key.state,
        to,
    };
    info!(
        "Trust anchor {} key {}: {} -> {}",
        zone, transition.key_tag, transition.from, transition.to
    );
    key.set_state(to, now);
    report.transitions.push(transition);
}
