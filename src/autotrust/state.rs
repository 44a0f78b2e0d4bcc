use serde::Serialize;
use std::fmt;

use crate::dns::DNSResource;

/// RFC 5011 key states, with the numeric codes used in anchor files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum KeyState {
    Start = 0,
    AddPending = 1,
    Valid = 2,
    Missing = 3,
    Revoked = 4,
    Removed = 5,
}

impl KeyState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Start),
            1 => Some(Self::AddPending),
            2 => Some(Self::Valid),
            3 => Some(Self::Missing),
            4 => Some(Self::Revoked),
            5 => Some(Self::Removed),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Label written next to the code in anchor files
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::AddPending => "ADDPEND",
            Self::Valid => "VALID",
            Self::Missing => "MISSING",
            Self::Revoked => "REVOKED",
            Self::Removed => "REMOVED",
        }
    }

    /// Keys in these states take part in verification
    pub fn is_trusted(self) -> bool {
        matches!(self, Self::Valid | Self::Missing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AddPending => "add_pending",
            Self::Valid => "valid",
            Self::Missing => "missing",
            Self::Revoked => "revoked",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate key (DS or DNSKEY) of a trust point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub rr: DNSResource,
    pub state: KeyState,
    /// Verified probes seen while in AddPending
    pub pending_count: u8,
    /// Seconds since the epoch of the last state change
    pub last_change: u64,
}

impl KeyEntry {
    pub fn new(rr: DNSResource, state: KeyState, now: u64) -> Self {
        Self {
            rr,
            state,
            pending_count: 0,
            last_change: now,
        }
    }

    pub fn key_tag(&self) -> u16 {
        self.rr.key_tag()
    }

    pub fn is_dnskey(&self) -> bool {
        self.rr.as_dnskey().is_some()
    }

    /// Move to `state`, stamping the change time
    pub fn set_state(&mut self, state: KeyState, now: u64) {
        if self.state != state {
            self.state = state;
            self.last_change = now;
            if state != KeyState::AddPending {
                self.pending_count = 0;
            }
        }
    }

    /// Seconds spent in the current state
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_change)
    }
}
