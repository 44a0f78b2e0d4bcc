//! RFC 5011 automated trust anchor maintenance.
//!
//! Trust points are loaded from anchor files into a [`TrustAnchorStore`],
//! probed on a schedule through a [`DnskeyQuerier`], and their keys moved
//! through the RFC 5011 states after each verified probe. State is written
//! back to the anchor files.

pub mod comments;
pub mod file;
pub mod point;
pub mod probe;
pub mod schedule;
pub mod state;
pub mod statetable;
pub mod store;
pub mod verify;

pub use file::LoadedAnchor;
pub use point::{ProbeGuard, TrustPoint, TrustPointData, TrustPointStatus};
pub use probe::{DnskeyQuerier, ProbeDriver, ProbeOutcome, unix_now};
pub use schedule::{ProbePolicy, ProbeSchedule};
pub use state::{KeyEntry, KeyState};
pub use statetable::{HoldDown, StateTableReport, Transition, run_statetable};
pub use store::TrustAnchorStore;
pub use verify::{VerifiedBy, verify_dnskey};
