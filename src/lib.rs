pub mod autotrust;
pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod metrics;

pub use autotrust::{TrustAnchorStore, TrustPoint};
pub use config::AutotrustConfig;
pub use error::{AutotrustError, ConfigError, Result};
