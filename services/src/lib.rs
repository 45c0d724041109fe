//! The attendance engine: session lifecycle, record ledger, reconciliation,
//! statistics and live change notification for group attendance.

pub mod actor;
pub mod error;
pub mod group_settings;
pub mod notifier;
pub mod reconciliation;
pub mod record_ledger;
pub mod role_gate;
pub mod session_manager;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;

pub use actor::Actor;
pub use error::{AppError, AppResult};
