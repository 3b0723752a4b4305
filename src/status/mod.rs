//! Background status reconciliation.
//!
//! [`StatusCache`] owns the single shared [`StatusRecord`]; [`StatusPoller`]
//! refreshes it from a [`StatusSource`] on a fixed cadence while request
//! handlers read copies and write overrides.

mod cache;
mod content_id;
mod poller;
mod record;
mod source;
#[cfg(test)]
mod tests;

pub use cache::{PollOutcome, StatusCache};
pub use content_id::{resolve_id, CONTENT_IDS};
pub use poller::{Liveness, StatusPoller};
pub use record::{ErrorCounters, PowerState, StatusRecord, VolumeReading};
pub use source::StatusSource;
