//! CRM side of the pipeline: lead lookup by phone, file upload and
//! attachment.

mod api;
mod client;
mod correlator;
mod matching;
mod models;

#[cfg(test)]
pub(crate) mod mock;

pub use api::CrmApi;
pub use client::CrmClient;
pub use correlator::{BatchOutcome, EntityCorrelator};
pub use matching::{MatchStrategy, MatchStrategyKind};
pub use models::{Lead, PhoneValue};
