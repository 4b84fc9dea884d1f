//! # Usage Accounting
//!
//! Token and cost accounting for provider calls.

pub mod ledger;
pub mod pricing;

pub use ledger::{UsageEntry, UsageLedger};
pub use pricing::{compute_cost, PricingTable};
