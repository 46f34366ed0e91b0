//! Bill Lifecycle Engine: per-bill normalization, status derivation and
//! tenant-level aggregates.

pub mod stats;
pub mod status;

pub use stats::BillStatistics;
pub use status::{
    apply_payment, cancel, derive_status, normalize_and_derive, normalize_text, DerivationRules,
    Effect, PaymentRules, Transition,
};
