//! Recurrence Expander: fans one bill template out into dated siblings.

pub mod expander;
pub mod frequency;

pub use expander::{plan, MAX_RECURRENCES};
pub use frequency::{advance, Frequency, UnknownFrequency};
