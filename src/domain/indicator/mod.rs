//! Technical indicators used by the signal generators.
//!
//! Series are returned as `Vec<Option<f64>>` aligned to the input; `None`
//! marks warmup bars where the indicator is undefined.

pub mod sma;

pub use sma::{calculate_sma, calculate_sma_with_gaps};
