//! Score fusion, boost evaluation, and deterministic ordering.

mod rank;

pub use rank::{FusionInput, rank};
