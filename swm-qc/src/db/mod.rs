//! Storage access for the engine
//!
//! Schema creation lives in `swm_common::db`; this module holds the queries the
//! engine runs against it.

pub mod biological;
pub mod chemical;

pub use chemical::load_reference_values;
