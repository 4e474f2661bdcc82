//! Shared types and the lot accounting engine for the Poultry Lot Management Platform
//!
//! This crate contains the domain models shared between the backend and the
//! browser (via WASM), plus the pure computations behind lot splits, lot
//! statistics and financial rollups. Nothing in here performs I/O.

pub mod cost;
pub mod error;
pub mod laying_curve;
pub mod models;
pub mod permissions;
pub mod rollup;
pub mod split;
pub mod stats;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
