//! HTTP handlers for the Poultry Lot Management Platform

mod finance;
mod health;
mod health_records;
mod lot;
mod records;

pub use finance::*;
pub use health::*;
pub use health_records::*;
pub use lot::*;
pub use records::*;
