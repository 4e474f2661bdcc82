//! Domain models for the Poultry Lot Management Platform

mod finance;
mod health;
mod lot;
mod production;

pub use finance::*;
pub use health::*;
pub use lot::*;
pub use production::*;
