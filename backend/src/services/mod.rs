//! Business logic services for the Poultry Lot Management Platform

pub mod access;
pub mod finance;
pub mod health;
pub mod lot;
pub mod records;
pub mod split;
pub mod stats;

pub use finance::FinanceService;
pub use health::HealthService;
pub use lot::LotService;
pub use records::RecordsService;
pub use split::SplitService;
pub use stats::StatsService;
