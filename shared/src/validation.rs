//! Validation utilities for the Poultry Lot Management Platform

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{EggCounts, LotStatus};

// ============================================================================
// Lot Validations
// ============================================================================

/// Validate the number of birds placed in a new lot
pub fn validate_initial_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Initial quantity must be greater than zero");
    }
    Ok(())
}

/// Validate age of the birds at placement, in days
pub fn validate_age_at_placement(age_days: i32) -> Result<(), &'static str> {
    if !(0..=700).contains(&age_days) {
        return Err("Age at placement must be between 0 and 700 days");
    }
    Ok(())
}

/// Validate that an expected end date does not precede placement
pub fn validate_lot_dates(
    placement_date: NaiveDate,
    expected_end_date: Option<NaiveDate>,
) -> Result<(), &'static str> {
    match expected_end_date {
        Some(end) if end < placement_date => Err("Expected end date cannot precede placement"),
        _ => Ok(()),
    }
}

/// Validate a status change requested through an update
pub fn validate_status_change(from: LotStatus, to: LotStatus) -> Result<(), &'static str> {
    if to == LotStatus::Deleted {
        return Err("Lots are deleted through the delete operation");
    }
    if from == LotStatus::Deleted {
        return Err("Deleted lots cannot be changed");
    }
    Ok(())
}

/// Validate a lot-level target given as a percentage
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

// ============================================================================
// Money Validations
// ============================================================================

/// Validate a monetary amount (expense amount, embedded lot cost, price)
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount.scale() > 2 && amount != amount.round_dp(2) {
        return Err("Amount cannot have more than 2 decimal places");
    }
    Ok(())
}

/// Validate a payment against the balance still owed
pub fn validate_payment(amount: Decimal, outstanding: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Payment must be greater than zero");
    }
    if amount > outstanding {
        return Err("Payment exceeds the outstanding balance");
    }
    Ok(())
}

// ============================================================================
// Daily Entry Validations
// ============================================================================

/// Validate a mortality count against the birds present
pub fn validate_mortality(count: i32, current_quantity: i32) -> Result<(), &'static str> {
    if count <= 0 {
        return Err("Mortality count must be greater than zero");
    }
    if count > current_quantity {
        return Err("Mortality cannot exceed the current number of birds");
    }
    Ok(())
}

/// Validate birds removed by a sale against the birds present
pub fn validate_bird_removal(quantity: i32, current_quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    if quantity > current_quantity {
        return Err("Cannot sell more birds than the lot holds");
    }
    Ok(())
}

pub fn validate_egg_counts(counts: &EggCounts) -> Result<(), &'static str> {
    let all = [
        counts.normal,
        counts.cracked,
        counts.dirty,
        counts.small,
        counts.double_yolk,
        counts.soft_shell,
    ];
    if all.iter().any(|c| *c < 0) {
        return Err("Egg counts cannot be negative");
    }
    Ok(())
}

pub fn validate_weight(average_weight_g: Decimal) -> Result<(), &'static str> {
    if average_weight_g <= Decimal::ZERO {
        return Err("Average weight must be greater than zero");
    }
    Ok(())
}

/// Validate a feed or water quantity
pub fn validate_consumption(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Consumption must be greater than zero");
    }
    Ok(())
}

/// Entries cannot be recorded for the future or before placement
pub fn validate_entry_date(
    date: NaiveDate,
    placement_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), &'static str> {
    if date > today {
        return Err("Entry date cannot be in the future");
    }
    if date < placement_date {
        return Err("Entry date cannot precede lot placement");
    }
    Ok(())
}

// ============================================================================
// Health Validations
// ============================================================================

/// Validate a vaccination window given in bird age days
pub fn validate_vaccination_window(day_from: i32, day_to: Option<i32>) -> Result<(), &'static str> {
    if day_from < 0 {
        return Err("Vaccination day cannot be negative");
    }
    if day_to.is_some_and(|to| to < day_from) {
        return Err("Vaccination window cannot end before it starts");
    }
    Ok(())
}

/// Validate a withdrawal period in days
pub fn validate_withdrawal_days(days: i32) -> Result<(), &'static str> {
    if !(0..=365).contains(&days) {
        return Err("Withdrawal period must be between 0 and 365 days");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    // ========================================================================
    // Lot Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_initial_quantity() {
        assert!(validate_initial_quantity(1).is_ok());
        assert!(validate_initial_quantity(0).is_err());
        assert!(validate_initial_quantity(-5).is_err());
    }

    #[test]
    fn test_validate_lot_dates() {
        assert!(validate_lot_dates(date(1, 1), Some(date(2, 15))).is_ok());
        assert!(validate_lot_dates(date(1, 1), None).is_ok());
        assert!(validate_lot_dates(date(2, 1), Some(date(1, 15))).is_err());
    }

    #[test]
    fn test_status_change_never_deletes() {
        assert!(validate_status_change(LotStatus::Active, LotStatus::Suspended).is_ok());
        assert!(validate_status_change(LotStatus::Active, LotStatus::Deleted).is_err());
        assert!(validate_status_change(LotStatus::Deleted, LotStatus::Active).is_err());
    }

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage(Decimal::from(92)).is_ok());
        assert!(validate_percentage(Decimal::from(101)).is_err());
    }

    // ========================================================================
    // Money Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::from_str("1500.50").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("1500.500").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("1500.505").unwrap()).is_err());
        assert!(validate_amount(Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_validate_payment() {
        assert!(validate_payment(Decimal::from(100), Decimal::from(100)).is_ok());
        assert!(validate_payment(Decimal::from(101), Decimal::from(100)).is_err());
        assert!(validate_payment(Decimal::ZERO, Decimal::from(100)).is_err());
    }

    // ========================================================================
    // Daily Entry Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_mortality() {
        assert!(validate_mortality(5, 100).is_ok());
        assert!(validate_mortality(100, 100).is_ok());
        assert!(validate_mortality(101, 100).is_err());
        assert!(validate_mortality(0, 100).is_err());
    }

    #[test]
    fn test_validate_bird_removal() {
        assert!(validate_bird_removal(50, 50).is_ok());
        assert!(validate_bird_removal(51, 50).is_err());
    }

    #[test]
    fn test_validate_egg_counts() {
        let mut counts = EggCounts {
            normal: 900,
            ..EggCounts::default()
        };
        assert!(validate_egg_counts(&counts).is_ok());
        counts.cracked = -1;
        assert!(validate_egg_counts(&counts).is_err());
    }

    #[test]
    fn test_validate_entry_date() {
        let placed = date(1, 10);
        let today = date(3, 1);
        assert!(validate_entry_date(date(2, 1), placed, today).is_ok());
        assert!(validate_entry_date(date(3, 2), placed, today).is_err());
        assert!(validate_entry_date(date(1, 9), placed, today).is_err());
    }

    // ========================================================================
    // Health Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_vaccination_window() {
        assert!(validate_vaccination_window(14, Some(18)).is_ok());
        assert!(validate_vaccination_window(1, None).is_ok());
        assert!(validate_vaccination_window(-1, None).is_err());
        assert!(validate_vaccination_window(18, Some(14)).is_err());
    }

    #[test]
    fn test_validate_withdrawal_days() {
        assert!(validate_withdrawal_days(0).is_ok());
        assert!(validate_withdrawal_days(28).is_ok());
        assert!(validate_withdrawal_days(-3).is_err());
    }
}
