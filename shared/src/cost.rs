//! Proportional cost attribution
//!
//! Rounding is applied once, to the transferred share; the retained share is
//! whatever is left, so the two always add back up to the original amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::types::round_money;

/// An amount divided between the lot that keeps it and the lot that receives it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostShare {
    pub transferred: Decimal,
    pub retained: Decimal,
}

/// Split `amount` by `ratio`, which must lie strictly between 0 and 1
pub fn attribute(amount: Decimal, ratio: Decimal) -> DomainResult<CostShare> {
    if ratio <= Decimal::ZERO || ratio >= Decimal::ONE {
        return Err(DomainError::validation(
            "ratio",
            "Ratio must be strictly between 0 and 1",
        ));
    }
    if amount < Decimal::ZERO {
        return Err(DomainError::validation("amount", "Amount cannot be negative"));
    }

    let transferred = round_money(amount * ratio);
    Ok(CostShare {
        transferred,
        retained: amount - transferred,
    })
}

/// Like [`attribute`] but an absent amount stays absent on both sides
pub fn attribute_optional(amount: Option<Decimal>, ratio: Decimal) -> DomainResult<Option<CostShare>> {
    amount.map(|a| attribute(a, ratio)).transpose()
}

/// Exact ratio of `part` to `whole`
pub fn ratio(part: i64, whole: i64) -> DomainResult<Decimal> {
    if whole == 0 {
        return Err(DomainError::validation("quantity", "Cannot divide by zero birds"));
    }
    Ok(Decimal::from(part) / Decimal::from(whole))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_attribute_exact_share() {
        let share = attribute(dec("50000"), dec("0.4")).unwrap();
        assert_eq!(share.transferred, dec("20000"));
        assert_eq!(share.retained, dec("30000"));
    }

    #[test]
    fn test_attribute_rounds_transferred_only() {
        let third = ratio(1, 3).unwrap();
        let share = attribute(dec("100.00"), third).unwrap();
        assert_eq!(share.transferred, dec("33.33"));
        assert_eq!(share.retained, dec("66.67"));
        assert_eq!(share.transferred + share.retained, dec("100.00"));
    }

    #[test]
    fn test_attribute_rejects_ratio_bounds() {
        assert!(attribute(dec("10"), Decimal::ZERO).is_err());
        assert!(attribute(dec("10"), Decimal::ONE).is_err());
        assert!(attribute(dec("10"), dec("1.5")).is_err());
        assert!(attribute(dec("10"), dec("-0.1")).is_err());
    }

    #[test]
    fn test_attribute_rejects_negative_amount() {
        let err = attribute(dec("-1"), dec("0.5")).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "amount"));
    }

    #[test]
    fn test_attribute_optional_keeps_none() {
        assert_eq!(attribute_optional(None, dec("0.5")).unwrap(), None);
        let share = attribute_optional(Some(dec("0")), dec("0.5")).unwrap().unwrap();
        assert_eq!(share.transferred, Decimal::ZERO);
    }

    #[test]
    fn test_ratio_rejects_zero_whole() {
        assert!(ratio(5, 0).is_err());
        assert_eq!(ratio(400, 1000).unwrap(), dec("0.4"));
    }
}
