//! Sales and expense ledger models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical expense category
///
/// Historical data contains mixed-case spellings and a few legacy names;
/// everything is normalized through [`ExpenseCategory::parse`] before it is
/// stored or compared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Feed,
    Chicks,
    Veterinary,
    Labor,
    Energy,
    Water,
    Transport,
    Packaging,
    Equipment,
    Maintenance,
    Rent,
    Insurance,
    Taxes,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 14] = [
        ExpenseCategory::Feed,
        ExpenseCategory::Chicks,
        ExpenseCategory::Veterinary,
        ExpenseCategory::Labor,
        ExpenseCategory::Energy,
        ExpenseCategory::Water,
        ExpenseCategory::Transport,
        ExpenseCategory::Packaging,
        ExpenseCategory::Equipment,
        ExpenseCategory::Maintenance,
        ExpenseCategory::Rent,
        ExpenseCategory::Insurance,
        ExpenseCategory::Taxes,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Feed => "feed",
            ExpenseCategory::Chicks => "chicks",
            ExpenseCategory::Veterinary => "veterinary",
            ExpenseCategory::Labor => "labor",
            ExpenseCategory::Energy => "energy",
            ExpenseCategory::Water => "water",
            ExpenseCategory::Transport => "transport",
            ExpenseCategory::Packaging => "packaging",
            ExpenseCategory::Equipment => "equipment",
            ExpenseCategory::Maintenance => "maintenance",
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Insurance => "insurance",
            ExpenseCategory::Taxes => "taxes",
            ExpenseCategory::Other => "other",
        }
    }

    /// Parse a category, ignoring case and mapping legacy names
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        let category = match normalized.as_str() {
            "medicine" => ExpenseCategory::Veterinary,
            "salary" => ExpenseCategory::Labor,
            "utilities" => ExpenseCategory::Energy,
            other => *Self::ALL.iter().find(|c| c.as_str() == other)?,
        };
        Some(category)
    }

    /// Read a stored value; anything unrecognized lands in `Other`
    pub fn from_stored(value: &str) -> Self {
        Self::parse(value).unwrap_or(ExpenseCategory::Other)
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledgered expense, optionally tied to a lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub lot_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
    pub supplier_name: Option<String>,
    pub is_paid: bool,
    pub notes: Option<String>,
    /// Lot this fragment was carved out of during a split
    pub from_split_lot_id: Option<Uuid>,
    /// Expense this fragment was carved out of; fragments are never split again
    pub original_expense_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Canonical sale type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    EggsTray,
    EggsCarton,
    LiveBirds,
    DressedBirds,
    CulledHens,
    Manure,
    Other,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::EggsTray => "eggs_tray",
            SaleType::EggsCarton => "eggs_carton",
            SaleType::LiveBirds => "live_birds",
            SaleType::DressedBirds => "dressed_birds",
            SaleType::CulledHens => "culled_hens",
            SaleType::Manure => "manure",
            SaleType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "eggs_tray" => Some(SaleType::EggsTray),
            "eggs_carton" => Some(SaleType::EggsCarton),
            "live_birds" => Some(SaleType::LiveBirds),
            "dressed_birds" => Some(SaleType::DressedBirds),
            "culled_hens" => Some(SaleType::CulledHens),
            "manure" => Some(SaleType::Manure),
            "other" => Some(SaleType::Other),
            _ => None,
        }
    }

    pub fn from_stored(value: &str) -> Self {
        Self::parse(value).unwrap_or(SaleType::Other)
    }

    /// Whether selling this type takes birds out of the lot
    pub fn removes_birds(&self) -> bool {
        matches!(
            self,
            SaleType::LiveBirds | SaleType::DressedBirds | SaleType::CulledHens
        )
    }
}

/// Payment state of a sale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Partial,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Overdue => "overdue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "paid" => Some(PaymentStatus::Paid),
            "pending" => Some(PaymentStatus::Pending),
            "partial" => Some(PaymentStatus::Partial),
            "overdue" => Some(PaymentStatus::Overdue),
            _ => None,
        }
    }

    pub fn from_stored(value: &str) -> Self {
        Self::parse(value).unwrap_or(PaymentStatus::Pending)
    }

    /// Status implied by the amount paid so far
    pub fn derive(total_amount: Decimal, amount_paid: Decimal) -> Self {
        if amount_paid >= total_amount {
            PaymentStatus::Paid
        } else if amount_paid > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    /// Still owed money by the client
    pub fn is_receivable(&self) -> bool {
        !matches!(self, PaymentStatus::Paid)
    }
}

/// A sale, optionally tied to a lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub lot_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub date: NaiveDate,
    pub sale_type: SaleType,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub client_name: Option<String>,
    pub payment_status: PaymentStatus,
    pub amount_paid: Decimal,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.amount_paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_legacy_aliases() {
        assert_eq!(ExpenseCategory::parse("medicine"), Some(ExpenseCategory::Veterinary));
        assert_eq!(ExpenseCategory::parse("Salary"), Some(ExpenseCategory::Labor));
        assert_eq!(ExpenseCategory::parse("UTILITIES"), Some(ExpenseCategory::Energy));
    }

    #[test]
    fn test_category_case_insensitive() {
        assert_eq!(ExpenseCategory::parse("Chicks"), Some(ExpenseCategory::Chicks));
        assert_eq!(ExpenseCategory::parse(" TRANSPORT"), Some(ExpenseCategory::Transport));
        assert_eq!(ExpenseCategory::parse("fuel"), None);
        assert_eq!(ExpenseCategory::from_stored("fuel"), ExpenseCategory::Other);
    }

    #[test]
    fn test_category_round_trips_canonical_name() {
        for category in ExpenseCategory::ALL {
            assert_eq!(ExpenseCategory::parse(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_payment_status_derive() {
        let total = Decimal::from(1000);
        assert_eq!(PaymentStatus::derive(total, Decimal::ZERO), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::derive(total, Decimal::from(400)), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::derive(total, total), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::derive(total, Decimal::from(1200)), PaymentStatus::Paid);
    }

    #[test]
    fn test_bird_sales_remove_birds() {
        assert!(SaleType::LiveBirds.removes_birds());
        assert!(SaleType::CulledHens.removes_birds());
        assert!(!SaleType::EggsTray.removes_birds());
        assert!(!SaleType::Manure.removes_birds());
    }
}
