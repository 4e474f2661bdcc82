//! Lot split planning
//!
//! [`plan_split`] does all of the arithmetic of a split without touching
//! storage: bird counts, the two ratios, embedded cost shares and the
//! redistribution of ledgered expenses. The backend applies the plan inside
//! a single transaction.
//!
//! Two ratios are involved. The split ratio is birds moved over birds
//! present now and is only recorded on the new lot. The cost ratio is birds
//! moved over the cost basis quantity of the source, because per-bird prices
//! were fixed at placement and later splits must not re-weight them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cost::{attribute, attribute_optional, ratio, CostShare};
use crate::error::{DomainError, DomainResult};
use crate::models::{Lot, LotStatus};
use crate::types::SPLIT_RATIO_SCALE;

/// The part of a source lot a split needs to see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSource {
    pub id: Uuid,
    pub code: String,
    pub name: Option<String>,
    pub status: LotStatus,
    pub current_quantity: i32,
    pub cost_basis_quantity: i32,
    pub chick_price_per_unit: Option<Decimal>,
    pub transport_cost: Option<Decimal>,
    pub other_initial_costs: Option<Decimal>,
}

impl From<&Lot> for SplitSource {
    fn from(lot: &Lot) -> Self {
        SplitSource {
            id: lot.id,
            code: lot.code.clone(),
            name: lot.name.clone(),
            status: lot.status,
            current_quantity: lot.current_quantity,
            cost_basis_quantity: lot.cost_basis_quantity,
            chick_price_per_unit: lot.chick_price_per_unit,
            transport_cost: lot.transport_cost,
            other_initial_costs: lot.other_initial_costs,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Request to move part of a lot into a new lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRequest {
    pub quantity: i32,
    pub target_building_id: Uuid,
    pub new_lot_name: Option<String>,
    /// Carve proportional fragments out of the source's past expenses
    #[serde(default = "default_true")]
    pub distribute_expenses: bool,
    pub notes: Option<String>,
}

/// An expense on the source lot that may be redistributed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseShareInput {
    pub id: Uuid,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub original_expense_id: Option<Uuid>,
}

/// How one source expense is divided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseTransfer {
    pub source_expense_id: Uuid,
    pub amount: CostShare,
    pub quantity: Option<CostShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPlan {
    /// Birds moved over birds present, stored on the new lot
    pub split_ratio: Decimal,
    /// Birds moved over the source's cost basis
    pub cost_ratio: Decimal,
    pub child_quantity: i32,
    pub source_remaining_quantity: i32,
    pub source_remaining_cost_basis: i32,
    pub chick_price_per_unit: Option<Decimal>,
    pub transport_cost: Option<CostShare>,
    pub other_initial_costs: Option<CostShare>,
    pub expense_transfers: Vec<ExpenseTransfer>,
    pub expenses_transferred: Decimal,
    pub child_name: String,
    pub child_notes: String,
}

/// Plan a split of `request.quantity` birds out of `source`
pub fn plan_split(
    source: &SplitSource,
    request: &SplitRequest,
    expenses: &[ExpenseShareInput],
) -> DomainResult<SplitPlan> {
    if source.status == LotStatus::Deleted {
        return Err(DomainError::NotFound("Lot".to_string()));
    }
    if request.quantity <= 0 {
        return Err(DomainError::validation(
            "quantity",
            "Quantity to split must be positive",
        ));
    }
    if request.quantity >= source.current_quantity {
        return Err(DomainError::validation(
            "quantity",
            format!(
                "Cannot split {} birds from a lot with {}; at least one bird must remain",
                request.quantity, source.current_quantity
            ),
        ));
    }
    if request.quantity >= source.cost_basis_quantity {
        return Err(DomainError::validation(
            "quantity",
            "Quantity exceeds the birds the lot carries costs for",
        ));
    }

    let split_ratio = stored_split_ratio(ratio(
        request.quantity.into(),
        source.current_quantity.into(),
    )?);
    let cost_ratio = ratio(request.quantity.into(), source.cost_basis_quantity.into())?;

    let transport_cost = attribute_optional(source.transport_cost, cost_ratio)?;
    let other_initial_costs = attribute_optional(source.other_initial_costs, cost_ratio)?;

    let mut expense_transfers = Vec::new();
    if request.distribute_expenses {
        // Fragments of an earlier split are already attributed
        for expense in expenses.iter().filter(|e| e.original_expense_id.is_none()) {
            let amount = attribute(expense.amount, cost_ratio)?;
            if amount.transferred.is_zero() {
                continue;
            }
            let quantity = attribute_optional(expense.quantity, cost_ratio)?;
            expense_transfers.push(ExpenseTransfer {
                source_expense_id: expense.id,
                amount,
                quantity,
            });
        }
    }
    let expenses_transferred = expense_transfers
        .iter()
        .map(|t| t.amount.transferred)
        .sum();

    Ok(SplitPlan {
        split_ratio,
        cost_ratio,
        child_quantity: request.quantity,
        source_remaining_quantity: source.current_quantity - request.quantity,
        source_remaining_cost_basis: source.cost_basis_quantity - request.quantity,
        chick_price_per_unit: source.chick_price_per_unit,
        transport_cost,
        other_initial_costs,
        expense_transfers,
        expenses_transferred,
        child_name: default_child_name(source, request.new_lot_name.as_deref()),
        child_notes: child_notes(&source.code, request.notes.as_deref()),
    })
}

/// Split ratio at storage precision, never rounded down to zero
fn stored_split_ratio(exact: Decimal) -> Decimal {
    let floor = Decimal::new(1, SPLIT_RATIO_SCALE);
    exact.round_dp(SPLIT_RATIO_SCALE).max(floor)
}

pub fn default_child_name(source: &SplitSource, requested: Option<&str>) -> String {
    match requested.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("{} - Split", source.name.as_deref().unwrap_or(&source.code)),
    }
}

pub fn child_notes(source_code: &str, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("Split from lot {}. {}", source_code, notes),
        None => format!("Split from lot {}.", source_code),
    }
}

/// Append the split audit line to a lot's notes
pub fn split_audit_note(
    existing: Option<&str>,
    date: NaiveDate,
    quantity: i32,
    child_code: &str,
) -> String {
    let line = format!(
        "[{}] Split: {} birds transferred to lot {}",
        date.format("%Y-%m-%d"),
        quantity,
        child_code
    );
    match existing.filter(|n| !n.is_empty()) {
        Some(notes) => format!("{}\n{}", notes, line),
        None => line,
    }
}

/// Description of an expense fragment on the new lot
pub fn fragment_description(description: Option<&str>, category: &str, source_code: &str) -> String {
    format!(
        "{} (split from {})",
        description.unwrap_or(category),
        source_code
    )
}

/// Notes of an expense fragment on the new lot
pub fn fragment_notes(cost_ratio: Decimal, original_amount: Decimal) -> String {
    format!(
        "Proportional split ({}%) of original expense amount {}",
        (cost_ratio * Decimal::ONE_HUNDRED).round_dp(1),
        original_amount
    )
}

/// Result of an executed split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub original_lot_id: Uuid,
    pub original_lot_code: String,
    pub original_lot_remaining_quantity: i32,
    pub new_lot_id: Uuid,
    pub new_lot_code: String,
    pub new_lot_quantity: i32,
    pub split_ratio: Decimal,
    pub expenses_transferred: Decimal,
    pub message: String,
}

impl SplitOutcome {
    pub fn new(source: &SplitSource, plan: &SplitPlan, new_lot_id: Uuid, new_lot_code: String) -> Self {
        let message = format!(
            "Split {} birds from lot {} into new lot {}",
            plan.child_quantity, source.code, new_lot_code
        );
        SplitOutcome {
            original_lot_id: source.id,
            original_lot_code: source.code.clone(),
            original_lot_remaining_quantity: plan.source_remaining_quantity,
            new_lot_id,
            new_lot_code,
            new_lot_quantity: plan.child_quantity,
            split_ratio: plan.split_ratio,
            expenses_transferred: plan.expenses_transferred,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn source(current: i32, basis: i32) -> SplitSource {
        SplitSource {
            id: Uuid::new_v4(),
            code: "LC-2025-0001".to_string(),
            name: None,
            status: LotStatus::Active,
            current_quantity: current,
            cost_basis_quantity: basis,
            chick_price_per_unit: Some(dec("450")),
            transport_cost: Some(dec("50000")),
            other_initial_costs: None,
        }
    }

    fn request(quantity: i32) -> SplitRequest {
        SplitRequest {
            quantity,
            target_building_id: Uuid::new_v4(),
            new_lot_name: None,
            distribute_expenses: true,
            notes: None,
        }
    }

    #[test]
    fn test_plan_quantities_and_costs() {
        let plan = plan_split(&source(1000, 1000), &request(400), &[]).unwrap();
        assert_eq!(plan.child_quantity, 400);
        assert_eq!(plan.source_remaining_quantity, 600);
        assert_eq!(plan.source_remaining_cost_basis, 600);
        assert_eq!(plan.split_ratio, dec("0.4"));
        let transport = plan.transport_cost.unwrap();
        assert_eq!(transport.transferred, dec("20000"));
        assert_eq!(transport.retained, dec("30000"));
        assert_eq!(plan.other_initial_costs, None);
        assert_eq!(plan.chick_price_per_unit, Some(dec("450")));
    }

    #[test]
    fn test_split_ratio_uses_current_and_cost_ratio_uses_basis() {
        // 100 birds died since placement
        let plan = plan_split(&source(900, 1000), &request(300), &[]).unwrap();
        assert_eq!(plan.split_ratio, dec("0.3333"));
        assert_eq!(plan.cost_ratio, dec("0.3"));
        assert_eq!(plan.transport_cost.unwrap().transferred, dec("15000"));
    }

    #[test]
    fn test_plan_rejects_whole_lot() {
        assert!(plan_split(&source(600, 600), &request(600), &[]).is_err());
        assert!(plan_split(&source(600, 600), &request(700), &[]).is_err());
        assert!(plan_split(&source(600, 600), &request(0), &[]).is_err());
    }

    #[test]
    fn test_plan_rejects_deleted_source() {
        let mut src = source(1000, 1000);
        src.status = LotStatus::Deleted;
        assert_eq!(
            plan_split(&src, &request(10), &[]).unwrap_err(),
            DomainError::NotFound("Lot".to_string())
        );
    }

    #[test]
    fn test_fragments_are_not_split_again() {
        let original = ExpenseShareInput {
            id: Uuid::new_v4(),
            amount: dec("100000"),
            quantity: Some(dec("2000")),
            original_expense_id: None,
        };
        let fragment = ExpenseShareInput {
            id: Uuid::new_v4(),
            amount: dec("40000"),
            quantity: None,
            original_expense_id: Some(Uuid::new_v4()),
        };
        let plan = plan_split(&source(1000, 1000), &request(400), &[original.clone(), fragment]).unwrap();
        assert_eq!(plan.expense_transfers.len(), 1);
        let transfer = &plan.expense_transfers[0];
        assert_eq!(transfer.source_expense_id, original.id);
        assert_eq!(transfer.amount.transferred, dec("40000"));
        assert_eq!(transfer.amount.retained, dec("60000"));
        assert_eq!(transfer.quantity.unwrap().transferred, dec("800"));
        assert_eq!(plan.expenses_transferred, dec("40000"));
    }

    #[test]
    fn test_zero_share_creates_no_fragment() {
        let tiny = ExpenseShareInput {
            id: Uuid::new_v4(),
            amount: dec("0.01"),
            quantity: None,
            original_expense_id: None,
        };
        let plan = plan_split(&source(1000, 1000), &request(1), &[tiny]).unwrap();
        assert!(plan.expense_transfers.is_empty());
        assert_eq!(plan.expenses_transferred, Decimal::ZERO);
    }

    #[test]
    fn test_distribute_disabled() {
        let expense = ExpenseShareInput {
            id: Uuid::new_v4(),
            amount: dec("100"),
            quantity: None,
            original_expense_id: None,
        };
        let mut req = request(400);
        req.distribute_expenses = false;
        let plan = plan_split(&source(1000, 1000), &req, &[expense]).unwrap();
        assert!(plan.expense_transfers.is_empty());
    }

    #[test]
    fn test_split_ratio_floor() {
        let plan = plan_split(&source(100_000, 100_000), &request(1), &[]).unwrap();
        assert_eq!(plan.split_ratio, dec("0.0001"));
    }

    #[test]
    fn test_names_and_notes() {
        let src = source(1000, 1000);
        assert_eq!(default_child_name(&src, None), "LC-2025-0001 - Split");
        assert_eq!(default_child_name(&src, Some("House B")), "House B");
        assert_eq!(
            child_notes("LC-2025-0001", Some("Moved for space")),
            "Split from lot LC-2025-0001. Moved for space"
        );

        let date = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        assert_eq!(
            split_audit_note(Some("Healthy flock"), date, 400, "LC-2025-0002"),
            "Healthy flock\n[2025-04-02] Split: 400 birds transferred to lot LC-2025-0002"
        );
        assert_eq!(
            split_audit_note(None, date, 400, "LC-2025-0002"),
            "[2025-04-02] Split: 400 birds transferred to lot LC-2025-0002"
        );
    }

    #[test]
    fn test_request_defaults_distribute() {
        let json = format!(r#"{{"quantity": 10, "target_building_id": "{}"}}"#, Uuid::new_v4());
        let req: SplitRequest = serde_json::from_str(&json).unwrap();
        assert!(req.distribute_expenses);
    }
}
