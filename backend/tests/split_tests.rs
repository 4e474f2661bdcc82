//! Lot split tests
//!
//! Exercises the split planner the server applies inside its transaction:
//! - Bird and cost basis conservation
//! - Cost conservation for embedded costs and ledgered expenses
//! - Fragments are never split a second time
//! - Chained splits attribute per placed bird

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::LotStatus;
use shared::split::{plan_split, ExpenseShareInput, SplitPlan, SplitRequest, SplitSource};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

fn source(current: i32, basis: i32, transport: Option<Decimal>) -> SplitSource {
    SplitSource {
        id: Uuid::new_v4(),
        code: "LC-2025-0001".to_string(),
        name: Some("House A".to_string()),
        status: LotStatus::Active,
        current_quantity: current,
        cost_basis_quantity: basis,
        chick_price_per_unit: Some(dec("500")),
        transport_cost: transport,
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

fn expense(amount: Decimal) -> ExpenseShareInput {
    ExpenseShareInput {
        id: Uuid::new_v4(),
        amount,
        quantity: None,
        original_expense_id: None,
    }
}

/// The source as the server leaves it after applying `plan`
fn after_split(before: &SplitSource, plan: &SplitPlan) -> SplitSource {
    SplitSource {
        current_quantity: plan.source_remaining_quantity,
        cost_basis_quantity: plan.source_remaining_cost_basis,
        transport_cost: plan.transport_cost.map(|c| c.retained),
        other_initial_costs: plan.other_initial_costs.map(|c| c.retained),
        ..before.clone()
    }
}

// ============================================================================
// Worked example
// ============================================================================

#[test]
fn test_worked_example() {
    let lot = source(1000, 1000, Some(dec("50000")));
    let feed = expense(dec("100000"));
    let plan = plan_split(&lot, &request(400), &[feed.clone()]).unwrap();

    assert_eq!(plan.child_quantity, 400);
    assert_eq!(plan.source_remaining_quantity, 600);

    let transport = plan.transport_cost.unwrap();
    assert_eq!(transport.retained, dec("30000"));
    assert_eq!(transport.transferred, dec("20000"));

    assert_eq!(plan.expense_transfers.len(), 1);
    let transfer = &plan.expense_transfers[0];
    assert_eq!(transfer.source_expense_id, feed.id);
    assert_eq!(transfer.amount.transferred, dec("40000"));
    assert_eq!(transfer.amount.retained, dec("60000"));

    // Splitting off every remaining bird is refused
    let remaining = after_split(&lot, &plan);
    assert!(plan_split(&remaining, &request(600), &[]).is_err());
}

#[test]
fn test_chained_split_uses_cost_basis() {
    let lot = source(1000, 1000, Some(dec("50000")));
    let first = plan_split(&lot, &request(400), &[]).unwrap();
    let remaining = after_split(&lot, &first);
    assert_eq!(remaining.cost_basis_quantity, 600);

    let second = plan_split(&remaining, &request(300), &[]).unwrap();
    assert_eq!(second.transport_cost.unwrap().transferred, dec("15000"));
    assert_eq!(second.transport_cost.unwrap().retained, dec("15000"));
    assert_eq!(second.source_remaining_cost_basis, 300);
}

#[test]
fn test_mortality_does_not_reweight_costs() {
    // 200 birds died after placement; the cost basis still holds 1000
    let lot = source(800, 1000, Some(dec("50000")));
    let plan = plan_split(&lot, &request(400), &[]).unwrap();
    assert_eq!(plan.split_ratio, dec("0.5"));
    assert_eq!(plan.cost_ratio, dec("0.4"));
    assert_eq!(plan.transport_cost.unwrap().transferred, dec("20000"));
}

#[test]
fn test_completed_lot_can_be_split() {
    let mut lot = source(1000, 1000, None);
    lot.status = LotStatus::Completed;
    assert!(plan_split(&lot, &request(100), &[]).is_ok());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_quantity_conservation(
        current in 2i32..200_000,
        deaths in 0i32..5_000,
        pick in 0.0f64..1.0,
    ) {
        let quantity = 1 + ((current - 1) as f64 * pick) as i32;
        prop_assume!(quantity < current);
        let basis = current + deaths;

        let plan = plan_split(&source(current, basis, None), &request(quantity), &[]).unwrap();
        prop_assert_eq!(plan.child_quantity + plan.source_remaining_quantity, current);
        prop_assert_eq!(plan.source_remaining_cost_basis, basis - quantity);
        prop_assert!(plan.split_ratio > Decimal::ZERO && plan.split_ratio <= Decimal::ONE);
    }

    #[test]
    fn prop_cost_conservation(
        current in 2i32..100_000,
        quantity_seed in 1i32..100_000,
        transport in 0i64..1_000_000_000,
        amounts in prop::collection::vec(0i64..10_000_000_000, 0..8),
    ) {
        let quantity = 1 + quantity_seed % (current - 1);
        let lot = source(current, current, Some(cents(transport)));
        let expenses: Vec<_> = amounts.iter().map(|a| expense(cents(*a))).collect();

        let plan = plan_split(&lot, &request(quantity), &expenses).unwrap();

        let share = plan.transport_cost.unwrap();
        prop_assert_eq!(share.transferred + share.retained, cents(transport));
        prop_assert!(share.transferred >= Decimal::ZERO && share.retained >= Decimal::ZERO);

        let mut moved = Decimal::ZERO;
        for transfer in &plan.expense_transfers {
            let original = expenses.iter().find(|e| e.id == transfer.source_expense_id).unwrap();
            prop_assert_eq!(transfer.amount.transferred + transfer.amount.retained, original.amount);
            prop_assert!(transfer.amount.transferred > Decimal::ZERO);
            moved += transfer.amount.transferred;
        }
        prop_assert_eq!(moved, plan.expenses_transferred);
    }

    #[test]
    fn prop_fragments_never_resplit(
        originals in 0usize..5,
        fragments in 1usize..5,
    ) {
        let mut expenses: Vec<_> = (0..originals).map(|_| expense(dec("1000"))).collect();
        for _ in 0..fragments {
            expenses.push(ExpenseShareInput {
                original_expense_id: Some(Uuid::new_v4()),
                ..expense(dec("1000"))
            });
        }

        let plan = plan_split(&source(1000, 1000, None), &request(500), &expenses).unwrap();
        prop_assert_eq!(plan.expense_transfers.len(), originals);
        for transfer in &plan.expense_transfers {
            let input = expenses.iter().find(|e| e.id == transfer.source_expense_id).unwrap();
            prop_assert!(input.original_expense_id.is_none());
        }
    }

    #[test]
    fn prop_whole_lot_split_is_refused(current in 1i32..100_000, extra in 0i32..100) {
        let lot = source(current, current, None);
        prop_assert!(plan_split(&lot, &request(current + extra), &[]).is_err());
    }
}
