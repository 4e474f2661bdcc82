//! WebAssembly module for the Poultry Lot Management Platform
//!
//! Lets the client preview what the server will compute:
//! - Split previews with cost attribution
//! - Expected laying rate for a flock's age
//! - Daily entry checks before submission
//! - Expense category normalization

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::cost;
use shared::laying_curve::{self, CurvePosition, ExpectedLayingRate, LayingPhase};
use shared::split::{plan_split, ExpenseShareInput, SplitPlan, SplitRequest, SplitSource};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

fn to_js(message: String) -> JsValue {
    JsValue::from_str(&message)
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

/// Preview a split of a lot; takes the source, request and candidate
/// expenses as JSON and returns the plan as JSON
#[wasm_bindgen]
pub fn preview_split(source_json: &str, request_json: &str, expenses_json: &str) -> Result<String, JsValue> {
    split_preview(source_json, request_json, expenses_json).map_err(to_js)
}

fn split_preview(source_json: &str, request_json: &str, expenses_json: &str) -> Result<String, String> {
    let source: SplitSource =
        serde_json::from_str(source_json).map_err(|e| format!("Invalid source JSON: {}", e))?;
    let request: SplitRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Invalid request JSON: {}", e))?;
    let expenses: Vec<ExpenseShareInput> = if expenses_json.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(expenses_json).map_err(|e| format!("Invalid expenses JSON: {}", e))?
    };

    let plan: SplitPlan = plan_split(&source, &request, &expenses).map_err(|e| e.to_string())?;
    serde_json::to_string(&plan).map_err(|e| e.to_string())
}

/// Share of `amount` carried by `quantity` of `cost_basis_quantity` birds,
/// as `{"transferred", "retained"}` JSON
#[wasm_bindgen]
pub fn attribute_cost(amount: &str, quantity: i32, cost_basis_quantity: i32) -> Result<String, JsValue> {
    cost_attribution(amount, quantity, cost_basis_quantity).map_err(to_js)
}

fn cost_attribution(amount: &str, quantity: i32, cost_basis_quantity: i32) -> Result<String, String> {
    let amount = parse_decimal("amount", amount)?;
    let ratio = cost::ratio(i64::from(quantity), i64::from(cost_basis_quantity))
        .map_err(|e| e.to_string())?;
    let share = cost::attribute(amount, ratio).map_err(|e| e.to_string())?;
    serde_json::to_string(&share).map_err(|e| e.to_string())
}

#[derive(Serialize)]
struct LayingOutlook {
    age_weeks: i64,
    phase: LayingPhase,
    expected: ExpectedLayingRate,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<CurvePosition>,
}

/// Expected laying band for a flock aged `age_weeks`; pass an observed rate
/// to place it against the band
#[wasm_bindgen]
pub fn expected_laying_rate(age_weeks: u32, observed_rate: Option<String>) -> Result<String, JsValue> {
    laying_outlook(i64::from(age_weeks), observed_rate.as_deref()).map_err(to_js)
}

fn laying_outlook(age_weeks: i64, observed_rate: Option<&str>) -> Result<String, String> {
    let expected = laying_curve::expected_rate(age_weeks);
    let position = observed_rate
        .map(|rate| parse_decimal("observed rate", rate))
        .transpose()?
        .map(|rate| laying_curve::compare(rate, &expected));
    let outlook = LayingOutlook {
        age_weeks,
        phase: laying_curve::phase(age_weeks),
        expected,
        position,
    };
    serde_json::to_string(&outlook).map_err(|e| e.to_string())
}

/// Laying rate of one day's collection, as a percentage string
#[wasm_bindgen]
pub fn calculate_laying_rate(total_eggs: i32, hen_count: i32) -> Option<String> {
    laying_rate(total_eggs, hen_count).map(|rate| rate.to_string())
}

/// Check a daily entry's mortality against the birds present
#[wasm_bindgen]
pub fn validate_daily_mortality(count: i32, current_quantity: i32) -> Result<(), JsValue> {
    shared::validate_mortality(count, current_quantity).map_err(JsValue::from_str)
}

/// Canonical name of an expense category, or `None` if unknown
#[wasm_bindgen]
pub fn normalize_expense_category(value: &str) -> Option<String> {
    ExpenseCategory::parse(value).map(|c| c.as_str().to_string())
}

/// Lot code for a type and sequence, e.g. `LC-2025-0007`
#[wasm_bindgen]
pub fn format_lot_code(lot_type: &str, year: i32, sequence: i32) -> Result<String, JsValue> {
    let lot_type = LotType::parse(lot_type)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown lot type '{}'", lot_type)))?;
    Ok(generate_lot_code(lot_type, year, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(value: &serde_json::Value) -> Decimal {
        Decimal::from_str(value.as_str().unwrap()).unwrap()
    }

    const SOURCE: &str = r#"{
        "id": "6f1c1d1e-58a4-4a7e-9a63-0d1f1b8e2c11",
        "code": "LC-2025-0001",
        "name": "House A",
        "status": "active",
        "current_quantity": 1000,
        "cost_basis_quantity": 1000,
        "chick_price_per_unit": "500",
        "transport_cost": "50000",
        "other_initial_costs": null
    }"#;

    const REQUEST: &str = r#"{
        "quantity": 400,
        "target_building_id": "0b7e9a41-3f0c-4a55-8d8a-5e2f3a1b9c77"
    }"#;

    #[test]
    fn test_split_preview_moves_costs() {
        let plan: serde_json::Value =
            serde_json::from_str(&split_preview(SOURCE, REQUEST, "").unwrap()).unwrap();
        assert_eq!(plan["source_remaining_quantity"], 600);
        assert_eq!(amount(&plan["transport_cost"]["transferred"]), Decimal::from(20000));
        assert_eq!(amount(&plan["transport_cost"]["retained"]), Decimal::from(30000));
    }

    #[test]
    fn test_split_preview_rejects_whole_lot() {
        let request = REQUEST.replace("400", "1000");
        assert!(split_preview(SOURCE, &request, "[]").is_err());
    }

    #[test]
    fn test_cost_attribution() {
        let share: serde_json::Value =
            serde_json::from_str(&cost_attribution("100000", 400, 1000).unwrap()).unwrap();
        assert_eq!(amount(&share["transferred"]), Decimal::from(40000));
        assert_eq!(amount(&share["retained"]), Decimal::from(60000));
        assert!(cost_attribution("abc", 1, 2).is_err());
    }

    #[test]
    fn test_laying_outlook_json() {
        let outlook: serde_json::Value =
            serde_json::from_str(&laying_outlook(10, None).unwrap()).unwrap();
        assert_eq!(outlook["age_weeks"], 10);
        assert!(outlook.get("position").is_none());
    }

    #[test]
    fn test_normalize_expense_category() {
        assert_eq!(normalize_expense_category("Medicine").as_deref(), Some("veterinary"));
        assert_eq!(normalize_expense_category("fuel"), None);
    }
}
