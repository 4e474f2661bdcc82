//! Financial rollups
//!
//! Ledgered expenses and the costs embedded in lot records are merged here.
//! A lot's chick or transport cost is only counted as a virtual line when no
//! expense of that canonical category exists for the lot or any lot it was
//! split from, so the same money is never counted twice.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ExpenseCategory;
use crate::types::{round_money, round_rate, DateRange};

/// Costs embedded in one lot record, with ledger presence flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotCostBasis {
    pub lot_id: Uuid,
    pub chick_price_per_unit: Option<Decimal>,
    pub cost_basis_quantity: i32,
    pub transport_cost: Option<Decimal>,
    pub other_initial_costs: Option<Decimal>,
    /// The lot or one of its split ancestors has a `chicks` expense, at any date
    pub has_chicks_expense: bool,
    /// The lot or one of its split ancestors has a `transport` expense, at any date
    pub has_transport_expense: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCostLine {
    pub lot_id: Uuid,
    pub category: ExpenseCategory,
    pub amount: Decimal,
}

/// Virtual cost lines that survive double-counting suppression
pub fn virtual_cost_lines(lots: &[LotCostBasis]) -> Vec<VirtualCostLine> {
    let mut lines = Vec::new();
    for lot in lots {
        if !lot.has_chicks_expense {
            if let Some(price) = lot.chick_price_per_unit {
                let amount = round_money(price * Decimal::from(lot.cost_basis_quantity));
                push_line(&mut lines, lot.lot_id, ExpenseCategory::Chicks, amount);
            }
        }
        if !lot.has_transport_expense {
            if let Some(amount) = lot.transport_cost {
                push_line(&mut lines, lot.lot_id, ExpenseCategory::Transport, amount);
            }
        }
        if let Some(amount) = lot.other_initial_costs {
            push_line(&mut lines, lot.lot_id, ExpenseCategory::Other, amount);
        }
    }
    lines
}

fn push_line(lines: &mut Vec<VirtualCostLine>, lot_id: Uuid, category: ExpenseCategory, amount: Decimal) {
    if amount > Decimal::ZERO {
        lines.push(VirtualCostLine {
            lot_id,
            category,
            amount,
        });
    }
}

/// Merge ledger totals and virtual lines into one canonical breakdown
///
/// Ledger rows may arrive under historical spellings; they are folded onto
/// their canonical category here.
pub fn fold_breakdown(
    ledger: &[(String, Decimal)],
    virtual_lines: &[VirtualCostLine],
) -> BTreeMap<ExpenseCategory, Decimal> {
    let mut breakdown = BTreeMap::new();
    for (raw, amount) in ledger {
        *breakdown
            .entry(ExpenseCategory::from_stored(raw))
            .or_insert(Decimal::ZERO) += *amount;
    }
    for line in virtual_lines {
        *breakdown.entry(line.category).or_insert(Decimal::ZERO) += line.amount;
    }
    breakdown
}

/// Raw aggregates for one rollup window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollupInputs {
    pub total_sales: Decimal,
    /// Ledger expense totals grouped by stored category
    pub ledger_by_category: Vec<(String, Decimal)>,
    /// Lots placed within the window
    pub lot_costs: Vec<LotCostBasis>,
    pub pending_receivables: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_sales: Decimal,
    pub total_expenses: Decimal,
    pub ledger_expenses: Decimal,
    pub lot_costs: Decimal,
    pub pending_receivables: Decimal,
    pub margin: Decimal,
    pub margin_percent: Decimal,
    pub breakdown: BTreeMap<ExpenseCategory, Decimal>,
}

/// Fold one window's aggregates into a summary
pub fn summarize(range: DateRange, inputs: &RollupInputs, include_lot_costs: bool) -> FinancialSummary {
    let virtual_lines = if include_lot_costs {
        virtual_cost_lines(&inputs.lot_costs)
    } else {
        Vec::new()
    };

    let ledger_expenses: Decimal = inputs.ledger_by_category.iter().map(|(_, a)| *a).sum();
    let lot_costs: Decimal = virtual_lines.iter().map(|l| l.amount).sum();
    let total_expenses = ledger_expenses + lot_costs;
    let margin = inputs.total_sales - total_expenses;

    FinancialSummary {
        start_date: range.start,
        end_date: range.end,
        total_sales: inputs.total_sales,
        total_expenses,
        ledger_expenses,
        lot_costs,
        pending_receivables: inputs.pending_receivables,
        margin,
        margin_percent: margin_percent(margin, inputs.total_sales),
        breakdown: fold_breakdown(&inputs.ledger_by_category, &virtual_lines),
    }
}

pub fn margin_percent(margin: Decimal, sales: Decimal) -> Decimal {
    if sales.is_zero() {
        return Decimal::ZERO;
    }
    round_rate(margin / sales * Decimal::ONE_HUNDRED)
}

/// One calendar month of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    pub label: String,
    pub range: DateRange,
}

/// The `months` calendar months ending with the month containing `today`,
/// oldest first
pub fn month_windows(today: NaiveDate, months: u32) -> Vec<MonthWindow> {
    let Some(current) = today.with_day(1) else {
        return Vec::new();
    };
    (0..months)
        .rev()
        .filter_map(|back| {
            let start = current.checked_sub_months(Months::new(back))?;
            let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
            Some(MonthWindow {
                label: start.format("%b %Y").to_string(),
                range: DateRange::bounded(start, end),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month_label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sales: Decimal,
    pub expenses: Decimal,
    pub margin: Decimal,
}

impl MonthlyPoint {
    pub fn from_summary(window: &MonthWindow, summary: &FinancialSummary) -> Option<Self> {
        Some(MonthlyPoint {
            month_label: window.label.clone(),
            start_date: window.range.start?,
            end_date: window.range.end?,
            sales: summary.total_sales,
            expenses: summary.total_expenses,
            margin: summary.margin,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitStatus {
    Profit,
    Loss,
    BreakEven,
}

impl ProfitStatus {
    pub fn of(profit: Decimal) -> Self {
        if profit > Decimal::ZERO {
            ProfitStatus::Profit
        } else if profit < Decimal::ZERO {
            ProfitStatus::Loss
        } else {
            ProfitStatus::BreakEven
        }
    }
}

/// Aggregates for a single lot's financial summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotFinanceInputs {
    pub lot: LotCostBasis,
    pub ledger_by_category: Vec<(String, Decimal)>,
    pub total_sales: Decimal,
    pub amount_received: Decimal,
    /// Sum of expense fragments received from the parent lot
    pub inherited_expenses: Decimal,
    pub parent_lot_id: Option<Uuid>,
    pub split_ratio: Option<Decimal>,
    pub child_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSplitInfo {
    pub parent_lot_id: Option<Uuid>,
    pub split_ratio: Option<Decimal>,
    pub inherited_expenses: Decimal,
    pub child_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotFinancialSummary {
    pub lot_id: Uuid,
    pub breakdown: BTreeMap<ExpenseCategory, Decimal>,
    pub total_expenses: Decimal,
    pub total_sales: Decimal,
    pub amount_received: Decimal,
    pub outstanding: Decimal,
    pub profit: Decimal,
    pub profit_status: ProfitStatus,
    pub margin_percent: Decimal,
    /// Total cost over the birds the lot carries costs for
    pub cost_per_bird: Option<Decimal>,
    pub split_info: LotSplitInfo,
}

pub fn lot_financials(inputs: &LotFinanceInputs) -> LotFinancialSummary {
    let ledgered = |category: ExpenseCategory| {
        inputs
            .ledger_by_category
            .iter()
            .any(|(raw, _)| ExpenseCategory::from_stored(raw) == category)
    };
    let mut basis = inputs.lot.clone();
    basis.has_chicks_expense |= ledgered(ExpenseCategory::Chicks);
    basis.has_transport_expense |= ledgered(ExpenseCategory::Transport);

    let virtual_lines = virtual_cost_lines(std::slice::from_ref(&basis));
    let breakdown = fold_breakdown(&inputs.ledger_by_category, &virtual_lines);
    let total_expenses: Decimal = breakdown.values().copied().sum();
    let profit = inputs.total_sales - total_expenses;
    let cost_per_bird = (inputs.lot.cost_basis_quantity > 0)
        .then(|| round_money(total_expenses / Decimal::from(inputs.lot.cost_basis_quantity)));

    LotFinancialSummary {
        lot_id: inputs.lot.lot_id,
        breakdown,
        total_expenses,
        total_sales: inputs.total_sales,
        amount_received: inputs.amount_received,
        outstanding: inputs.total_sales - inputs.amount_received,
        profit,
        profit_status: ProfitStatus::of(profit),
        margin_percent: margin_percent(profit, inputs.total_sales),
        cost_per_bird,
        split_info: LotSplitInfo {
            parent_lot_id: inputs.parent_lot_id,
            split_ratio: inputs.split_ratio,
            inherited_expenses: inputs.inherited_expenses,
            child_count: inputs.child_count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn lot(has_chicks: bool, has_transport: bool) -> LotCostBasis {
        LotCostBasis {
            lot_id: Uuid::new_v4(),
            chick_price_per_unit: Some(dec("500")),
            cost_basis_quantity: 1000,
            transport_cost: Some(dec("50000")),
            other_initial_costs: Some(dec("10000")),
            has_chicks_expense: has_chicks,
            has_transport_expense: has_transport,
        }
    }

    #[test]
    fn test_virtual_lines_without_ledger() {
        let lines = virtual_cost_lines(&[lot(false, false)]);
        let amounts: Vec<_> = lines.iter().map(|l| (l.category, l.amount)).collect();
        assert_eq!(
            amounts,
            vec![
                (ExpenseCategory::Chicks, dec("500000")),
                (ExpenseCategory::Transport, dec("50000")),
                (ExpenseCategory::Other, dec("10000")),
            ]
        );
    }

    #[test]
    fn test_ledgered_chicks_suppress_virtual_chicks() {
        let lines = virtual_cost_lines(&[lot(true, false)]);
        assert!(lines.iter().all(|l| l.category != ExpenseCategory::Chicks));
        let lines = virtual_cost_lines(&[lot(true, true)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].category, ExpenseCategory::Other);
    }

    #[test]
    fn test_breakdown_merges_spellings() {
        let ledger = vec![
            ("feed".to_string(), dec("100")),
            ("Feed".to_string(), dec("50")),
            ("medicine".to_string(), dec("20")),
            ("veterinary".to_string(), dec("5")),
        ];
        let breakdown = fold_breakdown(&ledger, &[]);
        assert_eq!(breakdown[&ExpenseCategory::Feed], dec("150"));
        assert_eq!(breakdown[&ExpenseCategory::Veterinary], dec("25"));
        assert_eq!(breakdown.len(), 2);
    }

    #[test]
    fn test_summary_counts_chicks_once() {
        let inputs = RollupInputs {
            total_sales: dec("800000"),
            ledger_by_category: vec![("Chicks".to_string(), dec("480000"))],
            lot_costs: vec![lot(true, false)],
            pending_receivables: dec("1000"),
        };
        let summary = summarize(DateRange::default(), &inputs, true);
        assert_eq!(summary.ledger_expenses, dec("480000"));
        assert_eq!(summary.lot_costs, dec("60000"));
        assert_eq!(summary.total_expenses, dec("540000"));
        assert_eq!(summary.breakdown[&ExpenseCategory::Chicks], dec("480000"));
        assert_eq!(summary.margin, dec("260000"));
        assert_eq!(summary.margin_percent, dec("32.50"));

        let without = summarize(DateRange::default(), &inputs, false);
        assert_eq!(without.total_expenses, dec("480000"));
        assert_eq!(without.lot_costs, Decimal::ZERO);
    }

    #[test]
    fn test_margin_percent_without_sales() {
        let summary = summarize(DateRange::default(), &RollupInputs::default(), true);
        assert_eq!(summary.margin_percent, Decimal::ZERO);
    }

    #[test]
    fn test_month_windows() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let windows = month_windows(today, 3);
        let labels: Vec<_> = windows.iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, vec!["Jan 2025", "Feb 2025", "Mar 2025"]);
        assert_eq!(windows[1].range.start, NaiveDate::from_ymd_opt(2025, 2, 1));
        assert_eq!(windows[1].range.end, NaiveDate::from_ymd_opt(2025, 2, 28));
        assert_eq!(windows[2].range.end, NaiveDate::from_ymd_opt(2025, 3, 31));
    }

    #[test]
    fn test_month_windows_cross_year() {
        let windows = month_windows(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(), 2);
        assert_eq!(windows[0].label, "Dec 2024");
        assert_eq!(windows[0].range.end, NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    #[test]
    fn test_lot_financials() {
        let mut basis = lot(false, false);
        basis.other_initial_costs = None;
        let inputs = LotFinanceInputs {
            lot: basis,
            ledger_by_category: vec![
                ("feed".to_string(), dec("300000")),
                ("transport".to_string(), dec("45000")),
            ],
            total_sales: dec("900000"),
            amount_received: dec("600000"),
            inherited_expenses: dec("0"),
            parent_lot_id: None,
            split_ratio: None,
            child_count: 1,
        };
        let summary = lot_financials(&inputs);
        assert_eq!(summary.total_expenses, dec("845000"));
        assert_eq!(summary.breakdown[&ExpenseCategory::Transport], dec("45000"));
        assert_eq!(summary.profit, dec("55000"));
        assert_eq!(summary.profit_status, ProfitStatus::Profit);
        assert_eq!(summary.outstanding, dec("300000"));
        assert_eq!(summary.cost_per_bird, Some(dec("845")));
    }

    #[test]
    fn test_profit_status() {
        assert_eq!(ProfitStatus::of(dec("-1")), ProfitStatus::Loss);
        assert_eq!(ProfitStatus::of(Decimal::ZERO), ProfitStatus::BreakEven);
    }

    #[test]
    fn test_breakdown_serializes_canonical_keys() {
        let breakdown = fold_breakdown(&[("Salary".to_string(), dec("10"))], &[]);
        let json = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(json["labor"], "10");
    }
}
