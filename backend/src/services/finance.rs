//! Financial rollups over sites and lots
//!
//! All aggregates of one rollup request are read inside a single
//! `REPEATABLE READ` read-only transaction and folded by `shared::rollup`.
//! The monthly series calls the same window summary once per month.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::rollup::{
    lot_financials, month_windows, summarize, FinancialSummary, LotCostBasis, LotFinanceInputs,
    LotFinancialSummary, MonthlyPoint, RollupInputs,
};
use shared::models::ExpenseCategory;
use shared::types::DateRange;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::FinanceConfig;
use crate::error::{AppError, AppResult};
use crate::services::access::{ensure_sites, load_lot, RowLock};

/// Finance service for summaries, monthly series and per-lot finance
#[derive(Clone)]
pub struct FinanceService {
    db: PgPool,
    config: FinanceConfig,
}

/// Query for a rollup over a date range
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Comma-separated site ids
    pub site_ids: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_lot_costs: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeriesFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    /// Comma-separated site ids
    pub site_ids: String,
    pub months: Option<u32>,
    pub include_lot_costs: Option<bool>,
    #[serde(default)]
    pub format: SeriesFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySeries {
    pub months: Vec<MonthlyPoint>,
    pub total_sales: Decimal,
    pub total_expenses: Decimal,
    pub total_margin: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct LotCostRow {
    lot_id: Uuid,
    chick_price_per_unit: Option<Decimal>,
    cost_basis_quantity: i32,
    transport_cost: Option<Decimal>,
    other_initial_costs: Option<Decimal>,
    has_chicks_expense: bool,
    has_transport_expense: bool,
}

impl From<LotCostRow> for LotCostBasis {
    fn from(row: LotCostRow) -> Self {
        LotCostBasis {
            lot_id: row.lot_id,
            chick_price_per_unit: row.chick_price_per_unit,
            cost_basis_quantity: row.cost_basis_quantity,
            transport_cost: row.transport_cost,
            other_initial_costs: row.other_initial_costs,
            has_chicks_expense: row.has_chicks_expense,
            has_transport_expense: row.has_transport_expense,
        }
    }
}

/// Parse a comma-separated list of site ids
pub fn parse_site_ids(raw: &str) -> AppResult<Vec<Uuid>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| AppError::validation("site_ids", format!("Invalid site id '{}'", s)))
        })
        .collect::<AppResult<Vec<_>>>()?;

    if ids.is_empty() {
        return Err(AppError::validation("site_ids", "At least one site is required"));
    }
    Ok(ids)
}

/// Start a transaction whose statements all see one snapshot
async fn begin_snapshot(db: &PgPool) -> AppResult<sqlx::Transaction<'static, sqlx::Postgres>> {
    let mut tx = db.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Read the aggregates of one window
///
/// A sale or expense is in scope when its own site is one of `site_ids` or
/// its lot sits in a building of one of those sites. Records of deleted lots
/// are left out. A lot's embedded chick or transport cost is suppressed when
/// the lot or any live lot it was split from has a ledgered expense of that
/// category.
async fn rollup_inputs(
    conn: &mut PgConnection,
    organization_id: Uuid,
    site_ids: &[Uuid],
    range: DateRange,
) -> AppResult<RollupInputs> {
    let total_sales: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(s.total_amount), 0)
        FROM sales s
        LEFT JOIN lots l ON l.id = s.lot_id
        LEFT JOIN buildings b ON b.id = l.building_id
        WHERE s.organization_id = $1
          AND (s.site_id = ANY($2) OR b.site_id = ANY($2))
          AND (l.id IS NULL OR l.status <> 'deleted')
          AND ($3::date IS NULL OR s.date >= $3)
          AND ($4::date IS NULL OR s.date <= $4)
        "#,
    )
    .bind(organization_id)
    .bind(site_ids)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(&mut *conn)
    .await?;

    let ledger_by_category: Vec<(String, Decimal)> = sqlx::query_as(
        r#"
        SELECT LOWER(TRIM(e.category)), SUM(e.amount)
        FROM expenses e
        LEFT JOIN lots l ON l.id = e.lot_id
        LEFT JOIN buildings b ON b.id = l.building_id
        WHERE e.organization_id = $1
          AND (e.site_id = ANY($2) OR b.site_id = ANY($2))
          AND (l.id IS NULL OR l.status <> 'deleted')
          AND ($3::date IS NULL OR e.date >= $3)
          AND ($4::date IS NULL OR e.date <= $4)
        GROUP BY LOWER(TRIM(e.category))
        "#,
    )
    .bind(organization_id)
    .bind(site_ids)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&mut *conn)
    .await?;

    let lot_costs = sqlx::query_as::<_, LotCostRow>(
        r#"
        SELECT
            l.id AS lot_id,
            l.chick_price_per_unit,
            l.cost_basis_quantity,
            l.transport_cost,
            l.other_initial_costs,
            lineage_has_expense(l.id, $5) AS has_chicks_expense,
            lineage_has_expense(l.id, $6) AS has_transport_expense
        FROM lots l
        JOIN buildings b ON b.id = l.building_id
        JOIN sites s ON s.id = b.site_id
        WHERE s.organization_id = $1
          AND b.site_id = ANY($2)
          AND l.status <> 'deleted'
          AND ($3::date IS NULL OR l.placement_date >= $3)
          AND ($4::date IS NULL OR l.placement_date <= $4)
        "#,
    )
    .bind(organization_id)
    .bind(site_ids)
    .bind(range.start)
    .bind(range.end)
    .bind(ExpenseCategory::Chicks.as_str())
    .bind(ExpenseCategory::Transport.as_str())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(LotCostBasis::from)
    .collect();

    let pending_receivables: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(s.total_amount - s.amount_paid), 0)
        FROM sales s
        LEFT JOIN lots l ON l.id = s.lot_id
        LEFT JOIN buildings b ON b.id = l.building_id
        WHERE s.organization_id = $1
          AND (s.site_id = ANY($2) OR b.site_id = ANY($2))
          AND (l.id IS NULL OR l.status <> 'deleted')
          AND LOWER(s.payment_status) IN ('pending', 'partial', 'overdue')
          AND ($3::date IS NULL OR s.date >= $3)
          AND ($4::date IS NULL OR s.date <= $4)
        "#,
    )
    .bind(organization_id)
    .bind(site_ids)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(&mut *conn)
    .await?;

    Ok(RollupInputs {
        total_sales,
        ledger_by_category,
        lot_costs,
        pending_receivables,
    })
}

impl FinanceService {
    /// Create a new FinanceService instance
    pub fn new(db: PgPool, config: FinanceConfig) -> Self {
        Self { db, config }
    }

    /// Sales, expenses and margin over the requested sites and dates
    pub async fn summary(
        &self,
        organization_id: Uuid,
        query: &SummaryQuery,
    ) -> AppResult<FinancialSummary> {
        let site_ids = parse_site_ids(&query.site_ids)?;
        let range = DateRange::new(query.start_date, query.end_date);
        if range.is_inverted() {
            return Err(AppError::validation("end_date", "End date cannot precede start date"));
        }

        let mut tx = begin_snapshot(&self.db).await?;
        ensure_sites(&mut *tx, organization_id, &site_ids).await?;
        let inputs = rollup_inputs(&mut tx, organization_id, &site_ids, range).await?;
        tx.commit().await?;

        Ok(summarize(range, &inputs, query.include_lot_costs.unwrap_or(true)))
    }

    /// One summary per calendar month, ending with the current month
    pub async fn monthly(
        &self,
        organization_id: Uuid,
        query: &MonthlyQuery,
    ) -> AppResult<MonthlySeries> {
        let site_ids = parse_site_ids(&query.site_ids)?;
        let months = self.config.series_months(query.months);
        let include_lot_costs = query.include_lot_costs.unwrap_or(true);
        let windows = month_windows(Utc::now().date_naive(), months);

        let mut tx = begin_snapshot(&self.db).await?;
        ensure_sites(&mut *tx, organization_id, &site_ids).await?;

        let mut points = Vec::with_capacity(windows.len());
        for window in &windows {
            let inputs = rollup_inputs(&mut tx, organization_id, &site_ids, window.range).await?;
            let summary = summarize(window.range, &inputs, include_lot_costs);
            let point = MonthlyPoint::from_summary(window, &summary)
                .ok_or_else(|| AppError::Internal("Month window without bounds".to_string()))?;
            points.push(point);
        }
        tx.commit().await?;

        tracing::debug!(%organization_id, months, sites = site_ids.len(), "Built monthly series");
        Ok(MonthlySeries {
            total_sales: points.iter().map(|p| p.sales).sum(),
            total_expenses: points.iter().map(|p| p.expenses).sum(),
            total_margin: points.iter().map(|p| p.margin).sum(),
            months: points,
        })
    }

    /// Expenses, sales and split provenance of one lot
    pub async fn lot_financial_summary(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
    ) -> AppResult<LotFinancialSummary> {
        let mut tx = begin_snapshot(&self.db).await?;
        let lot = load_lot(&mut *tx, organization_id, lot_id, RowLock::None).await?;

        let ledger_by_category: Vec<(String, Decimal)> = sqlx::query_as(
            r#"
            SELECT LOWER(TRIM(category)), SUM(amount)
            FROM expenses
            WHERE lot_id = $1
            GROUP BY LOWER(TRIM(category))
            "#,
        )
        .bind(lot_id)
        .fetch_all(&mut *tx)
        .await?;

        let (total_sales, amount_received): (Decimal, Decimal) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_amount), 0), COALESCE(SUM(amount_paid), 0) FROM sales WHERE lot_id = $1",
        )
        .bind(lot_id)
        .fetch_one(&mut *tx)
        .await?;

        let inherited_expenses: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE lot_id = $1 AND from_split_lot_id IS NOT NULL",
        )
        .bind(lot_id)
        .fetch_one(&mut *tx)
        .await?;

        let (ancestor_chicks, ancestor_transport): (bool, bool) = sqlx::query_as(
            "SELECT lineage_has_expense($1, $2), lineage_has_expense($1, $3)",
        )
        .bind(lot_id)
        .bind(ExpenseCategory::Chicks.as_str())
        .bind(ExpenseCategory::Transport.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let child_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lots WHERE parent_lot_id = $1 AND status <> 'deleted'",
        )
        .bind(lot_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let inputs = LotFinanceInputs {
            lot: LotCostBasis {
                lot_id,
                chick_price_per_unit: lot.chick_price_per_unit,
                cost_basis_quantity: lot.cost_basis_quantity,
                transport_cost: lot.transport_cost,
                other_initial_costs: lot.other_initial_costs,
                has_chicks_expense: ancestor_chicks,
                has_transport_expense: ancestor_transport,
            },
            ledger_by_category,
            total_sales,
            amount_received,
            inherited_expenses,
            parent_lot_id: lot.parent_lot_id,
            split_ratio: lot.split_ratio,
            child_count,
        };
        Ok(lot_financials(&inputs))
    }

    /// Export rows as CSV with a header line
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_site_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_site_ids(&format!("{}, {},", a, b)).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_parse_site_ids_rejects_empty_and_garbage() {
        assert!(matches!(parse_site_ids(" , "), Err(AppError::Validation { .. })));
        assert!(matches!(parse_site_ids("not-a-uuid"), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_monthly_csv_has_header_and_rows() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let points = vec![MonthlyPoint {
            month_label: "Mar 2025".to_string(),
            start_date: start,
            end_date: end,
            sales: Decimal::from(1200),
            expenses: Decimal::from(800),
            margin: Decimal::from(400),
        }];
        let csv = FinanceService::export_to_csv(&points).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("month_label,start_date,end_date,sales,expenses,margin")
        );
        assert_eq!(lines.next(), Some("Mar 2025,2025-03-01,2025-03-31,1200,800,400"));
    }

    #[test]
    fn test_suppressed_categories_match_trimmed_lowercase_spelling() {
        // The suppression check in SQL compares LOWER(TRIM(category)) with
        // these canonical names; the breakdown folds through from_stored.
        for raw in ["Chicks ", " chicks", "CHICKS", "Transport", " transport "] {
            let folded = ExpenseCategory::from_stored(raw);
            assert_eq!(folded.as_str(), raw.trim().to_lowercase());
            assert!(matches!(folded, ExpenseCategory::Chicks | ExpenseCategory::Transport));
        }
    }
}
