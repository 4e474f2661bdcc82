//! Daily production entries and ledger writes
//!
//! Every write that touches a lot recomputes that lot's stats before its
//! transaction commits.

use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::stats::LotStats;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, AppError, AppResult};
use crate::models::{
    laying_rate, EggCounts, Expense, ExpenseCategory, ExpenseRow, Lot, LotType, MortalityCause,
    PaymentStatus, Sale, SaleRow, SaleType,
};
use crate::services::access::{ensure_sites, load_lot, RowLock};
use crate::services::stats;

const SALE_COLUMNS: &str = "id, lot_id, site_id, date, sale_type, quantity, unit, unit_price, \
     total_amount, client_name, payment_status, amount_paid, payment_date, notes, created_at";

pub(crate) const EXPENSE_COLUMNS: &str = "id, lot_id, site_id, date, category, description, quantity, unit, \
     unit_price, amount, supplier_name, is_paid, notes, from_split_lot_id, original_expense_id, \
     created_at";

/// Records service for daily entries, sales and expenses
#[derive(Clone)]
pub struct RecordsService {
    db: PgPool,
}

// ============================================================================
// Daily Entry Types
// ============================================================================

/// One day's observations for a lot; every part is optional
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DailyEntryInput {
    pub date: NaiveDate,
    pub mortality_count: Option<i32>,
    pub mortality_cause: Option<String>,
    pub eggs_normal: Option<i32>,
    pub eggs_cracked: Option<i32>,
    pub eggs_dirty: Option<i32>,
    pub eggs_small: Option<i32>,
    pub eggs_double_yolk: Option<i32>,
    pub eggs_soft_shell: Option<i32>,
    pub average_weight_g: Option<Decimal>,
    #[validate(range(min = 1, message = "Sample size must be greater than zero"))]
    pub sample_size: Option<i32>,
    pub feed_quantity_kg: Option<Decimal>,
    #[validate(length(max = 50, message = "Feed type cannot exceed 50 characters"))]
    pub feed_type: Option<String>,
    pub water_liters: Option<Decimal>,
}

impl DailyEntryInput {
    fn egg_counts(&self) -> EggCounts {
        EggCounts {
            normal: self.eggs_normal.unwrap_or(0),
            cracked: self.eggs_cracked.unwrap_or(0),
            dirty: self.eggs_dirty.unwrap_or(0),
            small: self.eggs_small.unwrap_or(0),
            double_yolk: self.eggs_double_yolk.unwrap_or(0),
            soft_shell: self.eggs_soft_shell.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EggEntry {
    pub total_eggs: i32,
    pub sellable_eggs: i32,
    pub hen_count: i32,
    pub laying_rate: Option<Decimal>,
}

/// What a daily entry recorded and the lot's state afterwards
#[derive(Debug, Clone, Serialize)]
pub struct DailyEntryOutcome {
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub current_quantity: i32,
    pub mortality: Option<i32>,
    pub eggs: Option<EggEntry>,
    pub weight_recorded: bool,
    pub feed_kg: Option<Decimal>,
    pub water_liters: Option<Decimal>,
    pub stats: LotStats,
}

// ============================================================================
// Ledger Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleInput {
    pub lot_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub date: NaiveDate,
    pub sale_type: String,
    pub quantity: Decimal,
    #[validate(length(max = 20, message = "Unit cannot exceed 20 characters"))]
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub total_amount: Option<Decimal>,
    #[validate(length(max = 200, message = "Client name cannot exceed 200 characters"))]
    pub client_name: Option<String>,
    pub amount_paid: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub payment_date: Option<NaiveDate>,
}

/// New expense; split provenance is never accepted from callers
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseInput {
    pub lot_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub date: NaiveDate,
    pub category: String,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    #[validate(length(max = 20, message = "Unit cannot exceed 20 characters"))]
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
    #[validate(length(max = 200, message = "Supplier name cannot exceed 200 characters"))]
    pub supplier_name: Option<String>,
    pub is_paid: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ScopedSaleRow {
    #[sqlx(flatten)]
    sale: SaleRow,
    organization_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct ScopedExpenseRow {
    #[sqlx(flatten)]
    expense: ExpenseRow,
    organization_id: Uuid,
}

fn check_owner(owner: Uuid, organization_id: Uuid, resource: &str) -> AppResult<()> {
    if owner != organization_id {
        return Err(AppError::Forbidden(format!(
            "{} belongs to another organization",
            resource
        )));
    }
    Ok(())
}

/// Whole number of birds carried by a bird sale
fn bird_count(quantity: Decimal) -> AppResult<i32> {
    if quantity.fract() != Decimal::ZERO {
        return Err(AppError::validation(
            "quantity",
            "Bird sales must be a whole number of birds",
        ));
    }
    quantity
        .to_i32()
        .ok_or_else(|| AppError::validation("quantity", "Quantity is out of range"))
}

async fn decrement_birds(conn: &mut PgConnection, lot_id: Uuid, count: i32) -> AppResult<i32> {
    let remaining: i32 = sqlx::query_scalar(
        r#"
        UPDATE lots SET current_quantity = current_quantity - $2, updated_at = NOW()
        WHERE id = $1
        RETURNING current_quantity
        "#,
    )
    .bind(lot_id)
    .bind(count)
    .fetch_one(&mut *conn)
    .await?;
    Ok(remaining)
}

impl RecordsService {
    /// Create a new RecordsService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Daily Entries
    // ========================================================================

    /// Record a day's mortality, eggs, weight, feed and water for a lot
    pub async fn daily_entry(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        input: DailyEntryInput,
    ) -> AppResult<DailyEntryOutcome> {
        input.validate()?;
        let mut tx = self.db.begin().await?;
        let lot = load_lot(&mut *tx, organization_id, lot_id, RowLock::ForUpdate).await?;

        let today = Utc::now().date_naive();
        shared::validate_entry_date(input.date, lot.placement_date, today)
            .map_err(field_error("date"))?;

        let counts = input.egg_counts();
        validate_entry(&lot, &input, &counts)?;

        let mut current_quantity = lot.current_quantity;
        if let Some(count) = input.mortality_count {
            let cause = match input.mortality_cause.as_deref() {
                Some(value) => MortalityCause::parse(value).ok_or_else(|| {
                    AppError::validation("mortality_cause", format!("Unknown cause '{}'", value))
                })?,
                None => MortalityCause::Unknown,
            };
            sqlx::query("INSERT INTO mortalities (lot_id, date, quantity, cause) VALUES ($1, $2, $3, $4)")
                .bind(lot_id)
                .bind(input.date)
                .bind(count)
                .bind(cause.as_str())
                .execute(&mut *tx)
                .await?;
            current_quantity = decrement_birds(&mut tx, lot_id, count).await?;
        }

        let eggs = if counts.is_empty() {
            None
        } else {
            let entry = EggEntry {
                total_eggs: counts.total(),
                sellable_eggs: counts.sellable(),
                hen_count: current_quantity,
                laying_rate: laying_rate(counts.total(), current_quantity),
            };
            sqlx::query(
                r#"
                INSERT INTO egg_productions (
                    lot_id, date, normal_eggs, cracked_eggs, dirty_eggs, small_eggs,
                    double_yolk_eggs, soft_shell_eggs, total_eggs, sellable_eggs,
                    hen_count, laying_rate
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(lot_id)
            .bind(input.date)
            .bind(counts.normal)
            .bind(counts.cracked)
            .bind(counts.dirty)
            .bind(counts.small)
            .bind(counts.double_yolk)
            .bind(counts.soft_shell)
            .bind(entry.total_eggs)
            .bind(entry.sellable_eggs)
            .bind(entry.hen_count)
            .bind(entry.laying_rate)
            .execute(&mut *tx)
            .await?;
            Some(entry)
        };

        if let Some(weight) = input.average_weight_g {
            let age = lot.age_days(input.date);
            sqlx::query(
                r#"
                INSERT INTO weight_records (lot_id, date, average_weight_g, sample_size, age_days)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(lot_id)
            .bind(input.date)
            .bind(weight)
            .bind(input.sample_size)
            .bind(i32::try_from(age).ok())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(feed) = input.feed_quantity_kg {
            sqlx::query(
                "INSERT INTO feed_consumptions (lot_id, date, quantity_kg, feed_type) VALUES ($1, $2, $3, $4)",
            )
            .bind(lot_id)
            .bind(input.date)
            .bind(feed)
            .bind(&input.feed_type)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(water) = input.water_liters {
            sqlx::query(
                "INSERT INTO water_consumptions (lot_id, date, quantity_liters) VALUES ($1, $2, $3)",
            )
            .bind(lot_id)
            .bind(input.date)
            .bind(water)
            .execute(&mut *tx)
            .await?;
        }

        let stats = stats::recompute(&mut tx, lot_id).await?;
        tx.commit().await?;

        Ok(DailyEntryOutcome {
            lot_id,
            date: input.date,
            current_quantity,
            mortality: input.mortality_count,
            eggs,
            weight_recorded: input.average_weight_g.is_some(),
            feed_kg: input.feed_quantity_kg,
            water_liters: input.water_liters,
            stats,
        })
    }

    // ========================================================================
    // Sales
    // ========================================================================

    /// Record a sale; bird sales take the birds out of their lot
    pub async fn create_sale(&self, organization_id: Uuid, input: CreateSaleInput) -> AppResult<Sale> {
        input.validate()?;
        let sale_type = SaleType::parse(&input.sale_type).ok_or_else(|| {
            AppError::validation("sale_type", format!("Unknown sale type '{}'", input.sale_type))
        })?;
        if input.quantity <= Decimal::ZERO {
            return Err(AppError::validation("quantity", "Quantity must be greater than zero"));
        }
        shared::validate_amount(input.unit_price).map_err(field_error("unit_price"))?;

        let total_amount = match input.total_amount {
            Some(total) => total,
            None => shared::types::round_money(input.quantity * input.unit_price),
        };
        shared::validate_amount(total_amount).map_err(field_error("total_amount"))?;
        let amount_paid = input.amount_paid.unwrap_or(Decimal::ZERO);
        shared::validate_amount(amount_paid).map_err(field_error("amount_paid"))?;
        if amount_paid > total_amount {
            return Err(AppError::validation(
                "amount_paid",
                "Amount paid cannot exceed the sale total",
            ));
        }

        let mut tx = self.db.begin().await?;
        if let Some(site_id) = input.site_id {
            ensure_sites(&mut *tx, organization_id, &[site_id]).await?;
        }

        if let Some(lot_id) = input.lot_id {
            let lock = if sale_type.removes_birds() {
                RowLock::ForUpdate
            } else {
                RowLock::None
            };
            let lot = load_lot(&mut *tx, organization_id, lot_id, lock).await?;
            if sale_type.removes_birds() {
                let count = bird_count(input.quantity)?;
                shared::validate_bird_removal(count, lot.current_quantity)
                    .map_err(field_error("quantity"))?;
                decrement_birds(&mut tx, lot_id, count).await?;
            }
        }

        let status = PaymentStatus::derive(total_amount, amount_paid);
        let query = format!(
            r#"
            INSERT INTO sales (
                organization_id, lot_id, site_id, date, sale_type, quantity, unit, unit_price,
                total_amount, client_name, payment_status, amount_paid, payment_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            SALE_COLUMNS
        );
        let row = sqlx::query_as::<_, SaleRow>(&query)
            .bind(organization_id)
            .bind(input.lot_id)
            .bind(input.site_id)
            .bind(input.date)
            .bind(sale_type.as_str())
            .bind(input.quantity)
            .bind(&input.unit)
            .bind(input.unit_price)
            .bind(total_amount)
            .bind(&input.client_name)
            .bind(status.as_str())
            .bind(amount_paid)
            .bind(input.payment_date)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(lot_id) = input.lot_id {
            stats::recompute(&mut tx, lot_id).await?;
        }
        tx.commit().await?;

        let sale = Sale::from(row);
        tracing::info!(sale_id = %sale.id, sale_type = sale_type.as_str(), total = %sale.total_amount, "Recorded sale");
        Ok(sale)
    }

    /// Add a payment to a sale and derive its new status
    pub async fn record_payment(
        &self,
        organization_id: Uuid,
        sale_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<Sale> {
        let mut tx = self.db.begin().await?;
        let query = format!(
            "SELECT {}, organization_id FROM sales WHERE id = $1 FOR UPDATE",
            SALE_COLUMNS
        );
        let scoped = sqlx::query_as::<_, ScopedSaleRow>(&query)
            .bind(sale_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;
        check_owner(scoped.organization_id, organization_id, "Sale")?;

        let sale = Sale::from(scoped.sale);
        shared::validate_payment(input.amount, sale.outstanding()).map_err(field_error("amount"))?;

        let amount_paid = sale.amount_paid + input.amount;
        let status = PaymentStatus::derive(sale.total_amount, amount_paid);
        let payment_date = input.payment_date.unwrap_or_else(|| Utc::now().date_naive());

        let query = format!(
            r#"
            UPDATE sales SET amount_paid = $2, payment_status = $3, payment_date = $4
            WHERE id = $1
            RETURNING {}
            "#,
            SALE_COLUMNS
        );
        let row = sqlx::query_as::<_, SaleRow>(&query)
            .bind(sale_id)
            .bind(amount_paid)
            .bind(status.as_str())
            .bind(payment_date)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Sale::from(row))
    }

    // ========================================================================
    // Expenses
    // ========================================================================

    pub async fn create_expense(
        &self,
        organization_id: Uuid,
        input: CreateExpenseInput,
    ) -> AppResult<Expense> {
        input.validate()?;
        let category = ExpenseCategory::parse(&input.category).ok_or_else(|| {
            AppError::validation("category", format!("Unknown category '{}'", input.category))
        })?;
        shared::validate_amount(input.amount).map_err(field_error("amount"))?;
        if let Some(price) = input.unit_price {
            shared::validate_amount(price).map_err(field_error("unit_price"))?;
        }

        let mut tx = self.db.begin().await?;
        if let Some(site_id) = input.site_id {
            ensure_sites(&mut *tx, organization_id, &[site_id]).await?;
        }
        if let Some(lot_id) = input.lot_id {
            load_lot(&mut *tx, organization_id, lot_id, RowLock::None).await?;
        }

        let query = format!(
            r#"
            INSERT INTO expenses (
                organization_id, lot_id, site_id, date, category, description, quantity,
                unit, unit_price, amount, supplier_name, is_paid, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            EXPENSE_COLUMNS
        );
        let row = sqlx::query_as::<_, ExpenseRow>(&query)
            .bind(organization_id)
            .bind(input.lot_id)
            .bind(input.site_id)
            .bind(input.date)
            .bind(category.as_str())
            .bind(&input.description)
            .bind(input.quantity)
            .bind(&input.unit)
            .bind(input.unit_price)
            .bind(input.amount)
            .bind(&input.supplier_name)
            .bind(input.is_paid.unwrap_or(true))
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(lot_id) = input.lot_id {
            stats::recompute(&mut tx, lot_id).await?;
        }
        tx.commit().await?;

        Ok(Expense::from(row))
    }

    /// Delete an expense; originals with split fragments are kept
    pub async fn delete_expense(&self, organization_id: Uuid, expense_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let query = format!(
            "SELECT {}, organization_id FROM expenses WHERE id = $1 FOR UPDATE",
            EXPENSE_COLUMNS
        );
        let scoped = sqlx::query_as::<_, ScopedExpenseRow>(&query)
            .bind(expense_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Expense".to_string()))?;
        check_owner(scoped.organization_id, organization_id, "Expense")?;
        let expense = Expense::from(scoped.expense);

        let fragments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM expenses WHERE original_expense_id = $1")
                .bind(expense_id)
                .fetch_one(&mut *tx)
                .await?;
        if fragments > 0 {
            return Err(AppError::validation(
                "id",
                "Expense was split across lots; delete its fragments first",
            ));
        }

        sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(expense_id)
            .execute(&mut *tx)
            .await?;

        if let Some(lot_id) = expense.lot_id {
            stats::recompute(&mut tx, lot_id).await?;
        }
        tx.commit().await?;

        tracing::info!(%expense_id, category = %expense.category, amount = %expense.amount, "Deleted expense");
        Ok(())
    }
}

/// Check every part of a daily entry before anything is written
fn validate_entry(lot: &Lot, input: &DailyEntryInput, counts: &EggCounts) -> AppResult<()> {
    if let Some(count) = input.mortality_count {
        shared::validate_mortality(count, lot.current_quantity)
            .map_err(field_error("mortality_count"))?;
    }
    shared::validate_egg_counts(counts).map_err(field_error("eggs"))?;
    if !counts.is_empty() && lot.lot_type != LotType::Layer {
        return Err(AppError::validation(
            "eggs",
            "Egg production is only recorded for layer lots",
        ));
    }
    if let Some(weight) = input.average_weight_g {
        shared::validate_weight(weight).map_err(field_error("average_weight_g"))?;
    }
    if let Some(feed) = input.feed_quantity_kg {
        shared::validate_consumption(feed).map_err(field_error("feed_quantity_kg"))?;
    }
    if let Some(water) = input.water_liters {
        shared::validate_consumption(water).map_err(field_error("water_liters"))?;
    }
    Ok(())
}
