//! Lot split execution
//!
//! The arithmetic lives in `shared::split::plan_split`; this service locks
//! the rows involved, applies the plan and recomputes both lots' stats, all
//! inside one transaction. Any error drops the transaction and nothing of
//! the split is kept.

use chrono::{Datelike, Utc};
use shared::split::{
    fragment_description, fragment_notes, plan_split, split_audit_note, ExpenseShareInput,
    SplitOutcome, SplitPlan, SplitRequest, SplitSource,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Expense, ExpenseRow, HealthEvent, HealthEventRow, Lot, VaccinationSchedule,
    VaccinationScheduleRow, HEALTH_EVENT_COLUMNS, VACCINATION_SCHEDULE_COLUMNS,
};
use crate::services::access::{ensure_building, load_lot, RowLock};
use crate::services::lot::next_lot_code;
use crate::services::stats;

/// Split service for dividing a lot into two
#[derive(Clone)]
pub struct SplitService {
    db: PgPool,
}

impl SplitService {
    /// Create a new SplitService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Move `request.quantity` birds of a lot into a new lot
    pub async fn split_lot(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        request: SplitRequest,
    ) -> AppResult<SplitOutcome> {
        let mut tx = self.db.begin().await?;

        let source = load_lot(&mut *tx, organization_id, lot_id, RowLock::ForUpdate).await?;
        ensure_building(&mut *tx, organization_id, request.target_building_id).await?;

        let expenses = if request.distribute_expenses {
            lock_splittable_expenses(&mut tx, lot_id).await?
        } else {
            Vec::new()
        };
        let shares: Vec<ExpenseShareInput> = expenses
            .iter()
            .map(|e| ExpenseShareInput {
                id: e.id,
                amount: e.amount,
                quantity: e.quantity,
                original_expense_id: e.original_expense_id,
            })
            .collect();

        let split_source = SplitSource::from(&source);
        let plan = plan_split(&split_source, &request, &shares)?;

        let today = Utc::now().date_naive();
        let child_code = next_lot_code(&mut *tx, source.lot_type, today.year()).await?;
        let child_id = insert_child(&mut tx, &source, &request, &plan, &child_code).await?;
        stats::insert_shell(&mut *tx, child_id).await?;

        move_expense_shares(&mut tx, organization_id, &source, child_id, &plan, &expenses).await?;
        let copied_events = copy_health_events(&mut tx, &source, child_id).await?;
        let copied_schedules = copy_vaccination_schedules(&mut tx, &source, child_id).await?;

        let notes = split_audit_note(source.notes.as_deref(), today, plan.child_quantity, &child_code);
        sqlx::query(
            r#"
            UPDATE lots SET
                current_quantity = $2,
                cost_basis_quantity = $3,
                transport_cost = $4,
                other_initial_costs = $5,
                notes = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(lot_id)
        .bind(plan.source_remaining_quantity)
        .bind(plan.source_remaining_cost_basis)
        .bind(plan.transport_cost.map(|c| c.retained))
        .bind(plan.other_initial_costs.map(|c| c.retained))
        .bind(&notes)
        .execute(&mut *tx)
        .await?;

        stats::recompute(&mut tx, lot_id).await?;
        stats::recompute(&mut tx, child_id).await?;
        tx.commit().await?;

        tracing::info!(
            source = %source.code,
            child = %child_code,
            quantity = plan.child_quantity,
            split_ratio = %plan.split_ratio,
            cost_ratio = %plan.cost_ratio,
            expenses_transferred = %plan.expenses_transferred,
            fragments = plan.expense_transfers.len(),
            copied_events,
            copied_schedules,
            "Split lot"
        );

        Ok(SplitOutcome::new(&split_source, &plan, child_id, child_code))
    }
}

/// Lock the source expenses that are not themselves split fragments
async fn lock_splittable_expenses(conn: &mut PgConnection, lot_id: Uuid) -> AppResult<Vec<Expense>> {
    let rows = sqlx::query_as::<_, ExpenseRow>(
        r#"
        SELECT id, lot_id, site_id, date, category, description, quantity, unit, unit_price,
               amount, supplier_name, is_paid, notes, from_split_lot_id, original_expense_id,
               created_at
        FROM expenses
        WHERE lot_id = $1 AND original_expense_id IS NULL
        ORDER BY date, created_at
        FOR UPDATE
        "#,
    )
    .bind(lot_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Expense::from).collect())
}

async fn insert_child(
    conn: &mut PgConnection,
    source: &Lot,
    request: &SplitRequest,
    plan: &SplitPlan,
    child_code: &str,
) -> AppResult<Uuid> {
    let child_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO lots (
            building_id, code, name, lot_type, status, breed, supplier,
            initial_quantity, current_quantity, cost_basis_quantity,
            placement_date, age_at_placement, expected_end_date,
            chick_price_per_unit, transport_cost, other_initial_costs,
            target_weight_g, target_fcr, target_laying_rate, notes,
            parent_lot_id, split_date, split_ratio
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, CURRENT_DATE, $20)
        RETURNING id
        "#,
    )
    .bind(request.target_building_id)
    .bind(child_code)
    .bind(&plan.child_name)
    .bind(source.lot_type.as_str())
    .bind(source.status.as_str())
    .bind(&source.breed)
    .bind(&source.supplier)
    .bind(plan.child_quantity)
    .bind(source.placement_date)
    .bind(source.age_at_placement)
    .bind(source.expected_end_date)
    .bind(plan.chick_price_per_unit)
    .bind(plan.transport_cost.map(|c| c.transferred))
    .bind(plan.other_initial_costs.map(|c| c.transferred))
    .bind(source.target_weight_g)
    .bind(source.target_fcr)
    .bind(source.target_laying_rate)
    .bind(&plan.child_notes)
    .bind(source.id)
    .bind(plan.split_ratio)
    .fetch_one(&mut *conn)
    .await?;

    Ok(child_id)
}

/// Carve each planned share out of its source expense
async fn move_expense_shares(
    conn: &mut PgConnection,
    organization_id: Uuid,
    source: &Lot,
    child_id: Uuid,
    plan: &SplitPlan,
    expenses: &[Expense],
) -> AppResult<()> {
    for transfer in &plan.expense_transfers {
        let Some(expense) = expenses.iter().find(|e| e.id == transfer.source_expense_id) else {
            continue;
        };

        sqlx::query(
            r#"
            INSERT INTO expenses (
                organization_id, lot_id, site_id, date, category, description, quantity,
                unit, unit_price, amount, supplier_name, is_paid, notes,
                from_split_lot_id, original_expense_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(organization_id)
        .bind(child_id)
        .bind(expense.site_id)
        .bind(expense.date)
        .bind(expense.category.as_str())
        .bind(fragment_description(
            expense.description.as_deref(),
            expense.category.as_str(),
            &source.code,
        ))
        .bind(transfer.quantity.map(|q| q.transferred))
        .bind(&expense.unit)
        .bind(expense.unit_price)
        .bind(transfer.amount.transferred)
        .bind(&expense.supplier_name)
        .bind(expense.is_paid)
        .bind(fragment_notes(plan.cost_ratio, expense.amount))
        .bind(source.id)
        .bind(expense.id)
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE expenses SET amount = $2, quantity = $3 WHERE id = $1")
            .bind(expense.id)
            .bind(transfer.amount.retained)
            .bind(transfer.quantity.map(|q| q.retained))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Copy every health event of the source onto the new lot, without cost
async fn copy_health_events(conn: &mut PgConnection, source: &Lot, child_id: Uuid) -> AppResult<usize> {
    let query = format!(
        "SELECT {} FROM health_events WHERE lot_id = $1 ORDER BY date, created_at",
        HEALTH_EVENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, HealthEventRow>(&query)
        .bind(source.id)
        .fetch_all(&mut *conn)
        .await?;

    let count = rows.len();
    for row in rows {
        let event = HealthEvent::try_from(row)?;
        let copy = event.inherited_copy(Uuid::new_v4(), child_id, &source.code);
        sqlx::query(
            r#"
            INSERT INTO health_events (
                id, lot_id, date, event_type, product_name, route, dose, target_disease,
                withdrawal_days_meat, withdrawal_days_eggs, cost, notes,
                inherited_from_lot_id, original_event_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(copy.id)
        .bind(copy.lot_id)
        .bind(copy.date)
        .bind(copy.event_type.as_str())
        .bind(&copy.product_name)
        .bind(copy.route.map(|r| r.as_str()))
        .bind(&copy.dose)
        .bind(&copy.target_disease)
        .bind(copy.withdrawal_days_meat)
        .bind(copy.withdrawal_days_eggs)
        .bind(copy.cost)
        .bind(&copy.notes)
        .bind(copy.inherited_from_lot_id)
        .bind(copy.original_event_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(count)
}

/// Copy the source's lot-scoped vaccination schedules onto the new lot
async fn copy_vaccination_schedules(
    conn: &mut PgConnection,
    source: &Lot,
    child_id: Uuid,
) -> AppResult<usize> {
    let query = format!(
        "SELECT {} FROM vaccination_schedules WHERE lot_id = $1 ORDER BY day_from",
        VACCINATION_SCHEDULE_COLUMNS
    );
    let rows = sqlx::query_as::<_, VaccinationScheduleRow>(&query)
        .bind(source.id)
        .fetch_all(&mut *conn)
        .await?;

    let count = rows.len();
    for row in rows {
        let schedule = VaccinationSchedule::from(row);
        let copy = schedule.inherited_copy(Uuid::new_v4(), child_id, &source.code);
        sqlx::query(
            r#"
            INSERT INTO vaccination_schedules (
                id, lot_id, vaccine_name, target_disease, day_from, day_to, route, dose,
                is_mandatory, notes, inherited_from_lot_id, original_schedule_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(copy.id)
        .bind(copy.lot_id)
        .bind(&copy.vaccine_name)
        .bind(&copy.target_disease)
        .bind(copy.day_from)
        .bind(copy.day_to)
        .bind(copy.route.map(|r| r.as_str()))
        .bind(&copy.dose)
        .bind(copy.is_mandatory)
        .bind(&copy.notes)
        .bind(copy.inherited_from_lot_id)
        .bind(copy.original_schedule_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(count)
}
