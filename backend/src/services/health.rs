//! Health events and lot vaccination programs
//!
//! A health event with a cost also books a `veterinary` expense on the lot,
//! so treatments show up in the lot's margin and in financial rollups.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::stats::LotStats;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, AppError, AppResult};
use crate::models::{
    health_expense_description, upcoming_vaccinations, AdministrationRoute, Expense,
    ExpenseCategory, ExpenseRow, HealthEvent, HealthEventRow, HealthEventType, UpcomingVaccination,
    VaccinationLot, VaccinationSchedule, VaccinationScheduleRow, HEALTH_EVENT_COLUMNS,
    VACCINATION_SCHEDULE_COLUMNS,
};
use crate::services::access::{ensure_sites, load_lot, RowLock};
use crate::services::records::EXPENSE_COLUMNS;
use crate::services::stats;

const DEFAULT_DAYS_AHEAD: i32 = 14;
const MAX_DAYS_AHEAD: i32 = 365;

/// Health service for events and vaccination schedules
#[derive(Clone)]
pub struct HealthService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthEventFilter {
    pub event_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHealthEventInput {
    pub date: NaiveDate,
    pub event_type: String,
    #[validate(length(max = 200, message = "Product name cannot exceed 200 characters"))]
    pub product_name: Option<String>,
    pub route: Option<String>,
    #[validate(length(max = 100, message = "Dose cannot exceed 100 characters"))]
    pub dose: Option<String>,
    #[validate(length(max = 200, message = "Target disease cannot exceed 200 characters"))]
    pub target_disease: Option<String>,
    pub withdrawal_days_meat: Option<i32>,
    pub withdrawal_days_eggs: Option<i32>,
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
}

/// The event and, when it had a cost, the expense booked for it
#[derive(Debug, Clone, Serialize)]
pub struct HealthEventOutcome {
    pub event: HealthEvent,
    /// Last day the birds cannot go to slaughter
    pub meat_withdrawal_ends: Option<NaiveDate>,
    pub eggs_withdrawal_ends: Option<NaiveDate>,
    pub expense: Option<Expense>,
    pub stats: Option<LotStats>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VaccinationInput {
    #[validate(length(min = 1, max = 200, message = "Vaccine name must be 1 to 200 characters"))]
    pub vaccine_name: String,
    #[validate(length(min = 1, max = 200, message = "Target disease must be 1 to 200 characters"))]
    pub target_disease: String,
    pub day_from: i32,
    pub day_to: Option<i32>,
    pub route: Option<String>,
    #[validate(length(max = 100, message = "Dose cannot exceed 100 characters"))]
    pub dose: Option<String>,
    pub is_mandatory: Option<bool>,
    pub notes: Option<String>,
}

/// A vaccination program replacing every schedule of a lot
#[derive(Debug, Deserialize)]
pub struct ApplyProgramInput {
    pub vaccinations: Vec<VaccinationInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingQuery {
    pub site_id: Option<Uuid>,
    pub days_ahead: Option<i32>,
}

#[derive(Debug, sqlx::FromRow)]
struct ActiveLotRow {
    id: Uuid,
    code: String,
    name: Option<String>,
    placement_date: NaiveDate,
    age_at_placement: i32,
}

impl From<ActiveLotRow> for VaccinationLot {
    fn from(row: ActiveLotRow) -> Self {
        VaccinationLot {
            id: row.id,
            code: row.code,
            name: row.name,
            placement_date: row.placement_date,
            age_at_placement: row.age_at_placement,
        }
    }
}

fn parse_route(value: Option<&str>) -> AppResult<Option<AdministrationRoute>> {
    value
        .map(|v| {
            AdministrationRoute::parse(v)
                .ok_or_else(|| AppError::validation("route", format!("Unknown route '{}'", v)))
        })
        .transpose()
}

fn withdrawal_end(date: NaiveDate, days: Option<i32>) -> Option<NaiveDate> {
    days.filter(|d| *d > 0)
        .map(|d| date + chrono::Duration::days(i64::from(d)))
}

/// Check a schedule entry and resolve its route
fn check_vaccination(input: &VaccinationInput) -> AppResult<Option<AdministrationRoute>> {
    input.validate()?;
    shared::validate_vaccination_window(input.day_from, input.day_to)
        .map_err(field_error("day_from"))?;
    parse_route(input.route.as_deref())
}

async fn insert_schedule(
    conn: &mut PgConnection,
    lot_id: Uuid,
    input: &VaccinationInput,
    route: Option<AdministrationRoute>,
) -> AppResult<VaccinationSchedule> {
    let query = format!(
        r#"
        INSERT INTO vaccination_schedules (
            lot_id, vaccine_name, target_disease, day_from, day_to, route, dose,
            is_mandatory, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        VACCINATION_SCHEDULE_COLUMNS
    );
    let row = sqlx::query_as::<_, VaccinationScheduleRow>(&query)
        .bind(lot_id)
        .bind(input.vaccine_name.trim())
        .bind(input.target_disease.trim())
        .bind(input.day_from)
        .bind(input.day_to)
        .bind(route.map(|r| r.as_str()))
        .bind(&input.dose)
        .bind(input.is_mandatory.unwrap_or(true))
        .bind(&input.notes)
        .fetch_one(&mut *conn)
        .await?;
    Ok(VaccinationSchedule::from(row))
}

impl HealthService {
    /// Create a new HealthService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Health Events
    // ========================================================================

    pub async fn list_events(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        filter: HealthEventFilter,
    ) -> AppResult<Vec<HealthEvent>> {
        load_lot(&self.db, organization_id, lot_id, RowLock::None).await?;
        let event_type = filter
            .event_type
            .as_deref()
            .map(|v| {
                HealthEventType::parse(v).ok_or_else(|| {
                    AppError::validation("event_type", format!("Unknown event type '{}'", v))
                })
            })
            .transpose()?;

        let query = format!(
            r#"
            SELECT {}
            FROM health_events
            WHERE lot_id = $1
              AND ($2::text IS NULL OR LOWER(event_type) = $2)
            ORDER BY date DESC, created_at DESC
            "#,
            HEALTH_EVENT_COLUMNS
        );
        sqlx::query_as::<_, HealthEventRow>(&query)
            .bind(lot_id)
            .bind(event_type.map(|t| t.as_str()))
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(HealthEvent::try_from)
            .collect()
    }

    /// Record a treatment, vaccination or visit on a lot
    pub async fn create_event(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        input: CreateHealthEventInput,
    ) -> AppResult<HealthEventOutcome> {
        input.validate()?;
        let event_type = HealthEventType::parse(&input.event_type).ok_or_else(|| {
            AppError::validation(
                "event_type",
                format!("Unknown event type '{}'", input.event_type),
            )
        })?;
        let route = parse_route(input.route.as_deref())?;
        for (field, days) in [
            ("withdrawal_days_meat", input.withdrawal_days_meat),
            ("withdrawal_days_eggs", input.withdrawal_days_eggs),
        ] {
            if let Some(days) = days {
                shared::validate_withdrawal_days(days).map_err(field_error(field))?;
            }
        }
        if let Some(cost) = input.cost {
            shared::validate_amount(cost).map_err(field_error("cost"))?;
        }

        let mut tx = self.db.begin().await?;
        let lot = load_lot(&mut *tx, organization_id, lot_id, RowLock::None).await?;
        shared::validate_entry_date(input.date, lot.placement_date, Utc::now().date_naive())
            .map_err(field_error("date"))?;

        let query = format!(
            r#"
            INSERT INTO health_events (
                lot_id, date, event_type, product_name, route, dose, target_disease,
                withdrawal_days_meat, withdrawal_days_eggs, cost, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            HEALTH_EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, HealthEventRow>(&query)
            .bind(lot_id)
            .bind(input.date)
            .bind(event_type.as_str())
            .bind(&input.product_name)
            .bind(route.map(|r| r.as_str()))
            .bind(&input.dose)
            .bind(&input.target_disease)
            .bind(input.withdrawal_days_meat)
            .bind(input.withdrawal_days_eggs)
            .bind(input.cost)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;
        let event = HealthEvent::try_from(row)?;

        let (expense, stats) = match input.cost.filter(|c| *c > Decimal::ZERO) {
            Some(cost) => {
                let query = format!(
                    r#"
                    INSERT INTO expenses (
                        organization_id, lot_id, date, category, description, quantity,
                        unit, amount, is_paid, notes
                    )
                    VALUES ($1, $2, $3, $4, $5, 1, $6, $7, TRUE, $8)
                    RETURNING {}
                    "#,
                    EXPENSE_COLUMNS
                );
                let description = health_expense_description(
                    event_type,
                    input.product_name.as_deref(),
                    &lot.code,
                );
                let row = sqlx::query_as::<_, ExpenseRow>(&query)
                    .bind(organization_id)
                    .bind(lot_id)
                    .bind(input.date)
                    .bind(ExpenseCategory::Veterinary.as_str())
                    .bind(description)
                    .bind(&input.dose)
                    .bind(cost)
                    .bind(&input.notes)
                    .fetch_one(&mut *tx)
                    .await?;
                let stats = stats::recompute(&mut tx, lot_id).await?;
                (Some(Expense::from(row)), Some(stats))
            }
            None => (None, None),
        };
        tx.commit().await?;

        tracing::info!(
            %lot_id,
            event_type = event_type.as_str(),
            booked_expense = expense.is_some(),
            "Recorded health event"
        );
        Ok(HealthEventOutcome {
            meat_withdrawal_ends: withdrawal_end(event.date, event.withdrawal_days_meat),
            eggs_withdrawal_ends: withdrawal_end(event.date, event.withdrawal_days_eggs),
            event,
            expense,
            stats,
        })
    }

    // ========================================================================
    // Vaccination Schedules
    // ========================================================================

    pub async fn list_schedules(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
    ) -> AppResult<Vec<VaccinationSchedule>> {
        load_lot(&self.db, organization_id, lot_id, RowLock::None).await?;
        let query = format!(
            "SELECT {} FROM vaccination_schedules WHERE lot_id = $1 ORDER BY day_from, vaccine_name",
            VACCINATION_SCHEDULE_COLUMNS
        );
        let rows = sqlx::query_as::<_, VaccinationScheduleRow>(&query)
            .bind(lot_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(VaccinationSchedule::from).collect())
    }

    /// Add one vaccination window to a lot's schedule
    pub async fn create_schedule(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        input: VaccinationInput,
    ) -> AppResult<VaccinationSchedule> {
        let route = check_vaccination(&input)?;
        let mut tx = self.db.begin().await?;
        load_lot(&mut *tx, organization_id, lot_id, RowLock::None).await?;
        let schedule = insert_schedule(&mut tx, lot_id, &input, route).await?;
        tx.commit().await?;
        Ok(schedule)
    }

    /// Replace a lot's schedules with a program
    pub async fn apply_program(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        input: ApplyProgramInput,
    ) -> AppResult<Vec<VaccinationSchedule>> {
        if input.vaccinations.is_empty() {
            return Err(AppError::validation(
                "vaccinations",
                "A program needs at least one vaccination",
            ));
        }
        let routes = input
            .vaccinations
            .iter()
            .map(check_vaccination)
            .collect::<AppResult<Vec<_>>>()?;

        let mut tx = self.db.begin().await?;
        load_lot(&mut *tx, organization_id, lot_id, RowLock::ForUpdate).await?;
        let removed = sqlx::query("DELETE FROM vaccination_schedules WHERE lot_id = $1")
            .bind(lot_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut schedules = Vec::with_capacity(input.vaccinations.len());
        for (vaccination, route) in input.vaccinations.iter().zip(routes) {
            schedules.push(insert_schedule(&mut tx, lot_id, vaccination, route).await?);
        }
        tx.commit().await?;

        tracing::info!(%lot_id, removed, added = schedules.len(), "Applied vaccination program");
        schedules.sort_by_key(|s| s.day_from);
        Ok(schedules)
    }

    /// Remove every schedule of a lot
    pub async fn clear_schedules(&self, organization_id: Uuid, lot_id: Uuid) -> AppResult<u64> {
        let mut tx = self.db.begin().await?;
        load_lot(&mut *tx, organization_id, lot_id, RowLock::ForUpdate).await?;
        let removed = sqlx::query("DELETE FROM vaccination_schedules WHERE lot_id = $1")
            .bind(lot_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed)
    }

    /// Vaccinations due within `days_ahead` days, or missed, across active lots
    pub async fn upcoming(
        &self,
        organization_id: Uuid,
        query: UpcomingQuery,
    ) -> AppResult<Vec<UpcomingVaccination>> {
        let days_ahead = query.days_ahead.unwrap_or(DEFAULT_DAYS_AHEAD);
        if !(0..=MAX_DAYS_AHEAD).contains(&days_ahead) {
            return Err(AppError::validation(
                "days_ahead",
                format!("Days ahead must be between 0 and {}", MAX_DAYS_AHEAD),
            ));
        }
        if let Some(site_id) = query.site_id {
            ensure_sites(&self.db, organization_id, &[site_id]).await?;
        }

        let lots: Vec<VaccinationLot> = sqlx::query_as::<_, ActiveLotRow>(
            r#"
            SELECT l.id, l.code, l.name, l.placement_date, l.age_at_placement
            FROM lots l
            JOIN buildings b ON b.id = l.building_id
            JOIN sites s ON s.id = b.site_id
            WHERE s.organization_id = $1
              AND ($2::uuid IS NULL OR s.id = $2)
              AND l.status = 'active'
            "#,
        )
        .bind(organization_id)
        .bind(query.site_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(VaccinationLot::from)
        .collect();
        if lots.is_empty() {
            return Ok(Vec::new());
        }
        let lot_ids: Vec<Uuid> = lots.iter().map(|l| l.id).collect();

        let schedule_query = format!(
            "SELECT {} FROM vaccination_schedules WHERE lot_id = ANY($1)",
            VACCINATION_SCHEDULE_COLUMNS
        );
        let mut schedules: HashMap<Uuid, Vec<VaccinationSchedule>> = HashMap::new();
        for row in sqlx::query_as::<_, VaccinationScheduleRow>(&schedule_query)
            .bind(&lot_ids)
            .fetch_all(&self.db)
            .await?
        {
            let schedule = VaccinationSchedule::from(row);
            if let Some(lot_id) = schedule.lot_id {
                schedules.entry(lot_id).or_default().push(schedule);
            }
        }

        let mut administered: HashMap<Uuid, Vec<String>> = HashMap::new();
        let products: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT lot_id, product_name
            FROM health_events
            WHERE lot_id = ANY($1)
              AND LOWER(event_type) = 'vaccination'
              AND product_name IS NOT NULL
            "#,
        )
        .bind(&lot_ids)
        .fetch_all(&self.db)
        .await?;
        for (lot_id, product) in products {
            administered.entry(lot_id).or_default().push(product);
        }

        let today = Utc::now().date_naive();
        let mut upcoming: Vec<UpcomingVaccination> = lots
            .iter()
            .flat_map(|lot| {
                upcoming_vaccinations(
                    lot,
                    schedules.get(&lot.id).map(Vec::as_slice).unwrap_or_default(),
                    administered.get(&lot.id).map(Vec::as_slice).unwrap_or_default(),
                    today,
                    days_ahead,
                )
            })
            .collect();
        upcoming.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.lot_code.cmp(&b.lot_code)));
        Ok(upcoming)
    }
}
