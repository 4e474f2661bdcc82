//! Database models for the Poultry Lot Management Platform
//!
//! Re-exports models from the shared crate and adds the row types sqlx reads
//! into. Enumerations are stored as their canonical strings and parsed back
//! into shared types here.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::stats::LotStats;
use uuid::Uuid;

use crate::error::AppError;

pub use shared::models::*;

/// Column list matching [`LotRow`]
pub const LOT_COLUMNS: &str = "l.id, l.building_id, l.code, l.name, l.lot_type, l.status, l.breed, \
     l.supplier, l.initial_quantity, l.current_quantity, l.cost_basis_quantity, l.placement_date, \
     l.age_at_placement, l.expected_end_date, l.actual_end_date, l.chick_price_per_unit, \
     l.transport_cost, l.other_initial_costs, l.target_weight_g, l.target_fcr, \
     l.target_laying_rate, l.notes, l.parent_lot_id, l.split_date, l.split_ratio, \
     l.created_at, l.updated_at";

#[derive(Debug, sqlx::FromRow)]
pub struct LotRow {
    pub id: Uuid,
    pub building_id: Uuid,
    pub code: String,
    pub name: Option<String>,
    pub lot_type: String,
    pub status: String,
    pub breed: Option<String>,
    pub supplier: Option<String>,
    pub initial_quantity: i32,
    pub current_quantity: i32,
    pub cost_basis_quantity: i32,
    pub placement_date: NaiveDate,
    pub age_at_placement: i32,
    pub expected_end_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub chick_price_per_unit: Option<Decimal>,
    pub transport_cost: Option<Decimal>,
    pub other_initial_costs: Option<Decimal>,
    pub target_weight_g: Option<Decimal>,
    pub target_fcr: Option<Decimal>,
    pub target_laying_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub parent_lot_id: Option<Uuid>,
    pub split_date: Option<NaiveDate>,
    pub split_ratio: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LotRow> for Lot {
    type Error = AppError;

    fn try_from(row: LotRow) -> Result<Self, Self::Error> {
        let lot_type = LotType::parse(&row.lot_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown lot type '{}'", row.lot_type)))?;
        let status = LotStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown lot status '{}'", row.status)))?;

        Ok(Lot {
            id: row.id,
            building_id: row.building_id,
            code: row.code,
            name: row.name,
            lot_type,
            status,
            breed: row.breed,
            supplier: row.supplier,
            initial_quantity: row.initial_quantity,
            current_quantity: row.current_quantity,
            cost_basis_quantity: row.cost_basis_quantity,
            placement_date: row.placement_date,
            age_at_placement: row.age_at_placement,
            expected_end_date: row.expected_end_date,
            actual_end_date: row.actual_end_date,
            chick_price_per_unit: row.chick_price_per_unit,
            transport_cost: row.transport_cost,
            other_initial_costs: row.other_initial_costs,
            target_weight_g: row.target_weight_g,
            target_fcr: row.target_fcr,
            target_laying_rate: row.target_laying_rate,
            notes: row.notes,
            parent_lot_id: row.parent_lot_id,
            split_date: row.split_date,
            split_ratio: row.split_ratio,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column list matching [`LotStatsRow`]
pub const STATS_COLUMNS: &str = "total_mortality, mortality_rate, total_eggs, average_laying_rate, \
     peak_laying_rate, eggs_per_hen_housed, current_weight_g, daily_gain_g, total_feed_kg, \
     feed_conversion_ratio, feed_per_egg_kg, total_water_liters, water_feed_ratio, total_sales, \
     total_expenses, gross_margin";

#[derive(Debug, sqlx::FromRow)]
pub struct LotStatsRow {
    pub total_mortality: i64,
    pub mortality_rate: Decimal,
    pub total_eggs: i64,
    pub average_laying_rate: Decimal,
    pub peak_laying_rate: Decimal,
    pub eggs_per_hen_housed: Decimal,
    pub current_weight_g: Option<Decimal>,
    pub daily_gain_g: Option<Decimal>,
    pub total_feed_kg: Decimal,
    pub feed_conversion_ratio: Option<Decimal>,
    pub feed_per_egg_kg: Option<Decimal>,
    pub total_water_liters: Decimal,
    pub water_feed_ratio: Option<Decimal>,
    pub total_sales: Decimal,
    pub total_expenses: Decimal,
    pub gross_margin: Decimal,
}

impl From<LotStatsRow> for LotStats {
    fn from(row: LotStatsRow) -> Self {
        LotStats {
            total_mortality: row.total_mortality,
            mortality_rate: row.mortality_rate,
            total_eggs: row.total_eggs,
            average_laying_rate: row.average_laying_rate,
            peak_laying_rate: row.peak_laying_rate,
            eggs_per_hen_housed: row.eggs_per_hen_housed,
            current_weight_g: row.current_weight_g,
            daily_gain_g: row.daily_gain_g,
            total_feed_kg: row.total_feed_kg,
            feed_conversion_ratio: row.feed_conversion_ratio,
            feed_per_egg_kg: row.feed_per_egg_kg,
            total_water_liters: row.total_water_liters,
            water_feed_ratio: row.water_feed_ratio,
            total_sales: row.total_sales,
            total_expenses: row.total_expenses,
            gross_margin: row.gross_margin,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SaleRow {
    pub id: Uuid,
    pub lot_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub date: NaiveDate,
    pub sale_type: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub client_name: Option<String>,
    pub payment_status: String,
    pub amount_paid: Decimal,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: row.id,
            lot_id: row.lot_id,
            site_id: row.site_id,
            date: row.date,
            sale_type: SaleType::from_stored(&row.sale_type),
            quantity: row.quantity,
            unit: row.unit,
            unit_price: row.unit_price,
            total_amount: row.total_amount,
            client_name: row.client_name,
            payment_status: PaymentStatus::from_stored(&row.payment_status),
            amount_paid: row.amount_paid,
            payment_date: row.payment_date,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub lot_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub date: NaiveDate,
    pub category: String,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
    pub supplier_name: Option<String>,
    pub is_paid: bool,
    pub notes: Option<String>,
    pub from_split_lot_id: Option<Uuid>,
    pub original_expense_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            lot_id: row.lot_id,
            site_id: row.site_id,
            date: row.date,
            category: ExpenseCategory::from_stored(&row.category),
            description: row.description,
            quantity: row.quantity,
            unit: row.unit,
            unit_price: row.unit_price,
            amount: row.amount,
            supplier_name: row.supplier_name,
            is_paid: row.is_paid,
            notes: row.notes,
            from_split_lot_id: row.from_split_lot_id,
            original_expense_id: row.original_expense_id,
            created_at: row.created_at,
        }
    }
}

/// Column list matching [`HealthEventRow`]
pub const HEALTH_EVENT_COLUMNS: &str = "id, lot_id, date, event_type, product_name, route, dose, \
     target_disease, withdrawal_days_meat, withdrawal_days_eggs, cost, notes, \
     inherited_from_lot_id, original_event_id";

#[derive(Debug, sqlx::FromRow)]
pub struct HealthEventRow {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub event_type: String,
    pub product_name: Option<String>,
    pub route: Option<String>,
    pub dose: Option<String>,
    pub target_disease: Option<String>,
    pub withdrawal_days_meat: Option<i32>,
    pub withdrawal_days_eggs: Option<i32>,
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
    pub inherited_from_lot_id: Option<Uuid>,
    pub original_event_id: Option<Uuid>,
}

impl TryFrom<HealthEventRow> for HealthEvent {
    type Error = AppError;

    fn try_from(row: HealthEventRow) -> Result<Self, Self::Error> {
        let event_type = HealthEventType::parse(&row.event_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown health event type '{}'", row.event_type))
        })?;
        Ok(HealthEvent {
            id: row.id,
            lot_id: row.lot_id,
            date: row.date,
            event_type,
            product_name: row.product_name,
            route: row.route.as_deref().and_then(AdministrationRoute::parse),
            dose: row.dose,
            target_disease: row.target_disease,
            withdrawal_days_meat: row.withdrawal_days_meat,
            withdrawal_days_eggs: row.withdrawal_days_eggs,
            cost: row.cost,
            notes: row.notes,
            inherited_from_lot_id: row.inherited_from_lot_id,
            original_event_id: row.original_event_id,
        })
    }
}

/// Column list matching [`VaccinationScheduleRow`]
pub const VACCINATION_SCHEDULE_COLUMNS: &str = "id, lot_id, vaccine_name, target_disease, day_from, \
     day_to, route, dose, is_mandatory, notes, inherited_from_lot_id, original_schedule_id";

#[derive(Debug, sqlx::FromRow)]
pub struct VaccinationScheduleRow {
    pub id: Uuid,
    pub lot_id: Option<Uuid>,
    pub vaccine_name: String,
    pub target_disease: String,
    pub day_from: i32,
    pub day_to: Option<i32>,
    pub route: Option<String>,
    pub dose: Option<String>,
    pub is_mandatory: bool,
    pub notes: Option<String>,
    pub inherited_from_lot_id: Option<Uuid>,
    pub original_schedule_id: Option<Uuid>,
}

impl From<VaccinationScheduleRow> for VaccinationSchedule {
    fn from(row: VaccinationScheduleRow) -> Self {
        VaccinationSchedule {
            id: row.id,
            lot_id: row.lot_id,
            vaccine_name: row.vaccine_name,
            target_disease: row.target_disease,
            day_from: row.day_from,
            day_to: row.day_to,
            route: row.route.as_deref().and_then(AdministrationRoute::parse),
            dose: row.dose,
            is_mandatory: row.is_mandatory,
            notes: row.notes,
            inherited_from_lot_id: row.inherited_from_lot_id,
            original_schedule_id: row.original_schedule_id,
        }
    }
}
