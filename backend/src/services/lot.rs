//! Lot registry: creation, reads, updates, closing, soft deletion and split
//! history

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::laying_curve::{self, CurvePosition, ExpectedLayingRate, LayingPhase};
use shared::stats::LotStats;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, Alternative, AppError, AppResult, Blocked};
use crate::models::{
    generate_lot_code, Lot, LotRow, LotStatus, LotType, SplitHistory, SplitRelative, LOT_COLUMNS,
};
use crate::services::access::{ensure_building, load_lot, RowLock};
use crate::services::stats;

/// Lot service for managing the lot registry
#[derive(Clone)]
pub struct LotService {
    db: PgPool,
}

/// Lot with its current snapshot
#[derive(Debug, Clone, Serialize)]
pub struct LotSummary {
    #[serde(flatten)]
    pub lot: Lot,
    pub age_days: i64,
    pub stats: Option<LotStats>,
}

/// Expected laying performance for a layer lot at its current age
#[derive(Debug, Clone, Serialize)]
pub struct LayingOutlook {
    pub phase: LayingPhase,
    pub expected: ExpectedLayingRate,
    /// Where the lot's average laying rate sits against the expected band
    pub position: Option<CurvePosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LotDetail {
    #[serde(flatten)]
    pub lot: Lot,
    pub age_days: i64,
    pub age_weeks: i64,
    pub stats: Option<LotStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub laying: Option<LayingOutlook>,
}

/// Filters for listing lots
#[derive(Debug, Default, Deserialize)]
pub struct LotFilter {
    pub status: Option<String>,
    pub lot_type: Option<String>,
    pub building_id: Option<Uuid>,
}

/// Input for creating a lot
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLotInput {
    pub building_id: Uuid,
    #[validate(length(max = 200, message = "Name cannot exceed 200 characters"))]
    pub name: Option<String>,
    pub lot_type: String,
    pub status: Option<String>,
    pub breed: Option<String>,
    pub supplier: Option<String>,
    #[validate(range(min = 1, message = "Initial quantity must be greater than zero"))]
    pub initial_quantity: i32,
    pub placement_date: NaiveDate,
    pub age_at_placement: Option<i32>,
    pub expected_end_date: Option<NaiveDate>,
    pub chick_price_per_unit: Option<Decimal>,
    pub transport_cost: Option<Decimal>,
    pub other_initial_costs: Option<Decimal>,
    pub target_weight_g: Option<Decimal>,
    pub target_fcr: Option<Decimal>,
    pub target_laying_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for updating a lot
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateLotInput {
    #[validate(length(max = 200, message = "Name cannot exceed 200 characters"))]
    pub name: Option<String>,
    pub status: Option<String>,
    pub breed: Option<String>,
    pub supplier: Option<String>,
    pub expected_end_date: Option<NaiveDate>,
    pub chick_price_per_unit: Option<Decimal>,
    pub transport_cost: Option<Decimal>,
    pub other_initial_costs: Option<Decimal>,
    pub target_weight_g: Option<Decimal>,
    pub target_fcr: Option<Decimal>,
    pub target_laying_rate: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseLotInput {
    pub actual_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Result of a soft delete
#[derive(Debug, Clone, Serialize)]
pub struct DeleteLotOutcome {
    pub lot_id: Uuid,
    pub code: String,
    pub status: LotStatus,
    /// Dependent records kept for history
    pub records: BTreeMap<String, i64>,
    pub message: String,
}

/// Partial update of a lot; a deleted lot is never touched
const UPDATE_LOT: &str = r#"
    UPDATE lots SET
        name = COALESCE($2, name),
        status = COALESCE($3, status),
        breed = COALESCE($4, breed),
        supplier = COALESCE($5, supplier),
        expected_end_date = COALESCE($6, expected_end_date),
        chick_price_per_unit = COALESCE($7, chick_price_per_unit),
        transport_cost = COALESCE($8, transport_cost),
        other_initial_costs = COALESCE($9, other_initial_costs),
        target_weight_g = COALESCE($10, target_weight_g),
        target_fcr = COALESCE($11, target_fcr),
        target_laying_rate = COALESCE($12, target_laying_rate),
        notes = COALESCE($13, notes),
        updated_at = NOW()
    WHERE id = $1
      AND status <> 'deleted'
"#;

/// Stores counted before a lot may be deleted
const DEPENDENT_STORES: &[&str] = &[
    "mortalities",
    "feed_consumptions",
    "water_consumptions",
    "weight_records",
    "egg_productions",
    "sales",
    "expenses",
    "health_events",
];

fn parse_lot_type(value: &str) -> AppResult<LotType> {
    LotType::parse(value)
        .ok_or_else(|| AppError::validation("lot_type", format!("Unknown lot type '{}'", value)))
}

fn parse_status(value: &str) -> AppResult<LotStatus> {
    LotStatus::parse(value)
        .ok_or_else(|| AppError::validation("status", format!("Unknown lot status '{}'", value)))
}

fn validate_costs(
    chick_price: Option<Decimal>,
    transport: Option<Decimal>,
    other: Option<Decimal>,
) -> AppResult<()> {
    let fields = [
        ("chick_price_per_unit", chick_price),
        ("transport_cost", transport),
        ("other_initial_costs", other),
    ];
    for (field, value) in fields {
        if let Some(amount) = value {
            shared::validate_amount(amount).map_err(field_error(field))?;
        }
    }
    Ok(())
}

/// Next code for a lot of `lot_type` placed in `year`
pub async fn next_lot_code<'e, E: PgExecutor<'e>>(
    executor: E,
    lot_type: LotType,
    year: i32,
) -> AppResult<String> {
    let sequence: i32 = sqlx::query_scalar("SELECT get_next_lot_sequence($1, $2)")
        .bind(lot_type.code_prefix())
        .bind(year)
        .fetch_one(executor)
        .await?;

    Ok(generate_lot_code(lot_type, year, sequence))
}

fn laying_outlook(lot: &Lot, stats: Option<&LotStats>, today: NaiveDate) -> Option<LayingOutlook> {
    if lot.lot_type != LotType::Layer {
        return None;
    }
    let weeks = lot.age_weeks(today);
    let expected = laying_curve::expected_rate(weeks);
    let position = stats
        .filter(|s| s.total_eggs > 0)
        .map(|s| laying_curve::compare(s.average_laying_rate, &expected));
    Some(LayingOutlook {
        phase: laying_curve::phase(weeks),
        expected,
        position,
    })
}

impl LotService {
    /// Create a new LotService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List the organization's lots with their snapshots
    pub async fn list_lots(
        &self,
        organization_id: Uuid,
        filter: LotFilter,
    ) -> AppResult<Vec<LotSummary>> {
        let status = filter.status.as_deref().map(parse_status).transpose()?;
        let lot_type = filter.lot_type.as_deref().map(parse_lot_type).transpose()?;

        let query = format!(
            r#"
            SELECT {}
            FROM lots l
            JOIN buildings b ON b.id = l.building_id
            JOIN sites s ON s.id = b.site_id
            WHERE s.organization_id = $1
              AND l.status <> 'deleted'
              AND ($2::VARCHAR IS NULL OR l.status = $2)
              AND ($3::VARCHAR IS NULL OR l.lot_type = $3)
              AND ($4::UUID IS NULL OR l.building_id = $4)
            ORDER BY l.placement_date DESC, l.code
            "#,
            LOT_COLUMNS
        );
        let rows = sqlx::query_as::<_, LotRow>(&query)
            .bind(organization_id)
            .bind(status.map(|s| s.as_str()))
            .bind(lot_type.map(|t| t.as_str()))
            .bind(filter.building_id)
            .fetch_all(&self.db)
            .await?;

        let today = Utc::now().date_naive();
        let mut lots = Vec::with_capacity(rows.len());
        for row in rows {
            let lot = Lot::try_from(row)?;
            let stats = stats::read(&self.db, lot.id).await?;
            lots.push(LotSummary {
                age_days: lot.age_days(today),
                lot,
                stats,
            });
        }
        Ok(lots)
    }

    /// Get a lot with its snapshot, age and laying outlook
    pub async fn get_lot(&self, organization_id: Uuid, lot_id: Uuid) -> AppResult<LotDetail> {
        let lot = load_lot(&self.db, organization_id, lot_id, RowLock::None).await?;
        let stats = stats::read(&self.db, lot.id).await?;
        let today = Utc::now().date_naive();

        Ok(LotDetail {
            age_days: lot.age_days(today),
            age_weeks: lot.age_weeks(today),
            laying: laying_outlook(&lot, stats.as_ref(), today),
            stats,
            lot,
        })
    }

    /// Create a new lot
    pub async fn create_lot(&self, organization_id: Uuid, input: CreateLotInput) -> AppResult<LotDetail> {
        input.validate()?;
        let lot_type = parse_lot_type(&input.lot_type)?;
        let status = match input.status.as_deref() {
            Some(value) => parse_status(value)?,
            None => LotStatus::Active,
        };
        if !matches!(status, LotStatus::Preparation | LotStatus::Active) {
            return Err(AppError::validation(
                "status",
                "New lots start in preparation or active",
            ));
        }
        let age_at_placement = input.age_at_placement.unwrap_or(1);
        shared::validate_age_at_placement(age_at_placement).map_err(field_error("age_at_placement"))?;
        shared::validate_lot_dates(input.placement_date, input.expected_end_date)
            .map_err(field_error("expected_end_date"))?;
        validate_costs(
            input.chick_price_per_unit,
            input.transport_cost,
            input.other_initial_costs,
        )?;
        if let Some(rate) = input.target_laying_rate {
            shared::validate_percentage(rate).map_err(field_error("target_laying_rate"))?;
        }

        let mut tx = self.db.begin().await?;
        ensure_building(&mut *tx, organization_id, input.building_id).await?;

        let code = next_lot_code(&mut *tx, lot_type, input.placement_date.year()).await?;

        let lot_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO lots (
                building_id, code, name, lot_type, status, breed, supplier,
                initial_quantity, current_quantity, cost_basis_quantity,
                placement_date, age_at_placement, expected_end_date,
                chick_price_per_unit, transport_cost, other_initial_costs,
                target_weight_g, target_fcr, target_laying_rate, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id
            "#,
        )
        .bind(input.building_id)
        .bind(&code)
        .bind(&input.name)
        .bind(lot_type.as_str())
        .bind(status.as_str())
        .bind(&input.breed)
        .bind(&input.supplier)
        .bind(input.initial_quantity)
        .bind(input.placement_date)
        .bind(age_at_placement)
        .bind(input.expected_end_date)
        .bind(input.chick_price_per_unit)
        .bind(input.transport_cost)
        .bind(input.other_initial_costs)
        .bind(input.target_weight_g)
        .bind(input.target_fcr)
        .bind(input.target_laying_rate)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        stats::insert_shell(&mut *tx, lot_id).await?;
        tx.commit().await?;

        tracing::info!(%lot_id, %code, quantity = input.initial_quantity, "Created lot");
        self.get_lot(organization_id, lot_id).await
    }

    /// Update a lot's descriptive fields, status, targets and embedded costs
    pub async fn update_lot(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        input: UpdateLotInput,
    ) -> AppResult<LotDetail> {
        input.validate()?;
        let mut tx = self.db.begin().await?;
        let existing = load_lot(&mut *tx, organization_id, lot_id, RowLock::ForUpdate).await?;

        let status = match input.status.as_deref() {
            Some(value) => {
                let next = parse_status(value)?;
                shared::validate_status_change(existing.status, next).map_err(field_error("status"))?;
                Some(next)
            }
            None => None,
        };
        validate_costs(
            input.chick_price_per_unit,
            input.transport_cost,
            input.other_initial_costs,
        )?;
        if let Some(end) = input.expected_end_date {
            shared::validate_lot_dates(existing.placement_date, Some(end))
                .map_err(field_error("expected_end_date"))?;
        }

        let updated = sqlx::query(UPDATE_LOT)
            .bind(lot_id)
            .bind(&input.name)
            .bind(status.map(|s| s.as_str()))
            .bind(&input.breed)
            .bind(&input.supplier)
            .bind(input.expected_end_date)
            .bind(input.chick_price_per_unit)
            .bind(input.transport_cost)
            .bind(input.other_initial_costs)
            .bind(input.target_weight_g)
            .bind(input.target_fcr)
            .bind(input.target_laying_rate)
            .bind(&input.notes)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AppError::NotFound("Lot".to_string()));
        }
        tx.commit().await?;

        self.get_lot(organization_id, lot_id).await
    }

    /// Mark a lot as completed
    pub async fn close_lot(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        input: CloseLotInput,
    ) -> AppResult<LotDetail> {
        let mut tx = self.db.begin().await?;
        let lot = load_lot(&mut *tx, organization_id, lot_id, RowLock::ForUpdate).await?;
        if lot.status == LotStatus::Completed {
            return Err(AppError::validation("status", "Lot is already completed"));
        }

        let end_date = input.actual_end_date.unwrap_or_else(|| Utc::now().date_naive());
        if end_date < lot.placement_date {
            return Err(AppError::validation(
                "actual_end_date",
                "End date cannot precede placement",
            ));
        }

        sqlx::query(
            r#"
            UPDATE lots SET
                status = 'completed',
                actual_end_date = $2,
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(lot_id)
        .bind(end_date)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        stats::recompute(&mut tx, lot_id).await?;
        tx.commit().await?;

        tracing::info!(%lot_id, code = %lot.code, %end_date, "Closed lot");
        self.get_lot(organization_id, lot_id).await
    }

    /// Soft delete a lot
    ///
    /// Active lots are always refused. Lots with recorded history are refused
    /// unless `force` is set, with the record counts in the refusal.
    pub async fn delete_lot(
        &self,
        organization_id: Uuid,
        lot_id: Uuid,
        force: bool,
    ) -> AppResult<DeleteLotOutcome> {
        let mut tx = self.db.begin().await?;
        let lot = load_lot(&mut *tx, organization_id, lot_id, RowLock::ForUpdate).await?;

        if lot.status == LotStatus::Active {
            return Err(AppError::Blocked(Box::new(Blocked {
                code: "LOT_IS_ACTIVE",
                message: format!(
                    "Lot {} is still active with {} birds; close it before deleting",
                    lot.code, lot.current_quantity
                ),
                overridable: false,
                records: None,
                alternatives: vec![
                    Alternative::new(
                        "close",
                        "Mark the lot as completed; its data stays in history and reports",
                        format!("POST /api/v1/lots/{}/close", lot_id),
                    ),
                    Alternative::new(
                        "change_status",
                        "Set the lot's status by hand, e.g. to completed or suspended",
                        format!("PATCH /api/v1/lots/{}", lot_id),
                    ),
                ],
            })));
        }

        let mut records = BTreeMap::new();
        for store in DEPENDENT_STORES {
            let query = format!("SELECT COUNT(*) FROM {} WHERE lot_id = $1", store);
            let count: i64 = sqlx::query_scalar(&query)
                .bind(lot_id)
                .fetch_one(&mut *tx)
                .await?;
            if count > 0 {
                records.insert(store.to_string(), count);
            }
        }

        if !records.is_empty() && !force {
            let total: i64 = records.values().sum();
            return Err(AppError::Blocked(Box::new(Blocked {
                code: "LOT_HAS_DATA",
                message: format!(
                    "Lot {} has {} records; deleting removes them from reports and financial totals",
                    lot.code, total
                ),
                overridable: true,
                records: Some(records),
                alternatives: vec![
                    Alternative::new(
                        "edit",
                        "Fix the lot's details if it was entered with a mistake",
                        format!("PATCH /api/v1/lots/{}", lot_id),
                    ),
                    Alternative::new(
                        "complete",
                        "Keep the lot in history and reports as completed",
                        format!("PATCH /api/v1/lots/{}", lot_id),
                    ),
                    Alternative::new(
                        "force_delete",
                        "Delete anyway; reserved for lots that should never have existed",
                        format!("DELETE /api/v1/lots/{}?force=true", lot_id),
                    ),
                ],
            })));
        }

        sqlx::query("UPDATE lots SET status = 'deleted', updated_at = NOW() WHERE id = $1")
            .bind(lot_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(%lot_id, code = %lot.code, force, "Deleted lot");
        Ok(DeleteLotOutcome {
            lot_id,
            message: format!("Lot {} deleted", lot.code),
            code: lot.code,
            status: LotStatus::Deleted,
            records,
        })
    }

    /// Parent and non-deleted children of a lot
    pub async fn split_history(&self, organization_id: Uuid, lot_id: Uuid) -> AppResult<SplitHistory> {
        let lot = load_lot(&self.db, organization_id, lot_id, RowLock::None).await?;

        let query = format!(
            r#"
            SELECT {}
            FROM lots l
            WHERE (l.id = $1 OR l.parent_lot_id = $2)
              AND l.status <> 'deleted'
            ORDER BY l.split_date NULLS FIRST, l.created_at
            "#,
            LOT_COLUMNS
        );
        let rows = sqlx::query_as::<_, LotRow>(&query)
            .bind(lot.parent_lot_id)
            .bind(lot_id)
            .fetch_all(&self.db)
            .await?;

        let mut parent = None;
        let mut children = Vec::new();
        for row in rows {
            let relative = Lot::try_from(row)?;
            if Some(relative.id) == lot.parent_lot_id {
                parent = Some(relative_of(relative));
            } else {
                children.push(relative_of(relative));
            }
        }

        Ok(SplitHistory {
            lot_id,
            parent,
            children,
        })
    }
}

fn relative_of(lot: Lot) -> SplitRelative {
    SplitRelative {
        id: lot.id,
        code: lot.code,
        name: lot.name,
        building_id: lot.building_id,
        initial_quantity: lot.initial_quantity,
        current_quantity: lot.current_quantity,
        split_date: lot.split_date,
        split_ratio: lot.split_ratio,
        status: lot.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_never_touches_deleted_lots() {
        let guard = UPDATE_LOT
            .lines()
            .map(str::trim)
            .skip_while(|line| !line.starts_with("WHERE"))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(guard, "WHERE id = $1 AND status <> 'deleted'");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(parse_status("Completed").unwrap(), LotStatus::Completed);
        assert!(matches!(
            parse_status("archived"),
            Err(AppError::Validation { ref field, .. }) if field == "status"
        ));
    }
}
