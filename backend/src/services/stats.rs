//! Lot statistics service
//!
//! Gathers every aggregate a snapshot needs in one statement, derives the
//! snapshot with `shared::stats::derive` and overwrites the stored row.
//! Writers call [`recompute`] inside their own transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::stats::{derive, LotProfile, LotStats, StatsInputs, WeightPoint};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{LotStatsRow, LotType, STATS_COLUMNS};
use crate::services::access::{load_lot, RowLock};

/// Stats service for reading and recomputing lot snapshots
#[derive(Clone)]
pub struct StatsService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct AggregateRow {
    lot_type: String,
    initial_quantity: i32,
    current_quantity: i32,
    total_mortality: i64,
    total_eggs: i64,
    laying_rate_avg: Option<Decimal>,
    laying_rate_max: Option<Decimal>,
    total_feed_kg: Decimal,
    total_water_liters: Decimal,
    total_sales: Decimal,
    total_expenses: Decimal,
    latest_weight_date: Option<NaiveDate>,
    latest_weight_g: Option<Decimal>,
    previous_weight_date: Option<NaiveDate>,
    previous_weight_g: Option<Decimal>,
}

fn weight_point(date: Option<NaiveDate>, grams: Option<Decimal>) -> Option<WeightPoint> {
    Some(WeightPoint {
        date: date?,
        average_weight_g: grams?,
    })
}

impl AggregateRow {
    fn split(self) -> AppResult<(LotProfile, StatsInputs)> {
        let lot_type = LotType::parse(&self.lot_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown lot type '{}'", self.lot_type)))?;
        let profile = LotProfile {
            lot_type,
            initial_quantity: self.initial_quantity,
            current_quantity: self.current_quantity,
        };
        let inputs = StatsInputs {
            total_mortality: self.total_mortality,
            total_eggs: self.total_eggs,
            laying_rate_avg: self.laying_rate_avg,
            laying_rate_max: self.laying_rate_max,
            total_feed_kg: self.total_feed_kg,
            total_water_liters: self.total_water_liters,
            latest_weight: weight_point(self.latest_weight_date, self.latest_weight_g),
            previous_weight: weight_point(self.previous_weight_date, self.previous_weight_g),
            total_sales: self.total_sales,
            total_expenses: self.total_expenses,
        };
        Ok((profile, inputs))
    }
}

/// Recompute and store the snapshot of one lot
pub async fn recompute(conn: &mut PgConnection, lot_id: Uuid) -> AppResult<LotStats> {
    let row = sqlx::query_as::<_, AggregateRow>(
        r#"
        SELECT
            l.lot_type,
            l.initial_quantity,
            l.current_quantity,
            (SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM mortalities WHERE lot_id = l.id) AS total_mortality,
            (SELECT COALESCE(SUM(total_eggs), 0)::BIGINT FROM egg_productions WHERE lot_id = l.id) AS total_eggs,
            (SELECT ROUND(AVG(laying_rate), 4) FROM egg_productions WHERE lot_id = l.id) AS laying_rate_avg,
            (SELECT MAX(laying_rate) FROM egg_productions WHERE lot_id = l.id) AS laying_rate_max,
            (SELECT COALESCE(SUM(quantity_kg), 0) FROM feed_consumptions WHERE lot_id = l.id) AS total_feed_kg,
            (SELECT COALESCE(SUM(quantity_liters), 0) FROM water_consumptions WHERE lot_id = l.id) AS total_water_liters,
            (SELECT COALESCE(SUM(total_amount), 0) FROM sales WHERE lot_id = l.id) AS total_sales,
            (SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE lot_id = l.id) AS total_expenses,
            lw.date AS latest_weight_date,
            lw.average_weight_g AS latest_weight_g,
            pw.date AS previous_weight_date,
            pw.average_weight_g AS previous_weight_g
        FROM lots l
        LEFT JOIN LATERAL (
            SELECT date, average_weight_g FROM weight_records
            WHERE lot_id = l.id
            ORDER BY date DESC, created_at DESC
            LIMIT 1
        ) lw ON TRUE
        LEFT JOIN LATERAL (
            SELECT date, average_weight_g FROM weight_records
            WHERE lot_id = l.id AND date < lw.date
            ORDER BY date DESC, created_at DESC
            LIMIT 1
        ) pw ON TRUE
        WHERE l.id = $1
        "#,
    )
    .bind(lot_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

    let (profile, inputs) = row.split()?;
    let stats = derive(&profile, &inputs);

    sqlx::query(
        r#"
        INSERT INTO lot_stats (
            lot_id, total_mortality, mortality_rate, total_eggs, average_laying_rate,
            peak_laying_rate, eggs_per_hen_housed, current_weight_g, daily_gain_g,
            total_feed_kg, feed_conversion_ratio, feed_per_egg_kg, total_water_liters,
            water_feed_ratio, total_sales, total_expenses, gross_margin, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, NOW())
        ON CONFLICT (lot_id) DO UPDATE SET
            total_mortality = EXCLUDED.total_mortality,
            mortality_rate = EXCLUDED.mortality_rate,
            total_eggs = EXCLUDED.total_eggs,
            average_laying_rate = EXCLUDED.average_laying_rate,
            peak_laying_rate = EXCLUDED.peak_laying_rate,
            eggs_per_hen_housed = EXCLUDED.eggs_per_hen_housed,
            current_weight_g = EXCLUDED.current_weight_g,
            daily_gain_g = EXCLUDED.daily_gain_g,
            total_feed_kg = EXCLUDED.total_feed_kg,
            feed_conversion_ratio = EXCLUDED.feed_conversion_ratio,
            feed_per_egg_kg = EXCLUDED.feed_per_egg_kg,
            total_water_liters = EXCLUDED.total_water_liters,
            water_feed_ratio = EXCLUDED.water_feed_ratio,
            total_sales = EXCLUDED.total_sales,
            total_expenses = EXCLUDED.total_expenses,
            gross_margin = EXCLUDED.gross_margin,
            updated_at = NOW()
        "#,
    )
    .bind(lot_id)
    .bind(stats.total_mortality)
    .bind(stats.mortality_rate)
    .bind(stats.total_eggs)
    .bind(stats.average_laying_rate)
    .bind(stats.peak_laying_rate)
    .bind(stats.eggs_per_hen_housed)
    .bind(stats.current_weight_g)
    .bind(stats.daily_gain_g)
    .bind(stats.total_feed_kg)
    .bind(stats.feed_conversion_ratio)
    .bind(stats.feed_per_egg_kg)
    .bind(stats.total_water_liters)
    .bind(stats.water_feed_ratio)
    .bind(stats.total_sales)
    .bind(stats.total_expenses)
    .bind(stats.gross_margin)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(%lot_id, "Recomputed lot stats");
    Ok(stats)
}

/// Create the empty snapshot row of a new lot
pub async fn insert_shell<'e, E: PgExecutor<'e>>(executor: E, lot_id: Uuid) -> AppResult<()> {
    sqlx::query("INSERT INTO lot_stats (lot_id) VALUES ($1) ON CONFLICT (lot_id) DO NOTHING")
        .bind(lot_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Read the stored snapshot of a lot, if any
pub async fn read<'e, E: PgExecutor<'e>>(executor: E, lot_id: Uuid) -> AppResult<Option<LotStats>> {
    let query = format!("SELECT {} FROM lot_stats WHERE lot_id = $1", STATS_COLUMNS);
    let row = sqlx::query_as::<_, LotStatsRow>(&query)
        .bind(lot_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(LotStats::from))
}

impl StatsService {
    /// Create a new StatsService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Current snapshot of a lot, derived on first read if missing
    pub async fn get_stats(&self, organization_id: Uuid, lot_id: Uuid) -> AppResult<LotStats> {
        load_lot(&self.db, organization_id, lot_id, RowLock::None).await?;
        match read(&self.db, lot_id).await? {
            Some(stats) => Ok(stats),
            None => self.recompute_lot(organization_id, lot_id).await,
        }
    }

    /// Force a full recompute of a lot's snapshot
    pub async fn recompute_lot(&self, organization_id: Uuid, lot_id: Uuid) -> AppResult<LotStats> {
        let mut tx = self.db.begin().await?;
        load_lot(&mut *tx, organization_id, lot_id, RowLock::None).await?;
        let stats = recompute(&mut tx, lot_id).await?;
        tx.commit().await?;
        Ok(stats)
    }
}
