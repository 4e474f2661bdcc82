//! Organization scoping for lots, buildings and sites
//!
//! Organization membership of a lot is derived through
//! building -> site -> organization.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Lot, LotRow, LotStatus, LOT_COLUMNS};

#[derive(Debug, sqlx::FromRow)]
struct ScopedLotRow {
    #[sqlx(flatten)]
    lot: LotRow,
    organization_id: Uuid,
}

/// Whether a lot read should hold the row for the rest of the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    None,
    ForUpdate,
}

/// Load a non-deleted lot of the caller's organization
pub async fn load_lot<'e, E: PgExecutor<'e>>(
    executor: E,
    organization_id: Uuid,
    lot_id: Uuid,
    lock: RowLock,
) -> AppResult<Lot> {
    let lock_clause = match lock {
        RowLock::None => "",
        RowLock::ForUpdate => "FOR UPDATE OF l",
    };
    let query = format!(
        r#"
        SELECT {}, s.organization_id
        FROM lots l
        JOIN buildings b ON b.id = l.building_id
        JOIN sites s ON s.id = b.site_id
        WHERE l.id = $1
        {}
        "#,
        LOT_COLUMNS, lock_clause
    );

    let row = sqlx::query_as::<_, ScopedLotRow>(&query)
        .bind(lot_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

    if row.organization_id != organization_id {
        return Err(AppError::Forbidden(
            "Lot belongs to another organization".to_string(),
        ));
    }
    let lot = Lot::try_from(row.lot)?;
    if lot.status == LotStatus::Deleted {
        return Err(AppError::NotFound("Lot".to_string()));
    }
    Ok(lot)
}

/// Check that a building exists and belongs to the caller's organization
pub async fn ensure_building<'e, E: PgExecutor<'e>>(
    executor: E,
    organization_id: Uuid,
    building_id: Uuid,
) -> AppResult<()> {
    let owner: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT s.organization_id
        FROM buildings b
        JOIN sites s ON s.id = b.site_id
        WHERE b.id = $1
        "#,
    )
    .bind(building_id)
    .fetch_optional(executor)
    .await?;

    match owner {
        None => Err(AppError::NotFound("Building".to_string())),
        Some(org) if org != organization_id => Err(AppError::Forbidden(
            "Building belongs to another organization".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// Check that every site id belongs to the caller's organization
pub async fn ensure_sites<'e, E: PgExecutor<'e>>(
    executor: E,
    organization_id: Uuid,
    site_ids: &[Uuid],
) -> AppResult<()> {
    let mut distinct = site_ids.to_vec();
    distinct.sort();
    distinct.dedup();

    let owned: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sites WHERE id = ANY($1) AND organization_id = $2",
    )
    .bind(&distinct)
    .bind(organization_id)
    .fetch_one(executor)
    .await?;

    if owned != distinct.len() as i64 {
        return Err(AppError::Forbidden(
            "One or more sites are not accessible".to_string(),
        ));
    }
    Ok(())
}
