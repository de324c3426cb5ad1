//! One database transaction per unit of work.

use crate::rows::{
    self, distribution_columns, inventory_columns, request_columns, track_columns,
};
use bloodbank_core::{
    BloodBank, BloodBankError, BloodBankId, BloodDistribution, BloodRequest, DateTime,
    DistributionFilter, DistributionId, Facility, FacilityId, InventoryFilter, InventoryUnit,
    InventoryUnitId, ProcessingStatus, RequestFilter, RequestGroupId, RequestId, RequestStatus,
    Result, ShipmentPhase, TrackScope, TrackState, UnitOfWork, User, UserId, Utc,
};
use sqlx::postgres::Postgres;
use sqlx::{Row, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> BloodBankError {
    move |e| BloodBankError::Storage(format!("{context}: {e}"))
}

fn missing(entity: &str, id: impl std::fmt::Display) -> BloodBankError {
    BloodBankError::Storage(format!("{entity} {id} does not exist"))
}

/// A unit of work over one `PostgreSQL` transaction.
///
/// Dropping it without calling [`UnitOfWork::commit`] rolls the transaction back.
/// Inventory reads take row locks so concurrent reservations against the same
/// unit serialize.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PostgresUnitOfWork {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

impl std::fmt::Debug for PostgresUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresUnitOfWork").finish_non_exhaustive()
    }
}

impl UnitOfWork for PostgresUnitOfWork {
    // ═══════════════════════════════════════════════════════════════════════
    // Directory
    // ═══════════════════════════════════════════════════════════════════════

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, facility_id, name FROM users WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("Failed to get user"))?;
        row.as_ref().map(rows::user).transpose()
    }

    async fn get_facility(&mut self, id: FacilityId) -> Result<Option<Facility>> {
        let row = sqlx::query("SELECT id, facility_name FROM facilities WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("Failed to get facility"))?;
        row.as_ref().map(rows::facility).transpose()
    }

    async fn find_missing_facilities(&mut self, ids: &[FacilityId]) -> Result<Vec<FacilityId>> {
        let wanted: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let found = sqlx::query("SELECT id FROM facilities WHERE id = ANY($1)")
            .bind(&wanted)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage("Failed to look up facilities"))?;
        let found: HashSet<Uuid> = found
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<std::result::Result<_, _>>()
            .map_err(storage("Failed to decode facility id"))?;
        Ok(ids
            .iter()
            .filter(|id| !found.contains(id.as_uuid()))
            .copied()
            .collect())
    }

    async fn get_blood_bank(&mut self, id: BloodBankId) -> Result<Option<BloodBank>> {
        let row =
            sqlx::query("SELECT id, facility_id, blood_bank_name FROM blood_banks WHERE id = $1")
                .bind(*id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(storage("Failed to get blood bank"))?;
        row.as_ref().map(rows::blood_bank).transpose()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Requests
    // ═══════════════════════════════════════════════════════════════════════

    async fn insert_request(&mut self, request: &BloodRequest) -> Result<()> {
        sqlx::query(concat!(
            "INSERT INTO blood_requests (",
            request_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(*request.id.as_uuid())
        .bind(*request.request_group_id.as_uuid())
        .bind(request.is_master_request)
        .bind(*request.requester_id.as_uuid())
        .bind(request.fulfilled_by_id.map(|id| *id.as_uuid()))
        .bind(*request.facility_id.as_uuid())
        .bind(*request.source_facility_id.as_uuid())
        .bind(request.blood_type.as_str())
        .bind(request.blood_product.as_str())
        .bind(i64::from(request.quantity_requested))
        .bind(request.request_status.as_str())
        .bind(request.processing_status.as_str())
        .bind(request.priority.as_str())
        .bind(request.notes.as_deref())
        .bind(request.cancellation_reason.as_deref())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("Failed to insert request"))?;
        Ok(())
    }

    async fn get_request(&mut self, id: RequestId) -> Result<Option<BloodRequest>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            request_columns!(),
            " FROM blood_requests WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("Failed to get request"))?;
        row.as_ref().map(rows::request).transpose()
    }

    async fn update_request(&mut self, request: &BloodRequest) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE blood_requests
            SET fulfilled_by_id = $2,
                request_status = $3,
                processing_status = $4,
                priority = $5,
                notes = $6,
                cancellation_reason = $7,
                updated_at = $8
            WHERE id = $1
            ",
        )
        .bind(*request.id.as_uuid())
        .bind(request.fulfilled_by_id.map(|id| *id.as_uuid()))
        .bind(request.request_status.as_str())
        .bind(request.processing_status.as_str())
        .bind(request.priority.as_str())
        .bind(request.notes.as_deref())
        .bind(request.cancellation_reason.as_deref())
        .bind(request.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("Failed to update request"))?;
        if result.rows_affected() == 0 {
            return Err(missing("request", request.id));
        }
        Ok(())
    }

    async fn delete_request(&mut self, id: RequestId) -> Result<()> {
        // Distributions and track states go with it (ON DELETE CASCADE).
        sqlx::query("DELETE FROM blood_requests WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(storage("Failed to delete request"))?;
        Ok(())
    }

    async fn list_requests(&mut self, filter: &RequestFilter) -> Result<Vec<BloodRequest>> {
        let found = sqlx::query(concat!(
            "SELECT ",
            request_columns!(),
            r"
            FROM blood_requests
            WHERE ($1::uuid IS NULL OR requester_id = $1)
              AND ($2::uuid IS NULL OR request_group_id = $2)
              AND ($3::uuid IS NULL OR facility_id = $3)
              AND ($4::uuid IS NULL OR source_facility_id = $4)
              AND ($5::text IS NULL OR request_status = $5)
              AND ($6::text IS NULL OR processing_status = $6)
              AND ($7::uuid IS NULL OR facility_id = $7 OR source_facility_id = $7)
              AND (NOT $8 OR request_status <> 'cancelled')
            ORDER BY created_at DESC, seq DESC
            "
        ))
        .bind(filter.requester.map(|id| *id.as_uuid()))
        .bind(filter.group.map(|id| *id.as_uuid()))
        .bind(filter.facility.map(|id| *id.as_uuid()))
        .bind(filter.source_facility.map(|id| *id.as_uuid()))
        .bind(filter.status.as_ref().map(RequestStatus::as_str))
        .bind(filter.processing_status.as_ref().map(ProcessingStatus::as_str))
        .bind(filter.involving.map(|id| *id.as_uuid()))
        .bind(filter.exclude_cancelled)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("Failed to list requests"))?;
        found.iter().map(rows::request).collect()
    }

    async fn cancel_group_siblings(
        &mut self,
        group: RequestGroupId,
        keep: RequestId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<RequestId>> {
        let cancelled = sqlx::query(
            r"
            WITH cancelled AS (
                UPDATE blood_requests r
                SET request_status = 'cancelled',
                    cancellation_reason = $3,
                    updated_at = $4
                WHERE r.request_group_id = $1
                  AND r.id <> $2
                  AND r.request_status IN ('pending', 'accepted')
                  AND NOT EXISTS (
                      SELECT 1 FROM blood_distributions d
                      WHERE d.request_id = r.id AND d.status = 'delivered'
                  )
                RETURNING r.id, r.seq
            )
            SELECT id FROM cancelled ORDER BY seq
            ",
        )
        .bind(*group.as_uuid())
        .bind(*keep.as_uuid())
        .bind(reason)
        .bind(at)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("Failed to cancel sibling requests"))?;
        cancelled
            .iter()
            .map(|row| row.try_get("id").map(RequestId::from_uuid))
            .collect::<std::result::Result<_, _>>()
            .map_err(storage("Failed to decode request id"))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Distributions
    // ═══════════════════════════════════════════════════════════════════════

    async fn insert_distribution(&mut self, distribution: &BloodDistribution) -> Result<()> {
        sqlx::query(concat!(
            "INSERT INTO blood_distributions (",
            distribution_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
        ))
        .bind(*distribution.id.as_uuid())
        .bind(&distribution.tracking_number)
        .bind(&distribution.batch_number)
        .bind(distribution.blood_product.as_str())
        .bind(distribution.blood_type.as_str())
        .bind(i64::from(distribution.quantity))
        .bind(distribution.status.as_str())
        .bind(distribution.date_dispatched)
        .bind(distribution.date_delivered)
        .bind(distribution.expiry_date)
        .bind(distribution.temperature_maintained)
        .bind(*distribution.dispatched_from_id.as_uuid())
        .bind(*distribution.dispatched_to_id.as_uuid())
        .bind(distribution.inventory_unit_id.map(|id| *id.as_uuid()))
        .bind(distribution.request_id.map(|id| *id.as_uuid()))
        .bind(*distribution.created_by_id.as_uuid())
        .bind(distribution.notes.as_deref())
        .bind(distribution.created_at)
        .bind(distribution.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("Failed to insert distribution"))?;
        Ok(())
    }

    async fn get_distribution(&mut self, id: DistributionId) -> Result<Option<BloodDistribution>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            distribution_columns!(),
            " FROM blood_distributions WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("Failed to get distribution"))?;
        row.as_ref().map(rows::distribution).transpose()
    }

    async fn find_distribution_by_tracking_number(
        &mut self,
        tracking_number: &str,
    ) -> Result<Option<BloodDistribution>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            distribution_columns!(),
            " FROM blood_distributions WHERE tracking_number = $1"
        ))
        .bind(tracking_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("Failed to find distribution"))?;
        row.as_ref().map(rows::distribution).transpose()
    }

    async fn update_distribution(&mut self, distribution: &BloodDistribution) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE blood_distributions
            SET tracking_number = $2,
                batch_number = $3,
                status = $4,
                date_dispatched = $5,
                date_delivered = $6,
                expiry_date = $7,
                temperature_maintained = $8,
                inventory_unit_id = $9,
                notes = $10,
                updated_at = $11
            WHERE id = $1
            ",
        )
        .bind(*distribution.id.as_uuid())
        .bind(&distribution.tracking_number)
        .bind(&distribution.batch_number)
        .bind(distribution.status.as_str())
        .bind(distribution.date_dispatched)
        .bind(distribution.date_delivered)
        .bind(distribution.expiry_date)
        .bind(distribution.temperature_maintained)
        .bind(distribution.inventory_unit_id.map(|id| *id.as_uuid()))
        .bind(distribution.notes.as_deref())
        .bind(distribution.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("Failed to update distribution"))?;
        if result.rows_affected() == 0 {
            return Err(missing("distribution", distribution.id));
        }
        Ok(())
    }

    async fn delete_distribution(&mut self, id: DistributionId) -> Result<()> {
        sqlx::query("DELETE FROM blood_distributions WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(storage("Failed to delete distribution"))?;
        Ok(())
    }

    async fn list_distributions(
        &mut self,
        filter: &DistributionFilter,
    ) -> Result<Vec<BloodDistribution>> {
        let statuses: Vec<&str> = filter.statuses.iter().map(ShipmentPhase::as_str).collect();
        let found = sqlx::query(concat!(
            "SELECT ",
            distribution_columns!(),
            r"
            FROM blood_distributions
            WHERE ($1::uuid IS NULL OR request_id = $1)
              AND ($2::uuid IS NULL OR dispatched_from_id = $2)
              AND ($3::uuid IS NULL OR dispatched_to_id = $3)
              AND (cardinality($4::text[]) = 0 OR status = ANY($4))
              AND ($5::date IS NULL OR expiry_date <= $5)
              AND ($6::timestamptz IS NULL OR created_at >= $6)
            ORDER BY created_at DESC, seq DESC
            "
        ))
        .bind(filter.request.map(|id| *id.as_uuid()))
        .bind(filter.blood_bank.map(|id| *id.as_uuid()))
        .bind(filter.facility.map(|id| *id.as_uuid()))
        .bind(&statuses)
        .bind(filter.expiring_on_or_before)
        .bind(filter.created_since)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("Failed to list distributions"))?;
        found.iter().map(rows::distribution).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Inventory
    // ═══════════════════════════════════════════════════════════════════════

    async fn get_inventory_unit(&mut self, id: InventoryUnitId) -> Result<Option<InventoryUnit>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            inventory_columns!(),
            " FROM inventory_units WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("Failed to get inventory unit"))?;
        row.as_ref().map(rows::inventory_unit).transpose()
    }

    async fn find_inventory_units(&mut self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>> {
        let found = sqlx::query(concat!(
            "SELECT ",
            inventory_columns!(),
            r"
            FROM inventory_units
            WHERE blood_bank_id = $1
              AND ($2::text IS NULL OR LOWER(blood_product) = LOWER($2))
              AND ($3::text IS NULL OR blood_type = $3)
              AND quantity >= $4
              AND ($5::date IS NULL OR expiry_date > $5)
            ORDER BY expiry_date ASC, created_at ASC
            FOR UPDATE
            "
        ))
        .bind(*filter.blood_bank.as_uuid())
        .bind(filter.product.as_ref().map(|p| p.as_str()))
        .bind(filter.blood_type.as_ref().map(|t| t.as_str()))
        .bind(i64::from(filter.min_quantity))
        .bind(filter.not_expired_on)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("Failed to find inventory units"))?;
        found.iter().map(rows::inventory_unit).collect()
    }

    async fn insert_inventory_unit(&mut self, unit: &InventoryUnit) -> Result<()> {
        sqlx::query(concat!(
            "INSERT INTO inventory_units (",
            inventory_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(*unit.id.as_uuid())
        .bind(*unit.blood_bank_id.as_uuid())
        .bind(unit.blood_product.as_str())
        .bind(unit.blood_type.as_str())
        .bind(i64::from(unit.quantity))
        .bind(unit.expiry_date)
        .bind(unit.added_by_id.map(|id| *id.as_uuid()))
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("Failed to insert inventory unit"))?;
        Ok(())
    }

    async fn set_inventory_quantity(
        &mut self,
        id: InventoryUnitId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE inventory_units SET quantity = $2, updated_at = $3 WHERE id = $1")
                .bind(*id.as_uuid())
                .bind(i64::from(quantity))
                .bind(at)
                .execute(&mut *self.tx)
                .await
                .map_err(storage("Failed to update inventory quantity"))?;
        if result.rows_affected() == 0 {
            return Err(missing("inventory unit", id));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tracking
    // ═══════════════════════════════════════════════════════════════════════

    async fn insert_track_state(&mut self, entry: &TrackState) -> Result<()> {
        sqlx::query(concat!(
            "INSERT INTO track_states (",
            track_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(*entry.id.as_uuid())
        .bind(*entry.blood_request_id.as_uuid())
        .bind(entry.blood_distribution_id.map(|id| *id.as_uuid()))
        .bind(entry.status.as_str())
        .bind(entry.location.as_deref())
        .bind(entry.notes.as_deref())
        .bind(entry.timestamp)
        .bind(*entry.created_by_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(storage("Failed to insert track state"))?;
        Ok(())
    }

    async fn list_track_states(&mut self, scope: TrackScope) -> Result<Vec<TrackState>> {
        let query = match scope {
            TrackScope::Request(id) => sqlx::query(concat!(
                "SELECT ",
                track_columns!(),
                " FROM track_states WHERE blood_request_id = $1 ORDER BY timestamp DESC, seq DESC"
            ))
            .bind(*id.as_uuid()),
            TrackScope::Distribution(id) => sqlx::query(concat!(
                "SELECT ",
                track_columns!(),
                " FROM track_states WHERE blood_distribution_id = $1 ORDER BY timestamp DESC, seq DESC"
            ))
            .bind(*id.as_uuid()),
        };
        let found = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage("Failed to list track states"))?;
        found.iter().map(rows::track_state).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Completion
    // ═══════════════════════════════════════════════════════════════════════

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(storage("Failed to commit transaction"))?;
        metrics::counter!("bloodbank.store.commits").increment(1);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(storage("Failed to roll back transaction"))?;
        tracing::debug!("Unit of work rolled back");
        Ok(())
    }
}
