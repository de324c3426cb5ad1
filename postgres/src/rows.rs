//! Row decoding.
//!
//! Enums are stored as their `as_str` text and quantities as `BIGINT`.
//! A row that no longer decodes is reported as a storage failure.

use bloodbank_core::{
    BloodBank, BloodBankError, BloodBankId, BloodDistribution, BloodProduct, BloodRequest,
    BloodType, DistributionId, Facility, FacilityId, InventoryUnit, InventoryUnitId, Priority,
    ProcessingStatus, RequestGroupId, RequestId, RequestStatus, Result, ShipmentPhase, TrackLabel,
    TrackState, TrackStateId, User, UserId,
};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Decode, Row, Type};
use uuid::Uuid;

macro_rules! request_columns {
    () => {
        "id, request_group_id, is_master_request, requester_id, fulfilled_by_id, \
         facility_id, source_facility_id, blood_type, blood_product, quantity_requested, \
         request_status, processing_status, priority, notes, cancellation_reason, \
         created_at, updated_at"
    };
}

macro_rules! distribution_columns {
    () => {
        "id, tracking_number, batch_number, blood_product, blood_type, quantity, status, \
         date_dispatched, date_delivered, expiry_date, temperature_maintained, \
         dispatched_from_id, dispatched_to_id, inventory_unit_id, request_id, \
         created_by_id, notes, created_at, updated_at"
    };
}

macro_rules! inventory_columns {
    () => {
        "id, blood_bank_id, blood_product, blood_type, quantity, expiry_date, added_by_id, \
         created_at, updated_at"
    };
}

macro_rules! track_columns {
    () => {
        "id, blood_request_id, blood_distribution_id, status, location, notes, timestamp, \
         created_by_id"
    };
}

pub(crate) use {distribution_columns, inventory_columns, request_columns, track_columns};

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| BloodBankError::Storage(format!("Failed to decode {name}: {e}")))
}

fn quantity(row: &PgRow, name: &str) -> Result<u32> {
    let value: i64 = column(row, name)?;
    u32::try_from(value)
        .map_err(|_| BloodBankError::Storage(format!("{name} out of range: {value}")))
}

fn corrupt(e: BloodBankError) -> BloodBankError {
    BloodBankError::Storage(format!("Corrupt row: {e}"))
}

fn blood_type(row: &PgRow) -> Result<BloodType> {
    BloodType::parse(&column::<String>(row, "blood_type")?).map_err(corrupt)
}

fn blood_product(row: &PgRow) -> Result<BloodProduct> {
    BloodProduct::new(column::<String>(row, "blood_product")?).map_err(corrupt)
}

pub(crate) fn facility(row: &PgRow) -> Result<Facility> {
    Ok(Facility {
        id: FacilityId::from_uuid(column(row, "id")?),
        facility_name: column(row, "facility_name")?,
    })
}

pub(crate) fn blood_bank(row: &PgRow) -> Result<BloodBank> {
    Ok(BloodBank {
        id: BloodBankId::from_uuid(column(row, "id")?),
        facility_id: FacilityId::from_uuid(column(row, "facility_id")?),
        blood_bank_name: column(row, "blood_bank_name")?,
    })
}

pub(crate) fn user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(column(row, "id")?),
        facility_id: column::<Option<Uuid>>(row, "facility_id")?.map(FacilityId::from_uuid),
        name: column(row, "name")?,
    })
}

pub(crate) fn request(row: &PgRow) -> Result<BloodRequest> {
    Ok(BloodRequest {
        id: RequestId::from_uuid(column(row, "id")?),
        request_group_id: RequestGroupId::from_uuid(column(row, "request_group_id")?),
        is_master_request: column(row, "is_master_request")?,
        requester_id: UserId::from_uuid(column(row, "requester_id")?),
        fulfilled_by_id: column::<Option<Uuid>>(row, "fulfilled_by_id")?.map(UserId::from_uuid),
        facility_id: FacilityId::from_uuid(column(row, "facility_id")?),
        source_facility_id: FacilityId::from_uuid(column(row, "source_facility_id")?),
        blood_type: blood_type(row)?,
        blood_product: blood_product(row)?,
        quantity_requested: quantity(row, "quantity_requested")?,
        request_status: RequestStatus::parse(&column::<String>(row, "request_status")?)
            .map_err(corrupt)?,
        processing_status: ProcessingStatus::parse(&column::<String>(row, "processing_status")?)
            .map_err(corrupt)?,
        priority: Priority::parse(&column::<String>(row, "priority")?).map_err(corrupt)?,
        notes: column(row, "notes")?,
        cancellation_reason: column(row, "cancellation_reason")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) fn distribution(row: &PgRow) -> Result<BloodDistribution> {
    Ok(BloodDistribution {
        id: DistributionId::from_uuid(column(row, "id")?),
        tracking_number: column(row, "tracking_number")?,
        batch_number: column(row, "batch_number")?,
        blood_product: blood_product(row)?,
        blood_type: blood_type(row)?,
        quantity: quantity(row, "quantity")?,
        status: ShipmentPhase::parse(&column::<String>(row, "status")?).map_err(corrupt)?,
        date_dispatched: column(row, "date_dispatched")?,
        date_delivered: column(row, "date_delivered")?,
        expiry_date: column(row, "expiry_date")?,
        temperature_maintained: column(row, "temperature_maintained")?,
        dispatched_from_id: BloodBankId::from_uuid(column(row, "dispatched_from_id")?),
        dispatched_to_id: FacilityId::from_uuid(column(row, "dispatched_to_id")?),
        inventory_unit_id: column::<Option<Uuid>>(row, "inventory_unit_id")?
            .map(InventoryUnitId::from_uuid),
        request_id: column::<Option<Uuid>>(row, "request_id")?.map(RequestId::from_uuid),
        created_by_id: UserId::from_uuid(column(row, "created_by_id")?),
        notes: column(row, "notes")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) fn inventory_unit(row: &PgRow) -> Result<InventoryUnit> {
    Ok(InventoryUnit {
        id: InventoryUnitId::from_uuid(column(row, "id")?),
        blood_bank_id: BloodBankId::from_uuid(column(row, "blood_bank_id")?),
        blood_product: blood_product(row)?,
        blood_type: blood_type(row)?,
        quantity: quantity(row, "quantity")?,
        expiry_date: column(row, "expiry_date")?,
        added_by_id: column::<Option<Uuid>>(row, "added_by_id")?.map(UserId::from_uuid),
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) fn track_state(row: &PgRow) -> Result<TrackState> {
    let label: String = column(row, "status")?;
    let status = TrackLabel::parse(&label)
        .ok_or_else(|| BloodBankError::Storage(format!("Corrupt row: unknown track label {label}")))?;
    Ok(TrackState {
        id: TrackStateId::from_uuid(column(row, "id")?),
        blood_request_id: RequestId::from_uuid(column(row, "blood_request_id")?),
        blood_distribution_id: column::<Option<Uuid>>(row, "blood_distribution_id")?
            .map(DistributionId::from_uuid),
        status,
        location: column(row, "location")?,
        notes: column(row, "notes")?,
        timestamp: column(row, "timestamp")?,
        created_by_id: UserId::from_uuid(column(row, "created_by_id")?),
    })
}
