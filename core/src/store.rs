//! Persistence ports.
//!
//! The lifecycle never talks to a database directly. Every service call opens
//! exactly one [`UnitOfWork`] through a [`BloodBankStore`], performs all of its
//! reads and writes through it, and commits once at the end. Dropping a unit of
//! work without committing discards every write made through it.
//!
//! ```text
//! BloodBankStore::begin()
//!        │
//!        ▼
//!   UnitOfWork ──► reads / writes ──► commit()   (all or nothing)
//!        │
//!        └────────► drop / rollback() (nothing persisted)
//! ```

use crate::blood::{BloodProduct, BloodType};
use crate::directory::{BloodBank, Facility, User};
use crate::distribution::{BloodDistribution, ShipmentPhase};
use crate::error::Result;
use crate::ids::{
    BloodBankId, DistributionId, FacilityId, InventoryUnitId, RequestGroupId, RequestId, UserId,
};
use crate::inventory::InventoryUnit;
use crate::request::{BloodRequest, ProcessingStatus, RequestStatus};
use crate::tracking::{TrackScope, TrackState};
use chrono::{DateTime, NaiveDate, Utc};

/// Predicate for [`UnitOfWork::list_requests`]. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestFilter {
    /// Requests made by this user
    pub requester: Option<UserId>,
    /// Requests in this group
    pub group: Option<RequestGroupId>,
    /// Requests addressed to this facility
    pub facility: Option<FacilityId>,
    /// Requests made on behalf of this facility
    pub source_facility: Option<FacilityId>,
    /// Requests in this status
    pub status: Option<RequestStatus>,
    /// Requests whose shipments are at this stage
    pub processing_status: Option<ProcessingStatus>,
    /// Requests addressed to or made on behalf of this facility
    pub involving: Option<FacilityId>,
    /// Leave out cancelled requests
    pub exclude_cancelled: bool,
}

/// Which side of a request a facility is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FacilityDirection {
    /// Requests addressed to the facility
    Received,
    /// Requests the facility made
    Sent,
    /// Either side
    #[default]
    All,
}

impl RequestFilter {
    /// Every request in a group.
    #[must_use]
    pub fn group(group: RequestGroupId) -> Self {
        Self {
            group: Some(group),
            ..Self::default()
        }
    }

    /// Every request made by a user.
    #[must_use]
    pub fn requester(requester: UserId) -> Self {
        Self {
            requester: Some(requester),
            ..Self::default()
        }
    }

    /// Requests on one side of a facility. Cancelled requests are left out
    /// unless the caller asks for them by status.
    #[must_use]
    pub fn facility(
        facility: FacilityId,
        direction: FacilityDirection,
        status: Option<RequestStatus>,
        processing_status: Option<ProcessingStatus>,
    ) -> Self {
        let mut filter = Self {
            status,
            processing_status,
            exclude_cancelled: status.is_none(),
            ..Self::default()
        };
        match direction {
            FacilityDirection::Received => filter.facility = Some(facility),
            FacilityDirection::Sent => filter.source_facility = Some(facility),
            FacilityDirection::All => filter.involving = Some(facility),
        }
        filter
    }

    /// Every request made on behalf of `from` and addressed to `to`.
    #[must_use]
    pub fn between(from: FacilityId, to: FacilityId) -> Self {
        Self {
            source_facility: Some(from),
            facility: Some(to),
            ..Self::default()
        }
    }

    /// Whether a request satisfies the predicate.
    #[must_use]
    pub fn matches(&self, request: &BloodRequest) -> bool {
        self.requester.is_none_or(|id| request.requester_id == id)
            && self.group.is_none_or(|id| request.request_group_id == id)
            && self.facility.is_none_or(|id| request.facility_id == id)
            && self
                .source_facility
                .is_none_or(|id| request.source_facility_id == id)
            && self.status.is_none_or(|s| request.request_status == s)
            && self
                .processing_status
                .is_none_or(|s| request.processing_status == s)
            && self.involving.is_none_or(|id| {
                request.facility_id == id || request.source_facility_id == id
            })
            && !(self.exclude_cancelled && request.request_status == RequestStatus::Cancelled)
    }
}

/// Predicate for [`UnitOfWork::list_distributions`]. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributionFilter {
    /// Shipments fulfilling this request
    pub request: Option<RequestId>,
    /// Shipments issued by this blood bank
    pub blood_bank: Option<BloodBankId>,
    /// Shipments addressed to this facility
    pub facility: Option<FacilityId>,
    /// Shipments in any of these phases (empty matches all)
    pub statuses: Vec<ShipmentPhase>,
    /// Shipments whose expiry date is on or before this day
    pub expiring_on_or_before: Option<NaiveDate>,
    /// Shipments created at or after this instant
    pub created_since: Option<DateTime<Utc>>,
}

impl DistributionFilter {
    /// Every shipment fulfilling a request.
    #[must_use]
    pub fn request(request: RequestId) -> Self {
        Self {
            request: Some(request),
            ..Self::default()
        }
    }

    /// Whether a distribution satisfies the predicate.
    #[must_use]
    pub fn matches(&self, distribution: &BloodDistribution) -> bool {
        self.request
            .is_none_or(|id| distribution.request_id == Some(id))
            && self
                .blood_bank
                .is_none_or(|id| distribution.dispatched_from_id == id)
            && self
                .facility
                .is_none_or(|id| distribution.dispatched_to_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&distribution.status))
            && self.expiring_on_or_before.is_none_or(|day| {
                distribution
                    .expiry_date
                    .is_some_and(|expiry| expiry <= day)
            })
            && self
                .created_since
                .is_none_or(|since| distribution.created_at >= since)
    }
}

/// Predicate for [`UnitOfWork::find_inventory_units`]. Unset fields match everything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryFilter {
    /// Owning blood bank
    pub blood_bank: BloodBankId,
    /// Product, compared case-insensitively
    pub product: Option<BloodProduct>,
    /// Blood group
    pub blood_type: Option<BloodType>,
    /// Units holding at least this many
    pub min_quantity: u32,
    /// Units still usable on this day
    pub not_expired_on: Option<NaiveDate>,
}

impl InventoryFilter {
    /// Whether a unit satisfies the predicate.
    #[must_use]
    pub fn matches(&self, unit: &InventoryUnit) -> bool {
        unit.blood_bank_id == self.blood_bank
            && self
                .product
                .as_ref()
                .is_none_or(|p| unit.blood_product.matches(p))
            && self.blood_type.is_none_or(|t| unit.blood_type == t)
            && unit.quantity >= self.min_quantity
            && self.not_expired_on.is_none_or(|day| unit.is_usable_on(day))
    }
}

/// Factory for units of work.
pub trait BloodBankStore: Send + Sync {
    /// The unit-of-work type handed out by this store.
    type Tx: UnitOfWork;

    /// Open a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BloodBankError::Storage`] if the backend cannot start a transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// One atomic batch of reads and writes.
///
/// Reads observe the unit's own uncommitted writes. All methods return
/// [`crate::BloodBankError::Storage`] on backend failure; lookups return
/// `Ok(None)` rather than `NotFound` so callers decide how to report absence.
pub trait UnitOfWork: Send {
    // ═══════════════════════════════════════════════════════════════════════
    // Directory
    // ═══════════════════════════════════════════════════════════════════════

    /// Load a user.
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Load a facility.
    async fn get_facility(&mut self, id: FacilityId) -> Result<Option<Facility>>;

    /// Return the ids from `ids` that do not name an existing facility, in input order.
    async fn find_missing_facilities(&mut self, ids: &[FacilityId]) -> Result<Vec<FacilityId>>;

    /// Load a blood bank.
    async fn get_blood_bank(&mut self, id: BloodBankId) -> Result<Option<BloodBank>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Requests
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a new request.
    async fn insert_request(&mut self, request: &BloodRequest) -> Result<()>;

    /// Load a request.
    async fn get_request(&mut self, id: RequestId) -> Result<Option<BloodRequest>>;

    /// Overwrite an existing request.
    async fn update_request(&mut self, request: &BloodRequest) -> Result<()>;

    /// Delete a request together with its distributions and track states.
    async fn delete_request(&mut self, id: RequestId) -> Result<()>;

    /// List requests, newest first.
    async fn list_requests(&mut self, filter: &RequestFilter) -> Result<Vec<BloodRequest>>;

    /// Cancel every open sibling of `keep` in one conditional update.
    ///
    /// Affects requests of `group` other than `keep` whose status is pending or
    /// accepted and that own no delivered distribution. Returns the ids changed.
    async fn cancel_group_siblings(
        &mut self,
        group: RequestGroupId,
        keep: RequestId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<RequestId>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Distributions
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a new distribution.
    async fn insert_distribution(&mut self, distribution: &BloodDistribution) -> Result<()>;

    /// Load a distribution.
    async fn get_distribution(&mut self, id: DistributionId) -> Result<Option<BloodDistribution>>;

    /// Load a distribution by its tracking number.
    async fn find_distribution_by_tracking_number(
        &mut self,
        tracking_number: &str,
    ) -> Result<Option<BloodDistribution>>;

    /// Overwrite an existing distribution.
    async fn update_distribution(&mut self, distribution: &BloodDistribution) -> Result<()>;

    /// Delete a distribution together with its track states.
    async fn delete_distribution(&mut self, id: DistributionId) -> Result<()>;

    /// List distributions, newest first.
    async fn list_distributions(
        &mut self,
        filter: &DistributionFilter,
    ) -> Result<Vec<BloodDistribution>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Inventory
    // ═══════════════════════════════════════════════════════════════════════

    /// Load an inventory unit.
    async fn get_inventory_unit(&mut self, id: InventoryUnitId) -> Result<Option<InventoryUnit>>;

    /// List matching units, earliest expiry first.
    async fn find_inventory_units(&mut self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>>;

    /// Insert a new inventory unit.
    async fn insert_inventory_unit(&mut self, unit: &InventoryUnit) -> Result<()>;

    /// Set the quantity of an existing unit.
    async fn set_inventory_quantity(
        &mut self,
        id: InventoryUnitId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<()>;

    // ═══════════════════════════════════════════════════════════════════════
    // Tracking
    // ═══════════════════════════════════════════════════════════════════════

    /// Append a tracking entry.
    async fn insert_track_state(&mut self, entry: &TrackState) -> Result<()>;

    /// List tracking entries, newest first; ties go to the later insertion.
    async fn list_track_states(&mut self, scope: TrackScope) -> Result<Vec<TrackState>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Completion
    // ═══════════════════════════════════════════════════════════════════════

    /// Persist every write made through this unit.
    async fn commit(self) -> Result<()>;

    /// Discard every write made through this unit.
    async fn rollback(self) -> Result<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::request::Priority;

    fn request(requester: UserId, group: RequestGroupId) -> BloodRequest {
        let now = Utc::now();
        BloodRequest {
            id: RequestId::new(),
            request_group_id: group,
            is_master_request: false,
            requester_id: requester,
            fulfilled_by_id: None,
            facility_id: FacilityId::new(),
            source_facility_id: FacilityId::new(),
            blood_type: BloodType::OPositive,
            blood_product: BloodProduct::new("Whole Blood").expect("valid product"),
            quantity_requested: 1,
            request_status: RequestStatus::Pending,
            processing_status: ProcessingStatus::Pending,
            priority: Priority::NotUrgent,
            notes: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_request_filter_matches_everything() {
        let r = request(UserId::new(), RequestGroupId::new());
        assert!(RequestFilter::default().matches(&r));
    }

    #[test]
    fn request_filter_combines_fields() {
        let user = UserId::new();
        let group = RequestGroupId::new();
        let r = request(user, group);
        assert!(RequestFilter::group(group).matches(&r));
        assert!(RequestFilter::requester(user).matches(&r));
        assert!(!RequestFilter::group(RequestGroupId::new()).matches(&r));
        let filter = RequestFilter {
            requester: Some(user),
            status: Some(RequestStatus::Accepted),
            ..RequestFilter::default()
        };
        assert!(!filter.matches(&r));
    }

    #[test]
    fn facility_filter_picks_the_side() {
        let mut r = request(UserId::new(), RequestGroupId::new());
        let (supplier, ward) = (r.facility_id, r.source_facility_id);

        let received = RequestFilter::facility(supplier, FacilityDirection::Received, None, None);
        let sent = RequestFilter::facility(supplier, FacilityDirection::Sent, None, None);
        let either = RequestFilter::facility(ward, FacilityDirection::All, None, None);
        assert!(received.matches(&r));
        assert!(!sent.matches(&r));
        assert!(either.matches(&r));
        assert!(RequestFilter::between(ward, supplier).matches(&r));
        assert!(!RequestFilter::between(supplier, ward).matches(&r));

        r.request_status = RequestStatus::Cancelled;
        assert!(!received.matches(&r));
        let cancelled = RequestFilter::facility(
            supplier,
            FacilityDirection::Received,
            Some(RequestStatus::Cancelled),
            None,
        );
        assert!(cancelled.matches(&r));
    }

    #[test]
    fn processing_status_narrows_the_facility_filter() {
        let r = request(UserId::new(), RequestGroupId::new());
        let dispatched = RequestFilter::facility(
            r.facility_id,
            FacilityDirection::Received,
            None,
            Some(ProcessingStatus::Dispatched),
        );
        assert!(!dispatched.matches(&r));
        let pending = RequestFilter::facility(
            r.facility_id,
            FacilityDirection::Received,
            None,
            Some(ProcessingStatus::Pending),
        );
        assert!(pending.matches(&r));
    }
}
