//! In-memory [`BloodBankStore`] for tests.
//!
//! A unit of work holds the store's lock for its whole lifetime and edits a
//! private copy of the data. `commit` swaps the copy in; `rollback` or drop
//! throws it away. Units are therefore fully serialized, which is the
//! strongest isolation a real backend could offer.
//!
//! Faults can be armed per operation name to exercise rollback paths.

use bloodbank_core::{
    BloodBank, BloodBankError, BloodBankId, BloodBankStore, BloodDistribution, BloodRequest,
    DateTime, DistributionFilter, DistributionId, Facility, FacilityId, InventoryFilter,
    InventoryUnit, InventoryUnitId, RequestFilter, RequestGroupId, RequestId, RequestStatus,
    Result, ShipmentPhase, TrackScope, TrackState, UnitOfWork, User, UserId, Utc,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Every row the store holds. Row vectors keep insertion order.
#[derive(Clone, Debug, Default)]
pub struct StoreData {
    /// Users by id
    pub users: HashMap<UserId, User>,
    /// Facilities by id
    pub facilities: HashMap<FacilityId, Facility>,
    /// Blood banks by id
    pub blood_banks: HashMap<BloodBankId, BloodBank>,
    /// Requests
    pub requests: Vec<BloodRequest>,
    /// Distributions
    pub distributions: Vec<BloodDistribution>,
    /// Inventory units
    pub inventory: Vec<InventoryUnit>,
    /// Tracking entries
    pub track_states: Vec<TrackState>,
}

impl StoreData {
    /// Look up a request.
    #[must_use]
    pub fn request(&self, id: RequestId) -> Option<&BloodRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    /// Look up a distribution.
    #[must_use]
    pub fn distribution(&self, id: DistributionId) -> Option<&BloodDistribution> {
        self.distributions.iter().find(|d| d.id == id)
    }

    /// Look up an inventory unit.
    #[must_use]
    pub fn unit(&self, id: InventoryUnitId) -> Option<&InventoryUnit> {
        self.inventory.iter().find(|u| u.id == id)
    }

    /// Total stock held by a blood bank across all units.
    #[must_use]
    pub fn stock_of(&self, bank: BloodBankId) -> u32 {
        self.inventory
            .iter()
            .filter(|u| u.blood_bank_id == bank)
            .map(|u| u.quantity)
            .sum()
    }

    /// Trail entries attached to a distribution, in insertion order.
    #[must_use]
    pub fn trail_of(&self, id: DistributionId) -> Vec<&TrackState> {
        self.track_states
            .iter()
            .filter(|t| t.blood_distribution_id == Some(id))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Shared {
    data: Arc<AsyncMutex<StoreData>>,
    faults: Mutex<HashSet<String>>,
}

/// In-memory store.
///
/// Cloning yields another handle to the same data.
///
/// # Example
///
/// ```
/// use bloodbank_testing::InMemoryStore;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStore::new();
/// store.fail_on("commit");
/// assert!(store.snapshot().await.requests.is_empty());
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit the committed data directly.
    pub async fn seed<F>(&self, edit: F)
    where
        F: FnOnce(&mut StoreData),
    {
        let mut data = self.shared.data.lock().await;
        edit(&mut data);
    }

    /// Copy of the committed data.
    pub async fn snapshot(&self) -> StoreData {
        self.shared.data.lock().await.clone()
    }

    /// Make every later call to `operation` fail with a storage error.
    ///
    /// `operation` is a [`UnitOfWork`] method name such as
    /// `"insert_track_state"`, or `"begin"`.
    pub fn fail_on(&self, operation: &str) {
        self.faults().insert(operation.to_string());
    }

    /// Disarm every fault.
    pub fn clear_faults(&self) {
        self.faults().clear();
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.faults().contains(operation) {
            return Err(BloodBankError::Storage(format!(
                "injected failure in {operation}"
            )));
        }
        Ok(())
    }
}

impl BloodBankStore for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        self.check("begin")?;
        let guard = Arc::clone(&self.shared.data).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryUnitOfWork {
            store: self.clone(),
            guard,
            working,
        })
    }
}

/// Unit of work over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    store: InMemoryStore,
    guard: OwnedMutexGuard<StoreData>,
    working: StoreData,
}

fn missing(entity: &str, id: impl std::fmt::Display) -> BloodBankError {
    BloodBankError::Storage(format!("{entity} {id} does not exist"))
}

/// Newest first by `key`; equal keys go to the later insertion.
fn newest_first<T, K: Ord>(
    rows: impl DoubleEndedIterator<Item = T>,
    key: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().collect();
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

impl UnitOfWork for InMemoryUnitOfWork {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        self.store.check("get_user")?;
        Ok(self.working.users.get(&id).cloned())
    }

    async fn get_facility(&mut self, id: FacilityId) -> Result<Option<Facility>> {
        self.store.check("get_facility")?;
        Ok(self.working.facilities.get(&id).cloned())
    }

    async fn find_missing_facilities(&mut self, ids: &[FacilityId]) -> Result<Vec<FacilityId>> {
        self.store.check("find_missing_facilities")?;
        Ok(ids
            .iter()
            .filter(|id| !self.working.facilities.contains_key(id))
            .copied()
            .collect())
    }

    async fn get_blood_bank(&mut self, id: BloodBankId) -> Result<Option<BloodBank>> {
        self.store.check("get_blood_bank")?;
        Ok(self.working.blood_banks.get(&id).cloned())
    }

    async fn insert_request(&mut self, request: &BloodRequest) -> Result<()> {
        self.store.check("insert_request")?;
        self.working.requests.push(request.clone());
        Ok(())
    }

    async fn get_request(&mut self, id: RequestId) -> Result<Option<BloodRequest>> {
        self.store.check("get_request")?;
        Ok(self.working.request(id).cloned())
    }

    async fn update_request(&mut self, request: &BloodRequest) -> Result<()> {
        self.store.check("update_request")?;
        let row = self
            .working
            .requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| missing("request", request.id))?;
        *row = request.clone();
        Ok(())
    }

    async fn delete_request(&mut self, id: RequestId) -> Result<()> {
        self.store.check("delete_request")?;
        let data = &mut self.working;
        data.requests.retain(|r| r.id != id);
        data.distributions.retain(|d| d.request_id != Some(id));
        data.track_states.retain(|t| t.blood_request_id != id);
        Ok(())
    }

    async fn list_requests(&mut self, filter: &RequestFilter) -> Result<Vec<BloodRequest>> {
        self.store.check("list_requests")?;
        Ok(newest_first(
            self.working
                .requests
                .iter()
                .filter(|r| filter.matches(r))
                .cloned(),
            |r| r.created_at,
        ))
    }

    async fn cancel_group_siblings(
        &mut self,
        group: RequestGroupId,
        keep: RequestId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<RequestId>> {
        self.store.check("cancel_group_siblings")?;
        let delivered: HashSet<RequestId> = self
            .working
            .distributions
            .iter()
            .filter(|d| d.status == ShipmentPhase::Delivered)
            .filter_map(|d| d.request_id)
            .collect();

        let mut cancelled = Vec::new();
        for request in &mut self.working.requests {
            if request.request_group_id == group
                && request.id != keep
                && request.request_status.is_open()
                && !delivered.contains(&request.id)
            {
                request.request_status = RequestStatus::Cancelled;
                request.cancellation_reason = Some(reason.to_string());
                request.updated_at = at;
                cancelled.push(request.id);
            }
        }
        Ok(cancelled)
    }

    async fn insert_distribution(&mut self, distribution: &BloodDistribution) -> Result<()> {
        self.store.check("insert_distribution")?;
        if self
            .working
            .distributions
            .iter()
            .any(|d| d.tracking_number == distribution.tracking_number)
        {
            return Err(BloodBankError::Storage(format!(
                "duplicate tracking number {}",
                distribution.tracking_number
            )));
        }
        self.working.distributions.push(distribution.clone());
        Ok(())
    }

    async fn get_distribution(&mut self, id: DistributionId) -> Result<Option<BloodDistribution>> {
        self.store.check("get_distribution")?;
        Ok(self.working.distribution(id).cloned())
    }

    async fn find_distribution_by_tracking_number(
        &mut self,
        tracking_number: &str,
    ) -> Result<Option<BloodDistribution>> {
        self.store.check("find_distribution_by_tracking_number")?;
        Ok(self
            .working
            .distributions
            .iter()
            .find(|d| d.tracking_number == tracking_number)
            .cloned())
    }

    async fn update_distribution(&mut self, distribution: &BloodDistribution) -> Result<()> {
        self.store.check("update_distribution")?;
        let row = self
            .working
            .distributions
            .iter_mut()
            .find(|d| d.id == distribution.id)
            .ok_or_else(|| missing("distribution", distribution.id))?;
        *row = distribution.clone();
        Ok(())
    }

    async fn delete_distribution(&mut self, id: DistributionId) -> Result<()> {
        self.store.check("delete_distribution")?;
        let data = &mut self.working;
        data.distributions.retain(|d| d.id != id);
        data.track_states
            .retain(|t| t.blood_distribution_id != Some(id));
        Ok(())
    }

    async fn list_distributions(
        &mut self,
        filter: &DistributionFilter,
    ) -> Result<Vec<BloodDistribution>> {
        self.store.check("list_distributions")?;
        Ok(newest_first(
            self.working
                .distributions
                .iter()
                .filter(|d| filter.matches(d))
                .cloned(),
            |d| d.created_at,
        ))
    }

    async fn get_inventory_unit(&mut self, id: InventoryUnitId) -> Result<Option<InventoryUnit>> {
        self.store.check("get_inventory_unit")?;
        Ok(self.working.unit(id).cloned())
    }

    async fn find_inventory_units(&mut self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>> {
        self.store.check("find_inventory_units")?;
        let mut units: Vec<InventoryUnit> = self
            .working
            .inventory
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        units.sort_by_key(|u| u.expiry_date);
        Ok(units)
    }

    async fn insert_inventory_unit(&mut self, unit: &InventoryUnit) -> Result<()> {
        self.store.check("insert_inventory_unit")?;
        self.working.inventory.push(unit.clone());
        Ok(())
    }

    async fn set_inventory_quantity(
        &mut self,
        id: InventoryUnitId,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.store.check("set_inventory_quantity")?;
        let unit = self
            .working
            .inventory
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| missing("inventory unit", id))?;
        unit.quantity = quantity;
        unit.updated_at = at;
        Ok(())
    }

    async fn insert_track_state(&mut self, entry: &TrackState) -> Result<()> {
        self.store.check("insert_track_state")?;
        self.working.track_states.push(entry.clone());
        Ok(())
    }

    async fn list_track_states(&mut self, scope: TrackScope) -> Result<Vec<TrackState>> {
        self.store.check("list_track_states")?;
        let rows = self.working.track_states.iter().filter(|t| match scope {
            TrackScope::Request(id) => t.blood_request_id == id,
            TrackScope::Distribution(id) => t.blood_distribution_id == Some(id),
        });
        Ok(newest_first(rows.cloned(), |t| t.timestamp))
    }

    async fn commit(self) -> Result<()> {
        self.store.check("commit")?;
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
