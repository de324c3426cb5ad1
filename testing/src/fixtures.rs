//! Seed data for lifecycle tests.

use crate::memory::InMemoryStore;
use crate::mocks::test_clock;
use bloodbank_core::{
    BloodBank, BloodBankId, BloodProduct, BloodType, Clock, DateTime, Facility, FacilityId,
    InventoryUnit, InventoryUnitId, NaiveDate, User, UserId, Utc,
};
use chrono::TimeDelta;

/// Product stocked by [`World::add_site`].
pub const DEFAULT_PRODUCT: &str = "Whole Blood";

/// Quantity stocked by [`World::add_site`].
pub const DEFAULT_STOCK: u32 = 50;

/// A facility with a blood bank, one staff member and one stock unit.
#[derive(Clone, Debug)]
pub struct Site {
    /// The facility
    pub facility: Facility,
    /// Its blood bank
    pub bank: BloodBank,
    /// A user working there
    pub staff: User,
    /// `O+` whole blood, expiring 60 days after the test clock's day
    pub stock: InventoryUnit,
}

/// Builder for store contents.
///
/// # Example
///
/// ```
/// use bloodbank_testing::World;
///
/// # tokio_test::block_on(async {
/// let world = World::new().await;
/// let general = world.add_site("General").await;
/// let data = world.store.snapshot().await;
/// assert_eq!(data.stock_of(general.bank.id), 50);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct World {
    /// The store being seeded
    pub store: InMemoryStore,
    now: DateTime<Utc>,
}

impl World {
    /// Empty world timed by [`test_clock`].
    pub async fn new() -> Self {
        Self::with_store(InMemoryStore::new()).await
    }

    /// Seed an existing store.
    pub async fn with_store(store: InMemoryStore) -> Self {
        Self {
            store,
            now: test_clock().now(),
        }
    }

    /// The day every fixture date is relative to.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// `today + days`.
    #[must_use]
    pub fn day(&self, days: i64) -> NaiveDate {
        self.today() + TimeDelta::days(days)
    }

    /// Add a facility without a blood bank.
    pub async fn add_facility(&self, name: &str) -> Facility {
        let facility = Facility {
            id: FacilityId::new(),
            facility_name: name.to_string(),
        };
        let row = facility.clone();
        self.store
            .seed(move |data| {
                data.facilities.insert(row.id, row);
            })
            .await;
        facility
    }

    /// Add a user, optionally attached to a facility.
    pub async fn add_user(&self, name: &str, facility: Option<FacilityId>) -> User {
        let user = User {
            id: UserId::new(),
            facility_id: facility,
            name: name.to_string(),
        };
        let row = user.clone();
        self.store
            .seed(move |data| {
                data.users.insert(row.id, row);
            })
            .await;
        user
    }

    /// Add a blood bank to a facility.
    pub async fn add_bank(&self, facility: &Facility, name: &str) -> BloodBank {
        let bank = BloodBank {
            id: BloodBankId::new(),
            facility_id: facility.id,
            blood_bank_name: name.to_string(),
        };
        let row = bank.clone();
        self.store
            .seed(move |data| {
                data.blood_banks.insert(row.id, row);
            })
            .await;
        bank
    }

    /// Add a stock unit to a blood bank.
    ///
    /// # Panics
    ///
    /// Panics if `product` is blank.
    #[allow(clippy::expect_used)]
    pub async fn add_stock(
        &self,
        bank: BloodBankId,
        product: &str,
        blood_type: BloodType,
        quantity: u32,
        expiry_date: NaiveDate,
    ) -> InventoryUnit {
        let unit = InventoryUnit {
            id: InventoryUnitId::new(),
            blood_bank_id: bank,
            blood_product: BloodProduct::new(product).expect("fixture product name"),
            blood_type,
            quantity,
            expiry_date,
            added_by_id: None,
            created_at: self.now,
            updated_at: self.now,
        };
        let row = unit.clone();
        self.store
            .seed(move |data| data.inventory.push(row))
            .await;
        unit
    }

    /// Add a full [`Site`] named `name`.
    pub async fn add_site(&self, name: &str) -> Site {
        let facility = self.add_facility(name).await;
        let bank = self.add_bank(&facility, &format!("{name} Blood Bank")).await;
        let staff = self
            .add_user(&format!("{name} staff"), Some(facility.id))
            .await;
        let stock = self
            .add_stock(
                bank.id,
                DEFAULT_PRODUCT,
                BloodType::OPositive,
                DEFAULT_STOCK,
                self.day(60),
            )
            .await;
        Site {
            facility,
            bank,
            staff,
            stock,
        }
    }
}
