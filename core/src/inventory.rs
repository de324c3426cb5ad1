//! Blood inventory units held by a blood bank.

use crate::blood::{BloodProduct, BloodType};
use crate::ids::{BloodBankId, InventoryUnitId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stock row: some quantity of one product and group held by one bank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    /// Unit id
    pub id: InventoryUnitId,
    /// Owning blood bank
    pub blood_bank_id: BloodBankId,
    /// Product held
    pub blood_product: BloodProduct,
    /// Blood group held
    pub blood_type: BloodType,
    /// Units on hand
    pub quantity: u32,
    /// Last day the stock may be used
    pub expiry_date: NaiveDate,
    /// Who added the stock (absent for restocked returns)
    pub added_by_id: Option<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl InventoryUnit {
    /// Whether the unit holds the given product and group.
    #[must_use]
    pub fn holds(&self, product: &BloodProduct, blood_type: BloodType) -> bool {
        self.blood_type == blood_type && self.blood_product.matches(product)
    }

    /// Whether the stock is still usable on `today`.
    #[must_use]
    pub fn is_usable_on(&self, today: NaiveDate) -> bool {
        self.expiry_date > today
    }
}
