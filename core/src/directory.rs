//! Directory records the lifecycle reads but never writes.
//!
//! Facilities, blood banks and users are maintained by the surrounding CRUD
//! layer; the lifecycle only resolves them by id and uses their names as
//! tracking locations.

use crate::ids::{BloodBankId, FacilityId, UserId};
use serde::{Deserialize, Serialize};

/// A hospital or clinic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    /// Facility id
    pub id: FacilityId,
    /// Display name
    pub facility_name: String,
}

/// A blood bank attached to a facility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodBank {
    /// Blood bank id
    pub id: BloodBankId,
    /// Facility hosting the bank
    pub facility_id: FacilityId,
    /// Display name
    pub blood_bank_name: String,
}

/// A staff member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: UserId,
    /// Facility the user works at
    pub facility_id: Option<FacilityId>,
    /// Display name
    pub name: String,
}
