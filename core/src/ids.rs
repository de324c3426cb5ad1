//! Strongly typed identifiers.
//!
//! Every persisted entity is keyed by a UUID wrapped in its own newtype so a
//! `FacilityId` can never be passed where a `BloodBankId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a health facility (hospital, clinic)
    FacilityId
);
define_id!(
    /// Unique identifier for a blood bank attached to a facility
    BloodBankId
);
define_id!(
    /// Unique identifier for a user
    UserId
);
define_id!(
    /// Unique identifier for a single blood request
    RequestId
);
define_id!(
    /// Identifier shared by every sibling request created in one fan-out
    RequestGroupId
);
define_id!(
    /// Unique identifier for a blood distribution (one shipment)
    DistributionId
);
define_id!(
    /// Unique identifier for an inventory unit (ledger row)
    InventoryUnitId
);
define_id!(
    /// Unique identifier for a tracking-trail entry
    TrackStateId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = RequestId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = FacilityId::new();
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, format!("\"{id}\""));
    }
}
