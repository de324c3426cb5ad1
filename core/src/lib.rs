//! # Blood Bank Core
//!
//! Domain vocabulary for the blood request / distribution / tracking lifecycle.
//!
//! This crate holds no I/O. It defines:
//!
//! - **Entities**: [`BloodRequest`], [`BloodDistribution`], [`TrackState`],
//!   [`InventoryUnit`] and the read-only directory records
//! - **Statuses**: [`ShipmentPhase`], the canonical shipment status, from which
//!   the request-level [`ProcessingStatus`] and the trail's [`TrackLabel`] are derived
//! - **Errors**: [`BloodBankError`], one taxonomy for every operation
//! - **Ports**: [`BloodBankStore`] / [`UnitOfWork`] for persistence,
//!   [`EventPublisher`] for committed domain events
//! - **Environment**: [`Clock`] and [`CodeGenerator`] for injected nondeterminism
//!
//! ## Status derivation
//!
//! ```text
//!                    ShipmentPhase
//!          ┌───────────────┴───────────────┐
//!          ▼                               ▼
//!  to_processing_status()           to_track_label()
//!  (BloodRequest.processing_status) (TrackState.status)
//! ```

pub mod blood;
pub mod config;
pub mod directory;
pub mod distribution;
pub mod environment;
pub mod error;
pub mod event;
pub mod ids;
pub mod inventory;
pub mod request;
pub mod store;
pub mod tracking;

pub use blood::{BloodProduct, BloodType};
pub use config::{EventDelivery, LifecycleConfig};
pub use directory::{BloodBank, Facility, User};
pub use distribution::{BloodDistribution, DistributionPatch, DistributionStats, ShipmentPhase};
pub use environment::{Clock, CodeGenerator, RandomCodeGenerator, SystemClock};
pub use error::{BloodBankError, Result};
pub use event::{DomainEvent, EventPublishError, EventPublisher, NoopPublisher};
pub use ids::{
    BloodBankId, DistributionId, FacilityId, InventoryUnitId, RequestGroupId, RequestId,
    TrackStateId, UserId,
};
pub use inventory::InventoryUnit;
pub use request::{BloodRequest, Priority, ProcessingStatus, RequestProgress, RequestStatus};
pub use store::{
    BloodBankStore, DistributionFilter, FacilityDirection, InventoryFilter, RequestFilter,
    UnitOfWork,
};
pub use tracking::{NewTrackState, TrackLabel, TrackScope, TrackState};

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
